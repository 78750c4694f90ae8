/// Rolling-window sequence construction.
///
/// Slides a fixed-length window over two aligned, patch-extracted series and
/// emits (past, future-target) samples. The target is always the primary
/// series' variable 0 (SWH for the wave modality) at the patch center pixel.

use ndarray::{Array2, Array4, Array5, s};

use crate::model::ForecastError;

/// Model-ready samples: two past windows per sample plus the future target.
///
/// `primary` is `[N, T, Cw, P, P]`, `secondary` is `[N, T, Cg, P, P]`,
/// `targets` is `[N, H]`. Index 0 is the earliest window; consecutive
/// windows overlap by T+H-1 steps (stride 1).
#[derive(Debug, Clone)]
pub struct SampleSet {
    pub primary: Array5<f32>,
    pub secondary: Array5<f32>,
    pub targets: Array2<f32>,
}

impl SampleSet {
    pub fn len(&self) -> usize {
        self.targets.shape()[0]
    }

    /// An empty set signals "insufficient history", not a failure.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds all stride-1 windows of `time_steps` past steps and `horizon`
/// future target steps from two series indexed `[time, variable, row, col]`.
///
/// Produces N = max(0, L − (T+H) + 1) samples; too little history yields an
/// empty `SampleSet`. Sample i observes steps [i, i+T) of both series and
/// targets the primary series' variable 0 at the patch center pixel over
/// steps [i+T, i+T+H).
pub fn build_sequences(
    primary: &Array4<f32>,
    secondary: &Array4<f32>,
    time_steps: usize,
    horizon: usize,
) -> Result<SampleSet, ForecastError> {
    if time_steps == 0 {
        return Err(ForecastError::EmptyInput("time_steps"));
    }
    if horizon == 0 {
        return Err(ForecastError::EmptyInput("horizon"));
    }

    let p_shape = primary.shape();
    let s_shape = secondary.shape();
    if p_shape[0] != s_shape[0] {
        return Err(ForecastError::ShapeMismatch {
            context: "primary vs secondary time length",
            expected: p_shape[0],
            actual: s_shape[0],
        });
    }

    let times = p_shape[0];
    let span = time_steps + horizon;
    let n = if times >= span { times - span + 1 } else { 0 };

    let (cw, pr, pc) = (p_shape[1], p_shape[2], p_shape[3]);
    let (cg, sr, sc) = (s_shape[1], s_shape[2], s_shape[3]);

    let mut out_primary = Array5::<f32>::zeros((n, time_steps, cw, pr, pc));
    let mut out_secondary = Array5::<f32>::zeros((n, time_steps, cg, sr, sc));
    let mut targets = Array2::<f32>::zeros((n, horizon));

    // Center pixel by floor division on each spatial axis.
    let center_row = pr / 2;
    let center_col = pc / 2;

    for i in 0..n {
        out_primary
            .slice_mut(s![i, .., .., .., ..])
            .assign(&primary.slice(s![i..i + time_steps, .., .., ..]));
        out_secondary
            .slice_mut(s![i, .., .., .., ..])
            .assign(&secondary.slice(s![i..i + time_steps, .., .., ..]));
        for h in 0..horizon {
            targets[[i, h]] = primary[[i + time_steps + h, 0, center_row, center_col]];
        }
    }

    Ok(SampleSet {
        primary: out_primary,
        secondary: out_secondary,
        targets,
    })
}
