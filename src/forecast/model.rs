/// The multimodal SWH forecaster.
///
/// Wiring, per time step: each modality's patch goes through its own spatial
/// encoder, the two embeddings concatenate and project to the fusion width,
/// self-attention mixes the T steps, an LSTM reduces the fused sequence to a
/// summary, and the head maps the summary to H lead-hour values. The head's
/// output carries no activation: the model regresses free-form SWH in meters
/// under a squared-error objective.

use ndarray::{Array2, Array3, Array4, Array5, s};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::forecast::components::{FusionEncoder, SpatialEncoder, TemporalLstm};
use crate::forecast::layers::{Linear, relu};
use crate::model::ForecastError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Model hyperparameters. The defaults are the dimensions the production
/// checkpoints were trained at; tests shrink them for speed.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Wave-modality channels (swh, mwp, mwd).
    pub ww3_channels: usize,
    /// Atmosphere-modality channels (10u, 10v, prmsl).
    pub gfs_channels: usize,
    pub patch_size: usize,
    pub time_steps: usize,
    pub horizon: usize,
    /// Spatial embedding width E per modality.
    pub cnn_dim: usize,
    /// Fusion width D; must divide evenly by `num_heads`.
    pub fusion_dim: usize,
    /// Summary width K.
    pub lstm_hidden: usize,
    pub num_heads: usize,
    pub fusion_layers: usize,
    pub feedforward_dim: usize,
    /// Weight initialization seed. Two models built from the same config
    /// compute identical outputs.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            ww3_channels: 3,
            gfs_channels: 3,
            patch_size: 9,
            time_steps: 12,
            horizon: 6,
            cnn_dim: 128,
            fusion_dim: 256,
            lstm_hidden: 256,
            num_heads: 4,
            fusion_layers: 2,
            feedforward_dim: 256,
            seed: 42,
        }
    }
}

impl ModelConfig {
    fn validate(&self) -> Result<(), ForecastError> {
        let dims = [
            self.ww3_channels,
            self.gfs_channels,
            self.patch_size,
            self.time_steps,
            self.horizon,
            self.cnn_dim,
            self.fusion_dim,
            self.lstm_hidden,
            self.num_heads,
            self.fusion_layers,
            self.feedforward_dim,
        ];
        if dims.contains(&0) {
            return Err(ForecastError::EmptyInput("model dimension"));
        }
        if self.fusion_dim % self.num_heads != 0 {
            return Err(ForecastError::ShapeMismatch {
                context: "fusion_dim vs num_heads",
                expected: self.fusion_dim,
                actual: self.num_heads,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Forecaster
// ---------------------------------------------------------------------------

/// The assembled model. Weights never change after construction: `forward`
/// takes `&self` and is safe to call concurrently from multiple threads.
pub struct WaveForecaster {
    cfg: ModelConfig,
    encoder_ww3: SpatialEncoder,
    encoder_gfs: SpatialEncoder,
    proj: Linear,
    fusion: FusionEncoder,
    temporal: TemporalLstm,
    head_hidden: Linear,
    head_out: Linear,
}

impl WaveForecaster {
    pub fn new(cfg: ModelConfig) -> Result<Self, ForecastError> {
        cfg.validate()?;
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        Ok(Self {
            encoder_ww3: SpatialEncoder::new(cfg.ww3_channels, cfg.cnn_dim, &mut rng),
            encoder_gfs: SpatialEncoder::new(cfg.gfs_channels, cfg.cnn_dim, &mut rng),
            proj: Linear::new(cfg.cnn_dim * 2, cfg.fusion_dim, &mut rng),
            fusion: FusionEncoder::new(
                cfg.fusion_dim,
                cfg.num_heads,
                cfg.fusion_layers,
                cfg.feedforward_dim,
                &mut rng,
            ),
            temporal: TemporalLstm::new(cfg.fusion_dim, cfg.lstm_hidden, &mut rng),
            head_hidden: Linear::new(cfg.lstm_hidden, cfg.lstm_hidden, &mut rng),
            head_out: Linear::new(cfg.lstm_hidden, cfg.horizon, &mut rng),
            cfg,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.cfg
    }

    /// Runs the forward pass: `[B,T,Cw,P,P]` + `[B,T,Cg,P,P]` → `[B,H]`.
    pub fn forward(
        &self,
        ww3: &Array5<f32>,
        gfs: &Array5<f32>,
    ) -> Result<Array2<f32>, ForecastError> {
        self.check_input(ww3, self.cfg.ww3_channels)?;
        self.check_input(gfs, self.cfg.gfs_channels)?;
        let (batch, time, ..) = ww3.dim();
        if gfs.shape()[0] != batch {
            return Err(ForecastError::ShapeMismatch {
                context: "ww3 vs gfs batch size",
                expected: batch,
                actual: gfs.shape()[0],
            });
        }
        if batch == 0 {
            return Err(ForecastError::EmptyInput("inference batch"));
        }

        // Fold batch and time together so each time step encodes
        // independently, then restore the sequence axis for fusion.
        let ww3_flat = flatten_time(ww3)?;
        let gfs_flat = flatten_time(gfs)?;
        let e_ww3 = self.encoder_ww3.forward(&ww3_flat); // [B*T, E]
        let e_gfs = self.encoder_gfs.forward(&gfs_flat); // [B*T, E]

        let mut joint = Array2::<f32>::zeros((batch * time, self.cfg.cnn_dim * 2));
        joint.slice_mut(s![.., ..self.cfg.cnn_dim]).assign(&e_ww3);
        joint.slice_mut(s![.., self.cfg.cnn_dim..]).assign(&e_gfs);
        let projected = self.proj.forward(&joint); // [B*T, D]

        let mut sequence = Array3::<f32>::zeros((batch, time, self.cfg.fusion_dim));
        for b in 0..batch {
            sequence
                .slice_mut(s![b, .., ..])
                .assign(&projected.slice(s![b * time..(b + 1) * time, ..]));
        }

        let fused = self.fusion.forward(&sequence); // [B, T, D]
        let summary = self.temporal.forward(&fused); // [B, K]
        let hidden = relu(&self.head_hidden.forward(&summary));
        Ok(self.head_out.forward(&hidden)) // [B, H]
    }

    fn check_input(&self, x: &Array5<f32>, channels: usize) -> Result<(), ForecastError> {
        let shape = x.shape();
        if shape[1] != self.cfg.time_steps {
            return Err(ForecastError::ShapeMismatch {
                context: "input time steps vs model config",
                expected: self.cfg.time_steps,
                actual: shape[1],
            });
        }
        if shape[2] != channels {
            return Err(ForecastError::ShapeMismatch {
                context: "input channels vs model config",
                expected: channels,
                actual: shape[2],
            });
        }
        // Any spatial extent >= the kernel support works; global pooling
        // absorbs the difference. Zero-extent patches cannot convolve.
        if shape[3] == 0 || shape[4] == 0 {
            return Err(ForecastError::EmptyInput("patch spatial extent"));
        }
        Ok(())
    }
}

/// `[B, T, C, P, P]` → `[B*T, C, P, P]`.
fn flatten_time(x: &Array5<f32>) -> Result<Array4<f32>, ForecastError> {
    let (b, t, c, rows, cols) = x.dim();
    let flat: Vec<f32> = x.iter().copied().collect();
    Array4::from_shape_vec((b * t, c, rows, cols), flat).map_err(|_| {
        ForecastError::ShapeMismatch {
            context: "batch-time flatten",
            expected: b * t * c * rows * cols,
            actual: 0,
        }
    })
}
