/// Neural network primitives.
///
/// Forward passes written directly over `ndarray`; weights initialize from a
/// seeded RNG with the usual uniform fan-in scaling, so a model built twice
/// from one seed computes identical outputs. Loops are plain and
/// allocation-light; batch and patch extents stay small enough here that
/// clarity beats blocking tricks.

use ndarray::{Array1, Array2, Array4, ArrayBase, Axis, Data, Ix2};
use rand::Rng;
use rand::rngs::StdRng;

// ---------------------------------------------------------------------------
// Activations
// ---------------------------------------------------------------------------

pub fn relu(x: &Array2<f32>) -> Array2<f32> {
    x.mapv(|v| v.max(0.0))
}

pub fn relu4(x: &Array4<f32>) -> Array4<f32> {
    x.mapv(|v| v.max(0.0))
}

pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Row-wise stable softmax, in place.
pub fn softmax_rows(x: &mut Array2<f32>) {
    for mut row in x.rows_mut() {
        let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.0;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            sum += *v;
        }
        for v in row.iter_mut() {
            *v /= sum;
        }
    }
}

/// Uniform fan-in initialization: U(-1/sqrt(fan_in), 1/sqrt(fan_in)).
fn init_uniform(rng: &mut StdRng, fan_in: usize) -> f32 {
    let bound = 1.0 / (fan_in as f32).sqrt();
    rng.gen_range(-bound..bound)
}

/// Weight matrix with uniform fan-in scaling.
pub(crate) fn uniform_matrix(
    rows: usize,
    cols: usize,
    fan_in: usize,
    rng: &mut StdRng,
) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |_| init_uniform(rng, fan_in))
}

/// Bias vector with uniform fan-in scaling.
pub(crate) fn uniform_vector(len: usize, fan_in: usize, rng: &mut StdRng) -> Array1<f32> {
    Array1::from_shape_fn(len, |_| init_uniform(rng, fan_in))
}

// ---------------------------------------------------------------------------
// Linear
// ---------------------------------------------------------------------------

/// Fully-connected layer, `y = x Wᵀ + b`.
pub struct Linear {
    weight: Array2<f32>, // [out, in]
    bias: Array1<f32>,
}

impl Linear {
    pub fn new(in_dim: usize, out_dim: usize, rng: &mut StdRng) -> Self {
        let weight = uniform_matrix(out_dim, in_dim, in_dim, rng);
        let bias = uniform_vector(out_dim, in_dim, rng);
        Self { weight, bias }
    }

    pub fn forward<S>(&self, x: &ArrayBase<S, Ix2>) -> Array2<f32>
    where
        S: Data<Elem = f32>,
    {
        x.dot(&self.weight.t()) + &self.bias
    }

    pub fn out_dim(&self) -> usize {
        self.weight.shape()[0]
    }
}

// ---------------------------------------------------------------------------
// Conv2d
// ---------------------------------------------------------------------------

/// 2-D convolution over `[batch, channel, row, col]` with zero padding.
pub struct Conv2d {
    weight: Array4<f32>, // [out_c, in_c, k, k]
    bias: Array1<f32>,
    padding: usize,
}

impl Conv2d {
    pub fn new(in_channels: usize, out_channels: usize, kernel: usize, padding: usize, rng: &mut StdRng) -> Self {
        let fan_in = in_channels * kernel * kernel;
        let weight = Array4::from_shape_fn((out_channels, in_channels, kernel, kernel), |_| {
            init_uniform(rng, fan_in)
        });
        let bias = uniform_vector(out_channels, fan_in, rng);
        Self {
            weight,
            bias,
            padding,
        }
    }

    pub fn forward(&self, x: &Array4<f32>) -> Array4<f32> {
        let (batch, in_c, rows, cols) = x.dim();
        let (out_c, _, kh, kw) = self.weight.dim();
        let p = self.padding as isize;
        let out_rows = rows + 2 * self.padding - kh + 1;
        let out_cols = cols + 2 * self.padding - kw + 1;

        let mut out = Array4::<f32>::zeros((batch, out_c, out_rows, out_cols));
        for b in 0..batch {
            for oc in 0..out_c {
                for oy in 0..out_rows {
                    for ox in 0..out_cols {
                        let mut acc = self.bias[oc];
                        for ic in 0..in_c {
                            for ky in 0..kh {
                                let iy = oy as isize + ky as isize - p;
                                if iy < 0 || iy >= rows as isize {
                                    continue;
                                }
                                for kx in 0..kw {
                                    let ix = ox as isize + kx as isize - p;
                                    if ix < 0 || ix >= cols as isize {
                                        continue;
                                    }
                                    acc += x[[b, ic, iy as usize, ix as usize]]
                                        * self.weight[[oc, ic, ky, kx]];
                                }
                            }
                        }
                        out[[b, oc, oy, ox]] = acc;
                    }
                }
            }
        }
        out
    }
}

/// Mean over both spatial axes: `[B, C, H, W]` → `[B, C]`.
pub fn global_avg_pool(x: &Array4<f32>) -> Array2<f32> {
    let (_, _, rows, cols) = x.dim();
    let count = (rows * cols) as f32;
    x.sum_axis(Axis(3)).sum_axis(Axis(2)) / count
}

// ---------------------------------------------------------------------------
// LayerNorm
// ---------------------------------------------------------------------------

/// Normalization over the feature (last) axis of `[rows, features]`.
pub struct LayerNorm {
    gamma: Array1<f32>,
    beta: Array1<f32>,
    eps: f32,
}

impl LayerNorm {
    pub fn new(dim: usize) -> Self {
        Self {
            gamma: Array1::ones(dim),
            beta: Array1::zeros(dim),
            eps: 1e-5,
        }
    }

    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let dim = x.shape()[1] as f32;
        let mut out = x.clone();
        for mut row in out.rows_mut() {
            let mean = row.sum() / dim;
            let var = row.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / dim;
            let inv = 1.0 / (var + self.eps).sqrt();
            for (i, v) in row.iter_mut().enumerate() {
                *v = (*v - mean) * inv * self.gamma[i] + self.beta[i];
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_linear_forward_shape_and_bias() {
        let mut r = rng();
        let layer = Linear::new(3, 2, &mut r);
        let x = Array2::<f32>::zeros((4, 3));
        let y = layer.forward(&x);
        assert_eq!(y.shape(), &[4, 2]);
        // Zero input leaves only the bias, identical in every row.
        assert_eq!(y.row(0), y.row(3));
    }

    #[test]
    fn test_conv2d_identity_kernel_preserves_input() {
        let mut r = rng();
        let mut conv = Conv2d::new(1, 1, 3, 1, &mut r);
        conv.weight.fill(0.0);
        conv.weight[[0, 0, 1, 1]] = 1.0; // center tap only
        conv.bias.fill(0.0);

        let x = Array4::from_shape_fn((1, 1, 4, 4), |(_, _, y, z)| (y * 4 + z) as f32);
        let y = conv.forward(&x);
        assert_eq!(y, x);
    }

    #[test]
    fn test_conv2d_same_padding_keeps_spatial_extent() {
        let mut r = rng();
        let conv = Conv2d::new(3, 8, 3, 1, &mut r);
        let x = Array4::<f32>::zeros((2, 3, 9, 9));
        assert_eq!(conv.forward(&x).shape(), &[2, 8, 9, 9]);
        let small = Array4::<f32>::zeros((2, 3, 3, 3));
        assert_eq!(conv.forward(&small).shape(), &[2, 8, 3, 3]);
    }

    #[test]
    fn test_global_avg_pool_means_spatial_axes() {
        let x = Array4::from_shape_fn((1, 2, 2, 2), |(_, c, y, z)| {
            if c == 0 { 1.0 } else { (y * 2 + z) as f32 }
        });
        let pooled = global_avg_pool(&x);
        assert_eq!(pooled[[0, 0]], 1.0);
        assert_eq!(pooled[[0, 1]], 1.5); // mean of 0,1,2,3
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let mut x = array![[1.0f32, 2.0, 3.0], [100.0, 100.0, 100.0]];
        softmax_rows(&mut x);
        for row in x.rows() {
            let sum: f32 = row.sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
        // Equal logits give the uniform distribution, even at large scale.
        assert!((x[[1, 0]] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_layer_norm_centers_and_scales() {
        let norm = LayerNorm::new(4);
        let x = array![[1.0f32, 2.0, 3.0, 4.0]];
        let y = norm.forward(&x);
        let mean: f32 = y.row(0).sum() / 4.0;
        let var: f32 = y.row(0).iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_seeded_init_is_deterministic() {
        let mut r1 = rng();
        let mut r2 = rng();
        let a = Linear::new(8, 8, &mut r1);
        let b = Linear::new(8, 8, &mut r2);
        assert_eq!(a.weight, b.weight);
        assert_eq!(a.bias, b.bias);
    }
}
