/// Model building blocks: one per forecasting stage.
///
/// `SpatialEncoder` compresses a patch to an embedding, `FusionEncoder`
/// mixes the two modalities across time with self-attention, and
/// `TemporalLstm` reduces the fused sequence to a summary state. Each block
/// owns its weights and exposes a pure forward pass.

use ndarray::{Array2, Array3, Array4, Axis, s};
use rand::rngs::StdRng;

use crate::forecast::layers::{
    Conv2d, LayerNorm, Linear, global_avg_pool, relu, relu4, sigmoid, softmax_rows,
    uniform_matrix, uniform_vector,
};

/// Feature widths of the two convolution stages. Matched to the patch sizes
/// this system works at (a handful of degrees around a buoy); wider stages
/// buy nothing once global pooling collapses the spatial axes.
const CONV1_CHANNELS: usize = 32;
const CONV2_CHANNELS: usize = 64;

// ---------------------------------------------------------------------------
// Spatial encoder
// ---------------------------------------------------------------------------

/// Compresses one patch `[B, C, P, P]` into an embedding `[B, E]`.
///
/// Two 3×3 convolution stages with ReLU, global average pooling, and a
/// linear projection. Pooling removes the spatial extent from the output
/// shape: the embedding is exactly E wide for any patch ≥ the kernel
/// support, and for any batch size.
pub struct SpatialEncoder {
    conv1: Conv2d,
    conv2: Conv2d,
    fc: Linear,
}

impl SpatialEncoder {
    pub fn new(in_channels: usize, out_dim: usize, rng: &mut StdRng) -> Self {
        Self {
            conv1: Conv2d::new(in_channels, CONV1_CHANNELS, 3, 1, rng),
            conv2: Conv2d::new(CONV1_CHANNELS, CONV2_CHANNELS, 3, 1, rng),
            fc: Linear::new(CONV2_CHANNELS, out_dim, rng),
        }
    }

    pub fn forward(&self, x: &Array4<f32>) -> Array2<f32> {
        let h = relu4(&self.conv1.forward(x));
        let h = relu4(&self.conv2.forward(&h));
        let pooled = global_avg_pool(&h);
        self.fc.forward(&pooled)
    }
}

// ---------------------------------------------------------------------------
// Fusion encoder
// ---------------------------------------------------------------------------

/// Multi-head self-attention over the T axis of one sequence `[T, D]`.
struct MultiHeadAttention {
    num_heads: usize,
    head_dim: usize,
    wq: Linear,
    wk: Linear,
    wv: Linear,
    wo: Linear,
}

impl MultiHeadAttention {
    fn new(d_model: usize, num_heads: usize, rng: &mut StdRng) -> Self {
        // d_model must split evenly across heads; ModelConfig validation
        // upstream guarantees it.
        let head_dim = d_model / num_heads;
        Self {
            num_heads,
            head_dim,
            wq: Linear::new(d_model, d_model, rng),
            wk: Linear::new(d_model, d_model, rng),
            wv: Linear::new(d_model, d_model, rng),
            wo: Linear::new(d_model, d_model, rng),
        }
    }

    fn attend(&self, seq: &Array2<f32>) -> Array2<f32> {
        let (t, d) = seq.dim();
        let q = self.wq.forward(seq);
        let k = self.wk.forward(seq);
        let v = self.wv.forward(seq);
        let scale = (self.head_dim as f32).sqrt();

        let mut context = Array2::<f32>::zeros((t, d));
        for h in 0..self.num_heads {
            let cols = h * self.head_dim..(h + 1) * self.head_dim;
            let qh = q.slice(s![.., cols.clone()]);
            let kh = k.slice(s![.., cols.clone()]);
            let vh = v.slice(s![.., cols.clone()]);
            let mut scores = qh.dot(&kh.t());
            scores.mapv_inplace(|x| x / scale);
            softmax_rows(&mut scores);
            context.slice_mut(s![.., cols]).assign(&scores.dot(&vh));
        }
        self.wo.forward(&context)
    }
}

/// One self-attention encoder layer: attention and feed-forward sublayers,
/// each wrapped in a residual connection and layer norm.
struct EncoderLayer {
    attn: MultiHeadAttention,
    norm1: LayerNorm,
    ff1: Linear,
    ff2: Linear,
    norm2: LayerNorm,
}

impl EncoderLayer {
    fn new(d_model: usize, num_heads: usize, feedforward_dim: usize, rng: &mut StdRng) -> Self {
        Self {
            attn: MultiHeadAttention::new(d_model, num_heads, rng),
            norm1: LayerNorm::new(d_model),
            ff1: Linear::new(d_model, feedforward_dim, rng),
            ff2: Linear::new(feedforward_dim, d_model, rng),
            norm2: LayerNorm::new(d_model),
        }
    }

    fn forward_seq(&self, seq: &Array2<f32>) -> Array2<f32> {
        let attended = self.attn.attend(seq);
        let x = self.norm1.forward(&(seq + &attended));
        let hidden = relu(&self.ff1.forward(&x));
        let ff = self.ff2.forward(&hidden);
        self.norm2.forward(&(&x + &ff))
    }
}

/// Stacked self-attention encoder over `[B, T, D]`, shape-preserving.
///
/// No positional signal is injected: attention here is permutation-symmetric
/// over time, and temporal order is recovered downstream by the recurrent
/// aggregator, which consumes the sequence chronologically.
pub struct FusionEncoder {
    layers: Vec<EncoderLayer>,
}

impl FusionEncoder {
    pub fn new(
        d_model: usize,
        num_heads: usize,
        num_layers: usize,
        feedforward_dim: usize,
        rng: &mut StdRng,
    ) -> Self {
        let layers = (0..num_layers)
            .map(|_| EncoderLayer::new(d_model, num_heads, feedforward_dim, rng))
            .collect();
        Self { layers }
    }

    pub fn forward(&self, x: &Array3<f32>) -> Array3<f32> {
        let (b, t, d) = x.dim();
        let mut out = Array3::<f32>::zeros((b, t, d));
        for bi in 0..b {
            let mut seq = x.index_axis(Axis(0), bi).to_owned();
            for layer in &self.layers {
                seq = layer.forward_seq(&seq);
            }
            out.index_axis_mut(Axis(0), bi).assign(&seq);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Temporal aggregator
// ---------------------------------------------------------------------------

/// Recurrent accumulation over the fused sequence, in chronological order.
/// Returns the final hidden state `[B, K]` as the sequence summary. This is
/// the one stage whose output depends on the order of time steps.
pub struct TemporalLstm {
    hidden: usize,
    w_ih: Array2<f32>, // [4K, D], gate order i, f, g, o
    w_hh: Array2<f32>, // [4K, K]
    b_ih: ndarray::Array1<f32>,
    b_hh: ndarray::Array1<f32>,
}

impl TemporalLstm {
    pub fn new(input_dim: usize, hidden: usize, rng: &mut StdRng) -> Self {
        Self {
            hidden,
            w_ih: uniform_matrix(4 * hidden, input_dim, input_dim, rng),
            w_hh: uniform_matrix(4 * hidden, hidden, hidden, rng),
            b_ih: uniform_vector(4 * hidden, input_dim, rng),
            b_hh: uniform_vector(4 * hidden, hidden, rng),
        }
    }

    pub fn forward(&self, x: &Array3<f32>) -> Array2<f32> {
        let (b, t, _d) = x.dim();
        let k = self.hidden;
        let mut h = Array2::<f32>::zeros((b, k));
        let mut c = Array2::<f32>::zeros((b, k));

        for ti in 0..t {
            let xt = x.index_axis(Axis(1), ti);
            let mut gates = xt.dot(&self.w_ih.t()) + h.dot(&self.w_hh.t());
            gates = gates + &self.b_ih;
            gates = gates + &self.b_hh;

            for bi in 0..b {
                for j in 0..k {
                    let i_gate = sigmoid(gates[[bi, j]]);
                    let f_gate = sigmoid(gates[[bi, k + j]]);
                    let g_gate = gates[[bi, 2 * k + j]].tanh();
                    let o_gate = sigmoid(gates[[bi, 3 * k + j]]);
                    let cell = f_gate * c[[bi, j]] + i_gate * g_gate;
                    c[[bi, j]] = cell;
                    h[[bi, j]] = o_gate * cell.tanh();
                }
            }
        }
        h
    }
}
