//! Neural network layers for the velocity network.

use candle_core::{DType, Device, Result, Tensor, D};
use candle_nn::{linear, Linear, Module, VarBuilder};

use crate::config::SamplerConfig;

/// RMSNorm with a learned scale.
#[derive(Debug, Clone)]
pub struct RmsNorm {
    weight: Tensor,
    eps: f32,
}

impl RmsNorm {
    /// Create a new RMSNorm layer.
    pub fn new(hidden_size: usize, eps: f32, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get((hidden_size,), "weight")?;
        Ok(Self { weight, eps })
    }

    /// Normalize over the last dimension. Statistics are taken in F32.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let dtype = x.dtype();
        let x = x.to_dtype(DType::F32)?;

        let variance = x.sqr()?.mean_keepdim(D::Minus1)?;
        let rms = (variance + self.eps as f64)?.sqrt()?;
        let normalized = x.broadcast_div(&rms)?;

        normalized
            .broadcast_mul(&self.weight.to_dtype(DType::F32)?)?
            .to_dtype(dtype)
    }
}

/// Layer normalization without learned affine terms.
pub fn plain_layer_norm(x: &Tensor, eps: f32) -> Result<Tensor> {
    let dtype = x.dtype();
    let x = x.to_dtype(DType::F32)?;

    let mean = x.mean_keepdim(D::Minus1)?;
    let centered = x.broadcast_sub(&mean)?;
    let variance = centered.sqr()?.mean_keepdim(D::Minus1)?;
    let std = (variance + eps as f64)?.sqrt()?;

    centered.broadcast_div(&std)?.to_dtype(dtype)
}

/// AdaLN modulation: `x * (1 + scale) + shift`.
fn modulate(x: &Tensor, shift: &Tensor, scale: &Tensor) -> Result<Tensor> {
    x.broadcast_mul(&(scale + 1.0)?)?.broadcast_add(shift)
}

/// Embeds a scalar step time through sinusoids and a small MLP.
#[derive(Debug, Clone)]
pub struct TimestepEmbedder {
    freqs: Vec<f32>,
    time_scale: f32,
    proj_in: Linear,
    proj_out: Linear,
    norm: RmsNorm,
}

impl TimestepEmbedder {
    pub fn new(config: &SamplerConfig, vb: VarBuilder) -> Result<Self> {
        let half = config.frequency_embedding_size / 2;
        let freqs = (0..half)
            .map(|i| (-config.max_period.ln() * i as f32 / half as f32).exp())
            .collect();

        let proj_in = linear(
            config.frequency_embedding_size,
            config.hidden_size,
            vb.pp("proj_in"),
        )?;
        let proj_out = linear(config.hidden_size, config.hidden_size, vb.pp("proj_out"))?;
        let norm = RmsNorm::new(config.hidden_size, config.norm_eps, vb.pp("norm"))?;

        Ok(Self {
            freqs,
            time_scale: config.time_scale,
            proj_in,
            proj_out,
            norm,
        })
    }

    /// Cosine then sine components for step time `t`.
    fn sinusoids(&self, t: f32) -> Vec<f32> {
        let t = t * self.time_scale;
        self.freqs
            .iter()
            .map(|f| (t * f).cos())
            .chain(self.freqs.iter().map(|f| (t * f).sin()))
            .collect()
    }

    /// Embed `t` for every batch row. Returns `[batch, 1, hidden]`.
    pub fn forward(&self, t: f32, batch: usize, dtype: DType, device: &Device) -> Result<Tensor> {
        let row = self.sinusoids(t);
        let width = row.len();
        let values: Vec<f32> = row.iter().copied().cycle().take(width * batch).collect();

        let emb = Tensor::from_vec(values, (batch, width), device)?.to_dtype(dtype)?;
        let hidden = self.proj_in.forward(&emb)?;
        let hidden = candle_nn::ops::silu(&hidden)?;
        let hidden = self.proj_out.forward(&hidden)?;
        self.norm.forward(&hidden)?.unsqueeze(1)
    }
}

/// Residual MLP block with AdaLN shift/scale/gate modulation.
#[derive(Debug, Clone)]
pub struct ResBlock {
    mlp_in: Linear,
    mlp_out: Linear,
    mod_linear: Linear,
    channels: usize,
    eps: f32,
}

impl ResBlock {
    pub fn new(config: &SamplerConfig, vb: VarBuilder) -> Result<Self> {
        let h = config.hidden_size;
        Ok(Self {
            mlp_in: linear(h, h, vb.pp("mlp_in"))?,
            mlp_out: linear(h, h, vb.pp("mlp_out"))?,
            mod_linear: linear(h, 3 * h, vb.pp("mod_linear"))?,
            channels: h,
            eps: config.norm_eps,
        })
    }

    /// The modulation projection, exposed for fusing.
    pub fn mod_linear(&self) -> &Linear {
        &self.mod_linear
    }

    /// Forward pass with conditioning signal `y`.
    pub fn forward(&self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        let modulation = self.mod_linear.forward(&candle_nn::ops::silu(y)?)?;
        self.forward_modulated(x, &modulation)
    }

    /// Forward pass with a precomputed `[.., 3 * channels]` modulation.
    pub fn forward_modulated(&self, x: &Tensor, modulation: &Tensor) -> Result<Tensor> {
        let c = self.channels;
        let shift = modulation.narrow(D::Minus1, 0, c)?;
        let scale = modulation.narrow(D::Minus1, c, c)?;
        let gate = modulation.narrow(D::Minus1, 2 * c, c)?;

        let h = modulate(&plain_layer_norm(x, self.eps)?, &shift, &scale)?;
        let h = self.mlp_in.forward(&h)?;
        let h = candle_nn::ops::silu(&h)?;
        let h = self.mlp_out.forward(&h)?;

        x + gate.broadcast_mul(&h)?
    }
}

/// Final AdaLN projection back to latent width.
#[derive(Debug, Clone)]
pub struct FinalLayer {
    linear: Linear,
    mod_linear: Linear,
    channels: usize,
    eps: f32,
}

impl FinalLayer {
    pub fn new(config: &SamplerConfig, vb: VarBuilder) -> Result<Self> {
        let h = config.hidden_size;
        Ok(Self {
            linear: linear(h, config.latent_dim, vb.pp("linear"))?,
            mod_linear: linear(h, 2 * h, vb.pp("mod_linear"))?,
            channels: h,
            eps: config.norm_eps,
        })
    }

    pub fn mod_linear(&self) -> &Linear {
        &self.mod_linear
    }

    pub fn forward(&self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        let modulation = self.mod_linear.forward(&candle_nn::ops::silu(y)?)?;
        self.forward_modulated(x, &modulation)
    }

    pub fn forward_modulated(&self, x: &Tensor, modulation: &Tensor) -> Result<Tensor> {
        let c = self.channels;
        let shift = modulation.narrow(D::Minus1, 0, c)?;
        let scale = modulation.narrow(D::Minus1, c, c)?;
        let h = modulate(&plain_layer_norm(x, self.eps)?, &shift, &scale)?;
        self.linear.forward(&h)
    }
}

/// All modulation projections of a network stacked into one matmul.
///
/// Produces the same modulations as running each block's projection in
/// turn, with one kernel launch per step instead of one per block.
#[derive(Debug, Clone)]
pub struct FusedModulation {
    linear: Linear,
    widths: Vec<usize>,
}

impl FusedModulation {
    /// Stack the given projections. Each must carry a bias.
    pub fn new(parts: &[&Linear]) -> Result<Self> {
        let mut weights = Vec::with_capacity(parts.len());
        let mut biases = Vec::with_capacity(parts.len());
        let mut widths = Vec::with_capacity(parts.len());

        for part in parts {
            let bias = part
                .bias()
                .ok_or_else(|| candle_core::Error::Msg("modulation without bias".into()))?;
            widths.push(part.weight().dim(0)?);
            weights.push(part.weight().clone());
            biases.push(bias.clone());
        }

        let weight = Tensor::cat(&weights, 0)?;
        let bias = Tensor::cat(&biases, 0)?;
        Ok(Self {
            linear: Linear::new(weight, Some(bias)),
            widths,
        })
    }

    /// Compute every modulation from `y`, split back per part.
    pub fn forward(&self, y: &Tensor) -> Result<Vec<Tensor>> {
        let all = self.linear.forward(&candle_nn::ops::silu(y)?)?;
        let mut offset = 0;
        let mut out = Vec::with_capacity(self.widths.len());
        for &width in &self.widths {
            out.push(all.narrow(D::Minus1, offset, width)?);
            offset += width;
        }
        Ok(out)
    }
}
