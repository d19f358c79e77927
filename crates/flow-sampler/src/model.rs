//! Velocity network for the refinement loop.

use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder};
use tracing::debug;

use crate::config::SamplerConfig;
use crate::layers::{FinalLayer, FusedModulation, ResBlock, TimestepEmbedder};

/// Predicts the flow direction for a latent state at step interval `[s, t]`.
///
/// Input latents are `[batch, frames, latent_dim]`; conditioning is projected
/// once per request to `[batch, frames, hidden]` and reused on every step.
#[derive(Debug)]
pub struct VelocityNet {
    input_proj: Linear,
    cond_proj: Linear,
    time_s: TimestepEmbedder,
    time_t: TimestepEmbedder,
    blocks: Vec<ResBlock>,
    final_layer: FinalLayer,
    fused: Option<FusedModulation>,
    dtype: DType,
    device: Device,
}

impl VelocityNet {
    /// Build from a VarBuilder rooted at the network prefix.
    ///
    /// With `fused`, every block's modulation projection is stacked into a
    /// single matmul evaluated once per step.
    pub fn new(config: &SamplerConfig, vb: VarBuilder, fused: bool) -> Result<Self> {
        let h = config.hidden_size;
        let input_proj = linear(config.latent_dim, h, vb.pp("input_proj"))?;
        let cond_proj = linear(config.cond_dim, h, vb.pp("cond_proj"))?;
        let time_s = TimestepEmbedder::new(config, vb.pp("time_s"))?;
        let time_t = TimestepEmbedder::new(config, vb.pp("time_t"))?;

        let mut blocks = Vec::with_capacity(config.num_blocks);
        for i in 0..config.num_blocks {
            blocks.push(ResBlock::new(config, vb.pp(format!("blocks.{i}")))?);
        }
        let final_layer = FinalLayer::new(config, vb.pp("final_layer"))?;

        let fused = if fused {
            let mut parts: Vec<&Linear> = blocks.iter().map(|b| b.mod_linear()).collect();
            parts.push(final_layer.mod_linear());
            Some(FusedModulation::new(&parts)?)
        } else {
            None
        };

        debug!(
            blocks = blocks.len(),
            hidden = h,
            fused = fused.is_some(),
            "velocity network built"
        );

        Ok(Self {
            input_proj,
            cond_proj,
            time_s,
            time_t,
            blocks,
            final_layer,
            fused,
            dtype: vb.dtype(),
            device: vb.device().clone(),
        })
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn is_fused(&self) -> bool {
        self.fused.is_some()
    }

    /// Project frame-aligned conditioning `[batch, frames, cond_dim]`.
    pub fn project_conditioning(&self, cond: &Tensor) -> Result<Tensor> {
        self.cond_proj.forward(cond)
    }

    /// Velocity at `x` for the interval from `s` to `t`.
    pub fn forward(&self, cond: &Tensor, s: f32, t: f32, x: &Tensor) -> Result<Tensor> {
        let batch = x.dim(0)?;
        let mut h = self.input_proj.forward(x)?;

        let ts = self.time_s.forward(s, batch, self.dtype, &self.device)?;
        let tt = self.time_t.forward(t, batch, self.dtype, &self.device)?;
        let time = ((ts + tt)? * 0.5)?;
        let y = cond.broadcast_add(&time)?;

        match &self.fused {
            Some(fused) => {
                let mods = fused.forward(&y)?;
                for (block, m) in self.blocks.iter().zip(&mods) {
                    h = block.forward_modulated(&h, m)?;
                }
                let last = mods
                    .last()
                    .ok_or_else(|| candle_core::Error::Msg("empty fused modulation".into()))?;
                self.final_layer.forward_modulated(&h, last)
            }
            None => {
                for block in &self.blocks {
                    h = block.forward(&h, &y)?;
                }
                self.final_layer.forward(&h, &y)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::seeded_weights;

    fn small_config() -> SamplerConfig {
        SamplerConfig {
            latent_dim: 4,
            hidden_size: 8,
            cond_dim: 6,
            num_blocks: 2,
            frequency_embedding_size: 8,
            frame_hop: 16,
            ..Default::default()
        }
    }

    fn build(fused: bool) -> VelocityNet {
        let device = Device::Cpu;
        let config = small_config();
        let tensors = seeded_weights(&config, 11, &device).unwrap();
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        VelocityNet::new(&config, vb.pp("net"), fused).unwrap()
    }

    #[test]
    fn test_forward_shape() {
        let net = build(false);
        let device = Device::Cpu;
        let x = Tensor::ones((2, 5, 4), DType::F32, &device).unwrap();
        let c = Tensor::ones((2, 5, 6), DType::F32, &device).unwrap();
        let cond = net.project_conditioning(&c).unwrap();
        let v = net.forward(&cond, 0.0, 0.25, &x).unwrap();
        assert_eq!(v.dims(), &[2, 5, 4]);
    }

    #[test]
    fn test_fused_matches_unfused() {
        let plain = build(false);
        let fused = build(true);
        assert!(fused.is_fused());

        let device = Device::Cpu;
        let x = Tensor::randn(0f32, 1.0, (1, 7, 4), &device).unwrap();
        let c = Tensor::randn(0f32, 1.0, (1, 7, 6), &device).unwrap();

        let a = plain
            .forward(&plain.project_conditioning(&c).unwrap(), 0.5, 0.75, &x)
            .unwrap();
        let b = fused
            .forward(&fused.project_conditioning(&c).unwrap(), 0.5, 0.75, &x)
            .unwrap();

        let a: Vec<f32> = a.flatten_all().unwrap().to_vec1().unwrap();
        let b: Vec<f32> = b.flatten_all().unwrap().to_vec1().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4, "{x} vs {y}");
        }
    }
}
