//! Latent-to-waveform decoding with windowed overlap-add.

use std::f32::consts::PI;

use candle_core::{DType, Tensor};
use candle_nn::VarBuilder;
use tracing::debug;

use echo_core::{EchoError, EchoResult};

use crate::config::SamplerConfig;
use crate::weights::DECODER_WEIGHT;

/// Projects each latent frame to a windowed block of `2 * hop` samples and
/// overlap-adds the blocks at `hop` spacing.
///
/// The periodic Hann window sums to one at 50% overlap, so interior samples
/// keep their level. Half a hop is trimmed from each end, leaving exactly
/// `frames * hop` samples.
#[derive(Debug, Clone)]
pub struct LatentDecoder {
    /// `[latent_dim, 2 * hop]`, always F32.
    proj: Tensor,
    window: Vec<f32>,
    hop: usize,
    peak_limit: f32,
}

impl LatentDecoder {
    pub fn new(config: &SamplerConfig, vb: &VarBuilder) -> candle_core::Result<Self> {
        let block = 2 * config.frame_hop;
        let weight = vb.get((block, config.latent_dim), DECODER_WEIGHT)?;
        let proj = weight.to_dtype(DType::F32)?.t()?.contiguous()?;

        Ok(Self {
            proj,
            window: hann_window(block),
            hop: config.frame_hop,
            peak_limit: config.peak_limit,
        })
    }

    /// Decode `[frames, latent_dim]` into mono samples.
    ///
    /// `step` is reported if the result is not finite.
    pub fn decode(&self, latent: &Tensor, step: usize) -> EchoResult<Vec<f32>> {
        let blocks: Vec<Vec<f32>> = latent
            .to_dtype(DType::F32)
            .and_then(|l| l.matmul(&self.proj))
            .and_then(|b| b.tanh())
            .and_then(|b| b.to_vec2())
            .map_err(|e| EchoError::inference(format!("decode failed: {e}")))?;

        let frames = blocks.len();
        let mut out = vec![0.0f32; (frames + 1) * self.hop];
        for (k, block) in blocks.iter().enumerate() {
            let start = k * self.hop;
            for (i, (&s, &w)) in block.iter().zip(&self.window).enumerate() {
                out[start + i] += s * w;
            }
        }

        let edge = self.hop / 2;
        let mut samples: Vec<f32> = out[edge..edge + frames * self.hop].to_vec();

        if samples.iter().any(|s| !s.is_finite()) {
            return Err(EchoError::numeric_instability(
                step,
                "decoded waveform contains non-finite samples",
            ));
        }

        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        if peak > self.peak_limit {
            let gain = self.peak_limit / peak;
            samples.iter_mut().for_each(|s| *s *= gain);
            debug!(peak, gain, "limited output peak");
        }

        Ok(samples)
    }
}

/// Periodic Hann window of length `n`.
pub fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos()))
        .collect()
}

/// RMS of a slice. Zero for an empty slice.
fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Drop trailing windows whose RMS is below `threshold`.
///
/// At least one window of audio is always kept.
pub fn trim_trailing_silence(samples: &mut Vec<f32>, window: usize, threshold: f32) {
    let window = window.max(1);
    if samples.len() <= window {
        return;
    }

    let mut end = samples.len();
    while end > window {
        let start = end.saturating_sub(window);
        if rms(&samples[start..end]) >= threshold {
            break;
        }
        end = start;
    }

    let end = end.max(window);
    if end < samples.len() {
        debug!(from = samples.len(), to = end, "trimmed trailing silence");
        samples.truncate(end);
    }
}
