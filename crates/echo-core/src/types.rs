//! Core data types for the Echo TTS pipeline.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EchoError, EchoResult};

/// A synthesized or decoded waveform.
///
/// Samples are interleaved when `channels > 1`. The storage is shared, so
/// cloning a buffer is cheap and the buffer stays usable after it is saved.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved PCM samples in `[-1, 1]`.
    pub samples: Arc<[f32]>,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a mono buffer.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            channels: 1,
            sample_rate,
        }
    }

    /// Create a buffer from interleaved samples.
    pub fn interleaved(samples: Vec<f32>, channels: u16, sample_rate: u32) -> EchoResult<Self> {
        if channels == 0 {
            return Err(EchoError::audio_format("channel count must be at least 1"));
        }
        if sample_rate == 0 {
            return Err(EchoError::audio_format("sample rate must be positive"));
        }
        if samples.len() % channels as usize != 0 {
            return Err(EchoError::audio_format(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            samples: samples.into(),
            channels,
            sample_rate,
        })
    }

    /// Total number of samples across all channels.
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Number of frames (samples per channel).
    pub fn num_frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in milliseconds.
    pub fn duration_ms(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames() as f32 / self.sample_rate as f32 * 1000.0
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Whether every sample is finite.
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }

    /// Whether every sample is exactly zero.
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0.0)
    }

    /// Copy out one channel.
    pub fn channel(&self, index: usize) -> Vec<f32> {
        let channels = self.channels as usize;
        if index >= channels {
            return Vec::new();
        }
        self.samples
            .iter()
            .skip(index)
            .step_by(channels)
            .copied()
            .collect()
    }
}

/// Text conditioning produced by a [`ConditioningEncoder`](crate::ConditioningEncoder).
///
/// Row-major `tokens x dim` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditioning {
    /// Flattened embedding values.
    pub values: Vec<f32>,
    /// Number of rows (encoded positions).
    pub tokens: usize,
    /// Embedding width.
    pub dim: usize,
}

impl Conditioning {
    /// Create conditioning, checking that the shape matches the data.
    pub fn new(values: Vec<f32>, tokens: usize, dim: usize) -> EchoResult<Self> {
        if tokens == 0 || dim == 0 {
            return Err(EchoError::invalid_request("conditioning must not be empty"));
        }
        if values.len() != tokens * dim {
            return Err(EchoError::internal(format!(
                "conditioning has {} values, expected {tokens}x{dim}",
                values.len()
            )));
        }
        Ok(Self {
            values,
            tokens,
            dim,
        })
    }

    /// Borrow one row.
    pub fn row(&self, token: usize) -> &[f32] {
        &self.values[token * self.dim..(token + 1) * self.dim]
    }
}

/// Knobs for the refinement loop beyond step count and length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    /// Classifier-free guidance scale (1.0 = conditional branch only).
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
    /// Scale applied to the initial noise.
    #[serde(default = "default_noise_scale")]
    pub noise_scale: f32,
    /// Truncate initial noise to `[-clamp, clamp]`.
    #[serde(default)]
    pub noise_clamp: Option<f32>,
    /// Drop near-silent audio from the end of the output.
    #[serde(default)]
    pub trim_trailing_silence: bool,
}

fn default_guidance_scale() -> f32 {
    1.0
}

fn default_noise_scale() -> f32 {
    1.0
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            guidance_scale: default_guidance_scale(),
            noise_scale: default_noise_scale(),
            noise_clamp: None,
            trim_trailing_silence: false,
        }
    }
}

impl SamplingOptions {
    /// Whether the unconditional branch must be evaluated.
    pub fn uses_guidance(&self) -> bool {
        (self.guidance_scale - 1.0).abs() > f32::EPSILON
    }

    /// Check option ranges.
    pub fn validate(&self) -> EchoResult<()> {
        if !self.guidance_scale.is_finite() || self.guidance_scale < 0.0 {
            return Err(EchoError::invalid_request(format!(
                "guidance_scale must be finite and >= 0, got {}",
                self.guidance_scale
            )));
        }
        if !self.noise_scale.is_finite() || self.noise_scale <= 0.0 {
            return Err(EchoError::invalid_request(format!(
                "noise_scale must be finite and > 0, got {}",
                self.noise_scale
            )));
        }
        if let Some(clamp) = self.noise_clamp {
            if !clamp.is_finite() || clamp <= 0.0 {
                return Err(EchoError::invalid_request(format!(
                    "noise_clamp must be finite and > 0, got {clamp}"
                )));
            }
        }
        Ok(())
    }
}

/// A synthesis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// Identifier used for log correlation only.
    pub request_id: Uuid,
    /// Text to synthesize.
    pub text: String,
    /// Seed for the initial noise.
    pub seed: u64,
    /// Number of refinement iterations.
    pub num_steps: usize,
    /// Number of latent frames to generate.
    pub sequence_length: usize,
    /// Sampling options.
    #[serde(default)]
    pub options: SamplingOptions,
}

impl SynthesisRequest {
    /// Create a request with default options.
    pub fn new(
        text: impl Into<String>,
        seed: u64,
        num_steps: usize,
        sequence_length: usize,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            text: text.into(),
            seed,
            num_steps,
            sequence_length,
            options: SamplingOptions::default(),
        }
    }

    /// Set the guidance scale.
    pub fn with_guidance_scale(mut self, scale: f32) -> Self {
        self.options.guidance_scale = scale;
        self
    }

    /// Set the initial noise scale.
    pub fn with_noise_scale(mut self, scale: f32) -> Self {
        self.options.noise_scale = scale;
        self
    }

    /// Truncate initial noise.
    pub fn with_noise_clamp(mut self, clamp: f32) -> Self {
        self.options.noise_clamp = Some(clamp);
        self
    }

    /// Trim trailing silence from the output.
    pub fn with_trailing_silence_trim(mut self, trim: bool) -> Self {
        self.options.trim_trailing_silence = trim;
        self
    }

    /// Replace all sampling options.
    pub fn with_options(mut self, options: SamplingOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate the request against the engine's sequence bounds.
    ///
    /// Out-of-range values are rejected, never clamped.
    pub fn validate(&self, min_sequence_length: usize, max_sequence_length: usize) -> EchoResult<()> {
        if self.text.trim().is_empty() {
            return Err(EchoError::invalid_request("text must not be empty"));
        }
        if self.num_steps == 0 {
            return Err(EchoError::invalid_request("num_steps must be at least 1"));
        }
        if self.sequence_length < min_sequence_length {
            return Err(EchoError::invalid_request(format!(
                "sequence_length {} is below the minimum of {min_sequence_length}",
                self.sequence_length
            )));
        }
        if self.sequence_length > max_sequence_length {
            return Err(EchoError::invalid_request(format!(
                "sequence_length {} exceeds the maximum of {max_sequence_length}",
                self.sequence_length
            )));
        }
        self.options.validate()
    }
}
