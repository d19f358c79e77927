//! Sampler configuration.

use candle_core::DType;
use serde::{Deserialize, Serialize};

use echo_core::{EchoError, EchoResult, Precision};

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// Output samples produced per latent frame.
pub const FRAME_HOP: usize = 2048;

/// Shortest accepted latent sequence.
pub const MIN_SEQUENCE_LENGTH: usize = 32;

/// Longest accepted latent sequence.
pub const MAX_SEQUENCE_LENGTH: usize = 640;

/// Architecture and output settings for the flow sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Width of each latent frame.
    #[serde(default = "default_latent_dim")]
    pub latent_dim: usize,
    /// Hidden width of the velocity network.
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    /// Conditioning row width; must match the encoder.
    #[serde(default = "default_cond_dim")]
    pub cond_dim: usize,
    /// Number of residual AdaLN blocks.
    #[serde(default = "default_num_blocks")]
    pub num_blocks: usize,
    /// Size of the sinusoidal step-time embedding.
    #[serde(default = "default_frequency_embedding_size")]
    pub frequency_embedding_size: usize,
    /// Longest period of the step-time embedding.
    #[serde(default = "default_max_period")]
    pub max_period: f32,
    /// Step times in `[0, 1]` are multiplied by this before embedding.
    #[serde(default = "default_time_scale")]
    pub time_scale: f32,
    /// Normalization epsilon.
    #[serde(default = "default_norm_eps")]
    pub norm_eps: f32,
    /// Samples per latent frame.
    #[serde(default = "default_frame_hop")]
    pub frame_hop: usize,
    /// Output sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_min_sequence_length")]
    pub min_sequence_length: usize,
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
    /// Output peaks above this are scaled down to it.
    #[serde(default = "default_peak_limit")]
    pub peak_limit: f32,
    /// RMS below which a window counts as silence when trimming.
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32,
    /// Window size in samples for silence detection.
    #[serde(default = "default_silence_window")]
    pub silence_window: usize,
}

fn default_latent_dim() -> usize {
    32
}

fn default_hidden_size() -> usize {
    128
}

fn default_cond_dim() -> usize {
    128
}

fn default_num_blocks() -> usize {
    4
}

fn default_frequency_embedding_size() -> usize {
    64
}

fn default_max_period() -> f32 {
    10_000.0
}

fn default_time_scale() -> f32 {
    1000.0
}

fn default_norm_eps() -> f32 {
    1e-5
}

fn default_frame_hop() -> usize {
    FRAME_HOP
}

fn default_sample_rate() -> u32 {
    SAMPLE_RATE
}

fn default_min_sequence_length() -> usize {
    MIN_SEQUENCE_LENGTH
}

fn default_max_sequence_length() -> usize {
    MAX_SEQUENCE_LENGTH
}

fn default_peak_limit() -> f32 {
    0.95
}

fn default_silence_threshold() -> f32 {
    1e-3
}

fn default_silence_window() -> usize {
    1024
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            latent_dim: default_latent_dim(),
            hidden_size: default_hidden_size(),
            cond_dim: default_cond_dim(),
            num_blocks: default_num_blocks(),
            frequency_embedding_size: default_frequency_embedding_size(),
            max_period: default_max_period(),
            time_scale: default_time_scale(),
            norm_eps: default_norm_eps(),
            frame_hop: default_frame_hop(),
            sample_rate: default_sample_rate(),
            min_sequence_length: default_min_sequence_length(),
            max_sequence_length: default_max_sequence_length(),
            peak_limit: default_peak_limit(),
            silence_threshold: default_silence_threshold(),
            silence_window: default_silence_window(),
        }
    }
}

impl SamplerConfig {
    /// Check that the sizes describe a buildable network.
    pub fn validate(&self) -> EchoResult<()> {
        let sizes = [
            ("latent_dim", self.latent_dim),
            ("hidden_size", self.hidden_size),
            ("cond_dim", self.cond_dim),
            ("frame_hop", self.frame_hop),
            ("silence_window", self.silence_window),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(EchoError::config(format!("{name} must be positive")));
        }
        if self.frequency_embedding_size < 2 || self.frequency_embedding_size % 2 != 0 {
            return Err(EchoError::config(
                "frequency_embedding_size must be even and at least 2",
            ));
        }
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(EchoError::config("time_scale must be finite and positive"));
        }
        if self.frame_hop % 2 != 0 {
            return Err(EchoError::config("frame_hop must be even"));
        }
        if self.sample_rate == 0 {
            return Err(EchoError::config("sample_rate must be positive"));
        }
        if self.min_sequence_length == 0 || self.min_sequence_length > self.max_sequence_length {
            return Err(EchoError::config(format!(
                "invalid sequence bounds [{}, {}]",
                self.min_sequence_length, self.max_sequence_length
            )));
        }
        if !(self.peak_limit > 0.0 && self.peak_limit <= 1.0) {
            return Err(EchoError::config("peak_limit must be in (0, 1]"));
        }
        Ok(())
    }

    /// Output samples for a sequence of `frames` latent frames.
    pub fn output_samples(&self, frames: usize) -> usize {
        frames * self.frame_hop
    }
}

/// Map a precision to the candle dtype used for sampler tensors.
pub fn compute_dtype(precision: Precision) -> DType {
    match precision {
        Precision::Full => DType::F32,
        Precision::Half => DType::F16,
        Precision::ReducedHalf => DType::BF16,
    }
}
