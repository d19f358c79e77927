//! Unified error types for the Echo TTS engine.

use std::io;
use std::path::{Path, PathBuf};

use crate::config::Precision;

/// Main error type for Echo TTS operations.
#[derive(Debug, thiserror::Error)]
pub enum EchoError {
    /// The requested compute device is not present.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The requested precision cannot be computed on the resolved device.
    #[error("precision {precision} is not supported on {device}")]
    UnsupportedPrecision { precision: Precision, device: String },

    /// Fused/compiled execution is not supported on the resolved device.
    #[error("acceleration unavailable: {0}")]
    AccelerationUnavailable(String),

    /// Caller supplied an invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The sampler produced non-finite values.
    #[error("numeric instability at step {step}: {detail}")]
    NumericInstability { step: usize, detail: String },

    /// Filesystem failure while reading or writing audio.
    #[error("I/O failure for {path}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed or unsupported audio container.
    #[error("audio format error: {0}")]
    AudioFormat(String),

    /// Weight loading error.
    #[error("model load failed for {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Tensor backend failure during inference.
    #[error("inference error: {0}")]
    Inference(String),

    /// Internal error (should not happen in normal operation).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results with EchoError.
pub type EchoResult<T> = Result<T, EchoError>;

impl EchoError {
    /// Create a device-unavailable error with message.
    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable(msg.into())
    }

    /// Create an acceleration-unavailable error with message.
    pub fn acceleration_unavailable(msg: impl Into<String>) -> Self {
        Self::AccelerationUnavailable(msg.into())
    }

    /// Create an unsupported-precision error for a device.
    pub fn unsupported_precision(precision: Precision, device: impl Into<String>) -> Self {
        Self::UnsupportedPrecision {
            precision,
            device: device.into(),
        }
    }

    /// Create an invalid request error with message.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a numeric instability error for the given step.
    pub fn numeric_instability(step: usize, detail: impl Into<String>) -> Self {
        Self::NumericInstability {
            step,
            detail: detail.into(),
        }
    }

    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::IoFailure {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create an audio format error with message.
    pub fn audio_format(msg: impl Into<String>) -> Self {
        Self::AudioFormat(msg.into())
    }

    /// Create a model load error.
    pub fn model_load(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a config error with message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an inference error with message.
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create an internal error with message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether retrying construction with `compile = false` may succeed.
    pub fn is_acceleration_failure(&self) -> bool {
        matches!(self, Self::AccelerationUnavailable(_))
    }

    /// Short stable label, used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeviceUnavailable(_) => "device_unavailable",
            Self::UnsupportedPrecision { .. } => "unsupported_precision",
            Self::AccelerationUnavailable(_) => "acceleration_unavailable",
            Self::InvalidRequest(_) => "invalid_request",
            Self::NumericInstability { .. } => "numeric_instability",
            Self::IoFailure { .. } => "io_failure",
            Self::AudioFormat(_) => "audio_format",
            Self::ModelLoad { .. } => "model_load",
            Self::Config(_) => "config",
            Self::Inference(_) => "inference",
            Self::Internal(_) => "internal",
        }
    }
}
