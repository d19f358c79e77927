//! Trait definitions for Echo TTS pipeline components.

use std::path::Path;

use crate::error::EchoResult;
use crate::types::{AudioBuffer, Conditioning};

/// Text normalization trait.
///
/// Implementations rewrite raw input into the form the encoder expects
/// (numbers spelled out, typography flattened, whitespace collapsed).
pub trait TextNormalizer: Send + Sync {
    /// Normalize the input text.
    fn normalize(&self, input: &str) -> EchoResult<String>;
}

/// Turns text into the conditioning consumed by the sampler.
///
/// Implementations must be deterministic and free of side effects: the same
/// text always yields the same conditioning.
pub trait ConditioningEncoder: Send + Sync {
    /// Encode text into a `tokens x dim` conditioning matrix.
    fn encode(&self, text: &str) -> EchoResult<Conditioning>;

    /// Width of each conditioning row.
    fn dim(&self) -> usize;
}

/// Audio container codec.
pub trait AudioCodec: Send + Sync {
    /// Write `buffer` to `path`, declaring `sample_rate` in the header.
    ///
    /// Replaces any existing file only once the new one is complete.
    fn save(&self, buffer: &AudioBuffer, path: &Path, sample_rate: u32) -> EchoResult<()>;

    /// Read a file back into a buffer and its declared sample rate.
    fn load(&self, path: &Path) -> EchoResult<(AudioBuffer, u32)>;
}
