//! # audio-codec
//!
//! WAV container codec for Echo TTS output.
//!
//! Writes float or 16-bit PCM WAV files with atomic replacement and reads
//! any PCM/float WAV back into an [`AudioBuffer`](echo_core::AudioBuffer).

pub mod wav;

pub use wav::{WAV_HEADER_BYTES, WavCodec, WavEncoding};
