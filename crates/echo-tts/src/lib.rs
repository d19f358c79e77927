//! # echo-tts
//!
//! The Echo TTS engine.
//!
//! This crate ties the pipeline together:
//! - Device selection and the precision policy
//! - The `EchoTts` façade: construct, synthesize, save
//! - Optional fused sampler path with construction-time warm-up
//! - JSON configuration, structured logging and metrics
//!
//! # Example
//!
//! ```ignore
//! use echo_tts::{DeviceKind, EchoTts};
//!
//! let engine = EchoTts::new(DeviceKind::Cpu, None, false)?;
//! let (audio, sample_rate) = engine.synthesize("Hello from Echo TTS.", 0, 4, 128)?;
//! engine.save(&audio, "hello.wav", sample_rate)?;
//! ```

pub mod config;
pub mod device;
mod engine;
pub mod logging;
pub mod metrics;
pub mod warm;

pub use config::{load_config, EchoConfig, OutputConfig};
pub use device::{resolve_precision, supports_precision, DeviceCapabilities};
pub use engine::{EchoTts, EchoTtsBuilder};

pub use audio_codec::WavEncoding;
pub use echo_core::{
    AudioBuffer, DeviceKind, EchoError, EchoResult, Precision, SamplingOptions, SynthesisRequest,
    WeightSource,
};
pub use flow_sampler::SamplerConfig;
