//! # echo-core
//!
//! Core types, traits, and error definitions for the Echo TTS engine.
//!
//! This crate provides the foundational abstractions used across all other crates
//! in the workspace, including:
//!
//! - Common data types (`AudioBuffer`, `Conditioning`, `SynthesisRequest`)
//! - Trait definitions for pipeline components
//! - Unified error handling via `EchoError`
//! - Configuration structures

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{
    DEFAULT_WEIGHT_SEED, DeviceKind, EngineConfig, LoggingConfig, Precision, WeightSource,
};
pub use error::{EchoError, EchoResult};
pub use traits::{AudioCodec, ConditioningEncoder, TextNormalizer};
pub use types::{AudioBuffer, Conditioning, SamplingOptions, SynthesisRequest};
