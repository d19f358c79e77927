//! # flow-sampler
//!
//! Seeded iterative sampler for the Echo TTS engine.
//!
//! Starting from Gaussian noise drawn from the request seed, a velocity
//! network refines a latent sequence over a fixed number of Euler steps,
//! then a windowed overlap-add decoder turns the latent into a waveform.
//!
//! # Architecture
//!
//! - Input and conditioning projections to the hidden width
//! - Two sinusoidal step-time embedders (interval start and end)
//! - N residual MLP blocks with AdaLN shift/scale/gate modulation
//! - Final AdaLN projection back to latent width
//! - Linear frame decoder with periodic Hann overlap-add
//!
//! # Example
//!
//! ```ignore
//! use flow_sampler::{FlowSampler, SamplerConfig};
//! use echo_core::{Precision, SynthesisRequest, WeightSource};
//! use candle_core::Device;
//!
//! let sampler = FlowSampler::new(
//!     SamplerConfig::default(),
//!     &WeightSource::default(),
//!     &Device::Cpu,
//!     Precision::Full,
//!     false,
//! )?;
//! let request = SynthesisRequest::new("Hello", 0, 4, 128);
//! let audio = sampler.sample(&conditioning, &request)?;
//! ```

pub mod config;
pub mod decoder;
pub mod layers;
pub mod model;
pub mod sampling;
pub mod weights;

pub use config::{
    compute_dtype, SamplerConfig, FRAME_HOP, MAX_SEQUENCE_LENGTH, MIN_SEQUENCE_LENGTH,
    SAMPLE_RATE,
};
pub use decoder::{trim_trailing_silence, LatentDecoder};
pub use model::VelocityNet;
pub use sampling::{draw_noise, FlowSampler};
