//! The synthesis façade.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::Device;
use tracing::{info, instrument, warn};

use audio_codec::{WavCodec, WavEncoding};
use echo_core::{
    AudioBuffer, AudioCodec, ConditioningEncoder, DeviceKind, EchoError, EchoResult, EngineConfig,
    Precision, SynthesisRequest, WeightSource,
};
use flow_sampler::{FlowSampler, SamplerConfig};
use text_conditioner::{ByteEncoder, DEFAULT_TABLE_SEED};

use crate::config::EchoConfig;
use crate::device::{
    check_precision, device_name, detect_capabilities, resolve_precision, select_device,
};
use crate::metrics::EngineMetrics;
use crate::warm::warm_sampler;

/// Text-to-speech engine.
///
/// Owns its device handle, weights and configuration, all fixed at
/// construction. `synthesize` takes `&self`; share one engine across threads
/// with an `Arc`.
pub struct EchoTts {
    encoder: Arc<dyn ConditioningEncoder>,
    sampler: FlowSampler,
    codec: WavCodec,
    device_kind: DeviceKind,
    precision: Precision,
    compile: bool,
    metrics: EngineMetrics,
}

impl std::fmt::Debug for EchoTts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EchoTts")
            .field("device", &self.device_kind)
            .field("precision", &self.precision)
            .field("compile", &self.compile)
            .field("encoder_dim", &self.encoder.dim())
            .field("sampler", &self.sampler)
            .field("codec", &self.codec)
            .finish()
    }
}

impl EchoTts {
    /// Build an engine with default weights and sampler settings.
    ///
    /// `dtype = None` picks the precision from what the device supports.
    /// With `compile`, the fused sampler path is built and traced once;
    /// if that fails the error is `AccelerationUnavailable` and building
    /// again with `compile = false` may succeed.
    pub fn new(device: DeviceKind, dtype: Option<Precision>, compile: bool) -> EchoResult<Self> {
        let mut builder = Self::builder().device(device).compile(compile);
        if let Some(dtype) = dtype {
            builder = builder.dtype(dtype);
        }
        builder.build()
    }

    pub fn builder() -> EchoTtsBuilder {
        EchoTtsBuilder::default()
    }

    pub fn from_config(config: &EchoConfig) -> EchoResult<Self> {
        EchoTtsBuilder::from_config(config).build()
    }

    pub fn device_kind(&self) -> DeviceKind {
        self.device_kind
    }

    pub fn device(&self) -> &Device {
        self.sampler.device()
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn is_compiled(&self) -> bool {
        self.compile
    }

    /// Fixed output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sampler.sample_rate()
    }

    pub fn sampler_config(&self) -> &SamplerConfig {
        self.sampler.config()
    }

    /// Synthesize `text` and return the audio with its sample rate.
    ///
    /// Identical arguments on the same engine produce bit-identical audio.
    pub fn synthesize(
        &self,
        text: &str,
        seed: u64,
        num_steps: usize,
        sequence_length: usize,
    ) -> EchoResult<(AudioBuffer, u32)> {
        let request = SynthesisRequest::new(text, seed, num_steps, sequence_length);
        let audio = self.synthesize_request(&request)?;
        Ok((audio, self.sample_rate()))
    }

    /// Synthesize a full request, including sampling options.
    #[instrument(
        skip(self, request),
        fields(request_id = %request.request_id, text_len = request.text.len())
    )]
    pub fn synthesize_request(&self, request: &SynthesisRequest) -> EchoResult<AudioBuffer> {
        self.metrics.request_received();
        let started = Instant::now();

        match self.run(request) {
            Ok(audio) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                let audio_ms = audio.duration_ms() as f64;
                self.metrics
                    .request_completed(elapsed_ms, audio_ms, request.num_steps);
                info!(
                    samples = audio.num_samples(),
                    audio_ms,
                    elapsed_ms,
                    "synthesis complete"
                );
                Ok(audio)
            }
            Err(e) => {
                self.metrics.request_failed(e.kind());
                warn!(error = %e, "synthesis failed");
                Err(e)
            }
        }
    }

    fn run(&self, request: &SynthesisRequest) -> EchoResult<AudioBuffer> {
        let config = self.sampler.config();
        request.validate(config.min_sequence_length, config.max_sequence_length)?;

        let cond = self.encoder.encode(&request.text)?;
        self.sampler.sample(&cond, request)
    }

    /// Run [`synthesize_request`](Self::synthesize_request) on the blocking
    /// pool. Wrap in `tokio::time::timeout` to bound the wait.
    pub async fn synthesize_async(
        self: Arc<Self>,
        request: SynthesisRequest,
    ) -> EchoResult<AudioBuffer> {
        tokio::task::spawn_blocking(move || self.synthesize_request(&request))
            .await
            .map_err(|e| EchoError::internal(format!("synthesis task failed: {e}")))?
    }

    /// Write `buffer` as a WAV file declaring `sample_rate`.
    pub fn save(
        &self,
        buffer: &AudioBuffer,
        path: impl AsRef<Path>,
        sample_rate: u32,
    ) -> EchoResult<()> {
        self.codec.save(buffer, path.as_ref(), sample_rate)
    }

    /// Read a WAV file back.
    pub fn load(&self, path: impl AsRef<Path>) -> EchoResult<(AudioBuffer, u32)> {
        self.codec.load(path.as_ref())
    }

    /// Write the sampler weights to a safetensors file.
    pub fn export_weights(&self, path: impl AsRef<Path>) -> EchoResult<()> {
        self.sampler.export_weights(path)
    }
}

/// Step-by-step engine construction.
#[derive(Default)]
pub struct EchoTtsBuilder {
    engine: EngineConfig,
    sampler: SamplerConfig,
    encoding: WavEncoding,
    encoder: Option<Arc<dyn ConditioningEncoder>>,
}

impl EchoTtsBuilder {
    pub fn from_config(config: &EchoConfig) -> Self {
        Self {
            engine: config.engine.clone(),
            sampler: config.sampler.clone(),
            encoding: config.output.encoding,
            encoder: None,
        }
    }

    pub fn device(mut self, device: DeviceKind) -> Self {
        self.engine.device = device;
        self
    }

    /// Override the precision policy.
    pub fn dtype(mut self, dtype: Precision) -> Self {
        self.engine.dtype = Some(dtype);
        self
    }

    pub fn compile(mut self, compile: bool) -> Self {
        self.engine.compile = compile;
        self
    }

    pub fn weights(mut self, weights: WeightSource) -> Self {
        self.engine.weights = weights;
        self
    }

    /// Load weights from a safetensors file.
    pub fn weights_file(self, path: impl Into<PathBuf>) -> Self {
        self.weights(WeightSource::Safetensors { path: path.into() })
    }

    pub fn sampler_config(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn encoding(mut self, encoding: WavEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Replace the default text encoder. Its width must equal the sampler's
    /// `cond_dim`.
    pub fn encoder(mut self, encoder: Arc<dyn ConditioningEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    #[instrument(skip(self), fields(device = %self.engine.device, compile = self.engine.compile))]
    pub fn build(self) -> EchoResult<EchoTts> {
        let Self {
            engine,
            sampler,
            encoding,
            encoder,
        } = self;
        sampler.validate()?;

        let device = select_device(engine.device)?;
        let precision = match engine.dtype {
            Some(explicit) => {
                check_precision(&device, explicit)?;
                explicit
            }
            None => resolve_precision(&detect_capabilities(&device)),
        };

        let encoder = encoder.unwrap_or_else(|| {
            Arc::new(ByteEncoder::new(sampler.cond_dim, DEFAULT_TABLE_SEED))
        });
        if encoder.dim() != sampler.cond_dim {
            return Err(EchoError::config(format!(
                "encoder width {} does not match sampler cond_dim {}",
                encoder.dim(),
                sampler.cond_dim
            )));
        }

        let flow = FlowSampler::new(sampler, &engine.weights, &device, precision, engine.compile)?;
        if engine.compile {
            warm_sampler(&flow)?;
        }

        info!(
            device = device_name(&device),
            %precision,
            compile = engine.compile,
            sample_rate = flow.sample_rate(),
            "Echo TTS engine ready"
        );

        Ok(EchoTts {
            encoder,
            sampler: flow,
            codec: WavCodec::new(encoding),
            device_kind: engine.device,
            precision,
            compile: engine.compile,
            metrics: EngineMetrics::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_core::Conditioning;

    fn small_sampler() -> SamplerConfig {
        SamplerConfig {
            latent_dim: 8,
            hidden_size: 16,
            cond_dim: 16,
            num_blocks: 1,
            frequency_embedding_size: 8,
            frame_hop: 64,
            sample_rate: 16_000,
            min_sequence_length: 4,
            max_sequence_length: 32,
            ..Default::default()
        }
    }

    struct ConstantEncoder(usize);

    impl ConditioningEncoder for ConstantEncoder {
        fn encode(&self, _text: &str) -> EchoResult<Conditioning> {
            Conditioning::new(vec![0.25; 2 * self.0], 2, self.0)
        }

        fn dim(&self) -> usize {
            self.0
        }
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EchoTts>();
    }

    #[test]
    fn test_cpu_defaults_to_full_precision() {
        let engine = EchoTts::builder().sampler_config(small_sampler()).build().unwrap();
        assert_eq!(engine.precision(), Precision::Full);
        assert_eq!(engine.device_kind(), DeviceKind::Cpu);
        assert!(!engine.is_compiled());
        assert_eq!(engine.sample_rate(), 16_000);
    }

    #[test]
    fn test_explicit_dtype_overrides_policy() {
        let engine = EchoTts::builder()
            .sampler_config(small_sampler())
            .dtype(Precision::Half)
            .build()
            .unwrap();
        assert_eq!(engine.precision(), Precision::Half);
    }

    #[test]
    fn test_unsupported_dtype_rejected_at_construction() {
        let err = EchoTts::builder()
            .sampler_config(small_sampler())
            .dtype(Precision::ReducedHalf)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            EchoError::UnsupportedPrecision {
                precision: Precision::ReducedHalf,
                ..
            }
        ));

        let err = EchoTts::new(DeviceKind::Cpu, Some(Precision::ReducedHalf), true).unwrap_err();
        assert!(!err.is_acceleration_failure());
    }

    #[test]
    fn test_custom_encoder() {
        let engine = EchoTts::builder()
            .sampler_config(small_sampler())
            .encoder(Arc::new(ConstantEncoder(16)))
            .build()
            .unwrap();
        let (audio, rate) = engine.synthesize("anything", 1, 2, 8).unwrap();
        assert_eq!(rate, 16_000);
        assert_eq!(audio.num_samples(), 8 * 64);
    }

    #[test]
    fn test_encoder_width_mismatch() {
        let err = EchoTts::builder()
            .sampler_config(small_sampler())
            .encoder(Arc::new(ConstantEncoder(12)))
            .build()
            .unwrap_err();
        assert!(matches!(err, EchoError::Config(_)));
    }

    #[test]
    fn test_validation_before_encoding() {
        let engine = EchoTts::builder().sampler_config(small_sampler()).build().unwrap();
        for (text, steps, len) in [("", 2, 8), ("hi", 0, 8), ("hi", 2, 3), ("hi", 2, 33)] {
            let err = engine.synthesize(text, 0, steps, len).unwrap_err();
            assert!(matches!(err, EchoError::InvalidRequest(_)), "{text:?} {steps} {len}");
        }
    }

    #[test]
    fn test_text_that_normalizes_to_nothing() {
        let engine = EchoTts::builder().sampler_config(small_sampler()).build().unwrap();
        let err = engine.synthesize("~ ^ ~", 0, 2, 8).unwrap_err();
        assert!(matches!(err, EchoError::InvalidRequest(_)));
    }

    #[test]
    fn test_missing_weights_file() {
        let err = EchoTts::builder()
            .sampler_config(small_sampler())
            .weights_file("/nonexistent/echo.safetensors")
            .build()
            .unwrap_err();
        assert!(matches!(err, EchoError::ModelLoad { .. }));
    }
}
