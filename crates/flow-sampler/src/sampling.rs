//! Seeded iterative sampling from noise to waveform.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tracing::{debug, info, instrument};

use echo_core::{
    AudioBuffer, Conditioning, EchoError, EchoResult, Precision, SynthesisRequest, WeightSource,
};

use crate::config::{compute_dtype, SamplerConfig};
use crate::decoder::{trim_trailing_silence, LatentDecoder};
use crate::model::VelocityNet;
use crate::weights;

/// Draws beyond the clamp are redrawn this many times before being clipped.
const MAX_REDRAWS: usize = 64;

fn inference(context: &'static str) -> impl Fn(candle_core::Error) -> EchoError {
    move |e| EchoError::inference(format!("{context}: {e}"))
}

/// Draw `len` standard-normal values from `seed`, scaled by `scale`.
///
/// With a clamp, values whose magnitude exceeds it are redrawn.
pub fn draw_noise(seed: u64, len: usize, scale: f32, clamp: Option<f32>) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            let mut value: f32 = StandardNormal.sample(&mut rng);
            value *= scale;
            if let Some(limit) = clamp {
                let mut redraws = 0;
                while value.abs() > limit && redraws < MAX_REDRAWS {
                    let z: f32 = StandardNormal.sample(&mut rng);
                    value = z * scale;
                    redraws += 1;
                }
                value = value.clamp(-limit, limit);
            }
            value
        })
        .collect()
}

/// Resample conditioning rows onto `frames` positions by proportional index.
fn align_conditioning(cond: &Conditioning, frames: usize) -> Vec<f32> {
    let mut aligned = Vec::with_capacity(frames * cond.dim);
    for f in 0..frames {
        let token = (f * cond.tokens / frames).min(cond.tokens - 1);
        aligned.extend_from_slice(cond.row(token));
    }
    aligned
}

/// Fail with the step index if `x` holds any non-finite value.
fn ensure_finite(x: &Tensor, step: usize) -> EchoResult<()> {
    let total: f32 = x
        .to_dtype(DType::F32)
        .and_then(|t| t.sum_all())
        .and_then(|t| t.to_scalar::<f32>())
        .map_err(inference("finiteness check"))?;

    if !total.is_finite() {
        return Err(EchoError::numeric_instability(
            step,
            "latent state contains non-finite values",
        ));
    }
    Ok(())
}

/// Turns conditioning into audio by refining seeded noise over a fixed
/// number of Euler steps and decoding the resulting latent.
///
/// Immutable after construction; `sample` takes `&self` and can be called
/// from several threads at once.
#[derive(Debug)]
pub struct FlowSampler {
    net: VelocityNet,
    decoder: LatentDecoder,
    weights: HashMap<String, Tensor>,
    config: SamplerConfig,
    device: Device,
    dtype: DType,
}

impl FlowSampler {
    /// Build a sampler from the configured weight source.
    #[instrument(skip(config, device))]
    pub fn new(
        config: SamplerConfig,
        source: &WeightSource,
        device: &Device,
        precision: Precision,
        fused: bool,
    ) -> EchoResult<Self> {
        config.validate()?;
        let tensors = match source {
            WeightSource::Seeded { seed } => weights::seeded_weights(&config, *seed, device)?,
            WeightSource::Safetensors { path } => weights::load_weights(path, &config, device)?,
        };
        Self::from_tensors(config, tensors, device, precision, fused)
    }

    /// Build a sampler from an in-memory weight table.
    pub fn from_tensors(
        config: SamplerConfig,
        tensors: HashMap<String, Tensor>,
        device: &Device,
        precision: Precision,
        fused: bool,
    ) -> EchoResult<Self> {
        config.validate()?;
        weights::check_tensors(&tensors, &config)?;
        let dtype = compute_dtype(precision);

        let vb = VarBuilder::from_tensors(tensors.clone(), dtype, device);
        let net = VelocityNet::new(&config, vb.pp("net"), fused)
            .map_err(inference("building velocity network"))?;

        let vb_f32 = VarBuilder::from_tensors(tensors.clone(), DType::F32, device);
        let decoder = LatentDecoder::new(&config, &vb_f32).map_err(inference("building decoder"))?;

        info!(
            ?dtype,
            fused,
            blocks = config.num_blocks,
            hidden = config.hidden_size,
            "flow sampler ready"
        );

        Ok(Self {
            net,
            decoder,
            weights: tensors,
            config,
            device: device.clone(),
            dtype,
        })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn is_fused(&self) -> bool {
        self.net.is_fused()
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Write the weight table to a safetensors file.
    pub fn export_weights(&self, path: impl AsRef<Path>) -> EchoResult<()> {
        weights::save_weights(&self.weights, path.as_ref())
    }

    /// Run the refinement loop and decode to a mono buffer.
    #[instrument(
        skip(self, cond, request),
        fields(
            request_id = %request.request_id,
            seed = request.seed,
            steps = request.num_steps,
            frames = request.sequence_length
        )
    )]
    pub fn sample(&self, cond: &Conditioning, request: &SynthesisRequest) -> EchoResult<AudioBuffer> {
        request.validate(
            self.config.min_sequence_length,
            self.config.max_sequence_length,
        )?;
        if cond.dim != self.config.cond_dim {
            return Err(EchoError::config(format!(
                "conditioning width {} does not match sampler width {}",
                cond.dim, self.config.cond_dim
            )));
        }
        if cond.tokens == 0 {
            return Err(EchoError::invalid_request("conditioning has no rows"));
        }
        if cond.values.len() != cond.tokens * cond.dim {
            return Err(EchoError::invalid_request(format!(
                "conditioning has {} values, expected {}x{}",
                cond.values.len(),
                cond.tokens,
                cond.dim
            )));
        }

        let options = &request.options;
        let frames = request.sequence_length;
        let num_steps = request.num_steps;
        let guided = options.uses_guidance();

        let cond = self.conditioning_tensor(cond, frames, guided)?;
        let cond = self
            .net
            .project_conditioning(&cond)
            .map_err(inference("projecting conditioning"))?;

        let noise = draw_noise(
            request.seed,
            frames * self.config.latent_dim,
            options.noise_scale,
            options.noise_clamp,
        );
        let mut x = Tensor::from_vec(noise, (1, frames, self.config.latent_dim), &self.device)
            .and_then(|t| t.to_dtype(self.dtype))
            .map_err(inference("allocating noise"))?;

        let dt = 1.0 / num_steps as f64;
        for step in 0..num_steps {
            let s = step as f32 / num_steps as f32;
            let t = (step + 1) as f32 / num_steps as f32;

            let v = self.velocity(&cond, s, t, &x, options.guidance_scale, guided)?;
            x = v
                .affine(dt, 0.0)
                .and_then(|dx| &x + dx)
                .map_err(inference("euler update"))?;

            ensure_finite(&x, step)?;
            debug!(step, s, t, "refinement step");
        }

        let latent = x.squeeze(0).map_err(inference("squeezing latent"))?;
        let mut samples = self.decoder.decode(&latent, num_steps)?;

        if options.trim_trailing_silence {
            trim_trailing_silence(
                &mut samples,
                self.config.silence_window,
                self.config.silence_threshold,
            );
        }

        debug!(samples = samples.len(), "sampling complete");
        Ok(AudioBuffer::mono(samples, self.config.sample_rate))
    }

    /// Conditioning aligned to `frames`; the unconditional branch is
    /// stacked as a zero row block when guided.
    fn conditioning_tensor(
        &self,
        cond: &Conditioning,
        frames: usize,
        guided: bool,
    ) -> EchoResult<Tensor> {
        let aligned = align_conditioning(cond, frames);
        let shape = (1, frames, cond.dim);
        let tensor = Tensor::from_vec(aligned, shape, &self.device)
            .and_then(|t| {
                if guided {
                    let zeros = t.zeros_like()?;
                    Tensor::cat(&[&t, &zeros], 0)
                } else {
                    Ok(t)
                }
            })
            .and_then(|t| t.to_dtype(self.dtype))
            .map_err(inference("building conditioning"))?;
        Ok(tensor)
    }

    /// One velocity evaluation. Guided requests run both branches in one
    /// batch and blend `v_u + g * (v_c - v_u)`.
    fn velocity(
        &self,
        cond: &Tensor,
        s: f32,
        t: f32,
        x: &Tensor,
        guidance_scale: f32,
        guided: bool,
    ) -> EchoResult<Tensor> {
        if !guided {
            return self
                .net
                .forward(cond, s, t, x)
                .map_err(inference("velocity"));
        }

        let blended = Tensor::cat(&[x, x], 0)
            .and_then(|batch| self.net.forward(cond, s, t, &batch))
            .and_then(|v| {
                let v_cond = v.narrow(0, 0, 1)?;
                let v_uncond = v.narrow(0, 1, 1)?;
                let delta = ((v_cond - &v_uncond)? * guidance_scale as f64)?;
                v_uncond + delta
            })
            .map_err(inference("guided velocity"))?;
        Ok(blended)
    }
}
