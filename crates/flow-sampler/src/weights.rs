//! Weight tables: seeded generation, safetensors loading and export.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::io;
use std::path::Path;

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tracing::{debug, info, instrument};

use echo_core::{EchoError, EchoResult};

use crate::config::SamplerConfig;

/// Name of the decoder projection tensor.
pub const DECODER_WEIGHT: &str = "decoder.weight";

/// Lowest and highest oscillator frequency of the seeded decoder basis.
const BASIS_LOW_HZ: f32 = 110.0;
const BASIS_HIGH_HZ: f32 = 3_520.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Init {
    /// Normal with std `1 / sqrt(fan_in)`.
    Normal { fan_in: usize },
    Zeros,
    Ones,
    /// Sinusoid bank over the decoder frame.
    Oscillators,
}

/// Shape and initialization of one named tensor.
#[derive(Debug, Clone)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<usize>,
    init: Init,
}

impl TensorSpec {
    fn new(name: impl Into<String>, shape: &[usize], init: Init) -> Self {
        Self {
            name: name.into(),
            shape: shape.to_vec(),
            init,
        }
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

fn push_linear(specs: &mut Vec<TensorSpec>, prefix: &str, in_dim: usize, out_dim: usize) {
    specs.push(TensorSpec::new(
        format!("{prefix}.weight"),
        &[out_dim, in_dim],
        Init::Normal { fan_in: in_dim },
    ));
    specs.push(TensorSpec::new(
        format!("{prefix}.bias"),
        &[out_dim],
        Init::Zeros,
    ));
}

/// Every tensor the sampler reads, in a fixed order.
pub fn tensor_specs(config: &SamplerConfig) -> Vec<TensorSpec> {
    let h = config.hidden_size;
    let mut specs = Vec::new();

    push_linear(&mut specs, "net.input_proj", config.latent_dim, h);
    push_linear(&mut specs, "net.cond_proj", config.cond_dim, h);

    for embedder in ["net.time_s", "net.time_t"] {
        push_linear(
            &mut specs,
            &format!("{embedder}.proj_in"),
            config.frequency_embedding_size,
            h,
        );
        push_linear(&mut specs, &format!("{embedder}.proj_out"), h, h);
        specs.push(TensorSpec::new(
            format!("{embedder}.norm.weight"),
            &[h],
            Init::Ones,
        ));
    }

    for i in 0..config.num_blocks {
        let prefix = format!("net.blocks.{i}");
        push_linear(&mut specs, &format!("{prefix}.mlp_in"), h, h);
        push_linear(&mut specs, &format!("{prefix}.mlp_out"), h, h);
        push_linear(&mut specs, &format!("{prefix}.mod_linear"), h, 3 * h);
    }

    push_linear(&mut specs, "net.final_layer.linear", h, config.latent_dim);
    push_linear(&mut specs, "net.final_layer.mod_linear", h, 2 * h);

    specs.push(TensorSpec::new(
        DECODER_WEIGHT,
        &[2 * config.frame_hop, config.latent_dim],
        Init::Oscillators,
    ));

    specs
}

/// Decoder basis: column `d` is a sinusoid at a log-spaced frequency.
fn oscillator_bank(rows: usize, cols: usize, sample_rate: u32) -> Vec<f32> {
    let gain = 1.0 / (cols as f32).sqrt();
    let ratio = (BASIS_HIGH_HZ / BASIS_LOW_HZ).ln();
    let freqs: Vec<f32> = (0..cols)
        .map(|d| {
            let pos = if cols > 1 { d as f32 / (cols - 1) as f32 } else { 0.0 };
            BASIS_LOW_HZ * (ratio * pos).exp()
        })
        .collect();

    let mut values = Vec::with_capacity(rows * cols);
    for n in 0..rows {
        let time = n as f32 / sample_rate as f32;
        values.extend(freqs.iter().map(|f| gain * (2.0 * PI * f * time).sin()));
    }
    values
}

/// Generate deterministic synthetic weights from `seed`.
#[instrument(skip(config, device))]
pub fn seeded_weights(
    config: &SamplerConfig,
    seed: u64,
    device: &Device,
) -> EchoResult<HashMap<String, Tensor>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tensors = HashMap::new();

    for spec in tensor_specs(config) {
        let n = spec.numel();
        let values: Vec<f32> = match spec.init {
            Init::Normal { fan_in } => {
                let std = 1.0 / (fan_in as f32).sqrt();
                (0..n)
                    .map(|_| {
                        let z: f32 = StandardNormal.sample(&mut rng);
                        z * std
                    })
                    .collect()
            }
            Init::Zeros => vec![0.0; n],
            Init::Ones => vec![1.0; n],
            Init::Oscillators => oscillator_bank(spec.shape[0], spec.shape[1], config.sample_rate),
        };

        let tensor = Tensor::from_vec(values, spec.shape.as_slice(), device)
            .map_err(|e| EchoError::inference(format!("weight allocation failed: {e}")))?;
        tensors.insert(spec.name, tensor);
    }

    debug!(count = tensors.len(), "generated seeded weights");
    Ok(tensors)
}

/// Load weights from a safetensors file and check them against the config.
#[instrument(skip(config, device), fields(path = %path.display()))]
pub fn load_weights(
    path: &Path,
    config: &SamplerConfig,
    device: &Device,
) -> EchoResult<HashMap<String, Tensor>> {
    if !path.is_file() {
        return Err(EchoError::model_load(path, "file not found"));
    }

    let tensors = candle_core::safetensors::load(path, device)
        .map_err(|e| EchoError::model_load(path, e.to_string()))?;

    check_tensors(&tensors, config)?;
    info!(count = tensors.len(), "loaded sampler weights");
    Ok(tensors)
}

/// Verify that every required tensor is present with the expected shape.
pub fn check_tensors(tensors: &HashMap<String, Tensor>, config: &SamplerConfig) -> EchoResult<()> {
    let mut missing = Vec::new();

    for spec in tensor_specs(config) {
        match tensors.get(&spec.name) {
            None => missing.push(spec.name),
            Some(t) if t.dims() != spec.shape.as_slice() => {
                return Err(EchoError::config(format!(
                    "tensor {} has shape {:?}, expected {:?}",
                    spec.name,
                    t.dims(),
                    spec.shape
                )));
            }
            Some(_) => {}
        }
    }

    if !missing.is_empty() {
        return Err(EchoError::config(format!(
            "missing {} tensor(s): {}",
            missing.len(),
            missing.join(", ")
        )));
    }
    Ok(())
}

/// Write weights to a safetensors file.
#[instrument(skip(tensors), fields(path = %path.display()))]
pub fn save_weights(tensors: &HashMap<String, Tensor>, path: &Path) -> EchoResult<()> {
    let mut host = HashMap::with_capacity(tensors.len());
    for (name, tensor) in tensors {
        let tensor = tensor
            .to_device(&Device::Cpu)
            .map_err(|e| EchoError::inference(format!("weight transfer failed: {e}")))?;
        host.insert(name.clone(), tensor);
    }

    candle_core::safetensors::save(&host, path)
        .map_err(|e| EchoError::io(path, io::Error::other(e.to_string())))?;

    info!(count = host.len(), "exported sampler weights");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SamplerConfig {
        SamplerConfig {
            latent_dim: 4,
            hidden_size: 8,
            cond_dim: 6,
            num_blocks: 2,
            frequency_embedding_size: 8,
            frame_hop: 16,
            ..Default::default()
        }
    }

    #[test]
    fn test_specs_cover_blocks() {
        let specs = tensor_specs(&small_config());
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"net.blocks.1.mod_linear.weight"));
        assert!(!names.contains(&"net.blocks.2.mod_linear.weight"));
        assert!(names.contains(&DECODER_WEIGHT));
    }

    #[test]
    fn test_seeded_weights_deterministic() {
        let device = Device::Cpu;
        let config = small_config();
        let a = seeded_weights(&config, 5, &device).unwrap();
        let b = seeded_weights(&config, 5, &device).unwrap();
        let c = seeded_weights(&config, 6, &device).unwrap();

        let name = "net.input_proj.weight";
        let va: Vec<f32> = a[name].flatten_all().unwrap().to_vec1().unwrap();
        let vb: Vec<f32> = b[name].flatten_all().unwrap().to_vec1().unwrap();
        let vc: Vec<f32> = c[name].flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(va, vb);
        assert_ne!(va, vc);
        assert!(check_tensors(&a, &config).is_ok());
    }

    #[test]
    fn test_check_tensors_reports_missing() {
        let device = Device::Cpu;
        let config = small_config();
        let mut tensors = seeded_weights(&config, 1, &device).unwrap();
        tensors.remove("net.cond_proj.bias");

        let err = check_tensors(&tensors, &config).unwrap_err();
        assert!(matches!(err, EchoError::Config(ref m) if m.contains("net.cond_proj.bias")));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_weights(
            Path::new("/nonexistent/echo.safetensors"),
            &small_config(),
            &Device::Cpu,
        )
        .unwrap_err();
        assert!(matches!(err, EchoError::ModelLoad { .. }));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.safetensors");
        let config = small_config();
        let tensors = seeded_weights(&config, 3, &Device::Cpu).unwrap();

        save_weights(&tensors, &path).unwrap();
        let loaded = load_weights(&path, &config, &Device::Cpu).unwrap();
        assert_eq!(loaded.len(), tensors.len());

        let name = "net.final_layer.linear.weight";
        let before: Vec<f32> = tensors[name].flatten_all().unwrap().to_vec1().unwrap();
        let after: Vec<f32> = loaded[name].flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(before, after);
    }
}
