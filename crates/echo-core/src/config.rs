//! Configuration structures for the Echo TTS engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Seed used for synthetic weights when no weight file is configured.
pub const DEFAULT_WEIGHT_SEED: u64 = 0x4543_484f;

/// Compute target for the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// General-purpose CPU computation.
    #[default]
    Cpu,
    /// GPU computation (CUDA or Metal, depending on enabled features).
    #[serde(alias = "cuda", alias = "metal", alias = "gpu")]
    Accelerator,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Accelerator => write!(f, "accelerator"),
        }
    }
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "accelerator" | "cuda" | "gpu" | "metal" | "mps" => Ok(Self::Accelerator),
            _ => Err(format!("unknown device: {s}")),
        }
    }
}

/// Numeric precision used for sampler computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Precision {
    /// 32-bit floating point.
    #[default]
    #[serde(alias = "f32")]
    Full,
    /// IEEE 16-bit floating point.
    #[serde(alias = "f16")]
    Half,
    /// Brain floating point 16.
    #[serde(alias = "bf16")]
    ReducedHalf,
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Precision::Full => write!(f, "full"),
            Precision::Half => write!(f, "half"),
            Precision::ReducedHalf => write!(f, "reduced-half"),
        }
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" | "f32" | "float32" => Ok(Self::Full),
            "half" | "f16" | "float16" => Ok(Self::Half),
            "reduced-half" | "bf16" | "bfloat16" => Ok(Self::ReducedHalf),
            _ => Err(format!("unknown precision: {s}")),
        }
    }
}

/// Where sampler weights come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WeightSource {
    /// Deterministic synthetic weights derived from a seed.
    Seeded { seed: u64 },
    /// Weights read from a safetensors file.
    Safetensors { path: PathBuf },
}

impl Default for WeightSource {
    fn default() -> Self {
        Self::Seeded {
            seed: DEFAULT_WEIGHT_SEED,
        }
    }
}

/// Engine construction settings. Fixed once the engine is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Compute target.
    #[serde(default)]
    pub device: DeviceKind,
    /// Explicit precision; resolved from device capabilities when absent.
    #[serde(default)]
    pub dtype: Option<Precision>,
    /// Build the fused sampler path and trace it at construction.
    #[serde(default)]
    pub compile: bool,
    /// Sampler weights.
    #[serde(default)]
    pub weights: WeightSource,
}

impl EngineConfig {
    /// Create a config for the given device with policy-resolved precision.
    pub fn new(device: DeviceKind) -> Self {
        Self {
            device,
            ..Default::default()
        }
    }

    /// Override the precision.
    pub fn with_dtype(mut self, dtype: Precision) -> Self {
        self.dtype = Some(dtype);
        self
    }

    /// Enable or disable the fused sampler path.
    pub fn with_compile(mut self, compile: bool) -> Self {
        self.compile = compile;
        self
    }

    /// Set the weight source.
    pub fn with_weights(mut self, weights: WeightSource) -> Self {
        self.weights = weights;
        self
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (json or text).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.device, DeviceKind::Cpu);
        assert!(config.dtype.is_none());
        assert!(!config.compile);
        assert_eq!(
            config.weights,
            WeightSource::Seeded {
                seed: DEFAULT_WEIGHT_SEED
            }
        );
    }

    #[test]
    fn test_device_kind_from_str() {
        assert_eq!("cpu".parse::<DeviceKind>().unwrap(), DeviceKind::Cpu);
        assert_eq!("CPU".parse::<DeviceKind>().unwrap(), DeviceKind::Cpu);
        assert_eq!(
            "cuda".parse::<DeviceKind>().unwrap(),
            DeviceKind::Accelerator
        );
        assert_eq!(
            "accelerator".parse::<DeviceKind>().unwrap(),
            DeviceKind::Accelerator
        );
        assert!("tpu".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn test_precision_from_str() {
        assert_eq!("full".parse::<Precision>().unwrap(), Precision::Full);
        assert_eq!("f16".parse::<Precision>().unwrap(), Precision::Half);
        assert_eq!(
            "bf16".parse::<Precision>().unwrap(),
            Precision::ReducedHalf
        );
        assert!("int8".parse::<Precision>().is_err());
        assert_eq!(Precision::ReducedHalf.to_string(), "reduced-half");
    }

    #[test]
    fn test_engine_config_serde() {
        let json = r#"{
            "device": "accelerator",
            "dtype": "reduced-half",
            "compile": true,
            "weights": { "kind": "safetensors", "path": "weights/echo.safetensors" }
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.device, DeviceKind::Accelerator);
        assert_eq!(config.dtype, Some(Precision::ReducedHalf));
        assert!(config.compile);
        assert_eq!(
            config.weights,
            WeightSource::Safetensors {
                path: PathBuf::from("weights/echo.safetensors")
            }
        );

        let minimal: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(minimal, EngineConfig::default());
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "text");
    }
}
