//! Root configuration file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use audio_codec::WavEncoding;
use echo_core::{EchoError, EchoResult, EngineConfig, LoggingConfig};
use flow_sampler::SamplerConfig;

/// Everything needed to build an engine, as read from a JSON file.
///
/// Every section is optional; missing fields take their defaults.
///
/// ```json
/// {
///   "engine": { "device": "cpu", "dtype": "full", "compile": false },
///   "sampler": { "num_blocks": 4 },
///   "output": { "encoding": "pcm16" },
///   "logging": { "level": "debug", "format": "json" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EchoConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Saved-file settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub encoding: WavEncoding,
}

impl EchoConfig {
    pub fn validate(&self) -> EchoResult<()> {
        self.sampler.validate()
    }
}

/// Read and validate a JSON config file.
pub fn load_config(path: impl AsRef<Path>) -> EchoResult<EchoConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| EchoError::io(path, e))?;
    let config: EchoConfig = serde_json::from_str(&text)
        .map_err(|e| EchoError::config(format!("{}: {e}", path.display())))?;
    config.validate()?;

    info!(path = %path.display(), device = %config.engine.device, "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_core::{DeviceKind, Precision, WeightSource};
    use std::io::Write;

    #[test]
    fn test_empty_object_is_default() {
        let config: EchoConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EchoConfig::default());
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "engine": {{
                    "device": "cpu",
                    "dtype": "full",
                    "compile": true,
                    "weights": {{ "kind": "seeded", "seed": 7 }}
                }},
                "output": {{ "encoding": "pcm16" }},
                "logging": {{ "level": "debug" }}
            }}"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.engine.device, DeviceKind::Cpu);
        assert_eq!(config.engine.dtype, Some(Precision::Full));
        assert!(config.engine.compile);
        assert_eq!(config.engine.weights, WeightSource::Seeded { seed: 7 });
        assert_eq!(config.output.encoding, WavEncoding::Pcm16);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_load_config_errors() {
        let err = load_config("/nonexistent/echo.json").unwrap_err();
        assert!(matches!(err, EchoError::IoFailure { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, EchoError::Config(_)));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "sampler": {{ "hidden_size": 0 }} }}"#).unwrap();
        assert!(load_config(file.path()).is_err());
    }
}
