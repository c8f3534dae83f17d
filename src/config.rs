//! Run configuration and OTG model loading.
//!
//! Everything here is resolved before the first call to the OTG API, so any
//! error is a startup error.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::model::{Config, MetricsMode};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read OTG model from {origin}")]
    Read {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed YAML in OTG model")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("malformed JSON in OTG model")]
    Json(#[from] serde_json::Error),

    #[error("invalid interval {input:?}: {source}")]
    Interval {
        input: String,
        #[source]
        source: humantime::DurationError,
    },
}

/// Format of the OTG model document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    /// YAML, which also accepts JSON documents.
    #[default]
    Yaml,
    Json,
}

/// Where the OTG model document comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelSource {
    File(PathBuf),
    #[default]
    Stdin,
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelSource::File(path) => write!(f, "{}", path.display()),
            ModelSource::Stdin => write!(f, "stdin"),
        }
    }
}

/// Immutable settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Location of the OTG API endpoint.
    pub api: String,
    /// Validate the endpoint's X.509 certificate.
    pub verify_tls: bool,
    pub format: InputFormat,
    pub source: ModelSource,
    pub metrics: MetricsMode,
    /// Pause between two metrics fetches.
    pub interval: Duration,
    /// Forced-stop multiplier of the ETA. `<= 0` means no limit.
    pub xeta: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            api: "https://localhost".to_string(),
            verify_tls: true,
            format: InputFormat::Yaml,
            source: ModelSource::Stdin,
            metrics: MetricsMode::Port,
            interval: Duration::from_millis(500),
            xeta: 0.0,
        }
    }
}

/// Read and parse the OTG model named by `source`.
pub fn load_model(source: &ModelSource, format: InputFormat) -> Result<Config, ConfigError> {
    let text = match source {
        ModelSource::File(path) => {
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                origin: path.display().to_string(),
                source,
            })?
        }
        ModelSource::Stdin => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|source| ConfigError::Read {
                    origin: "stdin".to_string(),
                    source,
                })?;
            buf
        }
    };
    let config = parse_model(&text, format)?;
    debug!(%source, flows = config.flows.len(), "loaded OTG model");
    Ok(config)
}

pub fn parse_model(text: &str, format: InputFormat) -> Result<Config, ConfigError> {
    Ok(match format {
        InputFormat::Yaml => serde_yaml_ng::from_str(text)?,
        InputFormat::Json => serde_json::from_str(text)?,
    })
}

/// Parse a duration such as `0.5s`, `250ms` or `1m30s`. A bare `0` is accepted.
pub fn parse_interval(input: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(input.trim()).map_err(|source| ConfigError::Interval {
        input: input.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_interval_units() {
        assert_eq!(parse_interval("0.5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_interval("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_interval("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_interval(" 2s ").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_interval("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_interval_rejects_garbage() {
        for input in ["", "10", "abc", "-1s", "1x"] {
            let err = parse_interval(input).unwrap_err();
            assert!(
                matches!(err, ConfigError::Interval { .. }),
                "{input:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_parse_model_yaml() {
        let yaml = r#"
ports:
  - name: p1
    location: localhost:5555
flows:
  - name: f1
    tx_rx:
      choice: port
      port:
        tx_name: p1
    rate:
      choice: pps
      pps: 100
    duration:
      choice: fixed_packets
      fixed_packets:
        packets: 1000
"#;
        let config = parse_model(yaml, InputFormat::Yaml).unwrap();
        assert_eq!(config.flows.len(), 1);
        assert_eq!(config.flows[0].packet_count(), 1000);
        assert_eq!(config.flows[0].rate_pps(), 100);
        assert!(config.extra.contains_key("ports"));
    }

    #[test]
    fn test_yaml_accepts_json_documents() {
        let json = r#"{"flows": [{"name": "f1", "rate": {"pps": 50}}]}"#;
        let from_yaml = parse_model(json, InputFormat::Yaml).unwrap();
        let from_json = parse_model(json, InputFormat::Json).unwrap();
        assert_eq!(from_yaml, from_json);
        assert_eq!(from_json.flows[0].rate_pps(), 50);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            parse_model("flows: [", InputFormat::Yaml),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            parse_model("flows: []", InputFormat::Json),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_load_model_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "flows:\n  - name: f1\n    duration:\n      fixed_packets:\n        packets: 7").unwrap();
        let source = ModelSource::File(file.path().to_path_buf());
        let config = load_model(&source, InputFormat::Yaml).unwrap();
        assert_eq!(config.flows[0].packet_count(), 7);
    }

    #[test]
    fn test_load_model_missing_file() {
        let source = ModelSource::File(PathBuf::from("/nonexistent/otg.yaml"));
        let err = load_model(&source, InputFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/otg.yaml"));
    }

    #[test]
    fn test_run_config_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.api, "https://localhost");
        assert_eq!(config.metrics, MetricsMode::Port);
        assert_eq!(config.interval, Duration::from_millis(500));
        assert_eq!(config.xeta, 0.0);
        assert_eq!(config.source, ModelSource::Stdin);
    }
}
