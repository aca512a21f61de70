//! Pipeline configuration.

use inlet_loader::GlueOptions;
use inlet_markup::TextPrefixPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid pipeline config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings for a [`DocumentPipeline`](crate::DocumentPipeline). Every field
/// has a default, so `{}` is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Tokenization of unclaimed `text/…` script types.
    pub text_prefix: TextPrefixPolicy,
    /// Compile worker threads. `0` compiles on the calling thread.
    pub worker_threads: usize,
    pub glue: GlueOptions,
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(PipelineConfig::from_json("{}").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = PipelineConfig::from_json(
            r#"{ "text_prefix": "registered_only", "worker_threads": 4, "glue": { "expose_globals": false } }"#,
        )
        .unwrap();
        assert_eq!(config.text_prefix, TextPrefixPolicy::RegisteredOnly);
        assert_eq!(config.worker_threads, 4);
        assert!(!config.glue.expose_globals);
        assert_eq!(config.glue.registry_global, "__inletModules");
    }

    #[test]
    fn test_round_trip() {
        let config = PipelineConfig {
            worker_threads: 2,
            ..PipelineConfig::default()
        };
        let back = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_bad_json_is_error() {
        let err = PipelineConfig::from_json(r#"{ "worker_threads": "many" }"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid pipeline config"));
    }
}
