use std::collections::HashMap;
use std::env;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
const DEFAULT_MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: String,
    /// Largest accepted request body
    pub max_body_bytes: usize,
    /// Longer titles are refused with 422
    pub max_title_chars: usize,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "QUILL_API_BIND_ADDR", DEFAULT_BIND_ADDR);
        let max_body_bytes = parse_positive(
            &lookup,
            "QUILL_API_MAX_BODY_BYTES",
            DEFAULT_MAX_BODY_BYTES,
        )?;
        let max_title_chars = parse_positive(
            &lookup,
            "QUILL_API_MAX_TITLE_CHARS",
            DEFAULT_MAX_TITLE_CHARS,
        )?;

        Ok(Self {
            bind_addr,
            max_body_bytes,
            max_title_chars,
        })
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_title_chars: DEFAULT_MAX_TITLE_CHARS,
        }
    }
}

fn parse_positive(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(default);
    };
    match raw.parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::Invalid(format!(
            "{name} must be a positive integer"
        ))),
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn config_defaults_when_unset() {
        let map: HashMap<&str, &str> = HashMap::new();
        let config =
            ApiConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string())).unwrap();
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.bind_addr, "127.0.0.1:8787");
    }

    #[test]
    fn config_reads_overrides() {
        let mut map = HashMap::new();
        map.insert("QUILL_API_BIND_ADDR", " 0.0.0.0:9000 ");
        map.insert("QUILL_API_MAX_TITLE_CHARS", "16");

        let config =
            ApiConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string())).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.max_title_chars, 16);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn config_rejects_invalid_limits() {
        let mut map = HashMap::new();
        map.insert("QUILL_API_MAX_BODY_BYTES", "0");
        let err = ApiConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("QUILL_API_MAX_BODY_BYTES"));
    }
}
