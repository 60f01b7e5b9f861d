//! # Runtime Configuration Module
//!
//! Dispatcher settings loaded from environment variables or a YAML file.
//!
//! ## Environment Variables
//!
//! ### `BRRTD_MAX_BODY_BYTES`
//!
//! Largest request body accepted before binding. Larger bodies are answered with
//! `413 Payload Too Large`. Accepts decimal (`1048576`) or hexadecimal
//! (`0x100000`). Default: 10 MiB.
//!
//! ### `BRRTD_RATE_LIMIT_CALLS` / `BRRTD_RATE_LIMIT_TTL_SECS`
//!
//! When both are set and non-zero, the dispatcher installs an in-memory rate
//! limiter allowing that many calls per client and route within the window.
//!
//! ### `BRRTD_LOG_*`
//!
//! Logging options, see [`LogConfig::from_env`].
//!
//! ## YAML
//!
//! The same structure can be loaded from a file:
//!
//! ```yaml
//! max_body_bytes: 1048576
//! rate_limit:
//!   calls_limit: 100
//!   limit_ttl_secs: 60
//! log:
//!   log_level: debug
//!   format: pretty
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use brrtdispatch::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Max body: {} bytes", config.max_body_bytes);
//! ```

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::logging::LogConfig;

/// Default request body limit (10 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Rate limit window settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Calls allowed per window
    pub calls_limit: u64,
    /// Window length in seconds
    pub limit_ttl_secs: u64,
}

/// Runtime configuration for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum accepted request body size in bytes (default: 10 MiB)
    pub max_body_bytes: usize,
    pub rate_limit: Option<RateLimitConfig>,
    pub log: LogConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            rate_limit: None,
            log: LogConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let max_body_bytes = env::var("BRRTD_MAX_BODY_BYTES")
            .ok()
            .and_then(|val| parse_size(&val))
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        let calls = env::var("BRRTD_RATE_LIMIT_CALLS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok());
        let ttl = env::var("BRRTD_RATE_LIMIT_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok());
        let rate_limit = match (calls, ttl) {
            (Some(calls_limit), Some(limit_ttl_secs)) if calls_limit > 0 && limit_ttl_secs > 0 => {
                Some(RateLimitConfig {
                    calls_limit,
                    limit_ttl_secs,
                })
            }
            _ => None,
        };

        RuntimeConfig {
            max_body_bytes,
            rate_limit,
            log: LogConfig::from_env(),
        }
    }

    /// Parse configuration from a YAML document. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML for this structure.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse runtime config YAML")
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_hex_and_decimal() {
        assert_eq!(parse_size("0x4000"), Some(0x4000));
        assert_eq!(parse_size("2048"), Some(2048));
        assert_eq!(parse_size("lots"), None);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = RuntimeConfig::from_yaml_str("rate_limit:\n  calls_limit: 5\n  limit_ttl_secs: 1\n")
            .unwrap();
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(
            config.rate_limit,
            Some(RateLimitConfig {
                calls_limit: 5,
                limit_ttl_secs: 1
            })
        );
        assert_eq!(config.log, LogConfig::default());
    }
}
