//! Loader configuration
//!
//! Every value has a default matching the hosted player CDN. Environment
//! variables override the defaults at runtime; a JSON file may be used
//! instead by the CLI.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default CDN origin that player scripts and iframes are served from
pub const DEFAULT_BASE_URL: &str = "https://players.brightcove.net/";

/// Environment variable overriding [`LoaderConfig::base_url`]
pub const ENV_BASE_URL: &str = "VIDLOADER_BASE_URL";

/// Environment variable overriding [`LoaderConfig::script_timeout_secs`]
pub const ENV_SCRIPT_TIMEOUT: &str = "VIDLOADER_SCRIPT_TIMEOUT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// CDN base, expected to end with `/`
    pub base_url: String,
    /// Name of the global the player runtime installs its init function on
    pub loader_global: String,
    /// Prefix (case-insensitive) of the globals holding player registries
    pub registry_global_prefix: String,
    /// Download timeout used by the HTTP script host
    pub script_timeout_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            loader_global: "bc".to_string(),
            registry_global_prefix: "videojs".to_string(),
            script_timeout_secs: 30,
        }
    }
}

impl LoaderConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base) = std::env::var(ENV_BASE_URL) {
            config.base_url = base;
        }
        if let Ok(timeout) = std::env::var(ENV_SCRIPT_TIMEOUT) {
            config.script_timeout_secs = timeout.parse().map_err(|_| {
                Error::InvalidConfig(format!("{} must be a number of seconds, got {:?}", ENV_SCRIPT_TIMEOUT, timeout))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file; missing keys take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::InvalidConfig("baseUrl must not be empty".into()));
        }
        if self.loader_global.is_empty() || self.registry_global_prefix.is_empty() {
            return Err(Error::InvalidConfig("global names must not be empty".into()));
        }
        if self.script_timeout_secs == 0 {
            return Err(Error::InvalidConfig("scriptTimeoutSecs must be positive".into()));
        }
        Ok(())
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.base_url, "https://players.brightcove.net/");
        assert_eq!(config.loader_global, "bc");
        assert_eq!(config.registry_global_prefix, "videojs");
        assert_eq!(config.script_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: LoaderConfig =
            serde_json::from_str(r#"{"baseUrl": "https://cdn.example/"}"#).unwrap();
        assert_eq!(config.base_url, "https://cdn.example/");
        assert_eq!(config.loader_global, "bc");
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = LoaderConfig {
            script_timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
