//! Configuration management for palaver.
//!
//! Loads configuration from ${PALAVER_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model preselected for new sessions.
    pub default_model: String,

    /// Custom system prompt override.
    ///
    /// When set, this takes precedence over any prompt supplied through a
    /// session patch, and seeds the default session after a full delete.
    pub system_prompt: Option<String>,

    /// Base URL of the chat backend (streaming chat + document upload).
    pub backend_base_url: String,

    /// URL of the model catalog resource.
    pub catalog_url: String,

    /// Interval between model catalog revalidations, in seconds.
    pub catalog_refresh_secs: u64,
}

impl Config {
    const DEFAULT_MODEL: &'static str = "gpt-4o-mini";
    const DEFAULT_BACKEND_BASE_URL: &'static str = "http://localhost:3000";
    const DEFAULT_CATALOG_URL: &'static str = "https://models.palaver.dev/catalog.json";
    const DEFAULT_CATALOG_REFRESH_SECS: u64 = 600;

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Resolves the backend base URL with precedence: env > config > default.
    pub fn backend_base_url(&self) -> Result<String> {
        resolve_url(&self.backend_base_url, "PALAVER_BACKEND_URL", "backend")
    }

    /// Resolves the model catalog URL with precedence: env > config > default.
    pub fn catalog_url(&self) -> Result<String> {
        resolve_url(&self.catalog_url, "PALAVER_CATALOG_URL", "catalog")
    }

    /// Returns the catalog revalidation interval.
    pub fn catalog_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.catalog_refresh_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model: Self::DEFAULT_MODEL.to_string(),
            system_prompt: None,
            backend_base_url: Self::DEFAULT_BACKEND_BASE_URL.to_string(),
            catalog_url: Self::DEFAULT_CATALOG_URL.to_string(),
            catalog_refresh_secs: Self::DEFAULT_CATALOG_REFRESH_SECS,
        }
    }
}

/// Resolves a URL, letting an environment variable override the config value.
fn resolve_url(config_value: &str, env_var: &str, what: &str) -> Result<String> {
    if let Ok(env_url) = std::env::var(env_var) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, what)?;
            return Ok(trimmed.to_string());
        }
    }

    let trimmed = config_value.trim();
    validate_url(trimmed, what)?;
    Ok(trimmed.to_string())
}

/// Validates that a URL is well-formed.
fn validate_url(url: &str, what: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid {what} URL: {url}"))?;
    Ok(())
}

pub mod paths {
    //! Path resolution for palaver configuration and data directories.
    //!
    //! PALAVER_HOME resolution order:
    //! 1. PALAVER_HOME environment variable (if set)
    //! 2. ~/.config/palaver (default)

    use std::path::PathBuf;

    /// Returns the palaver home directory.
    ///
    /// Checks PALAVER_HOME env var first, falls back to ~/.config/palaver
    pub fn palaver_home() -> PathBuf {
        if let Ok(home) = std::env::var("PALAVER_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("palaver"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        palaver_home().join("config.toml")
    }

    /// Returns the path to the persisted session state file.
    pub fn state_path() -> PathBuf {
        palaver_home().join("sessions.json")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults_when_file_missing() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(&temp.path().join("config.toml")).unwrap();
        assert_eq!(config.default_model, Config::DEFAULT_MODEL);
        assert!(config.system_prompt.is_none());
        assert_eq!(config.catalog_refresh_secs, 600);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "default_model = \"claude-3-5-sonnet\"").unwrap();
        writeln!(file, "system_prompt = \"Always answer in French.\"").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.default_model, "claude-3-5-sonnet");
        assert_eq!(
            config.system_prompt.as_deref(),
            Some("Always answer in French.")
        );
        assert_eq!(config.backend_base_url, Config::DEFAULT_BACKEND_BASE_URL);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "default_model = [not toml").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_rejects_malformed_url() {
        let config = Config {
            backend_base_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.backend_base_url().is_err());
    }
}
