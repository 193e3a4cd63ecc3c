//! Application configuration
//!
//! Values are resolved in this order, highest priority last:
//!
//! 1. Defaults
//! 2. Config file (`coastal-kiln.toml`, or the path in `COASTAL_KILN_CONFIG`)
//! 3. Environment variables
//!
//! Without both backend values the application runs offline.

use crate::database::DATABASE_FILE;
use crate::error::AppError;
use crate::services::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "coastal-kiln.toml";
pub const ENV_CONFIG: &str = "COASTAL_KILN_CONFIG";
pub const ENV_SUPABASE_URL: &str = "COASTAL_KILN_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "COASTAL_KILN_SUPABASE_ANON_KEY";
pub const ENV_DATA_DIR: &str = "COASTAL_KILN_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub data_dir: PathBuf,
    /// Upper bound for the initial auth notification
    pub loading_timeout_ms: u64,
    /// Pause before the first remote load
    pub startup_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    /// Where password-reset mails send the user back to
    pub password_reset_redirect: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            data_dir: PathBuf::from("./data"),
            loading_timeout_ms: 3000,
            startup_delay_ms: 100,
            retry_attempts: 3,
            retry_base_delay_ms: 300,
            password_reset_redirect: None,
        }
    }
}

/// Connection values of the hosted backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

impl AppConfig {
    /// Loads the config file named by the environment (or the default file)
    /// and applies environment overrides
    pub fn load() -> Result<Self, AppError> {
        let path = std::env::var(ENV_CONFIG).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let config = Self::load_from(Path::new(&path))?;
        Ok(config.with_overrides(|name| std::env::var(name).ok()))
    }

    /// Defaults overlaid with `path` when it exists
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self, AppError> {
        toml::from_str(content).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Applies overrides looked up by variable name
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SUPABASE_URL) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = lookup(ENV_SUPABASE_ANON_KEY) {
            self.supabase_anon_key = Some(key);
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    /// Backend settings, `None` when either value is missing or blank
    pub fn backend(&self) -> Option<BackendConfig> {
        let url = self.supabase_url.as_deref().map(str::trim).unwrap_or("");
        let anon_key = self.supabase_anon_key.as_deref().map(str::trim).unwrap_or("");
        if url.is_empty() || anon_key.is_empty() {
            return None;
        }
        Some(BackendConfig {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn loading_timeout(&self) -> Duration {
        Duration::from_millis(self.loading_timeout_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_offline() {
        let config = AppConfig::default();
        assert_eq!(config.backend(), None);
        assert_eq!(config.loading_timeout(), Duration::from_secs(3));
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert_eq!(config.database_path(), PathBuf::from("./data/coastal-kiln.db"));
    }

    #[test]
    fn test_file_values_with_env_overrides() {
        let config = AppConfig::from_toml(
            r#"
            supabase_url = "https://file.example.co/"
            supabase_anon_key = "file-key"
            startup_delay_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.startup_delay_ms, 50);
        assert_eq!(config.retry_base_delay_ms, 300);

        let env: HashMap<&str, &str> = [
            (ENV_SUPABASE_URL, "https://env.example.co"),
            (ENV_DATA_DIR, "/tmp/kiln"),
        ]
        .into_iter()
        .collect();
        let config = config.with_overrides(|name| env.get(name).map(|v| v.to_string()));

        let backend = config.backend().unwrap();
        assert_eq!(backend.url, "https://env.example.co");
        assert_eq!(backend.anon_key, "file-key");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/kiln/coastal-kiln.db"));
    }

    #[test]
    fn test_missing_either_value_means_offline() {
        let config = AppConfig {
            supabase_url: Some("https://x.example.co".into()),
            supabase_anon_key: Some("  ".into()),
            ..AppConfig::default()
        };
        assert_eq!(config.backend(), None);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = AppConfig::from_toml("retry_attempts = \"many\"");
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
