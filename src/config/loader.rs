//! Configuration loading utilities

use crate::{Result, config::Settings};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "STREAM_RESOLVER_CONFIG";

/// Configuration loader with multiple source support
#[derive(Debug)]
pub struct ConfigLoader {
    defaults: Settings,
}

impl ConfigLoader {
    /// Create new configuration loader
    pub fn new() -> Self {
        Self {
            defaults: Settings::default(),
        }
    }

    /// Get the config file path from the environment or the default location
    ///
    /// Priority:
    /// 1. `STREAM_RESOLVER_CONFIG` environment variable
    /// 2. `~/.config/stream-resolver/config.toml` (or platform equivalent)
    pub fn get_config_path() -> Option<PathBuf> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(config_path);
            if path.exists() {
                debug!("Using config file from {}: {:?}", CONFIG_ENV_VAR, path);
                return Some(path);
            } else {
                warn!("{} points to non-existent file: {:?}", CONFIG_ENV_VAR, path);
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("stream-resolver").join("config.toml");
            if default_path.exists() {
                debug!("Using default config file: {:?}", default_path);
                return Some(default_path);
            }
        }

        debug!("No config file found");
        None
    }

    /// Load configuration with precedence order:
    /// 1. Environment variables (highest priority)
    /// 2. Configuration file, explicit or discovered
    /// 3. Default values (lowest priority)
    pub fn load(&self, config_file: Option<&Path>) -> Result<Settings> {
        let mut settings = self.defaults.clone();

        let discovered;
        let path = match config_file {
            Some(path) => Some(path),
            None => {
                discovered = Self::get_config_path();
                discovered.as_deref()
            }
        };

        if let Some(path) = path {
            if path.exists() {
                info!("Loading configuration from file: {:?}", path);
                settings = Settings::from_file(path)?;
            } else {
                warn!("Configuration file not found: {:?}, using defaults", path);
            }
        }

        debug!("Applying environment variable overrides");
        settings = settings.merge_with_env()?;

        settings.validate()?;

        debug!("Final configuration: {:?}", settings);
        Ok(settings)
    }

    /// Load configuration from environment only
    pub fn from_env_only(&self) -> Result<Settings> {
        let settings = Settings::from_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Get default configuration
    pub fn defaults(&self) -> &Settings {
        &self.defaults
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_TEST_MUTEX;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_defaults() {
        let loader = ConfigLoader::new();
        let defaults = loader.defaults();
        assert_eq!(defaults.license.key_system, "com.widevine.alpha");
        assert_eq!(defaults.resolve.stage_timeout, 30);
    }

    #[test]
    fn test_load_from_file() {
        let _lock = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[resolve]
stage_timeout = 10
refresh_on_unauthorized = true

[logging]
level = "debug"
        "#
        )
        .unwrap();

        let loader = ConfigLoader::new();
        let settings = loader.load(Some(temp_file.path())).unwrap();

        assert_eq!(settings.resolve.stage_timeout, 10);
        assert!(settings.resolve.refresh_on_unauthorized);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn test_env_overrides_file() {
        let _lock = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[resolve]\nstage_timeout = 10").unwrap();

        unsafe {
            std::env::set_var("RESOLVER_STAGE_TIMEOUT", "3");
        }

        let result = ConfigLoader::new().load(Some(temp_file.path()));

        unsafe {
            std::env::remove_var("RESOLVER_STAGE_TIMEOUT");
        }

        assert_eq!(result.unwrap().resolve.stage_timeout, 3);
    }

    #[test]
    fn test_config_path_from_env() {
        let _lock = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let temp_file = NamedTempFile::new().unwrap();
        unsafe {
            std::env::set_var(CONFIG_ENV_VAR, temp_file.path());
        }

        let path = ConfigLoader::get_config_path();

        unsafe {
            std::env::remove_var(CONFIG_ENV_VAR);
        }

        assert_eq!(path.as_deref(), Some(temp_file.path()));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let _lock = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[logging]\nlevel = \"loud\"").unwrap();

        let result = ConfigLoader::new().load(Some(temp_file.path()));
        assert!(result.is_err());
    }
}
