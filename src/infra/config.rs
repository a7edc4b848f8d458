//! Configuration management infrastructure.
//!
//! Persists tool preferences (default access method, WinRM listener
//! settings, timeouts, concurrency) as a TOML file under the user's
//! configuration directory.

use crate::domain::types::AccessMethod;
use crate::infra::error::{ResyncError, ResyncResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tool configuration with all remote-access preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Default access method when none is given on the command line.
    pub default_method: String,

    /// WinRM listener port on target hosts.
    pub winrm_port: u16,

    /// Use HTTPS for the WinRM listener.
    pub winrm_tls: bool,

    /// Per-host operation timeout.
    pub timeout_seconds: u64,

    /// Upper bound on hosts processed simultaneously.
    pub max_parallel_hosts: usize,

    /// Emit outcomes as JSON instead of text lines.
    pub json_output: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            default_method: AccessMethod::default().as_str().to_string(),
            winrm_port: crate::domain::constants::WINRM_HTTP_PORT,
            winrm_tls: false,
            timeout_seconds: 30,
            max_parallel_hosts: 8,
            json_output: false,
        }
    }
}

impl ToolConfig {
    /// The configured default method, parsed.
    ///
    /// # Errors
    ///
    /// Returns [`ResyncError::Configuration`] when the stored string names no
    /// known method.
    pub fn default_method(&self) -> ResyncResult<AccessMethod> {
        self.default_method
            .parse()
            .map_err(ResyncError::Configuration)
    }
}

/// Configuration manager for handling the config file.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with the default path.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible for parity with path lookups that
    /// may fail on exotic platforms.
    pub fn new() -> ResyncResult<Self> {
        Ok(Self {
            config_path: Self::default_config_path(),
        })
    }

    /// Create a configuration manager with a custom path.
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Default configuration file location.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("chain-resync").join("config.toml")
        } else {
            PathBuf::from("chain-resync-config.toml")
        }
    }

    /// Load configuration, creating the default file if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`ResyncError::Configuration`] on unreadable or invalid
    /// content.
    pub fn load_or_create_default(&self) -> ResyncResult<ToolConfig> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = ToolConfig::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration from the file.
    ///
    /// # Errors
    ///
    /// Returns [`ResyncError::Configuration`] on unreadable or invalid
    /// content.
    pub fn load(&self) -> ResyncResult<ToolConfig> {
        log::debug!("loading configuration from {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            ResyncError::Configuration(format!(
                "failed to read config file {}: {e}",
                self.config_path.display()
            ))
        })?;

        let config: ToolConfig = toml::from_str(&content)
            .map_err(|e| ResyncError::Configuration(format!("failed to parse config file: {e}")))?;

        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration to the file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ResyncError::Configuration`] when the file cannot be
    /// written.
    pub fn save(&self, config: &ToolConfig) -> ResyncResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ResyncError::Configuration(format!(
                    "failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let content = toml::to_string_pretty(config)
            .map_err(|e| ResyncError::Configuration(format!("failed to serialize config: {e}")))?;

        fs::write(&self.config_path, content).map_err(|e| {
            ResyncError::Configuration(format!(
                "failed to write config file {}: {e}",
                self.config_path.display()
            ))
        })?;

        log::debug!("configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Update a single configuration value by key.
    ///
    /// # Errors
    ///
    /// Returns [`ResyncError::Configuration`] for unknown keys or invalid
    /// values.
    pub fn update_value(&self, key: &str, value: &str) -> ResyncResult<()> {
        let mut config = self.load_or_create_default()?;

        match key {
            "default_method" => {
                value
                    .parse::<AccessMethod>()
                    .map_err(ResyncError::Configuration)?;
                config.default_method = value.to_string();
            }
            "winrm_port" => {
                config.winrm_port = value.parse().map_err(|_| {
                    ResyncError::Configuration(format!("invalid port value: {value}"))
                })?;
            }
            "winrm_tls" => {
                config.winrm_tls = value.parse().map_err(|_| {
                    ResyncError::Configuration(format!("invalid boolean value: {value}"))
                })?;
            }
            "timeout_seconds" => {
                config.timeout_seconds = value.parse().map_err(|_| {
                    ResyncError::Configuration(format!("invalid timeout value: {value}"))
                })?;
            }
            "max_parallel_hosts" => {
                config.max_parallel_hosts = value.parse().map_err(|_| {
                    ResyncError::Configuration(format!("invalid parallelism value: {value}"))
                })?;
            }
            "json_output" => {
                config.json_output = value.parse().map_err(|_| {
                    ResyncError::Configuration(format!("invalid boolean value: {value}"))
                })?;
            }
            _ => {
                return Err(ResyncError::Configuration(format!(
                    "unknown configuration key: {key}"
                )));
            }
        }

        Self::validate_config(&config)?;
        self.save(&config)
    }

    /// The configuration file path.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Export configuration as a portable format.
    ///
    /// # Errors
    ///
    /// Returns [`ResyncError::Configuration`] when serialization fails.
    pub fn export_config(&self, format: ExportFormat) -> ResyncResult<String> {
        let config = self.load_or_create_default()?;

        match format {
            ExportFormat::Toml => toml::to_string_pretty(&config)
                .map_err(|e| ResyncError::Configuration(format!("TOML export failed: {e}"))),
            ExportFormat::Json => serde_json::to_string_pretty(&config)
                .map_err(|e| ResyncError::Configuration(format!("JSON export failed: {e}"))),
        }
    }

    fn validate_config(config: &ToolConfig) -> ResyncResult<()> {
        config.default_method()?;

        if config.timeout_seconds == 0 {
            return Err(ResyncError::Configuration(
                "timeout must be greater than 0".to_string(),
            ));
        }
        if config.max_parallel_hosts == 0 {
            return Err(ResyncError::Configuration(
                "max_parallel_hosts must be greater than 0".to_string(),
            ));
        }
        if config.winrm_port == 0 {
            return Err(ResyncError::Configuration(
                "winrm_port must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration export formats.
#[derive(Debug, Clone, Copy)]
pub enum ExportFormat {
    Toml,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_configuration_is_valid() {
        let config = ToolConfig::default();
        assert_eq!(config.default_method().unwrap(), AccessMethod::ManagementQuery);
        assert_eq!(config.winrm_port, 5985);
        assert!(config.timeout_seconds > 0);
    }

    #[test]
    fn config_serialization_round_trips() {
        let config = ToolConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: ToolConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.default_method, deserialized.default_method);
        assert_eq!(config.winrm_port, deserialized.winrm_port);
    }

    #[test]
    fn config_manager_with_temp_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");
        let manager = ConfigManager::with_path(&config_path);

        let config = manager.load_or_create_default().unwrap();
        assert!(config_path.exists());

        let loaded = manager.load().unwrap();
        assert_eq!(config.default_method, loaded.default_method);
    }

    #[test]
    fn update_value_rejects_unknown_keys_and_bad_values() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("cfg.toml"));

        manager.update_value("default_method", "winrm").unwrap();
        assert_eq!(manager.load().unwrap().default_method, "winrm");

        assert!(manager.update_value("default_method", "carrier-pigeon").is_err());
        assert!(manager.update_value("no_such_key", "1").is_err());
        assert!(manager.update_value("timeout_seconds", "0").is_err());
    }
}
