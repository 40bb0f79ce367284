//! Installer configuration management

use anyhow::{Context, Result, anyhow};
use common::ReplacementPolicy;
use protocol::ExtensionIdentifier;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallerConfig {
    #[serde(default)]
    pub installer: InstallerSettings,
    #[serde(default)]
    pub extension: ExtensionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerSettings {
    pub log_level: String,
    /// Log file used while the terminal UI owns the screen
    /// If None, uses `<config dir>/virtual-usb/installer.log`
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionSettings {
    /// Bundle identifier of the driver extension to manage
    #[serde(default)]
    pub identifier: ExtensionIdentifier,
    /// Answer given when the OS asks to replace an installed version
    #[serde(default)]
    pub replacement: ReplacementPolicy,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            identifier: ExtensionIdentifier::default(),
            replacement: ReplacementPolicy::Replace,
        }
    }
}

impl InstallerConfig {
    /// Load configuration from the specified path
    ///
    /// Returns the configuration and the file it was read from. Nothing is
    /// logged here since logging is set up from the loaded values.
    pub fn load(path: Option<PathBuf>) -> Result<(Self, PathBuf)> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/virtual-usb/installer.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: InstallerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        Ok((config, config_path))
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> (Self, Option<PathBuf>) {
        match Self::load(None) {
            Ok((config, path)) => (config, Some(path)),
            Err(e) => {
                // Print to stderr since logging is not initialized yet
                eprintln!("Config: {}", e);
                (Self::default(), None)
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("installer.toml")
    }

    /// Log file for terminal UI mode
    pub fn log_file(&self) -> PathBuf {
        self.installer
            .log_file
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("installer.log"))
    }

    fn config_dir() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("virtual-usb")
        } else {
            PathBuf::from(".config/virtual-usb")
        }
    }

    /// Validate configuration values
    ///
    /// The identifier is validated while parsing.
    fn validate(&self) -> Result<()> {
        common::validate_log_level(&self.installer.log_level)?;
        Ok(())
    }
}

/// Expand `~` in a user-supplied config path
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}
