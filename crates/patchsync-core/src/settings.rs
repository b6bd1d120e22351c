//! Persistent user settings for patchsync
//!
//! Settings are stored in a TOML configuration file at:
//! - Linux/macOS: `~/.config/patchsync/patchsync_config.toml`
//! - Windows: `%APPDATA%\patchsync\patchsync_config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! manifest_url = "http://patch.example.com/plist.txt"
//! fallback_base_url = "http://patch.example.com/Patch/Files/"
//!
//! [paths]
//! data_dir = "Data"
//! state_dir = "Cache"
//!
//! [network]
//! connect_timeout_secs = 10
//! stall_timeout_secs = 30
//!
//! [verify]
//! verify_downloads = false
//! hash_progress_interval = "1M"
//!
//! [behavior]
//! log_file = true
//! quiet = false
//! ```

use crate::config::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration file name
const CONFIG_FILE_NAME: &str = "patchsync_config.toml";

/// Application name for config directory
const APP_NAME: &str = "patchsync";

/// User settings loaded from configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Where manifests and files come from
    pub server: ServerSettings,

    /// Local directories
    pub paths: PathSettings,

    /// Transfer timeouts
    pub network: NetworkSettings,

    /// Hashing and verification
    pub verify: VerifySettings,

    /// General behavior settings
    pub behavior: BehaviorSettings,
}

/// Remote locations
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Manifest URL or local path
    pub manifest_url: Option<String>,

    /// Base URL for fallback downloads
    pub fallback_base_url: Option<String>,
}

/// Local directories
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathSettings {
    /// Directory holding the patched files
    pub data_dir: PathBuf,

    /// Directory holding cache, recovery marker and logs
    pub state_dir: PathBuf,
}

/// Transfer timeouts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkSettings {
    /// Connect timeout per download attempt, in seconds
    pub connect_timeout_secs: u64,

    /// Longest silence between body chunks, in seconds
    pub stall_timeout_secs: u64,
}

/// Hashing and verification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VerifySettings {
    /// Re-hash each downloaded file and fail on mismatch
    pub verify_downloads: bool,

    /// Bytes hashed between progress updates (e.g., "1M", "512K")
    pub hash_progress_interval: String,
}

/// General behavior settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BehaviorSettings {
    /// Write the session log file
    pub log_file: bool,

    /// Whether to suppress non-error output
    pub quiet: bool,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("Data"),
            state_dir: PathBuf::from("Cache"),
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: crate::config::DEFAULT_CONNECT_TIMEOUT.as_secs(),
            stall_timeout_secs: crate::config::DEFAULT_STALL_TIMEOUT.as_secs(),
        }
    }
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            verify_downloads: false,
            hash_progress_interval: "1M".to_string(),
        }
    }
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            log_file: true,
            quiet: false,
        }
    }
}

impl Settings {
    /// Load settings from the configuration file
    ///
    /// Returns default settings if the file doesn't exist or can't be parsed
    pub fn load() -> Self {
        Self::load_from_path(Self::config_path())
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            tracing::debug!("No config path available, using defaults");
            return Self::default();
        };

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(settings) => {
                    tracing::debug!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Parse settings from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, SettingsError> {
        toml::from_str(contents).map_err(SettingsError::Deserialize)
    }

    /// Save settings to the configuration file
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        self.save_to_path(Self::config_path())
    }

    /// Save settings to a specific path
    pub fn save_to_path(&self, path: Option<PathBuf>) -> Result<PathBuf, SettingsError> {
        let path = path.ok_or(SettingsError::NoConfigDir)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let contents = toml::to_string_pretty(self).map_err(SettingsError::Serialize)?;

        std::fs::write(&path, contents).map_err(|e| SettingsError::Io {
            path: path.clone(),
            source: e,
        })?;

        tracing::info!("Saved settings to {:?}", path);
        Ok(path)
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|p| p.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    /// Get the path to the configuration directory
    pub fn config_dir() -> Option<PathBuf> {
        dirs_next::config_dir().map(|p| p.join(APP_NAME))
    }

    /// Generate a default configuration file content as a string
    pub fn default_config_string() -> String {
        let default = Self::default();
        toml::to_string_pretty(&default)
            .unwrap_or_else(|_| String::from("# Failed to generate default config"))
    }

    /// Build a session config from these settings
    pub fn to_sync_config(&self) -> Result<SyncConfig, SettingsError> {
        let manifest_url = self
            .server
            .manifest_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or(SettingsError::MissingManifestUrl)?;

        let interval = parse_size(&self.verify.hash_progress_interval)?;

        let mut config = SyncConfig::new(
            manifest_url,
            self.paths.data_dir.clone(),
            self.paths.state_dir.clone(),
        )
        .connect_timeout(Duration::from_secs(self.network.connect_timeout_secs))
        .stall_timeout(Duration::from_secs(self.network.stall_timeout_secs))
        .hash_progress_interval(interval)
        .verify_downloads(self.verify.verify_downloads);

        if let Some(base) = self.server.fallback_base_url.as_deref() {
            if !base.trim().is_empty() {
                config = config.fallback_base_url(base);
            }
        }

        Ok(config)
    }
}

/// Parse a size string such as `"4096"`, `"512K"`, `"1M"` or `"1G"`
pub fn parse_size(s: &str) -> Result<u64, SettingsError> {
    let s = s.trim();
    let invalid = || SettingsError::InvalidSize(s.to_string());

    let upper = s.to_ascii_uppercase();
    let digits = upper.trim_end_matches('B');
    let (number, multiplier) = match digits.chars().last() {
        Some('K') => (&digits[..digits.len() - 1], 1024u64),
        Some('M') => (&digits[..digits.len() - 1], 1024 * 1024),
        Some('G') => (&digits[..digits.len() - 1], 1024 * 1024 * 1024),
        Some(c) if c.is_ascii_digit() => (digits, 1),
        _ => return Err(invalid()),
    };

    let value: u64 = number.trim().parse().map_err(|_| invalid())?;
    let bytes = value.checked_mul(multiplier).ok_or_else(invalid)?;
    if bytes == 0 {
        return Err(invalid());
    }
    Ok(bytes)
}

/// Errors that can occur when working with settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// No configuration directory available
    #[error("Could not determine configuration directory")]
    NoConfigDir,

    /// Failed to read or write config file
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path that caused the error
        path: PathBuf,
        /// The underlying error
        source: std::io::Error,
    },

    /// Failed to serialize settings
    #[error("Failed to serialize settings: {0}")]
    Serialize(toml::ser::Error),

    /// Failed to deserialize settings
    #[error("Failed to parse settings: {0}")]
    Deserialize(toml::de::Error),

    /// No manifest URL configured
    #[error("No manifest URL configured (set server.manifest_url or pass --manifest-url)")]
    MissingManifestUrl,

    /// Size string could not be parsed
    #[error("Invalid size: {0:?}")]
    InvalidSize(String),
}
