//! Configuration management for Ferry.
//!
//! Both the daemon and the server read the same TOML file; each side only
//! looks at its own section, so one file can describe a whole deployment.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/ferry/config.toml` |
//! | macOS | `~/Library/Application Support/ferry/config.toml` |
//! | Windows | `%APPDATA%\ferry\config.toml` |
//!
//! ## Example
//!
//! ```toml
//! [daemon]
//! listen_addr = "127.0.0.1:7940"
//! target_addr = "archive.example.net:7941"
//!
//! [server]
//! listen_addr = "0.0.0.0:7941"
//! archive_dir = "/var/lib/ferry/archive"
//!
//! [logging]
//! enabled = true
//! filter = "warn,ferry=info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{DEFAULT_DAEMON_PORT, DEFAULT_TRANSFER_PORT};

/// Main configuration struct for Ferry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Client daemon settings
    pub daemon: DaemonConfig,
    /// Archive server settings
    pub server: ServerConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Client daemon configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Local endpoint where the daemon accepts submissions
    pub listen_addr: String,
    /// Endpoint of the archive server the daemon delivers to
    pub target_addr: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("127.0.0.1:{DEFAULT_DAEMON_PORT}"),
            target_addr: format!("127.0.0.1:{DEFAULT_TRANSFER_PORT}"),
        }
    }
}

/// Archive server configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network endpoint where the server accepts transfers
    pub listen_addr: String,
    /// Destination directory for received files
    pub archive_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{DEFAULT_TRANSFER_PORT}"),
            archive_dir: PathBuf::from("archive"),
        }
    }
}

/// Logging configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Master switch; when false the CLI installs no subscriber
    pub enabled: bool,
    /// Default `EnvFilter` directive (`RUST_LOG` overrides it)
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: "warn,ferry=info,ferry_core=info".to_string(),
        }
    }
}

impl Config {
    /// Load the configuration from the default path, falling back to
    /// defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load the configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Write the configuration to a file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot serialize config: {e}")))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("cannot create {}: {e}", parent.display())))?;
        }
        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("cannot write {}: {e}", path.display())))
    }
}

/// Platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ferry").join("config.toml"))
}
