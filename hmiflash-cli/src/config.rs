//! Configuration file support for hmiflash.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (HMIFLASH_*)
//! 3. Local config file (./hmiflash.toml)
//! 4. Global config file (~/.config/hmiflash/config.toml)

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Local configuration file name.
pub const LOCAL_CONFIG_FILE: &str = "hmiflash.toml";

/// USB device identification for port matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsbDevice {
    /// USB Vendor ID.
    pub vid: u16,
    /// USB Product ID.
    pub pid: u16,
}

impl UsbDevice {
    /// Check if this device matches the given USB info.
    pub fn matches(&self, vid: u16, pid: u16) -> bool {
        self.vid == vid && self.pid == pid
    }
}

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub serial: Option<String>,
    /// Upload baud rate for the display on this connection.
    pub baud: Option<u32>,
}

/// Port-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortConfig {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Extra USB bridges to treat as display adapters.
    #[serde(default)]
    pub usb_device: Vec<UsbDevice>,
}

/// Upload tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadSection {
    /// Baud rate to negotiate for the transfer.
    pub baud: Option<u32>,
    /// Per-block acknowledgment timeout in milliseconds.
    pub ack_timeout_ms: Option<u64>,
    /// Delay before switching to the upload baud rate, in milliseconds.
    pub settle_ms: Option<u64>,
}

impl UploadSection {
    /// Configured acknowledgment timeout.
    pub fn ack_timeout(&self) -> Option<Duration> {
        self.ack_timeout_ms
            .map(Duration::from_millis)
    }

    /// Configured settle delay.
    pub fn settle_delay(&self) -> Option<Duration> {
        self.settle_ms
            .map(Duration::from_millis)
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Port configuration.
    #[serde(default)]
    pub port: PortConfig,
    /// Upload configuration.
    #[serde(default)]
    pub upload: UploadSection,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Local config overrides global
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "hmiflash").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.port.connection.serial.is_some() {
            self.port.connection.serial = other.port.connection.serial;
        }
        if other.port.connection.baud.is_some() {
            self.port.connection.baud = other.port.connection.baud;
        }
        self.port.usb_device.extend(other.port.usb_device);

        if other.upload.baud.is_some() {
            self.upload.baud = other.upload.baud;
        }
        if other.upload.ack_timeout_ms.is_some() {
            self.upload.ack_timeout_ms = other.upload.ack_timeout_ms;
        }
        if other.upload.settle_ms.is_some() {
            self.upload.settle_ms = other.upload.settle_ms;
        }
    }

    /// Whether `vid:pid` was registered as a display adapter.
    pub fn is_configured_device(&self, vid: u16, pid: u16) -> bool {
        self.port
            .usb_device
            .iter()
            .any(|d| d.matches(vid, pid))
    }
}
