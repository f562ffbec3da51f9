// src/settings.rs
//
// Persistent settings.
// A TOML file with serial, session and record-format parameters; missing keys take defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SettingsError;
use crate::io::pacing::PacingPolicy;
use crate::io::serial::framer::TextEncoding;
use crate::record::RecordFormat;
use crate::session::{SessionConfig, DEFAULT_TARGET_COUNT};

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "linetap.toml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_target_count")]
    pub target_count: usize,
    #[serde(default)]
    pub encoding: TextEncoding,
    #[serde(default = "default_forward_empty_records")]
    pub forward_empty_records: bool,
    #[serde(default)]
    pub decode_trailing_line: bool,
    /// Directory for log files (None = stderr only)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    // Tables last, so the file serializes as valid TOML
    #[serde(default)]
    pub pacing: PacingPolicy,
    #[serde(default)]
    pub format: RecordFormat,
}

fn default_baud_rate() -> u32 {
    9600
}
fn default_read_timeout_ms() -> u64 {
    50
}
fn default_target_count() -> usize {
    DEFAULT_TARGET_COUNT
}
fn default_forward_empty_records() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            port: None,
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            target_count: default_target_count(),
            encoding: TextEncoding::default(),
            forward_empty_records: default_forward_empty_records(),
            decode_trailing_line: false,
            log_dir: None,
            pacing: PacingPolicy::default(),
            format: RecordFormat::default(),
        }
    }
}

impl Settings {
    /// Session parameters derived from these settings
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            target_count: self.target_count,
            encoding: self.encoding,
            format: self.format.clone(),
            pacing: self.pacing.clone(),
            forward_empty_records: self.forward_empty_records,
            decode_trailing_line: self.decode_trailing_line,
        }
    }

    /// Serial port parameters, if a port is configured
    #[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
    pub fn serial_config(&self) -> Option<crate::io::serial::SerialConfig> {
        self.port.as_ref().map(|port| crate::io::serial::SerialConfig {
            port: port.clone(),
            baud_rate: self.baud_rate,
            read_timeout_ms: self.read_timeout_ms,
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.baud_rate == 0 {
            return Err(SettingsError::Invalid("baud rate must be positive".to_string()));
        }
        self.session_config().validate()
    }
}

/// Default settings location: `<config dir>/linetap/linetap.toml`
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("linetap").join(SETTINGS_FILE))
}

/// Load settings from a file. A missing file yields defaults.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let settings: Settings = toml::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let content = toml::to_string_pretty(settings)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, content).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })
}
