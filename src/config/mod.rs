//! Configuration module for SerialScope-RS
//!
//! This module handles:
//! - Application configuration ([`AppConfig`], TOML, see [`settings`])
//! - Application state persistence (last port and baud rate)
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.serialscope.serialscope-rs/`
//! - **macOS**: `~/Library/Application Support/dev.serialscope.serialscope-rs/`
//! - **Windows**: `%APPDATA%\dev.serialscope.serialscope-rs\`
//!
//! # Files
//!
//! - `app_state.json` - Last connection, restored on the next run
//! - `config.toml` - Application configuration
//!
//! # Example
//!
//! ```ignore
//! use serialscope_rs::config::{AppConfig, AppState};
//!
//! let config = AppConfig::load_or_default("config.toml");
//! let mut state = AppState::load_or_default();
//!
//! state.update_last_connection(Some("/dev/ttyACM0"), 115_200);
//! state.save()?;
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{Result, ScopeError};
use crate::transport::DEFAULT_BAUD_RATE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.serialscope.serialscope-rs";

/// App state filename
pub const APP_STATE_FILE: &str = "app_state.json";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        ScopeError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            ScopeError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the app state file
pub fn app_state_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(APP_STATE_FILE))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== App State ====================

/// State remembered between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    /// Version of the app state format
    #[serde(default = "default_app_state_version")]
    pub version: u32,

    /// Port selected when the application last ran
    #[serde(default)]
    pub last_port: Option<String>,

    /// Baud rate in use when the application last ran
    #[serde(default = "default_baud_rate")]
    pub last_baud_rate: u32,
}

fn default_app_state_version() -> u32 {
    1
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            version: 1,
            last_port: None,
            last_baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl AppState {
    /// Load app state from the default location
    pub fn load() -> Result<Self> {
        let path = app_state_path().ok_or_else(|| {
            ScopeError::Config("Could not determine app state path".to_string())
        })?;
        Self::load_from(path)
    }

    /// Load app state from a file; a missing file yields defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ScopeError::Config(format!("Failed to read app state: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| ScopeError::Config(format!("Failed to parse app state: {}", e)))
    }

    /// Load app state, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load app state, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save app state to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save_to(dir.join(APP_STATE_FILE))
    }

    /// Save app state to a file
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ScopeError::Config(format!("Failed to serialize app state: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| ScopeError::Config(format!("Failed to write app state: {}", e)))
    }

    /// Remember the connection in use
    pub fn update_last_connection(&mut self, port: Option<&str>, baud_rate: u32) {
        self.last_port = port.map(String::from);
        self.last_baud_rate = baud_rate;
    }

    /// Fill the serial section of a config from the remembered connection.
    ///
    /// A port named in the config file wins over the remembered one.
    pub fn apply_to(&self, config: &mut SerialConfig) {
        if config.port.is_none() {
            config.port = self.last_port.clone();
            config.baud_rate = self.last_baud_rate;
        }
    }
}

// ==================== Tests ====================
