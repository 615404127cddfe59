use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upper bound on one line-protocol input line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

// ── Sections ─────────────────────────────────────────────────────

/// Line-protocol listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    pub host: String,
    pub port: u16,
    /// Sent once when a client connects, before the first prompt.
    pub banner: String,
    pub prompt: String,
    pub max_line_bytes: usize,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7000,
            banner: "Welcome to cmdcore.\nType 'help' to list the available commands.".to_string(),
            prompt: "> ".to_string(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// JSON-RPC listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    pub host: String,
    pub port: u16,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7001,
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive, e.g. `info` or `cmdcore::shell=debug`.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

// ── Top level ────────────────────────────────────────────────────

/// Process-wide settings. Every field has a default, so an empty JSON object
/// is a valid settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub shell: ShellSettings,
    pub rpc: RpcSettings,
    pub log: LogSettings,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load settings from `path`.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let data = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Settings from an explicit file, or from the default location in
/// `config_dir` when it exists, or built-in defaults.
///
/// An explicit path that cannot be read is an error; a missing default file
/// is not.
pub fn resolve(explicit: Option<&Path>, config_dir: &Path) -> Result<Settings, SettingsError> {
    if let Some(path) = explicit {
        return load_settings(path);
    }
    let path = crate::paths::settings_path(config_dir);
    if path.exists() {
        load_settings(&path)
    } else {
        Ok(Settings::default())
    }
}
