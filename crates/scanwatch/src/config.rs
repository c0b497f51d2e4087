//! Configuration for scanwatch.
//!
//! Config priority: explicit path (`--config`) > `SCANWATCH_CONFIG` env var >
//! user config (`~/.config/scanwatch/config.toml`) > built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors produced while loading a config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
  /// Debounce settings
  #[serde(default)]
  pub watch: WatchConfig,

  /// External scanner settings
  #[serde(default)]
  pub scanner: ScannerConfig,

  /// Desktop dialog settings
  #[serde(default)]
  pub dialog: DialogConfig,

  /// Logging settings
  #[serde(default)]
  pub log: LogConfig,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Default log level (error, warn, info, debug, trace); RUST_LOG overrides
  pub level: String,
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
    }
  }
}

/// Debounce settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
  /// How long file access must be quiescent before a scan starts (ms)
  pub quiescence_ms: u64,
}

fn default_quiescence_ms() -> u64 {
  2000
}

impl Default for WatchConfig {
  fn default() -> Self {
    Self {
      quiescence_ms: default_quiescence_ms(),
    }
  }
}

impl WatchConfig {
  /// Get the quiescence delay as a `Duration`
  pub fn quiescence(&self) -> Duration {
    Duration::from_millis(self.quiescence_ms)
  }
}

/// External scanner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
  /// Scanner program, invoked with the file path as its final argument
  pub command: String,

  /// Extra arguments placed before the file path
  pub args: Vec<String>,
}

impl Default for ScannerConfig {
  fn default() -> Self {
    Self {
      command: "clamdscan".to_string(),
      args: Vec::new(),
    }
  }
}

/// Desktop dialog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
  /// Dialog program (zenity-compatible flags are assumed)
  pub command: String,
}

impl Default for DialogConfig {
  fn default() -> Self {
    Self {
      command: "zenity".to_string(),
    }
  }
}

impl Config {
  /// Load configuration, optionally from an explicit path.
  ///
  /// An explicit or env-provided path must exist and parse; a malformed file
  /// is a fatal setup error rather than a silent fallback. When no config
  /// file is present anywhere, defaults are used.
  pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
    if let Some(path) = explicit {
      return Self::load_file(path);
    }

    if let Ok(path) = std::env::var("SCANWATCH_CONFIG") {
      return Self::load_file(Path::new(&path));
    }

    if let Some(path) = Self::user_config_path()
      && path.exists()
    {
      return Self::load_file(&path);
    }

    Ok(Self::default())
  }

  /// Load and parse a single config file
  pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Get the user-level config path
  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
      return Some(PathBuf::from(path).join("scanwatch").join("config.toml"));
    }

    dirs::config_dir().map(|p| p.join("scanwatch").join("config.toml"))
  }
}
