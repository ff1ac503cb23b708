//! NBD plugin configuration.
//!
//! Configuration is assembled in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via VBLK_NBD_CONFIG or --config)
//! 3. Environment variables
//! 4. `key=value` parameters passed through the plugin contract

use serde::Deserialize;
use std::path::{Path, PathBuf};
use vblk_plugin::{absolute_path, PluginError};

/// Longest socket path a `sockaddr_un` can hold, including the terminator.
pub const SUN_PATH_MAX: usize = 108;

/// Help text for the accepted parameters.
pub const CONFIG_HELP: &str = "\
socket=<SOCKNAME>   (required) The Unix socket to connect to.
export=<NAME>                  Export name to connect to (default \"\").";

/// Settings for one NBD backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NbdConfig {
    /// Unix socket of the NBD server.
    pub socket: Option<PathBuf>,
    /// Export to request during new-style negotiation.
    pub export: String,
}

impl NbdConfig {
    /// Loads configuration from `path` (or `VBLK_NBD_CONFIG` when no path is
    /// given), then applies environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("VBLK_NBD_CONFIG").map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                let config = Self::from_file(&path)?;
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: NbdConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(socket) = std::env::var("VBLK_NBD_SOCKET") {
            if !socket.is_empty() {
                self.socket = Some(PathBuf::from(socket));
            }
        }

        if let Ok(export) = std::env::var("VBLK_NBD_EXPORT") {
            self.export = export;
        }
    }

    /// Applies one `key=value` parameter.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), PluginError> {
        match key {
            "socket" => {
                self.socket = Some(absolute_path(value)?);
            }
            "export" => {
                self.export = value.to_string();
            }
            _ => {
                tracing::error!("unknown parameter '{}'", key);
                return Err(PluginError::config(format!("unknown parameter '{}'", key)));
            }
        }
        Ok(())
    }

    /// Checks that the parameter set is usable and returns the socket path.
    pub fn validate(&self) -> Result<&Path, ConfigError> {
        let socket = self.socket.as_deref().ok_or_else(|| {
            ConfigError::ValidationError(
                "you must supply the socket=<SOCKNAME> parameter after the plugin name on the command line"
                    .to_string(),
            )
        })?;

        if socket.as_os_str().len() >= SUN_PATH_MAX {
            return Err(ConfigError::ValidationError(
                "socket file name too large".to_string(),
            ));
        }

        Ok(socket)
    }

}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for PluginError {
    fn from(err: ConfigError) -> Self {
        PluginError::config(err.to_string())
    }
}
