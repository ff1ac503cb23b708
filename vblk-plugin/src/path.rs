//! Path helpers for configuration parameters.

use crate::error::PluginError;
use std::path::{Path, PathBuf};

/// Resolves `value` against the current directory.
///
/// Servers may change directory after configuration, so relative paths given
/// on the command line are pinned down while parameters are parsed. The path
/// does not need to exist.
pub fn absolute_path(value: impl AsRef<Path>) -> Result<PathBuf, PluginError> {
    let path = value.as_ref();
    if path.as_os_str().is_empty() {
        return Err(PluginError::config("cannot convert null string to absolute path"));
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| {
        tracing::error!("getcwd: {}", e);
        PluginError::Transport(e)
    })?;
    Ok(cwd.join(path))
}
