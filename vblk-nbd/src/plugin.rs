//! The `nbd` plugin.

use crate::config::{NbdConfig, CONFIG_HELP};
use crate::handle::NbdHandle;
use vblk_plugin::{Plugin, PluginError, PluginHandle, Result, ThreadModel};

/// Forwards block operations to an NBD server on a Unix socket.
#[derive(Debug, Default)]
pub struct NbdPlugin {
    config: NbdConfig,
}

impl NbdPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a preloaded configuration (file and environment layers).
    pub fn with_config(config: NbdConfig) -> Self {
        Self { config }
    }

    pub fn config_ref(&self) -> &NbdConfig {
        &self.config
    }
}

impl Plugin for NbdPlugin {
    fn name(&self) -> &'static str {
        "nbd"
    }

    fn longname(&self) -> &'static str {
        "vblk nbd plugin"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn thread_model(&self) -> ThreadModel {
        // one transaction in flight per connection
        ThreadModel::SerializeRequests
    }

    fn config(&mut self, key: &str, value: &str) -> Result<()> {
        self.config.set(key, value)
    }

    fn config_complete(&mut self) -> Result<()> {
        self.config.validate().map_err(|e| {
            tracing::error!("{}", e);
            PluginError::from(e)
        })?;
        Ok(())
    }

    fn config_help(&self) -> &'static str {
        CONFIG_HELP
    }

    fn open(&self, _readonly: bool) -> Result<Box<dyn PluginHandle>> {
        let socket = self.config.validate()?;
        let handle = NbdHandle::open(socket, &self.config.export)?;
        Ok(Box::new(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata() {
        let plugin = NbdPlugin::new();
        assert_eq!(plugin.name(), "nbd");
        assert_eq!(plugin.thread_model(), ThreadModel::SerializeRequests);
        assert!(plugin.config_help().contains("socket=<SOCKNAME>"));
        assert!(plugin.config_help().contains("export=<NAME>"));
        assert!(!plugin.version().is_empty());
    }

    #[test]
    fn test_config_complete_requires_socket() {
        let mut plugin = NbdPlugin::new();
        plugin.config("export", "x").unwrap();
        let err = plugin.config_complete().unwrap_err();
        assert!(matches!(err, PluginError::Config(_)));
    }

    #[test]
    fn test_config_pass_through() {
        let mut plugin = NbdPlugin::new();
        plugin.config("socket", "/run/nbd.sock").unwrap();
        plugin.config_complete().unwrap();
        assert_eq!(plugin.config_ref().export, "");
        assert!(plugin.config("bogus", "1").is_err());
    }

    #[test]
    fn test_open_without_server_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = NbdPlugin::new();
        plugin
            .config("socket", dir.path().join("missing.sock").to_str().unwrap())
            .unwrap();
        plugin.config_complete().unwrap();
        assert!(matches!(plugin.open(false), Err(PluginError::Transport(_))));
    }
}
