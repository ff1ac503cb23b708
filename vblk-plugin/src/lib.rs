//! # vblk-plugin
//!
//! The contract every vblk plugin implements.
//!
//! A server drives a plugin in a fixed order: `config` once per `key=value`
//! parameter, `config_complete` once, then `open` per client connection. Each
//! open handle serves block operations until `close` consumes it.

pub mod error;
pub mod path;
pub mod plugin;

pub use error::PluginError;
pub use path::absolute_path;
pub use plugin::{Plugin, PluginHandle, ThreadModel};

/// Result type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;
