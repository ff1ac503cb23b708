//! # vblk-nbd
//!
//! A vblk plugin that forwards every block operation to an NBD server
//! listening on a Unix domain socket.
//!
//! This crate provides:
//! - Old-style and new-style handshake negotiation
//! - A single-transaction request issuer and a background reply receiver
//! - Fail-fast handling once the connection can no longer be trusted
//! - The `nbd` plugin with `socket=` and `export=` parameters

pub mod config;
pub mod connection;
pub mod error;
pub mod handle;
pub mod handshake;
pub mod io;
pub mod plugin;
pub mod transaction;

pub use config::{ConfigError, NbdConfig};
pub use connection::Connection;
pub use error::NbdError;
pub use handle::NbdHandle;
pub use handshake::HandshakeOutcome;
pub use plugin::NbdPlugin;
