//! NBD plugin error types.

use thiserror::Error;
use vblk_plugin::PluginError;
use vblk_protocol::WireStatus;

/// Errors raised while talking to the NBD server.
#[derive(Debug, Error)]
pub enum NbdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] vblk_protocol::ProtocolError),

    /// The connection hit an unrecoverable error earlier.
    #[error("connection to NBD server is dead")]
    Dead,

    #[error("a request is already outstanding")]
    Busy,

    #[error("server replied {0}")]
    Status(WireStatus),

    #[error("operation not supported by export")]
    NotSupported,

    #[error("request too large: {0} bytes")]
    TooLarge(usize),
}

impl From<NbdError> for PluginError {
    fn from(err: NbdError) -> Self {
        match err {
            NbdError::Io(e) => PluginError::Transport(e),
            NbdError::Protocol(_) => PluginError::Io,
            NbdError::Dead => PluginError::Shutdown,
            NbdError::Busy => PluginError::Busy,
            NbdError::Status(status) => match status {
                WireStatus::PermissionDenied => PluginError::Permission,
                WireStatus::Io => PluginError::Io,
                WireStatus::OutOfMemory => PluginError::NoMemory,
                WireStatus::InvalidArgument => PluginError::Invalid,
                WireStatus::OutOfSpace => PluginError::NoSpace,
                WireStatus::Shutdown => PluginError::Shutdown,
                WireStatus::Success => PluginError::Io,
            },
            NbdError::NotSupported => PluginError::NotSupported,
            NbdError::TooLarge(_) => PluginError::Invalid,
        }
    }
}
