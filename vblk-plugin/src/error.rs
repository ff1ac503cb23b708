//! Plugin error types.

use thiserror::Error;

/// Errors returned from plugin operations.
///
/// Each variant corresponds to one errno value a server can send to its own
/// clients, so a plugin's failure survives the trip over the wire.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("operation not permitted")]
    Permission,

    #[error("input/output error")]
    Io,

    #[error("cannot allocate memory")]
    NoMemory,

    #[error("invalid argument")]
    Invalid,

    #[error("no space left on device")]
    NoSpace,

    #[error("connection shut down")]
    Shutdown,

    #[error("operation not supported")]
    NotSupported,

    #[error("another request is already in flight")]
    Busy,

    #[error("{0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Transport(#[from] std::io::Error),
}

impl PluginError {
    pub const EPERM: i32 = 1;
    pub const EIO: i32 = 5;
    pub const ENOMEM: i32 = 12;
    pub const EBUSY: i32 = 16;
    pub const EINVAL: i32 = 22;
    pub const ENOSPC: i32 = 28;
    pub const EOPNOTSUPP: i32 = 95;
    pub const ESHUTDOWN: i32 = 108;

    /// The errno value a server should report for this error.
    pub fn errno(&self) -> i32 {
        match self {
            PluginError::Permission => Self::EPERM,
            PluginError::Io => Self::EIO,
            PluginError::NoMemory => Self::ENOMEM,
            PluginError::Invalid => Self::EINVAL,
            PluginError::NoSpace => Self::ENOSPC,
            PluginError::Shutdown => Self::ESHUTDOWN,
            PluginError::NotSupported => Self::EOPNOTSUPP,
            PluginError::Busy => Self::EBUSY,
            PluginError::Config(_) => Self::EINVAL,
            PluginError::Transport(_) => Self::EIO,
        }
    }

    /// Whether the caller should retry the operation another way.
    ///
    /// Only `NotSupported` qualifies: it asks for a fallback such as writing
    /// explicit zeroes instead of a zero request.
    pub fn wants_fallback(&self) -> bool {
        matches!(self, PluginError::NotSupported)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        PluginError::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_values() {
        assert_eq!(PluginError::Permission.errno(), 1);
        assert_eq!(PluginError::Io.errno(), 5);
        assert_eq!(PluginError::NoMemory.errno(), 12);
        assert_eq!(PluginError::Invalid.errno(), 22);
        assert_eq!(PluginError::NoSpace.errno(), 28);
        assert_eq!(PluginError::NotSupported.errno(), 95);
        assert_eq!(PluginError::Shutdown.errno(), 108);
        assert_eq!(PluginError::config("bad").errno(), 22);
    }

    #[test]
    fn test_wants_fallback() {
        assert!(PluginError::NotSupported.wants_fallback());
        assert!(!PluginError::Shutdown.wants_fallback());
        assert!(!PluginError::Io.wants_fallback());
    }

    #[test]
    fn test_display() {
        let err = PluginError::config("unknown parameter 'foo'");
        assert_eq!(err.to_string(), "unknown parameter 'foo'");

        let err = PluginError::from(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gone",
        ));
        assert!(err.to_string().contains("gone"));
        assert_eq!(err.errno(), PluginError::EIO);
    }
}
