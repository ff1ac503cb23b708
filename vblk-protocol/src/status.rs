//! Wire status codes.
//!
//! NBD only carries a small set of errno values. Anything else a server sends
//! is treated as an invalid-argument failure.

use std::fmt;

/// Status carried in a reply header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireStatus {
    Success,
    PermissionDenied,
    Io,
    OutOfMemory,
    InvalidArgument,
    OutOfSpace,
    /// Server asks the client to disconnect gracefully.
    Shutdown,
}

impl WireStatus {
    pub const SUCCESS: u32 = 0;
    pub const EPERM: u32 = 1;
    pub const EIO: u32 = 5;
    pub const ENOMEM: u32 = 12;
    pub const EINVAL: u32 = 22;
    pub const ENOSPC: u32 = 28;
    pub const ESHUTDOWN: u32 = 108;

    /// Maps a raw status, collapsing unknown values to `InvalidArgument`.
    pub fn from_code(code: u32) -> Self {
        match code {
            Self::SUCCESS => WireStatus::Success,
            Self::EPERM => WireStatus::PermissionDenied,
            Self::EIO => WireStatus::Io,
            Self::ENOMEM => WireStatus::OutOfMemory,
            Self::EINVAL => WireStatus::InvalidArgument,
            Self::ENOSPC => WireStatus::OutOfSpace,
            Self::ESHUTDOWN => WireStatus::Shutdown,
            other => {
                tracing::debug!("unexpected error {}, squashing to EINVAL", other);
                WireStatus::InvalidArgument
            }
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            WireStatus::Success => Self::SUCCESS,
            WireStatus::PermissionDenied => Self::EPERM,
            WireStatus::Io => Self::EIO,
            WireStatus::OutOfMemory => Self::ENOMEM,
            WireStatus::InvalidArgument => Self::EINVAL,
            WireStatus::OutOfSpace => Self::ENOSPC,
            WireStatus::Shutdown => Self::ESHUTDOWN,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WireStatus::Success)
    }
}

impl fmt::Display for WireStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireStatus::Success => write!(f, "SUCCESS"),
            WireStatus::PermissionDenied => write!(f, "EPERM"),
            WireStatus::Io => write!(f, "EIO"),
            WireStatus::OutOfMemory => write!(f, "ENOMEM"),
            WireStatus::InvalidArgument => write!(f, "EINVAL"),
            WireStatus::OutOfSpace => write!(f, "ENOSPC"),
            WireStatus::Shutdown => write!(f, "ESHUTDOWN"),
        }
    }
}
