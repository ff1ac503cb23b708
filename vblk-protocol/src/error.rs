//! Protocol error types.

use thiserror::Error;

/// Errors raised while decoding NBD handshake or transmission blocks.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("wrong magic: not an NBD server (got {0:?})")]
    InvalidMagic([u8; 8]),

    #[error("unexpected version {0:#x}")]
    UnsupportedVersion(u64),

    #[error("invalid header magic: {0:#x}")]
    InvalidHeaderMagic(u32),

    #[error("truncated block: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("export name too long: {0} bytes")]
    ExportNameTooLong(usize),
}
