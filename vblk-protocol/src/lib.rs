//! # vblk-protocol
//!
//! Client side of the NBD (Network Block Device) wire protocol.
//!
//! This crate provides:
//! - Magic numbers, commands and flag bitfields
//! - Old-style and new-style handshake blocks
//! - Fixed request and reply headers
//! - Mapping of wire status codes to local classifications

pub mod error;
pub mod flags;
pub mod handshake;
pub mod header;
pub mod status;

pub use error::ProtocolError;
pub use flags::{ClientFlags, ExportFlags, GlobalFlags};
pub use handshake::{ExportNameOption, HandshakeFinish, HandshakePrefix, OldHandshake, Version};
pub use header::{Command, ReplyHeader, RequestHeader, REPLY_HEADER_SIZE, REQUEST_HEADER_SIZE};
pub use status::WireStatus;

/// "NBDMAGIC", first eight bytes sent by every server.
pub const NBD_MAGIC: [u8; 8] = *b"NBDMAGIC";

/// Version discriminant of the old-style handshake.
pub const OLD_VERSION: u64 = 0x0000_4202_8186_1253;

/// Version discriminant of the new-style handshake ("IHAVEOPT").
pub const NEW_VERSION: u64 = 0x4948_4156_454F_5054;

/// Magic at the start of every request header.
pub const REQUEST_MAGIC: u32 = 0x2560_9513;

/// Magic at the start of every simple reply header.
pub const REPLY_MAGIC: u32 = 0x6744_6698;

/// Option code asking the server to select an export and enter transmission.
pub const OPT_EXPORT_NAME: u32 = 1;

/// Length of the reserved zero padding at the end of the handshake.
pub const HANDSHAKE_PADDING: usize = 124;
