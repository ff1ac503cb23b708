//! Handshake blocks for both protocol variants.
//!
//! Both variants start with the same 16 bytes:
//!
//! ```text
//! +------------+-----------+
//! | "NBDMAGIC" |  version  |
//! |  8 bytes   |  8 bytes  |
//! +------------+-----------+
//! ```
//!
//! Old-style servers then send size and flags directly. New-style servers
//! send global flags and expect the client to pick an export by name.

use crate::error::ProtocolError;
use crate::flags::{ClientFlags, ExportFlags, GlobalFlags};
use crate::{HANDSHAKE_PADDING, NBD_MAGIC, NEW_VERSION, OLD_VERSION, OPT_EXPORT_NAME};
use bytes::{Buf, BufMut, BytesMut};

/// Longest export name the protocol allows.
pub const MAX_EXPORT_NAME: usize = 4096;

fn check_len(buf: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        return Err(ProtocolError::Truncated {
            needed,
            got: buf.len(),
        });
    }
    Ok(())
}

/// Handshake variant announced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Old,
    New,
}

impl Version {
    pub fn from_u64(value: u64) -> Result<Self, ProtocolError> {
        match value {
            OLD_VERSION => Ok(Version::Old),
            NEW_VERSION => Ok(Version::New),
            other => Err(ProtocolError::UnsupportedVersion(other)),
        }
    }

    pub fn as_u64(&self) -> u64 {
        match self {
            Version::Old => OLD_VERSION,
            Version::New => NEW_VERSION,
        }
    }
}

/// The 16 bytes shared by both handshake variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakePrefix {
    pub version: Version,
}

impl HandshakePrefix {
    pub const SIZE: usize = 16;

    pub fn decode(mut buf: &[u8]) -> Result<Self, ProtocolError> {
        check_len(buf, Self::SIZE)?;

        let mut magic = [0u8; 8];
        buf.copy_to_slice(&mut magic);
        if magic != NBD_MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }

        let version = Version::from_u64(buf.get_u64())?;
        Ok(Self { version })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_slice(&NBD_MAGIC);
        buf.put_u64(self.version.as_u64());
        buf
    }
}

/// Remainder of an old-style handshake after the common prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OldHandshake {
    pub export_size: u64,
    pub global_flags: u16,
    pub export_flags: ExportFlags,
}

impl OldHandshake {
    /// size (8) + global flags (2) + export flags (2) + padding (124)
    pub const SIZE: usize = 8 + 2 + 2 + HANDSHAKE_PADDING;

    pub fn decode(mut buf: &[u8]) -> Result<Self, ProtocolError> {
        check_len(buf, Self::SIZE)?;
        let export_size = buf.get_u64();
        let global_flags = buf.get_u16();
        let export_flags = ExportFlags::from_bits(buf.get_u16());
        Ok(Self {
            export_size,
            global_flags,
            export_flags,
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u64(self.export_size);
        buf.put_u16(self.global_flags);
        buf.put_u16(self.export_flags.bits());
        buf.put_bytes(0, HANDSHAKE_PADDING);
        buf
    }
}

/// Decodes the two-byte global flags of a new-style server.
pub fn decode_global_flags(mut buf: &[u8]) -> Result<GlobalFlags, ProtocolError> {
    check_len(buf, 2)?;
    Ok(GlobalFlags::from_bits(buf.get_u16()))
}

/// Encodes the four-byte client flags reply.
pub fn encode_client_flags(flags: ClientFlags) -> [u8; 4] {
    flags.bits().to_be_bytes()
}

/// The `NBD_OPT_EXPORT_NAME` option, which ends option haggling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportNameOption {
    pub name: String,
}

impl ExportNameOption {
    /// version (8) + option (4) + length (4)
    pub const HEADER_SIZE: usize = 16;

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let name = self.name.as_bytes();
        if name.len() > MAX_EXPORT_NAME {
            return Err(ProtocolError::ExportNameTooLong(name.len()));
        }

        let mut buf = BytesMut::with_capacity(Self::HEADER_SIZE + name.len());
        buf.put_u64(NEW_VERSION);
        buf.put_u32(OPT_EXPORT_NAME);
        buf.put_u32(name.len() as u32);
        buf.put_slice(name);
        Ok(buf)
    }
}

/// Server's answer to `NBD_OPT_EXPORT_NAME`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeFinish {
    pub export_size: u64,
    pub export_flags: ExportFlags,
}

impl HandshakeFinish {
    /// Bytes to read, depending on whether no-zeroes was negotiated.
    pub fn wire_size(no_zeroes: bool) -> usize {
        if no_zeroes {
            8 + 2
        } else {
            8 + 2 + HANDSHAKE_PADDING
        }
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, ProtocolError> {
        check_len(buf, Self::wire_size(true))?;
        let export_size = buf.get_u64();
        let export_flags = ExportFlags::from_bits(buf.get_u16());
        Ok(Self {
            export_size,
            export_flags,
        })
    }

    pub fn encode(&self, no_zeroes: bool) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::wire_size(no_zeroes));
        buf.put_u64(self.export_size);
        buf.put_u16(self.export_flags.bits());
        if !no_zeroes {
            buf.put_bytes(0, HANDSHAKE_PADDING);
        }
        buf
    }
}
