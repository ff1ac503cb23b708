//! Transmission-phase request and reply headers.
//!
//! Request header (28 bytes):
//!
//! ```text
//! +--------+---------+--------+--------+--------+
//! | magic  | command | cookie | offset | length |
//! | 4 bytes| 4 bytes |8 bytes |8 bytes |4 bytes |
//! +--------+---------+--------+--------+--------+
//! ```
//!
//! Reply header (16 bytes):
//!
//! ```text
//! +--------+--------+--------+
//! | magic  | status | cookie |
//! | 4 bytes| 4 bytes|8 bytes |
//! +--------+--------+--------+
//! ```
//!
//! The cookie is opaque to the server and echoed back unchanged.

use crate::error::ProtocolError;
use crate::status::WireStatus;
use crate::{REPLY_MAGIC, REQUEST_MAGIC};
use bytes::{Buf, BufMut, BytesMut};

pub const REQUEST_HEADER_SIZE: usize = 28;
pub const REPLY_HEADER_SIZE: usize = 16;

/// Transmission-phase command, carried in the low 16 bits of the command word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Command {
    Read = 0,
    Write = 1,
    Disconnect = 2,
    Flush = 3,
    Trim = 4,
    WriteZeroes = 6,
}

impl Command {
    /// Zeroed range must stay allocated.
    pub const FLAG_NO_HOLE: u32 = 1 << 17;

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Command::Read),
            1 => Some(Command::Write),
            2 => Some(Command::Disconnect),
            3 => Some(Command::Flush),
            4 => Some(Command::Trim),
            6 => Some(Command::WriteZeroes),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// A request header: command word (command plus flag bits), cookie, range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub command: Command,
    pub flags: u32,
    pub cookie: u64,
    pub offset: u64,
    pub length: u32,
}

impl RequestHeader {
    pub fn new(command: Command, offset: u64, length: u32, cookie: u64) -> Self {
        Self {
            command,
            flags: 0,
            cookie,
            offset,
            length,
        }
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags |= flags & 0xffff_0000;
        self
    }

    /// The on-wire command word.
    pub fn command_word(&self) -> u32 {
        self.flags | self.command.as_u16() as u32
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(REQUEST_HEADER_SIZE);
        buf.put_u32(REQUEST_MAGIC);
        buf.put_u32(self.command_word());
        buf.put_u64(self.cookie);
        buf.put_u64(self.offset);
        buf.put_u32(self.length);
        buf
    }

    /// Parses a request header. Used by test servers; clients only encode.
    pub fn decode(mut buf: &[u8]) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < REQUEST_HEADER_SIZE {
            return Err(ProtocolError::Truncated {
                needed: REQUEST_HEADER_SIZE,
                got: buf.len(),
            });
        }
        let magic = buf.get_u32();
        if magic != REQUEST_MAGIC {
            return Err(ProtocolError::InvalidHeaderMagic(magic));
        }
        let word = buf.get_u32();
        let cookie = buf.get_u64();
        let offset = buf.get_u64();
        let length = buf.get_u32();
        Ok(Command::from_u16(word as u16).map(|command| Self {
            command,
            flags: word & 0xffff_0000,
            cookie,
            offset,
            length,
        }))
    }
}

/// A simple reply header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub status: u32,
    pub cookie: u64,
}

impl ReplyHeader {
    pub fn new(status: WireStatus, cookie: u64) -> Self {
        Self {
            status: status.code(),
            cookie,
        }
    }

    /// Decodes a reply header, rejecting a bad magic.
    pub fn decode(mut buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < REPLY_HEADER_SIZE {
            return Err(ProtocolError::Truncated {
                needed: REPLY_HEADER_SIZE,
                got: buf.len(),
            });
        }
        let magic = buf.get_u32();
        if magic != REPLY_MAGIC {
            return Err(ProtocolError::InvalidHeaderMagic(magic));
        }
        let status = buf.get_u32();
        let cookie = buf.get_u64();
        Ok(Self { status, cookie })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(REPLY_HEADER_SIZE);
        buf.put_u32(REPLY_MAGIC);
        buf.put_u32(self.status);
        buf.put_u64(self.cookie);
        buf
    }

    pub fn wire_status(&self) -> WireStatus {
        WireStatus::from_code(self.status)
    }
}
