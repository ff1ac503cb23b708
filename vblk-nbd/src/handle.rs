//! Block operations on an open NBD connection.

use crate::connection::Connection;
use crate::error::NbdError;
use std::path::Path;
use vblk_plugin::{PluginHandle, Result};
use vblk_protocol::Command;

/// Per-connection handle of the `nbd` plugin.
pub struct NbdHandle {
    conn: Connection,
}

impl NbdHandle {
    /// Connects to the server and runs the handshake.
    pub fn open(socket: &Path, export: &str) -> std::result::Result<Self, NbdError> {
        let conn = Connection::open(socket, export)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn request_len(len: usize) -> std::result::Result<u32, NbdError> {
    u32::try_from(len).map_err(|_| NbdError::TooLarge(len))
}

impl PluginHandle for NbdHandle {
    fn close(self: Box<Self>) {
        self.conn.close();
    }

    fn get_size(&self) -> Result<u64> {
        Ok(self.conn.export_size())
    }

    fn can_write(&self) -> Result<bool> {
        Ok(!self.conn.export_flags().is_read_only())
    }

    fn can_flush(&self) -> Result<bool> {
        Ok(self.conn.export_flags().can_flush())
    }

    fn is_rotational(&self) -> Result<bool> {
        Ok(self.conn.export_flags().is_rotational())
    }

    fn can_trim(&self) -> Result<bool> {
        Ok(self.conn.export_flags().can_trim())
    }

    // TODO: split requests larger than the server's maximum transfer size
    fn pread(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let count = request_len(buf.len())?;
        let data = self
            .conn
            .transact(Command::Read, 0, offset, count, None, buf.len())?;
        buf.copy_from_slice(&data);
        Ok(())
    }

    fn pwrite(&self, buf: &[u8], offset: u64) -> Result<()> {
        let count = request_len(buf.len())?;
        self.conn
            .transact(Command::Write, 0, offset, count, Some(buf), 0)?;
        Ok(())
    }

    fn zero(&self, count: u32, offset: u64, may_trim: bool) -> Result<()> {
        if !self.conn.export_flags().can_write_zeroes() {
            // the server falls back to writing zeroes itself
            return Err(NbdError::NotSupported.into());
        }

        let flags = if may_trim { 0 } else { Command::FLAG_NO_HOLE };
        self.conn
            .transact(Command::WriteZeroes, flags, offset, count, None, 0)?;
        Ok(())
    }

    fn trim(&self, count: u32, offset: u64) -> Result<()> {
        self.conn
            .transact(Command::Trim, 0, offset, count, None, 0)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.conn.transact(Command::Flush, 0, 0, 0, None, 0)?;
        Ok(())
    }
}
