//! Plugin and handle traits.

use crate::Result;

/// How many requests a server may run against a plugin at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ThreadModel {
    /// One connection at a time.
    SerializeConnections,
    /// One request at a time across all connections.
    SerializeAllRequests,
    /// One request at a time per connection.
    SerializeRequests,
    /// No restriction.
    Parallel,
}

/// A block-device plugin.
///
/// `config` and `config_complete` run before any handle is opened and take
/// `&mut self`; after that the plugin is shared between connections.
pub trait Plugin: Send + Sync {
    /// Short name, used to select the plugin.
    fn name(&self) -> &'static str;

    /// Human readable name.
    fn longname(&self) -> &'static str {
        self.name()
    }

    fn version(&self) -> &'static str;

    fn thread_model(&self) -> ThreadModel {
        ThreadModel::Parallel
    }

    /// Accepts one `key=value` parameter.
    fn config(&mut self, key: &str, value: &str) -> Result<()>;

    /// Called once after the last parameter, to validate the whole set.
    fn config_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Help text describing the accepted parameters.
    fn config_help(&self) -> &'static str {
        ""
    }

    /// Opens a handle for one client connection.
    fn open(&self, readonly: bool) -> Result<Box<dyn PluginHandle>>;
}

/// A per-connection handle.
///
/// Block operations may be called from any thread, subject to the plugin's
/// [`ThreadModel`].
pub trait PluginHandle: Send + Sync {
    /// Releases the handle. Consumes it, so it runs at most once.
    fn close(self: Box<Self>);

    fn get_size(&self) -> Result<u64>;

    fn can_write(&self) -> Result<bool> {
        Ok(false)
    }

    fn can_flush(&self) -> Result<bool> {
        Ok(false)
    }

    fn is_rotational(&self) -> Result<bool> {
        Ok(false)
    }

    fn can_trim(&self) -> Result<bool> {
        Ok(false)
    }

    /// Reads exactly `buf.len()` bytes starting at `offset`.
    fn pread(&self, buf: &mut [u8], offset: u64) -> Result<()>;

    /// Writes all of `buf` at `offset`.
    fn pwrite(&self, _buf: &[u8], _offset: u64) -> Result<()> {
        Err(crate::PluginError::Permission)
    }

    /// Zeroes `count` bytes at `offset`. `may_trim` allows punching a hole.
    ///
    /// The default asks the server to fall back to writing zeroes itself.
    fn zero(&self, _count: u32, _offset: u64, _may_trim: bool) -> Result<()> {
        Err(crate::PluginError::NotSupported)
    }

    fn trim(&self, _count: u32, _offset: u64) -> Result<()> {
        Err(crate::PluginError::NotSupported)
    }

    fn flush(&self) -> Result<()> {
        Err(crate::PluginError::NotSupported)
    }
}
