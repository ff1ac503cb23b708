//! Flag bitfields exchanged during the handshake.

/// Global flags sent by a new-style server right after the version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalFlags(u16);

impl GlobalFlags {
    /// Server supports fixed new-style option haggling.
    pub const FIXED_NEWSTYLE: u16 = 1 << 0;
    /// Server can omit the 124 bytes of padding after the export flags.
    pub const NO_ZEROES: u16 = 1 << 1;

    /// Bits this client understands and will echo back.
    const RECOGNIZED: u16 = Self::FIXED_NEWSTYLE | Self::NO_ZEROES;

    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn no_zeroes(&self) -> bool {
        self.0 & Self::NO_ZEROES != 0
    }

    /// Client flags to send back: the recognized subset of what the server offered.
    pub fn negotiate(&self) -> ClientFlags {
        ClientFlags((self.0 & Self::RECOGNIZED) as u32)
    }
}

/// Flags returned by the client in reply to the global flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientFlags(u32);

impl ClientFlags {
    pub const FIXED_NEWSTYLE: u32 = 1 << 0;
    pub const NO_ZEROES: u32 = 1 << 1;

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn no_zeroes(&self) -> bool {
        self.0 & Self::NO_ZEROES != 0
    }
}

/// Per-export transmission flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportFlags(u16);

impl ExportFlags {
    pub const HAS_FLAGS: u16 = 1 << 0;
    pub const READ_ONLY: u16 = 1 << 1;
    pub const SEND_FLUSH: u16 = 1 << 2;
    pub const SEND_FUA: u16 = 1 << 3;
    pub const ROTATIONAL: u16 = 1 << 4;
    pub const SEND_TRIM: u16 = 1 << 5;
    pub const SEND_WRITE_ZEROES: u16 = 1 << 6;

    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn is_read_only(&self) -> bool {
        self.0 & Self::READ_ONLY != 0
    }

    pub fn can_flush(&self) -> bool {
        self.0 & Self::SEND_FLUSH != 0
    }

    pub fn is_rotational(&self) -> bool {
        self.0 & Self::ROTATIONAL != 0
    }

    pub fn can_trim(&self) -> bool {
        self.0 & Self::SEND_TRIM != 0
    }

    pub fn can_write_zeroes(&self) -> bool {
        self.0 & Self::SEND_WRITE_ZEROES != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate_masks_unknown_bits() {
        let gflags = GlobalFlags::from_bits(0xfff0 | GlobalFlags::NO_ZEROES);
        let cflags = gflags.negotiate();
        assert_eq!(cflags.bits(), ClientFlags::NO_ZEROES);
        assert!(cflags.no_zeroes());
    }

    #[test]
    fn test_negotiate_echoes_recognized_bits() {
        let gflags = GlobalFlags::from_bits(GlobalFlags::FIXED_NEWSTYLE | GlobalFlags::NO_ZEROES);
        assert_eq!(gflags.negotiate().bits(), 0x3);

        let gflags = GlobalFlags::from_bits(0);
        assert_eq!(gflags.negotiate().bits(), 0);
        assert!(!gflags.no_zeroes());
    }

    #[test]
    fn test_export_flags() {
        let flags = ExportFlags::from_bits(
            ExportFlags::HAS_FLAGS | ExportFlags::SEND_FLUSH | ExportFlags::SEND_TRIM,
        );
        assert!(flags.can_flush());
        assert!(flags.can_trim());
        assert!(!flags.is_read_only());
        assert!(!flags.is_rotational());
        assert!(!flags.can_write_zeroes());

        let flags = ExportFlags::from_bits(ExportFlags::READ_ONLY | ExportFlags::ROTATIONAL);
        assert!(flags.is_read_only());
        assert!(flags.is_rotational());
    }
}
