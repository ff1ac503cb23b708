//! Handshake negotiation.
//!
//! Reads the common prefix, branches on the version and collects the export
//! size and transmission flags. No option haggling is done beyond selecting
//! the export by name.

use crate::error::NbdError;
use crate::io::{read_full, write_full};
use std::io::{Read, Write};
use vblk_protocol::handshake::{decode_global_flags, encode_client_flags};
use vblk_protocol::{
    ExportFlags, ExportNameOption, HandshakeFinish, HandshakePrefix, OldHandshake, Version,
};

/// What a completed handshake tells us about the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeOutcome {
    pub version: Version,
    pub export_size: u64,
    pub export_flags: ExportFlags,
}

/// Runs the client side of the handshake on a freshly connected stream.
pub fn negotiate<S: Read + Write>(
    stream: &mut S,
    export: &str,
) -> Result<HandshakeOutcome, NbdError> {
    let mut prefix = [0u8; HandshakePrefix::SIZE];
    read_full(stream, &mut prefix).map_err(|e| {
        tracing::error!("unable to read magic: {}", e);
        e
    })?;
    let prefix = HandshakePrefix::decode(&prefix).map_err(|e| {
        tracing::error!("{}", e);
        e
    })?;

    match prefix.version {
        Version::Old => old_style(stream),
        Version::New => new_style(stream, export),
    }
}

fn old_style<S: Read>(stream: &mut S) -> Result<HandshakeOutcome, NbdError> {
    let mut block = [0u8; OldHandshake::SIZE];
    read_full(stream, &mut block).map_err(|e| {
        tracing::error!("unable to read old handshake: {}", e);
        e
    })?;
    let old = OldHandshake::decode(&block)?;

    tracing::debug!(
        "old-style handshake: size={} flags={:#x}",
        old.export_size,
        old.export_flags.bits()
    );
    Ok(HandshakeOutcome {
        version: Version::Old,
        export_size: old.export_size,
        export_flags: old.export_flags,
    })
}

fn new_style<S: Read + Write>(stream: &mut S, export: &str) -> Result<HandshakeOutcome, NbdError> {
    let mut raw = [0u8; 2];
    read_full(stream, &mut raw).map_err(|e| {
        tracing::error!("unable to read global flags: {}", e);
        e
    })?;
    let gflags = decode_global_flags(&raw)?;

    let cflags = gflags.negotiate();
    write_full(stream, &encode_client_flags(cflags)).map_err(|e| {
        tracing::error!("unable to return global flags: {}", e);
        e
    })?;

    let option = ExportNameOption::new(export).encode()?;
    write_full(stream, &option).map_err(|e| {
        tracing::error!("unable to request export '{}': {}", export, e);
        e
    })?;

    let mut finish = vec![0u8; HandshakeFinish::wire_size(gflags.no_zeroes())];
    read_full(stream, &mut finish).map_err(|e| {
        tracing::error!("unable to read new handshake: {}", e);
        e
    })?;
    let finish = HandshakeFinish::decode(&finish)?;

    tracing::debug!(
        "new-style handshake: export='{}' size={} flags={:#x}",
        export,
        finish.export_size,
        finish.export_flags.bits()
    );
    Ok(HandshakeOutcome {
        version: Version::New,
        export_size: finish.export_size,
        export_flags: finish.export_flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use vblk_protocol::{GlobalFlags, ProtocolError, NEW_VERSION, OLD_VERSION};

    /// Scripted server: reads come from `input`, writes land in `output`.
    struct Scripted {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Scripted {
        fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn prefix(version: u64) -> Vec<u8> {
        let mut raw = b"NBDMAGIC".to_vec();
        raw.extend_from_slice(&version.to_be_bytes());
        raw
    }

    #[test]
    fn test_old_style() {
        let mut input = prefix(OLD_VERSION);
        input.extend_from_slice(
            &OldHandshake {
                export_size: 1_048_576,
                global_flags: 0,
                export_flags: ExportFlags::from_bits(0),
            }
            .encode(),
        );

        let mut stream = Scripted::new(input);
        let outcome = negotiate(&mut stream, "").unwrap();
        assert_eq!(outcome.version, Version::Old);
        assert_eq!(outcome.export_size, 1_048_576);
        assert!(!outcome.export_flags.is_read_only());
        assert!(stream.output.is_empty());
    }

    #[test]
    fn test_new_style_with_padding() {
        let mut input = prefix(NEW_VERSION);
        input.extend_from_slice(&GlobalFlags::FIXED_NEWSTYLE.to_be_bytes());
        let finish = HandshakeFinish {
            export_size: 8192,
            export_flags: ExportFlags::from_bits(ExportFlags::SEND_FLUSH),
        };
        input.extend_from_slice(&finish.encode(false));

        let mut stream = Scripted::new(input);
        let outcome = negotiate(&mut stream, "foo").unwrap();
        assert_eq!(outcome.version, Version::New);
        assert_eq!(outcome.export_size, 8192);
        assert!(outcome.export_flags.can_flush());

        // client flags, then the export-name option
        let out = &stream.output;
        assert_eq!(&out[..4], &[0, 0, 0, 1]);
        assert_eq!(&out[4..12], b"IHAVEOPT");
        assert_eq!(&out[12..16], &1u32.to_be_bytes());
        assert_eq!(&out[16..20], &3u32.to_be_bytes());
        assert_eq!(&out[20..], b"foo");
    }

    #[test]
    fn test_new_style_no_zeroes() {
        let mut input = prefix(NEW_VERSION);
        input.extend_from_slice(
            &(GlobalFlags::FIXED_NEWSTYLE | GlobalFlags::NO_ZEROES).to_be_bytes(),
        );
        let finish = HandshakeFinish {
            export_size: 512,
            export_flags: ExportFlags::from_bits(0),
        };
        input.extend_from_slice(&finish.encode(true));

        let mut stream = Scripted::new(input);
        let outcome = negotiate(&mut stream, "").unwrap();
        assert_eq!(outcome.export_size, 512);
        assert_eq!(&stream.output[..4], &[0, 0, 0, 3]);
        // nothing left unread
        assert_eq!(stream.input.position() as usize, stream.input.get_ref().len());
    }

    #[test]
    fn test_bad_magic() {
        let mut input = b"HTTP/1.1".to_vec();
        input.extend_from_slice(&OLD_VERSION.to_be_bytes());
        let err = negotiate(&mut Scripted::new(input), "").unwrap_err();
        assert!(matches!(
            err,
            NbdError::Protocol(ProtocolError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_unexpected_version() {
        let err = negotiate(&mut Scripted::new(prefix(7)), "").unwrap_err();
        assert!(matches!(
            err,
            NbdError::Protocol(ProtocolError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_truncated_old_handshake() {
        let mut input = prefix(OLD_VERSION);
        input.extend_from_slice(&[0u8; 20]);
        let err = negotiate(&mut Scripted::new(input), "").unwrap_err();
        assert!(matches!(err, NbdError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }
}
