//! Exact-length transfers over a stream socket.
//!
//! A peer that goes away mid-message is always an error. NBD has no way to
//! resynchronize, so a short read can never be treated as a valid result.

use std::io::{self, Read, Write};

/// Reads exactly `buf.len()` bytes, retrying on interruption.
pub fn read_full<R: Read + ?Sized>(reader: &mut R, mut buf: &mut [u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match reader.read(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "unexpected EOF from NBD server",
                ))
            }
            Ok(n) => buf = &mut buf[n..],
            Err(e) if retryable(&e) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Writes all of `buf`, retrying on interruption.
pub fn write_full<W: Write + ?Sized>(writer: &mut W, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match writer.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "NBD server stopped accepting data",
                ))
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if retryable(&e) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn retryable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Hands out data in small pieces, interrupting between them.
    struct Choppy {
        data: VecDeque<u8>,
        interrupt_next: bool,
    }

    impl Choppy {
        fn new(data: &[u8]) -> Self {
            Self {
                data: data.iter().copied().collect(),
                interrupt_next: true,
            }
        }
    }

    impl Read for Choppy {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            self.interrupt_next = true;
            let n = buf.len().min(3).min(self.data.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.data.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    impl Write for Choppy {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            self.interrupt_next = true;
            let n = buf.len().min(2);
            self.data.extend(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_read_full_across_fragments() {
        let mut src = Choppy::new(b"0123456789");
        let mut buf = [0u8; 10];
        read_full(&mut src, &mut buf).unwrap();
        assert_eq!(&buf, b"0123456789");
    }

    #[test]
    fn test_read_full_eof_mid_message() {
        let mut src = Choppy::new(b"0123");
        let mut buf = [0u8; 10];
        let err = read_full(&mut src, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_read_full_empty_buffer() {
        let mut src = Choppy::new(b"");
        read_full(&mut src, &mut []).unwrap();
    }

    #[test]
    fn test_write_full_across_fragments() {
        let mut sink = Choppy::new(b"");
        write_full(&mut sink, b"hello world").unwrap();
        assert_eq!(sink.data.iter().copied().collect::<Vec<_>>(), b"hello world");
    }

    #[test]
    fn test_write_full_zero_write() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Ok(0)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let err = write_full(&mut Full, b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }

    #[test]
    fn test_transport_error_reported() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::ConnectionReset))
            }
        }
        let mut buf = [0u8; 4];
        let err = read_full(&mut Broken, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
