//! Subcommand implementations.

use crate::Commands;
use serde::Serialize;
use std::fmt::Write as _;
use vblk_plugin::{PluginError, PluginHandle};

type CmdResult = Result<String, Box<dyn std::error::Error>>;

/// Largest zero buffer written when a server cannot zero natively.
const ZERO_CHUNK: usize = 64 * 1024;

#[derive(Debug, Serialize)]
struct ExportInfo {
    size: u64,
    can_write: bool,
    can_flush: bool,
    can_trim: bool,
    is_rotational: bool,
}

/// Splits a `key=value` parameter.
pub fn parse_param(param: &str) -> Result<(&str, &str), PluginError> {
    match param.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(PluginError::config(format!(
            "parameter '{}' is not in key=value form",
            param
        ))),
    }
}

pub fn execute(handle: &dyn PluginHandle, cmd: Commands) -> CmdResult {
    match cmd {
        Commands::Info { json } => {
            let info = ExportInfo {
                size: handle.get_size()?,
                can_write: handle.can_write()?,
                can_flush: handle.can_flush()?,
                can_trim: handle.can_trim()?,
                is_rotational: handle.is_rotational()?,
            };
            if json {
                Ok(serde_json::to_string_pretty(&info)?)
            } else {
                Ok(format!(
                    "size: {}\nwrite: {}\nflush: {}\ntrim: {}\nrotational: {}",
                    info.size, info.can_write, info.can_flush, info.can_trim, info.is_rotational
                ))
            }
        }

        Commands::Read {
            offset,
            length,
            output,
        } => {
            let mut buf = vec![0u8; length as usize];
            handle.pread(&mut buf, offset)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &buf)?;
                    Ok(format!("{} bytes written to {}", buf.len(), path.display()))
                }
                None => Ok(hex_dump(&buf, offset)),
            }
        }

        Commands::Write { offset, input } => {
            if !handle.can_write()? {
                return Err(PluginError::Permission.into());
            }
            let data = std::fs::read(&input)?;
            handle.pwrite(&data, offset)?;
            Ok(format!("{} bytes written at offset {}", data.len(), offset))
        }

        Commands::Zero {
            offset,
            length,
            no_trim,
        } => {
            match handle.zero(length, offset, !no_trim) {
                Ok(()) => {}
                Err(e) if e.wants_fallback() => {
                    tracing::debug!("zero not supported, writing zeroes instead");
                    write_zeroes(handle, length, offset)?;
                }
                Err(e) => return Err(e.into()),
            }
            Ok(format!("{} bytes zeroed at offset {}", length, offset))
        }

        Commands::Trim { offset, length } => {
            if !handle.can_trim()? {
                return Err(PluginError::NotSupported.into());
            }
            handle.trim(length, offset)?;
            Ok(format!("{} bytes trimmed at offset {}", length, offset))
        }

        Commands::Flush => {
            if !handle.can_flush()? {
                return Err(PluginError::NotSupported.into());
            }
            handle.flush()?;
            Ok(String::new())
        }

        Commands::HelpParams => Ok(String::new()),
    }
}

fn write_zeroes(handle: &dyn PluginHandle, length: u32, offset: u64) -> Result<(), PluginError> {
    let zeroes = vec![0u8; ZERO_CHUNK.min(length as usize)];
    let mut done = 0usize;
    while done < length as usize {
        let n = zeroes.len().min(length as usize - done);
        handle.pwrite(&zeroes[..n], offset + done as u64)?;
        done += n;
    }
    Ok(())
}

fn hex_dump(data: &[u8], base: u64) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:08x}: ", base + (i * 16) as u64);
        for byte in line {
            let _ = write!(out, "{:02x} ", byte);
        }
        for _ in line.len()..16 {
            out.push_str("   ");
        }
        out.push(' ');
        out.extend(line.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }
    out.pop();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory::Memory;

    /// Plain in-memory handle without native zeroing.
    mod memory {
        use std::sync::Mutex;
        use vblk_plugin::{PluginHandle, Result};

        pub struct Memory {
            pub data: Mutex<Vec<u8>>,
        }

        impl PluginHandle for Memory {
            fn close(self: Box<Self>) {}

            fn get_size(&self) -> Result<u64> {
                Ok(self.data.lock().unwrap().len() as u64)
            }

            fn can_write(&self) -> Result<bool> {
                Ok(true)
            }

            fn pread(&self, buf: &mut [u8], offset: u64) -> Result<()> {
                let data = self.data.lock().unwrap();
                let start = offset as usize;
                buf.copy_from_slice(&data[start..start + buf.len()]);
                Ok(())
            }

            fn pwrite(&self, buf: &[u8], offset: u64) -> Result<()> {
                let mut data = self.data.lock().unwrap();
                let start = offset as usize;
                data[start..start + buf.len()].copy_from_slice(buf);
                Ok(())
            }
        }
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("socket=/run/a.sock").unwrap(), ("socket", "/run/a.sock"));
        assert_eq!(parse_param("export=").unwrap(), ("export", ""));
        assert_eq!(parse_param("a=b=c").unwrap(), ("a", "b=c"));
        assert!(parse_param("socket").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_hex_dump() {
        let dump = hex_dump(b"NBDMAGIC\x00\x01", 0x10);
        assert_eq!(
            dump,
            "00000010: 4e 42 44 4d 41 47 49 43 00 01                    NBDMAGIC.."
        );
    }

    #[test]
    fn test_zero_falls_back_to_writes() {
        let mem = Memory {
            data: std::sync::Mutex::new(vec![0xff; 200_000]),
        };
        let out = execute(
            &mem,
            Commands::Zero {
                offset: 10,
                length: 150_000,
                no_trim: false,
            },
        )
        .unwrap();
        assert!(out.contains("150000"));

        let data = mem.data.lock().unwrap();
        assert_eq!(data[9], 0xff);
        assert!(data[10..150_010].iter().all(|&b| b == 0));
        assert_eq!(data[150_010], 0xff);
    }

    #[test]
    fn test_info_json() {
        let mem = Memory {
            data: std::sync::Mutex::new(vec![0; 4096]),
        };
        let out = execute(&mem, Commands::Info { json: true }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["size"], 4096);
        assert_eq!(value["can_write"], true);
        assert_eq!(value["can_trim"], false);
    }

    #[test]
    fn test_write_then_read_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bin");
        let output = dir.path().join("out.bin");
        std::fs::write(&input, b"hello block").unwrap();

        let mem = Memory {
            data: std::sync::Mutex::new(vec![0; 64]),
        };
        execute(
            &mem,
            Commands::Write {
                offset: 8,
                input,
            },
        )
        .unwrap();
        execute(
            &mem,
            Commands::Read {
                offset: 8,
                length: 11,
                output: Some(output.clone()),
            },
        )
        .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"hello block");
    }

    #[test]
    fn test_flush_unsupported() {
        let mem = Memory {
            data: std::sync::Mutex::new(vec![0; 16]),
        };
        assert!(execute(&mem, Commands::Flush).is_err());
    }
}
