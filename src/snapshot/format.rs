//! Snapshot Binary Format
//!
//! Opcode constants and a bounds-checked cursor for the RDB-style dump.
//!
//! ## Layout
//!
//! ```text
//! ┌────────────┬─────────────────────────┬──────┬────────┬────────────┬─────────────┐
//! │ "REDIS" +  │ 0xFA aux / 0xFE select  │ 0xFB │ table  │ expires    │ records ... │
//! │ 4-digit    │ (metadata, skipped)     │      │ size   │ size       │ [0xFF]      │
//! │ version    │                         │      │        │            │             │
//! └────────────┴─────────────────────────┴──────┴────────┴────────────┴─────────────┘
//!
//! record   = [0xFD u32-le seconds | 0xFC u64-le millis]? type key value
//! type     = 0x00 (string)
//! key      = encoded string
//! value    = encoded string
//! ```
//!
//! ## Framing
//!
//! A bare records section (no `REDIS` magic, located by scanning for the
//! first `0xFB`) frames every count and string length as one unsigned byte,
//! so keys and values hold 0 to 255 bytes. A full dump behind the `REDIS`
//! header uses the length encoding below instead. See [`Framing`].
//!
//! ## String Encoding
//!
//! The two high bits of the first length byte select the form:
//!
//! - `00`: length is the low 6 bits
//! - `01`: length is 14 bits (low 6 bits + next byte)
//! - `10`: `0x80` is followed by a 32-bit big-endian length, `0x81` by 64-bit
//! - `11`: the string is an integer (`0xC0` i8, `0xC1` i16, `0xC2` i32, little-endian)
//!
//! Every read goes through [`Cursor`], which reports
//! [`SnapshotError::Truncated`] instead of indexing past the buffer.

use crate::snapshot::SnapshotError;
use bytes::Bytes;

/// Magic prefix of a full dump file.
pub const MAGIC: &[u8] = b"REDIS";

/// Width of the ASCII version number after the magic.
pub const VERSION_LEN: usize = 4;

/// Single-byte section markers.
pub mod opcode {
    pub const AUX: u8 = 0xFA;
    pub const RESIZE_DB: u8 = 0xFB;
    pub const EXPIRE_TIME_MS: u8 = 0xFC;
    pub const EXPIRE_TIME: u8 = 0xFD;
    pub const SELECT_DB: u8 = 0xFE;
    pub const EOF: u8 = 0xFF;
}

/// Value-type tag of a plain string record.
pub const VALUE_TYPE_STRING: u8 = 0x00;

const ENC_INT8: u8 = 0xC0;
const ENC_INT16: u8 = 0xC1;
const ENC_INT32: u8 = 0xC2;

/// A decoded length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// A byte count.
    Plain(usize),
    /// The following bytes hold an integer in the given special encoding.
    Encoded(u8),
}

/// How counts and string lengths are laid out in a records section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// One unsigned byte per count or length.
    Byte,
    /// Length-encoded prefixes, as written after a `REDIS` header.
    Encoded,
}

impl Framing {
    pub fn read_count(self, cursor: &mut Cursor<'_>) -> Result<usize, SnapshotError> {
        match self {
            Framing::Byte => Ok(cursor.read_u8()? as usize),
            Framing::Encoded => cursor.read_count(),
        }
    }

    pub fn read_string(self, cursor: &mut Cursor<'_>) -> Result<Bytes, SnapshotError> {
        match self {
            Framing::Byte => cursor.read_byte_string(),
            Framing::Encoded => cursor.read_string(),
        }
    }
}

/// Forward-only reader over a snapshot buffer.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor positioned at `pos`.
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    /// Current byte offset into the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Consumes `n` bytes and returns them.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(SnapshotError::Truncated {
                offset: self.pos,
                wanted: n,
            })?;

        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u32_le(&mut self) -> Result<u32, SnapshotError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.read_bytes(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, SnapshotError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    /// Reads a length prefix.
    pub fn read_length(&mut self) -> Result<Length, SnapshotError> {
        let offset = self.pos;
        let first = self.read_u8()?;

        match first >> 6 {
            0b00 => Ok(Length::Plain((first & 0x3F) as usize)),
            0b01 => {
                let next = self.read_u8()?;
                Ok(Length::Plain((((first & 0x3F) as usize) << 8) | next as usize))
            }
            0b10 => match first {
                0x80 => {
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(self.read_bytes(4)?);
                    Ok(Length::Plain(u32::from_be_bytes(raw) as usize))
                }
                0x81 => {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(self.read_bytes(8)?);
                    let len = usize::try_from(u64::from_be_bytes(raw)).map_err(|_| {
                        SnapshotError::Truncated {
                            offset,
                            wanted: usize::MAX,
                        }
                    })?;
                    Ok(Length::Plain(len))
                }
                other => Err(SnapshotError::UnsupportedEncoding {
                    encoding: other,
                    offset,
                }),
            },
            _ => Ok(Length::Encoded(first)),
        }
    }

    /// Reads a length prefix that must be a plain count (table sizes, db numbers).
    pub fn read_count(&mut self) -> Result<usize, SnapshotError> {
        let offset = self.pos;
        match self.read_length()? {
            Length::Plain(n) => Ok(n),
            Length::Encoded(encoding) => {
                Err(SnapshotError::UnsupportedEncoding { encoding, offset })
            }
        }
    }

    /// Reads a string prefixed by a single length byte.
    pub fn read_byte_string(&mut self) -> Result<Bytes, SnapshotError> {
        let len = self.read_u8()? as usize;
        Ok(Bytes::copy_from_slice(self.read_bytes(len)?))
    }

    /// Reads an encoded string. Integer-encoded strings come back in decimal.
    pub fn read_string(&mut self) -> Result<Bytes, SnapshotError> {
        let offset = self.pos;
        match self.read_length()? {
            Length::Plain(len) => Ok(Bytes::copy_from_slice(self.read_bytes(len)?)),
            Length::Encoded(ENC_INT8) => {
                let n = self.read_u8()? as i8;
                Ok(Bytes::from(n.to_string()))
            }
            Length::Encoded(ENC_INT16) => {
                let mut raw = [0u8; 2];
                raw.copy_from_slice(self.read_bytes(2)?);
                Ok(Bytes::from(i16::from_le_bytes(raw).to_string()))
            }
            Length::Encoded(ENC_INT32) => {
                let n = self.read_u32_le()? as i32;
                Ok(Bytes::from(n.to_string()))
            }
            Length::Encoded(encoding) => {
                Err(SnapshotError::UnsupportedEncoding { encoding, offset })
            }
        }
    }
}
