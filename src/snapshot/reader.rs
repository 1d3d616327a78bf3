//! Snapshot Reader
//!
//! A stateless decoder over a dump file. Every call opens and scans the file
//! again; nothing is cached between calls.
//!
//! ## Scan
//!
//! 1. Find the records section: walk the header opcodes when the file carries
//!    the `REDIS` magic, otherwise jump to the first `0xFB` byte. Only the
//!    first resize-db marker is ever used. A bare section found by the scan
//!    uses single-byte counts and lengths; a full dump uses length encoding.
//! 2. Read the hash-table size (number of records) and the expires size.
//! 3. Decode records one at a time. The optional expiry opcode decides whether
//!    4 or 8 bytes come before the value-type tag; every step is bounds-checked.

use crate::clock;
use crate::snapshot::format::{opcode, Cursor, Framing, MAGIC, VALUE_TYPE_STRING, VERSION_LEN};
use crate::snapshot::SnapshotError;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::trace;

/// One key/value pair decoded from the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub key: Bytes,
    pub value: Bytes,
    /// Absolute expiry in milliseconds since the Unix epoch.
    pub expires_at: Option<u64>,
}

impl SnapshotRecord {
    /// Returns true if the record's embedded deadline has passed at `now`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        clock::is_expired_at(self.expires_at, now)
    }
}

/// Result of a successful [`SnapshotReader::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotValue {
    pub value: Bytes,
    pub expired: bool,
}

/// Reads records from a dump file on demand.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    path: PathBuf,
}

impl SnapshotReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finds `key` in the dump.
    ///
    /// Returns `Ok(None)` when the key is not in the file.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<SnapshotValue>, SnapshotError> {
        let data = std::fs::read(&self.path)?;
        let now = clock::now_millis();

        for record in records(&data)? {
            let record = record?;
            if record.key.as_ref() == key {
                let expired = record.is_expired_at(now);
                return Ok(Some(SnapshotValue {
                    value: record.value,
                    expired,
                }));
            }
        }

        Ok(None)
    }

    /// Lists every key whose embedded expiry has not yet elapsed.
    pub fn list_keys(&self) -> Result<Vec<Bytes>, SnapshotError> {
        let now = clock::now_millis();
        Ok(self
            .load()?
            .into_iter()
            .filter(|record| !record.is_expired_at(now))
            .map(|record| record.key)
            .collect())
    }

    /// Decodes the whole file, expired records included.
    pub fn load(&self) -> Result<Vec<SnapshotRecord>, SnapshotError> {
        let data = std::fs::read(&self.path)?;
        decode(&data)
    }
}

/// Decodes every record in an in-memory dump.
pub fn decode(data: &[u8]) -> Result<Vec<SnapshotRecord>, SnapshotError> {
    records(data)?.collect()
}

/// Returns an iterator over the records of `data`.
pub fn records(data: &[u8]) -> Result<Records<'_>, SnapshotError> {
    let Some((mut cursor, framing)) = seek_resize_db(data)? else {
        return Ok(Records::empty(data));
    };

    let table_size = framing.read_count(&mut cursor)?;
    let expires_size = framing.read_count(&mut cursor)?;
    trace!(
        table_size,
        expires_size,
        ?framing,
        offset = cursor.position(),
        "Snapshot records section"
    );

    Ok(Records {
        cursor,
        framing,
        remaining: table_size,
        done: false,
    })
}

/// Positions a cursor just past the first resize-db marker.
///
/// Returns `Ok(None)` for a well-formed dump that holds no database.
fn seek_resize_db(data: &[u8]) -> Result<Option<(Cursor<'_>, Framing)>, SnapshotError> {
    if !data.starts_with(MAGIC) {
        return data
            .iter()
            .position(|&b| b == opcode::RESIZE_DB)
            .map(|pos| Some((Cursor::at(data, pos + 1), Framing::Byte)))
            .ok_or(SnapshotError::MissingDatabaseMarker);
    }

    let mut cursor = Cursor::at(data, MAGIC.len());
    cursor.read_bytes(VERSION_LEN)?;

    loop {
        let offset = cursor.position();
        match cursor.read_u8()? {
            opcode::AUX => {
                cursor.read_string()?;
                cursor.read_string()?;
            }
            opcode::SELECT_DB => {
                cursor.read_count()?;
            }
            opcode::RESIZE_DB => return Ok(Some((cursor, Framing::Encoded))),
            opcode::EOF => return Ok(None),
            other => {
                return Err(SnapshotError::UnexpectedOpcode {
                    opcode: other,
                    offset,
                })
            }
        }
    }
}

/// Iterator over decoded records.
///
/// Stops after the declared table size, at an end-of-file or select-db
/// opcode, or after the first error.
#[derive(Debug)]
pub struct Records<'a> {
    cursor: Cursor<'a>,
    framing: Framing,
    remaining: usize,
    done: bool,
}

impl<'a> Records<'a> {
    fn empty(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::at(data, data.len()),
            framing: Framing::Byte,
            remaining: 0,
            done: true,
        }
    }

    fn next_record(&mut self) -> Result<Option<SnapshotRecord>, SnapshotError> {
        let mut expires_at = None;
        let mut offset = self.cursor.position();
        let mut tag = self.cursor.read_u8()?;

        match tag {
            opcode::EOF | opcode::SELECT_DB => return Ok(None),
            opcode::EXPIRE_TIME => {
                let secs = self.cursor.read_u32_le()?;
                expires_at = Some(u64::from(secs) * 1000);
                offset = self.cursor.position();
                tag = self.cursor.read_u8()?;
            }
            opcode::EXPIRE_TIME_MS => {
                expires_at = Some(self.cursor.read_u64_le()?);
                offset = self.cursor.position();
                tag = self.cursor.read_u8()?;
            }
            _ => {}
        }

        if tag != VALUE_TYPE_STRING {
            return Err(SnapshotError::UnsupportedValueType {
                value_type: tag,
                offset,
            });
        }

        let key = self.framing.read_string(&mut self.cursor)?;
        let value = self.framing.read_string(&mut self.cursor)?;

        Ok(Some(SnapshotRecord {
            key,
            value,
            expires_at,
        }))
    }
}

impl Iterator for Records<'_> {
    type Item = Result<SnapshotRecord, SnapshotError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == 0 {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => {
                self.remaining -= 1;
                Some(Ok(record))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
