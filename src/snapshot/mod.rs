//! Snapshot Module
//!
//! Read-only access to RDB-style binary dumps. The store consults the
//! snapshot for keys that were never written during this process lifetime,
//! and the server can ingest the whole file once at startup.
//!
//! ## Example
//!
//! ```no_run
//! use emberkv::snapshot::SnapshotReader;
//!
//! let reader = SnapshotReader::new("/var/lib/emberkv/dump.rdb");
//! if let Some(hit) = reader.lookup(b"greeting")? {
//!     println!("value={:?} expired={}", hit.value, hit.expired);
//! }
//! # Ok::<(), emberkv::snapshot::SnapshotError>(())
//! ```

pub mod format;
pub mod reader;

pub use reader::{decode, SnapshotReader, SnapshotRecord, SnapshotValue};

use thiserror::Error;

/// Errors raised while reading or decoding a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The file could not be opened or read
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    /// A length or fixed-width field runs past the end of the buffer
    #[error("snapshot truncated at offset {offset}: wanted {wanted} more bytes")]
    Truncated { offset: usize, wanted: usize },

    /// No resize-db marker was found
    #[error("snapshot has no database section")]
    MissingDatabaseMarker,

    /// An unknown opcode appeared in the header
    #[error("unexpected opcode {opcode:#04x} at offset {offset}")]
    UnexpectedOpcode { opcode: u8, offset: usize },

    /// A record holds something other than a plain string
    #[error("unsupported value type {value_type:#04x} at offset {offset}")]
    UnsupportedValueType { value_type: u8, offset: usize },

    /// A string uses an encoding this reader does not handle (e.g. LZF)
    #[error("unsupported string encoding {encoding:#04x} at offset {offset}")]
    UnsupportedEncoding { encoding: u8, offset: usize },
}

impl SnapshotError {
    /// True when the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SnapshotError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
