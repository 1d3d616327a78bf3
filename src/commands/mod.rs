//! Command Handler Module
//!
//! The dispatcher between the protocol engine and the storage engine.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Parser    │  (protocol module)
//! └────────┬────────┘
//!          │ Command
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │──> SnapshotReader on miss
//! └─────────────────┘
//! ```

pub mod handler;

pub use handler::CommandHandler;
