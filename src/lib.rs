//! # EmberKV - A Small In-Memory Key-Value Server
//!
//! EmberKV speaks a subset of the Redis protocol (RESP) and serves a keyspace
//! that can be seeded from, and read through to, an RDB snapshot file.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              EmberKV                                │
//! │                                                                     │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐              │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │              │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │              │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘              │
//! │                                               │                     │
//! │                                               ▼                     │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────┐    │
//! │  │   RESP      │    │              StorageEngine               │    │
//! │  │   Parser    │    │  ┌────────┐ ┌────────┐ ┌────────┐        │    │
//! │  └─────────────┘    │  │Shard 0 │ │Shard 1 │ │...N    │        │    │
//! │                     │  └────────┘ └────────┘ └────────┘        │    │
//! │                     └───────────────────┬──────────────────────┘    │
//! │                                         │ miss                      │
//! │                                         ▼                           │
//! │                     ┌──────────────────────────────────────────┐    │
//! │                     │      SnapshotReader (dir/dbfilename)     │    │
//! │                     └──────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `PING [message]`
//! - `ECHO message`
//! - `SET key value [PX milliseconds | EX seconds]`
//! - `GET key`
//! - `CONFIG GET parameter` (`dir`, `dbfilename`)
//! - `KEYS pattern`
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP frames and the command model
//! - [`commands`]: the dispatcher
//! - [`storage`]: thread-safe keyspace with TTL support
//! - [`snapshot`]: RDB snapshot decoding
//! - [`connection`]: client connection management
//! - [`config`]: command-line configuration
//!
//! ## Expiry
//!
//! Deadlines are absolute wall-clock milliseconds. An entry is expired once
//! the clock reaches its deadline; expired entries are never returned and
//! are removed lazily on access or by the background sweeper.

pub mod clock;
pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod snapshot;
pub mod storage;

pub use commands::CommandHandler;
pub use config::ServerConfig;
pub use connection::handle_connection;
pub use protocol::{Command, CommandKind, ParseError, RespValue};
pub use snapshot::{SnapshotError, SnapshotReader};
pub use storage::{ExpiryConfig, ExpirySweeper, StorageEngine};

/// The default port EmberKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host EmberKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// EmberKV version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
