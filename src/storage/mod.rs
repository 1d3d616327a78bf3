//! Storage Engine Module
//!
//! The keyspace for EmberKV: a sharded, lock-guarded map with millisecond TTLs,
//! a read-through fallback to an on-disk snapshot, and an optional background
//! sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! │                        │ miss                               │
//! │                        ▼                                    │
//! │                 SnapshotReader                              │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use emberkv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let engine = StorageEngine::new();
//! engine.set_with_ttl(Bytes::from("session"), Bytes::from("token123"), Duration::from_secs(3600));
//! assert_eq!(engine.get(b"session"), Some(Bytes::from("token123")));
//! ```

pub mod engine;
pub mod expiry;

pub use engine::{Entry, StorageEngine};
pub use expiry::{ExpiryConfig, ExpirySweeper};
