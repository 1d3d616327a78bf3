//! Connection Module
//!
//! Client connection management. The listener in `main.rs` spawns one task
//! per accepted socket; each task owns a [`ConnectionHandler`] and shares
//! the storage engine through its [`CommandHandler`](crate::commands::CommandHandler).
//!
//! ```text
//! TcpListener::accept ──spawn──> ConnectionHandler::run
//!                                  read → parse → execute → reply
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use emberkv::commands::CommandHandler;
//! use emberkv::connection::handle_connection;
//!
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler.clone()));
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler};
