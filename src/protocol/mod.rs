//! RESP Protocol Implementation
//!
//! The protocol engine: decodes request frames into [`Command`]s and
//! serializes [`RespValue`] replies.
//!
//! ## Modules
//!
//! - `types`: the `RespValue` enum and its wire encoding
//! - `parser`: incremental frame decoder
//! - `command`: the `Command` model built from a decoded frame
//!
//! ## Example
//!
//! ```
//! use emberkv::protocol::{parse_command, CommandKind, RespValue};
//! use bytes::Bytes;
//!
//! let (command, consumed) = parse_command(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n").unwrap().unwrap();
//! assert_eq!(command.kind(), CommandKind::Get);
//! assert_eq!(consumed, 23);
//!
//! let reply = RespValue::bulk_string(Bytes::from("ember"));
//! assert_eq!(reply.serialize(), b"$5\r\nember\r\n");
//! ```

pub mod command;
pub mod parser;
pub mod types;

pub use command::{parse_command, Command, CommandKind};
pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
