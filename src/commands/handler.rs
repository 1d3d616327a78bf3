//! Command Handler
//!
//! Maps each [`Command`] to a store operation and a reply. The handler holds
//! no state of its own beyond the shared storage engine and the read-only
//! server configuration.
//!
//! | Command                      | Reply                                 |
//! |------------------------------|---------------------------------------|
//! | `PING [message]`             | `+PONG` or the message as bulk        |
//! | `ECHO message`               | bulk message                          |
//! | `SET key value [PX ms|EX s]` | `+OK`                                 |
//! | `GET key`                    | bulk value or null bulk               |
//! | `CONFIG GET param`           | `[param, value]`, value `""` if unknown |
//! | `KEYS pattern`               | array of matching non-expired keys    |
//! | anything else                | `-ERR unknown command '<name>'`       |

use crate::config::ServerConfig;
use crate::protocol::{Command, CommandKind, RespValue};
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Dispatches parsed commands against the storage engine.
#[derive(Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
    config: Arc<ServerConfig>,
}

impl CommandHandler {
    pub fn new(storage: Arc<StorageEngine>, config: Arc<ServerConfig>) -> Self {
        Self { storage, config }
    }

    /// Executes a command and returns the reply to send back.
    pub fn execute(&self, command: Command) -> RespValue {
        trace!(command = command.name(), args = command.args().len(), "Executing command");

        let args = command.args();
        match command.kind() {
            CommandKind::Ping => self.cmd_ping(args),
            CommandKind::Echo => self.cmd_echo(args),
            CommandKind::Set => self.cmd_set(args),
            CommandKind::Get => self.cmd_get(args),
            CommandKind::ConfigGet => self.cmd_config_get(args),
            CommandKind::Keys => self.cmd_keys(args),
            CommandKind::Unrecognized => {
                RespValue::error(format!("ERR unknown command '{}'", command.name()))
            }
        }
    }

    /// PING [message]
    fn cmd_ping(&self, args: &[Bytes]) -> RespValue {
        match args {
            [] => RespValue::pong(),
            [message] => RespValue::bulk_string(message.clone()),
            _ => wrong_arity("ping"),
        }
    }

    /// ECHO message
    fn cmd_echo(&self, args: &[Bytes]) -> RespValue {
        match args {
            [message] => RespValue::bulk_string(message.clone()),
            _ => wrong_arity("echo"),
        }
    }

    /// SET key value [PX milliseconds | EX seconds]
    fn cmd_set(&self, args: &[Bytes]) -> RespValue {
        let [key, value, options @ ..] = args else {
            return wrong_arity("set");
        };

        let mut ttl: Option<Duration> = None;
        let mut rest = options.iter();
        while let Some(option) = rest.next() {
            let to_duration: fn(u64) -> Duration = if option.eq_ignore_ascii_case(b"PX") {
                Duration::from_millis
            } else if option.eq_ignore_ascii_case(b"EX") {
                Duration::from_secs
            } else {
                return RespValue::error("ERR syntax error");
            };

            if ttl.is_some() {
                return RespValue::error("ERR syntax error");
            }

            let Some(amount) = rest.next() else {
                return RespValue::error("ERR syntax error");
            };

            match parse_positive(amount) {
                Some(n) => ttl = Some(to_duration(n)),
                None => return RespValue::error("ERR invalid expire time in 'set' command"),
            }
        }

        match ttl {
            Some(ttl) => self.storage.set_with_ttl(key.clone(), value.clone(), ttl),
            None => self.storage.set(key.clone(), value.clone()),
        }

        RespValue::ok()
    }

    /// GET key
    fn cmd_get(&self, args: &[Bytes]) -> RespValue {
        match args {
            [key] => RespValue::optional_bulk(self.storage.get(key)),
            _ => wrong_arity("get"),
        }
    }

    /// CONFIG GET parameter [parameter ...]
    fn cmd_config_get(&self, args: &[Bytes]) -> RespValue {
        if args.is_empty() {
            return wrong_arity("config|get");
        }

        let mut pairs = Vec::with_capacity(args.len() * 2);
        for param in args {
            let value = std::str::from_utf8(param)
                .ok()
                .and_then(|name| self.config.get(name))
                .unwrap_or("");
            pairs.push(param.clone());
            pairs.push(Bytes::copy_from_slice(value.as_bytes()));
        }

        RespValue::bulk_array(pairs)
    }

    /// KEYS pattern
    fn cmd_keys(&self, args: &[Bytes]) -> RespValue {
        match args {
            [pattern] => {
                let pattern = String::from_utf8_lossy(pattern);
                RespValue::bulk_array(self.storage.keys(&pattern))
            }
            _ => wrong_arity("keys"),
        }
    }
}

fn wrong_arity(command: &str) -> RespValue {
    RespValue::error(format!(
        "ERR wrong number of arguments for '{}' command",
        command
    ))
}

fn parse_positive(raw: &[u8]) -> Option<u64> {
    std::str::from_utf8(raw)
        .ok()?
        .parse::<u64>()
        .ok()
        .filter(|&n| n > 0)
}
