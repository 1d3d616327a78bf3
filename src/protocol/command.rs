//! Command Model
//!
//! Turns a decoded request frame into a [`Command`]: a kind tag plus the
//! ordered arguments that follow the verb. Verbs are matched
//! case-insensitively; `CONFIG GET` is recognized as one kind.
//!
//! A frame that is not a non-empty array of bulk strings is a
//! [`ParseError`], never a silent PING.

use crate::protocol::parser::{ParseError, ParseResult, RespParser};
use crate::protocol::types::RespValue;
use bytes::Bytes;

/// The command verbs this server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Ping,
    Echo,
    Get,
    Set,
    ConfigGet,
    Keys,
    Unrecognized,
}

impl CommandKind {
    fn from_verb(verb: &[u8]) -> Self {
        const VERBS: &[(&str, CommandKind)] = &[
            ("PING", CommandKind::Ping),
            ("ECHO", CommandKind::Echo),
            ("GET", CommandKind::Get),
            ("SET", CommandKind::Set),
            ("KEYS", CommandKind::Keys),
        ];

        VERBS
            .iter()
            .find(|(name, _)| name.as_bytes().eq_ignore_ascii_case(verb))
            .map(|(_, kind)| *kind)
            .unwrap_or(CommandKind::Unrecognized)
    }
}

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    /// The verb as the client sent it, e.g. `get` or `CONFIG SET`
    name: String,
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(kind: CommandKind, name: impl Into<String>, args: Vec<Bytes>) -> Self {
        Self {
            kind,
            name: name.into(),
            args,
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments after the verb (after `CONFIG GET` for [`CommandKind::ConfigGet`]).
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Builds a command from a decoded frame.
    pub fn from_frame(frame: RespValue) -> ParseResult<Self> {
        let RespValue::Array(items) = frame else {
            return Err(ParseError::ProtocolError(
                "expected '*', got something else".to_string(),
            ));
        };

        let mut parts = items
            .into_iter()
            .map(|item| match item {
                RespValue::BulkString(b) => Ok(b),
                _ => Err(ParseError::ProtocolError(
                    "expected '$', got something else".to_string(),
                )),
            })
            .collect::<ParseResult<Vec<Bytes>>>()?
            .into_iter();

        let Some(verb) = parts.next() else {
            return Err(ParseError::ProtocolError("empty command".to_string()));
        };
        let mut args: Vec<Bytes> = parts.collect();
        let mut name = String::from_utf8_lossy(&verb).into_owned();

        if verb.eq_ignore_ascii_case(b"CONFIG") {
            let Some(sub) = args.first().cloned() else {
                return Ok(Self::new(CommandKind::Unrecognized, name, args));
            };
            name = format!("{} {}", name, String::from_utf8_lossy(&sub));
            if sub.eq_ignore_ascii_case(b"GET") {
                args.remove(0);
                return Ok(Self::new(CommandKind::ConfigGet, name, args));
            }
            return Ok(Self::new(CommandKind::Unrecognized, name, args));
        }

        Ok(Self::new(CommandKind::from_verb(&verb), name, args))
    }
}

/// Parses one command from the start of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed, otherwise the command and
/// the number of bytes it occupied.
pub fn parse_command(buf: &[u8]) -> ParseResult<Option<(Command, usize)>> {
    match RespParser::new().parse(buf)? {
        Some((frame, consumed)) => Ok(Some((Command::from_frame(frame)?, consumed))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> Command {
        let (command, consumed) = parse_command(input).unwrap().unwrap();
        assert_eq!(consumed, input.len());
        command
    }

    #[test]
    fn test_ping() {
        let command = parse(b"*1\r\n$4\r\nPING\r\n");
        assert_eq!(command.kind(), CommandKind::Ping);
        assert!(command.args().is_empty());
    }

    #[test]
    fn test_verbs_are_case_insensitive() {
        assert_eq!(parse(b"*2\r\n$4\r\necho\r\n$3\r\nhey\r\n").kind(), CommandKind::Echo);
        assert_eq!(parse(b"*2\r\n$3\r\ngEt\r\n$1\r\nk\r\n").kind(), CommandKind::Get);
        assert_eq!(parse(b"*2\r\n$4\r\nkeys\r\n$1\r\n*\r\n").kind(), CommandKind::Keys);
    }

    #[test]
    fn test_set_with_px_arguments() {
        let command = parse(b"*5\r\n$3\r\nset\r\n$3\r\nfoo\r\n$3\r\nbar\r\n$2\r\npx\r\n$3\r\n100\r\n");
        assert_eq!(command.kind(), CommandKind::Set);
        assert_eq!(
            command.args(),
            &[
                Bytes::from("foo"),
                Bytes::from("bar"),
                Bytes::from("px"),
                Bytes::from("100"),
            ]
        );
    }

    #[test]
    fn test_config_get() {
        let command = parse(b"*3\r\n$6\r\nconfig\r\n$3\r\nget\r\n$3\r\ndir\r\n");
        assert_eq!(command.kind(), CommandKind::ConfigGet);
        assert_eq!(command.args(), &[Bytes::from("dir")]);
    }

    #[test]
    fn test_config_other_subcommand_is_unrecognized() {
        let command = parse(b"*3\r\n$6\r\nCONFIG\r\n$3\r\nSET\r\n$3\r\ndir\r\n");
        assert_eq!(command.kind(), CommandKind::Unrecognized);
        assert_eq!(command.name(), "CONFIG SET");
    }

    #[test]
    fn test_unknown_verb() {
        let command = parse(b"*1\r\n$5\r\nFLUSH\r\n");
        assert_eq!(command.kind(), CommandKind::Unrecognized);
        assert_eq!(command.name(), "FLUSH");
    }

    #[test]
    fn test_argument_count_is_not_fixed() {
        // Extra and missing arguments are kept as sent; the dispatcher checks arity
        let command = parse(b"*4\r\n$4\r\nECHO\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n");
        assert_eq!(command.args().len(), 3);

        let command = parse(b"*1\r\n$3\r\nGET\r\n");
        assert!(command.args().is_empty());
    }

    #[test]
    fn test_inline_ping() {
        assert_eq!(parse(b"PING\r\n").kind(), CommandKind::Ping);
    }

    #[test]
    fn test_incomplete_command() {
        assert!(parse_command(b"*2\r\n$3\r\nGET\r\n").unwrap().is_none());
    }

    #[test]
    fn test_malformed_frames_are_errors_not_ping() {
        assert!(parse_command(b"*0\r\n").is_err());
        assert!(parse_command(b"+PING\r\n").is_err());
        assert!(parse_command(b"*1\r\n:1\r\n").is_err());
        assert!(parse_command(b"*1\r\n$4\r\nPINGxx").is_err());
    }
}
