pub mod client;
pub mod dbsize;
pub mod decr;
pub mod del;
pub mod echo;
pub mod executable;
pub mod exists;
pub mod get;
pub mod incr;
pub mod lpush;
pub mod lrange;
pub mod ping;
pub mod rpush;
pub mod set;
pub mod ttl;

use bytes::Bytes;
use std::{str, vec};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::store::SharedStore;
use crate::Error;

use client::Client;
use dbsize::DBSize;
use decr::Decr;
use del::Del;
use echo::Echo;
use exists::Exists;
use get::Get;
use incr::Incr;
use lpush::Lpush;
use lrange::Lrange;
use ping::Ping;
use rpush::Rpush;
use set::Set;
use ttl::Ttl;

#[derive(Debug, PartialEq)]
pub enum Command {
    Client(Client),
    DBSize(DBSize),
    Decr(Decr),
    Del(Del),
    Echo(Echo),
    Exists(Exists),
    Get(Get),
    Incr(Incr),
    Lpush(Lpush),
    Lrange(Lrange),
    Ping(Ping),
    Rpush(Rpush),
    Set(Set),
    Ttl(Ttl),
}

impl Executable for Command {
    fn exec(self, store: SharedStore) -> Result<Frame, Error> {
        match self {
            Command::Client(cmd) => cmd.exec(store),
            Command::DBSize(cmd) => cmd.exec(store),
            Command::Decr(cmd) => cmd.exec(store),
            Command::Del(cmd) => cmd.exec(store),
            Command::Echo(cmd) => cmd.exec(store),
            Command::Exists(cmd) => cmd.exec(store),
            Command::Get(cmd) => cmd.exec(store),
            Command::Incr(cmd) => cmd.exec(store),
            Command::Lpush(cmd) => cmd.exec(store),
            Command::Lrange(cmd) => cmd.exec(store),
            Command::Ping(cmd) => cmd.exec(store),
            Command::Rpush(cmd) => cmd.exec(store),
            Command::Set(cmd) => cmd.exec(store),
            Command::Ttl(cmd) => cmd.exec(store),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = Error;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the server as RESP arrays.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(CommandParserError::InvalidFrame {
                    expected: "array".to_string(),
                    actual: frame,
                }
                .into())
            }
        };

        let parser = &mut CommandParser {
            parts: frames.into_iter(),
        };

        let command_name = parser.parse_command_name()?;

        match &command_name[..] {
            "client" => Client::try_from(parser).map(Command::Client),
            "dbsize" => DBSize::try_from(parser).map(Command::DBSize),
            "decr" => Decr::try_from(parser).map(Command::Decr),
            "del" => Del::try_from(parser).map(Command::Del),
            "echo" => Echo::try_from(parser).map(Command::Echo),
            "exists" => Exists::try_from(parser).map(Command::Exists),
            "get" => Get::try_from(parser).map(Command::Get),
            "incr" => Incr::try_from(parser).map(Command::Incr),
            "lpush" => Lpush::try_from(parser).map(Command::Lpush),
            "lrange" => Lrange::try_from(parser).map(Command::Lrange),
            "ping" => Ping::try_from(parser).map(Command::Ping),
            "rpush" => Rpush::try_from(parser).map(Command::Rpush),
            "set" => Set::try_from(parser).map(Command::Set),
            "ttl" => Ttl::try_from(parser).map(Command::Ttl),
            _ => Err(CommandParserError::UnknownCommand {
                command: command_name,
            }
            .into()),
        }
    }
}

pub(crate) struct CommandParser {
    parts: vec::IntoIter<Frame>,
}

impl CommandParser {
    fn parse_command_name(&mut self) -> Result<String, CommandParserError> {
        let command_name = self.parts.next().ok_or(CommandParserError::EndOfStream)?;

        match command_name {
            Frame::Simple(s) => Ok(s.to_lowercase()),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_lowercase())
                .map_err(CommandParserError::InvalidUTF8String),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple string".to_string(),
                actual: frame,
            }),
        }
    }

    fn next_string(&mut self) -> Result<String, CommandParserError> {
        let frame = self.parts.next().ok_or(CommandParserError::EndOfStream)?;

        match frame {
            // Both `Simple` and `Bulk` representation may be strings.
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_string())
                .map_err(CommandParserError::InvalidUTF8String),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    fn next_integer(&mut self) -> Result<i64, CommandParserError> {
        let frame = self.parts.next().ok_or(CommandParserError::EndOfStream)?;

        match frame {
            Frame::Integer(i) => Ok(i),
            Frame::Simple(string) => {
                string
                    .parse::<i64>()
                    .map_err(|_| CommandParserError::InvalidFrame {
                        expected: "parseable i64 frame".to_string(),
                        actual: Frame::Simple(string),
                    })
            }
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map_err(CommandParserError::InvalidUTF8String)?
                .parse::<i64>()
                .map_err(|_| CommandParserError::InvalidFrame {
                    expected: "parseable i64 frame".to_string(),
                    actual: Frame::Bulk(bytes),
                }),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "integer".to_string(),
                actual: frame,
            }),
        }
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        let frame = self.parts.next().ok_or(CommandParserError::EndOfStream)?;

        match frame {
            Frame::Simple(s) => Ok(Bytes::from(s)),
            Frame::Bulk(bytes) => Ok(bytes),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    /// Fails with a wrong-arity error unless every argument frame has been
    /// consumed.
    fn finish(&mut self, command: &str) -> Result<(), CommandParserError> {
        match self.parts.next() {
            None => Ok(()),
            Some(_) => Err(CommandParserError::WrongNumberOfArguments {
                command: command.to_string(),
            }),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub(crate) enum CommandParserError {
    #[error("protocol error; invalid frame, expected {expected}, got {actual}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("wrong number of arguments for '{command}' command")]
    WrongNumberOfArguments { command: String },
    #[error("syntax error")]
    SyntaxError,
    #[error("invalid expire time in '{command}' command")]
    InvalidExpireTime { command: String },
    #[error("protocol error; invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
    #[error("protocol error; attempting to extract a value failed due to the frame being fully consumed")]
    EndOfStream,
}

impl CommandParserError {
    /// Running out of argument frames surfaces as a wrong-arity error that
    /// names the verb being parsed.
    fn arity(self, command: &str) -> CommandParserError {
        match self {
            CommandParserError::EndOfStream => CommandParserError::WrongNumberOfArguments {
                command: command.to_string(),
            },
            err => err,
        }
    }
}
