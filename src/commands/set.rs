use bytes::Bytes;
use tokio::time::Duration;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::SharedStore;
use crate::Error;

/// Stores a string value under `key`, replacing any prior entry. The
/// trailing `EX seconds` / `PX millis` options set an expiry; they may
/// repeat, and the last one wins.
///
/// Ref: <https://redis.io/docs/latest/commands/set>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: String,
    pub value: Bytes,
    pub ttl: Option<Duration>,
}

impl Executable for Set {
    fn exec(self, store: SharedStore) -> Result<Frame, Error> {
        let mut store = store.lock().unwrap();
        store.set(self.key, self.value, self.ttl);

        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string().map_err(|err| err.arity("set"))?;
        let value = parser.next_bytes().map_err(|err| err.arity("set"))?;

        let mut ttl = None;
        loop {
            let option = match parser.next_string() {
                Ok(option) => option,
                Err(CommandParserError::EndOfStream) => break,
                Err(err) => return Err(err.into()),
            };

            match option.to_uppercase().as_str() {
                "EX" => {
                    let seconds = parser
                        .next_integer()
                        .map_err(|_| CommandParserError::SyntaxError)?;
                    ttl = Some(expire_duration(Duration::from_secs, seconds)?);
                }
                "PX" => {
                    let millis = parser
                        .next_integer()
                        .map_err(|_| CommandParserError::SyntaxError)?;
                    ttl = Some(expire_duration(Duration::from_millis, millis)?);
                }
                // An unrecognized option aborts the command before any write.
                _ => return Err(CommandParserError::SyntaxError.into()),
            }
        }

        Ok(Self { key, value, ttl })
    }
}

fn expire_duration(make: fn(u64) -> Duration, value: i64) -> Result<Duration, CommandParserError> {
    u64::try_from(value)
        .ok()
        .filter(|value| *value > 0)
        .map(make)
        .ok_or(CommandParserError::InvalidExpireTime {
            command: "set".to_string(),
        })
}
