use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::SharedStore;
use crate::Error;

/// Removes the given keys and replies with the number actually removed.
///
/// Ref: <https://redis.io/docs/latest/commands/del>
#[derive(Debug, PartialEq)]
pub struct Del {
    pub keys: Vec<String>,
}

impl Executable for Del {
    fn exec(self, store: SharedStore) -> Result<Frame, Error> {
        let mut count = 0;
        let mut store = store.lock().unwrap();
        for key in self.keys {
            if store.remove(&key) {
                count += 1;
            }
        }

        Ok(Frame::Integer(count))
    }
}

impl TryFrom<&mut CommandParser> for Del {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let mut keys = vec![];

        loop {
            match parser.next_string() {
                Ok(key) => keys.push(key),
                Err(CommandParserError::EndOfStream) if !keys.is_empty() => {
                    break;
                }
                Err(err) => return Err(err.arity("del").into()),
            }
        }

        Ok(Self { keys })
    }
}
