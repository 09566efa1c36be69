use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::frame::Frame;
use crate::store::SharedStore;
use crate::Error;

/// Pushes a value onto the tail of the list at `key` and replies with the
/// resulting length. A missing, expired, or string-typed entry is
/// reinitialized as an empty list first.
///
/// Ref: <https://redis.io/docs/latest/commands/rpush>
#[derive(Debug, PartialEq)]
pub struct Rpush {
    pub key: String,
    pub value: Bytes,
}

impl Executable for Rpush {
    fn exec(self, store: SharedStore) -> Result<Frame, Error> {
        let len = store.lock().unwrap().push_back(&self.key, self.value);

        Ok(Frame::Integer(len as i64))
    }
}

impl TryFrom<&mut CommandParser> for Rpush {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string().map_err(|err| err.arity("rpush"))?;
        let value = parser.next_bytes().map_err(|err| err.arity("rpush"))?;
        parser.finish("rpush")?;

        Ok(Self { key, value })
    }
}
