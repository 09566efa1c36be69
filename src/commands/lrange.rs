use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::frame::Frame;
use crate::store::SharedStore;
use crate::Error;

/// Replies with the inclusive slice `[start, stop]` of the list at `key` as
/// an array of bulk strings. Negative indices count from the tail.
///
/// Ref: <https://redis.io/docs/latest/commands/lrange>
#[derive(Debug, PartialEq)]
pub struct Lrange {
    pub key: String,
    pub start: i64,
    pub stop: i64,
}

impl Executable for Lrange {
    fn exec(self, store: SharedStore) -> Result<Frame, Error> {
        let items = store
            .lock()
            .unwrap()
            .lrange(&self.key, self.start, self.stop);

        Ok(Frame::Array(items.into_iter().map(Frame::Bulk).collect()))
    }
}

impl TryFrom<&mut CommandParser> for Lrange {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string().map_err(|err| err.arity("lrange"))?;
        let start = parser.next_integer().map_err(|err| err.arity("lrange"))?;
        let stop = parser.next_integer().map_err(|err| err.arity("lrange"))?;
        parser.finish("lrange")?;

        Ok(Self { key, start, stop })
    }
}
