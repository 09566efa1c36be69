use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::frame::Frame;
use crate::store::SharedStore;
use crate::Error;

/// Get the value of `key`. If the key does not exist, has expired, or does
/// not hold a string, the special value `nil` is returned.
///
/// Ref: <https://redis.io/docs/latest/commands/get/>
#[derive(Debug, PartialEq)]
pub struct Get {
    pub key: String,
}

impl Executable for Get {
    fn exec(self, store: SharedStore) -> Result<Frame, Error> {
        let value = store.lock().unwrap().get(&self.key);

        match value {
            Some(value) => Ok(Frame::Bulk(value)),
            None => Ok(Frame::Null),
        }
    }
}

impl TryFrom<&mut CommandParser> for Get {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string().map_err(|err| err.arity("get"))?;
        parser.finish("get")?;

        Ok(Self { key })
    }
}
