use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::frame::Frame;
use crate::store::SharedStore;
use crate::Error;

/// Increments the number stored at `key` by one and replies with the new
/// value. A missing or expired key counts from zero.
///
/// Ref: <https://redis.io/docs/latest/commands/incr/>
#[derive(Debug, PartialEq)]
pub struct Incr {
    pub key: String,
}

impl Executable for Incr {
    fn exec(self, store: SharedStore) -> Result<Frame, Error> {
        let res = store.lock().unwrap().incr_by(&self.key, 1);

        let frame = match res {
            Ok(value) => Frame::Integer(value),
            Err(err) => Frame::Error(format!("ERR {}", err)),
        };
        Ok(frame)
    }
}

impl TryFrom<&mut CommandParser> for Incr {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string().map_err(|err| err.arity("incr"))?;
        parser.finish("incr")?;

        Ok(Self { key })
    }
}
