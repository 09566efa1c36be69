use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::frame::Frame;
use crate::store::SharedStore;
use crate::Error;

/// Replies with the number of live keys.
///
/// Ref: <https://redis.io/docs/latest/commands/dbsize>
#[derive(Debug, PartialEq)]
pub struct DBSize;

impl Executable for DBSize {
    fn exec(self, store: SharedStore) -> Result<Frame, Error> {
        let size = store.lock().unwrap().size();

        Ok(Frame::Integer(size as i64))
    }
}

impl TryFrom<&mut CommandParser> for DBSize {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.finish("dbsize")?;
        Ok(Self)
    }
}
