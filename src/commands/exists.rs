use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::frame::Frame;
use crate::store::SharedStore;
use crate::Error;

/// Returns whether `key` is present and not expired, as `1` or `0`.
///
/// Ref: <https://redis.io/docs/latest/commands/exists>
#[derive(Debug, PartialEq)]
pub struct Exists {
    pub key: String,
}

impl Executable for Exists {
    fn exec(self, store: SharedStore) -> Result<Frame, Error> {
        let exists = store.lock().unwrap().exists(&self.key);

        Ok(Frame::Integer(i64::from(exists)))
    }
}

impl TryFrom<&mut CommandParser> for Exists {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string().map_err(|err| err.arity("exists"))?;
        parser.finish("exists")?;

        Ok(Self { key })
    }
}
