use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::frame::Frame;
use crate::store::SharedStore;
use crate::Error;

/// TTL returns the remaining time to live of a key that has a timeout, in
/// seconds: `-1` when the key has no expiry, `-2` when it does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/ttl>
#[derive(Debug, PartialEq)]
pub struct Ttl {
    pub key: String,
}

impl Executable for Ttl {
    fn exec(self, store: SharedStore) -> Result<Frame, Error> {
        let ttl = store.lock().unwrap().ttl(&self.key);

        let seconds = match ttl {
            None => -2,
            Some(None) => -1,
            Some(Some(remaining)) => remaining.as_secs() as i64,
        };
        Ok(Frame::Integer(seconds))
    }
}

impl TryFrom<&mut CommandParser> for Ttl {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string().map_err(|err| err.arity("ttl"))?;
        parser.finish("ttl")?;

        Ok(Self { key })
    }
}
