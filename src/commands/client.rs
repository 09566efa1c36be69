use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::frame::Frame;
use crate::store::SharedStore;
use crate::Error;

/// CLIENT subcommands (SETINFO and friends) configure per-connection
/// metadata that this server does not track. They are accepted and ignored
/// so that stock client libraries can complete their connection setup.
#[derive(Debug, PartialEq)]
pub struct Client;

impl Executable for Client {
    fn exec(self, _store: SharedStore) -> Result<Frame, Error> {
        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Client {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        while parser.next_bytes().is_ok() {}
        Ok(Self)
    }
}
