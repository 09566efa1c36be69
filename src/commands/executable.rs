use crate::frame::Frame;
use crate::store::SharedStore;
use crate::Error;

pub trait Executable {
    fn exec(self, store: SharedStore) -> Result<Frame, Error>;
}
