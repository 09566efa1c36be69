use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::Error;

/// Per-client connection state: the socket plus the codec's accumulation
/// buffer. Bytes read from the socket stay buffered until they form a
/// complete frame; the undecoded remainder is retained across reads.
pub struct Connection {
    pub id: Uuid,
    frames: Framed<TcpStream, FrameCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            frames: Framed::new(stream, FrameCodec),
        }
    }

    /// Reads the next complete frame, waiting for more bytes while only a
    /// partial frame has arrived.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly. A
    /// close in the middle of a frame, or malformed input, is an error.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        self.frames.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.frames.send(frame).await
    }
}
