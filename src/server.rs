use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::commands::executable::Executable;
use crate::commands::Command;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::store::{SharedStore, Store};
use crate::Error;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Snapshot file loaded at startup (when present) and written on
    /// shutdown.
    pub snapshot: Option<PathBuf>,
}

/// Accepts connections until `shutdown` is cancelled, then waits for every
/// in-flight connection to finish and writes the snapshot, if one is
/// configured. Connection handling never blocks the accept loop.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt().try_init();

    let listener = TcpListener::bind(("127.0.0.1", config.port)).await?;
    let store = Arc::new(Mutex::new(open_store(&config)));

    info!("server listening on {}", listener.local_addr()?);

    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => {
                let (socket, client_address) = accepted?;
                let store = store.clone();
                info!("accepted connection from {:?}", client_address);

                connections.spawn(async move {
                    if let Err(e) = handle_connection(socket, client_address, store).await {
                        error!("connection error: {}", e);
                    }
                });
            }
        }
    }

    info!("shutting down, waiting for in-flight connections");
    while connections.join_next().await.is_some() {}

    if let Some(path) = &config.snapshot {
        match store.lock().unwrap().save(path) {
            Ok(()) => info!("saved snapshot to {}", path.display()),
            Err(e) => error!("failed to save snapshot to {}: {}", path.display(), e),
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Store {
    let mut store = Store::new();
    if let Some(path) = &config.snapshot {
        match store.load(path) {
            Ok(count) => info!("restored {} keys from {}", count, path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no snapshot at {}, starting empty", path.display())
            }
            Err(e) => error!("failed to load snapshot from {}: {}", path.display(), e),
        }
    }
    store
}

#[instrument(
    name = "connection",
    skip(stream, store),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    store: SharedStore,
) -> Result<(), Error> {
    let mut conn = Connection::new(stream);

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", client_address.to_string());

    while let Some(frame) = conn.read_frame().await? {
        debug!("received frame: {:?}", frame);

        let reply = match Command::try_from(frame) {
            Ok(cmd) => cmd.exec(store.clone())?,
            // Argument and unknown-command failures go back on the wire as
            // error replies; the connection stays open.
            Err(err) => Frame::Error(format!("ERR {}", err)),
        };

        debug!("sending reply: {:?}", reply);
        conn.write_frame(reply).await?;
    }

    debug!("connection closed");
    Ok(())
}
