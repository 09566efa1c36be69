use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use rustash::{server, Error};

const PORT: u16 = 6379;

#[derive(Parser, Debug)]
struct Args {
    /// The port to listen on
    #[arg(short, long, default_value_t = PORT)]
    port: u16,

    /// Snapshot file loaded on startup and written on shutdown
    #[arg(short, long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    let config = server::Config {
        port: args.port,
        snapshot: args.snapshot,
    };
    server::run(config, shutdown).await
}
