//! chunkferry upload server daemon.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use chunkferry_server::{ServerConfig, ServerError, UploadHandler, UploadServer};

#[derive(Parser)]
#[command(name = "chunkferryd")]
#[command(about = "Chunked-upload server: receives chunks, merges artifacts")]
struct Cli {
    /// TCP port to listen on (0 = OS-assigned)
    #[arg(short, long, default_value_t = 8090)]
    port: u16,

    /// Storage root for in-flight chunks and finished artifacts
    #[arg(short, long, default_value = "uploads")]
    root: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let handler = UploadHandler::new(&cli.root).await?;
    let server = UploadServer::new(ServerConfig { port: cli.port }, handler);

    let shutdown = Arc::clone(&server);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received ctrl-c, shutting down");
            shutdown.shutdown();
        }
    });

    server.run().await
}
