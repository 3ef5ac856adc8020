//! WebSocket upload server.
//!
//! Listens on a TCP port, upgrades connections to WebSocket, and
//! dispatches JSON and binary messages to a [`Handler`]. The bundled
//! [`UploadHandler`] wires the protocol operations to the chunk store and
//! merge engine.

mod connection;
mod handler;
mod server;
mod upload;

pub use connection::Sender;
pub use handler::{Handler, HandlerFuture};
pub use server::{ServerConfig, UploadServer};
pub use upload::UploadHandler;

/// Per-connection send buffer capacity.
///
/// Replies are queued with `try_send`; a saturated buffer drops the reply
/// and the client's request times out, so the buffer is sized well above
/// the number of requests a client keeps in flight.
pub const SEND_BUFFER_SIZE: usize = 2048;

/// Errors produced by the upload server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] chunkferry_store::StoreError),

    #[error("send buffer full")]
    SendBufferFull,

    #[error("connection closed")]
    Closed,
}
