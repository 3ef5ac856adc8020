//! Upload orchestrator and WebSocket client.
//!
//! [`FileUploader`] drives a file to a fully-merged state on the server:
//! fingerprint in the background, probe for resumable chunks, upload the
//! missing ones with bounded parallelism and bounded retries, then issue
//! the merge. [`WsConnection`] is the concrete transport; the orchestrator
//! only sees the [`ServerConnection`] trait.

mod connection;
mod uploader;
mod ws;

pub use connection::{ResponseFuture, ServerConnection};
pub use uploader::{FileUploader, UploadEvent};
pub use ws::WsConnection;

use std::time::Duration;

/// Maximum chunk uploads in flight at once.
pub const PARALLEL_CHUNK_UPLOADS: usize = 4;

/// Attempts per chunk before the whole upload is reported failed.
pub const CHUNK_RETRY_ATTEMPTS: u32 = 3;

/// Pause between chunk retry attempts.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Errors produced by the client crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transfer(#[from] chunkferry_transfer::TransferError),

    #[error("WebSocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("server error {code}: {message}")]
    Server { code: i32, message: String },

    #[error("unexpected response: expected {expected}")]
    UnexpectedResponse { expected: &'static str },

    #[error("chunk {index} failed after {attempts} attempts: {reason}")]
    ChunkFailed {
        index: u32,
        attempts: u32,
        reason: String,
    },

    #[error("upload cancelled")]
    Cancelled,
}

impl ClientError {
    /// `true` for transient transport faults worth retrying at the chunk
    /// level. Local read errors and 4xx rejections are not retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Timeout | ClientError::Closed | ClientError::Ws(_) => true,
            ClientError::Server { code, .. } => *code >= 500,
            _ => false,
        }
    }
}
