//! Message types, size limits, and request timeouts shared by both sides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum WebSocket message size (header + chunk payload).
///
/// Must leave headroom above the largest configured chunk size so a binary
/// chunk frame never gets rejected by the transport.
pub const WS_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Timeout for control requests (resume probe, merge, whole-file upload).
pub const WS_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for binary chunk frames.
///
/// Longer than [`WS_REQUEST_TIMEOUT`] to absorb slow disk I/O on the
/// server while it stages a multi-megabyte chunk.
pub const WS_CHUNK_TIMEOUT: Duration = Duration::from_secs(60);

/// All message types exchanged between client and server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Client -> server: resume probe for a fingerprint.
    CheckChunks,
    /// Server -> client: indices currently stored for a fingerprint.
    ChunkSet,
    /// Server -> client: acknowledgment for one binary chunk frame.
    ChunkReceived,
    /// Client -> server: assemble all chunks into the final artifact.
    MergeUpload,
    /// Server -> client: merge succeeded, artifact path attached.
    MergeResult,
    /// Client -> server: non-chunked direct upload of a small file.
    UploadFile,
    /// Server -> client: whole-file upload stored.
    FileStored,
    Ping,
    Pong,
    Error,
}
