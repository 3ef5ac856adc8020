//! Client-side file machinery: sampled fingerprinting, chunk planning, and
//! per-chunk reads with checksums.
//!
//! Nothing in this crate talks to the network; the upload orchestrator in
//! the client crate drives these pieces.

mod fingerprint;
mod reader;
mod split;
mod validation;

pub use fingerprint::{SAMPLE_LEN, fingerprint_file, fingerprint_file_detached};
pub use reader::{Chunk, checksum_bytes, read_chunk, read_chunk_detached};
pub use split::{ChunkSpan, chunk_count, chunk_spans};
pub use validation::{validate_artifact_name, validate_fingerprint};

/// Default chunk size: 4 MiB.
///
/// Larger chunks reduce per-chunk overhead (checksums, ACKs, syscalls).
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be at least 2 bytes, got {0}")]
    InvalidChunkSize(u64),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("background worker failed: {0}")]
    Worker(String),
}
