//! Server-side persistence for chunked uploads.
//!
//! A [`ChunkStore`] holds in-flight chunks under one directory per
//! fingerprint, an [`ArtifactStore`] holds finished files in the shared
//! output directory, and the [`MergeEngine`] turns a complete chunk set
//! into an artifact. The [`SessionRegistry`] provides the per-fingerprint
//! lock that keeps concurrent writes and the final merge race-free.

mod artifact;
mod chunks;
mod merge;
mod session;

pub use artifact::ArtifactStore;
pub use chunks::{ChunkStore, PutOutcome};
pub use merge::MergeEngine;
pub use session::{SessionRegistry, SessionState, UploadSession};

/// Errors produced by the store crate.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("nothing to merge for {fingerprint}")]
    NothingToMerge { fingerprint: String },

    #[error("chunk count mismatch: declared {declared}, stored {stored}")]
    ChunkCountMismatch { declared: u32, stored: u32 },

    #[error("chunk {index} missing from a full-count set")]
    MissingChunk { index: u32 },
}

impl StoreError {
    /// `true` for merge-precondition failures the client can fix and retry
    /// (as opposed to I/O faults).
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            StoreError::NothingToMerge { .. }
                | StoreError::ChunkCountMismatch { .. }
                | StoreError::MissingChunk { .. }
        )
    }
}
