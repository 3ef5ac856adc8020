//! Assembles a complete chunk set into the final artifact.
//!
//! The merge is a strict sequential fold in index order: index order is
//! the only ordering the source file's byte layout relies on, never
//! arrival order. The destination is staged under a temp name and renamed
//! only after every chunk has been appended and synced; chunk files are
//! deleted only after the rename, so a failed merge leaves the complete
//! chunk set on disk for a retry.

use std::path::PathBuf;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::artifact::ArtifactStore;
use crate::chunks::ChunkStore;
use crate::session::SessionRegistry;
use crate::StoreError;

/// Merge engine over a chunk store and an artifact store sharing one
/// upload root.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    chunks: ChunkStore,
    artifacts: ArtifactStore,
    sessions: SessionRegistry,
}

impl MergeEngine {
    pub fn new(chunks: ChunkStore, artifacts: ArtifactStore, sessions: SessionRegistry) -> Self {
        Self {
            chunks,
            artifacts,
            sessions,
        }
    }

    /// Merges the chunks of `fingerprint` into the artifact `name`.
    ///
    /// Preconditions, checked in order under the fingerprint lock:
    /// 1. Artifact already exists: clean up any leftover chunk directory
    ///    and return the existing path (idempotent merge).
    /// 2. No chunk directory: [`StoreError::NothingToMerge`].
    /// 3. Stored count differs from `total`, or `total` is zero:
    ///    [`StoreError::ChunkCountMismatch`].
    ///
    /// On success the chunk directory is gone and the artifact path is
    /// returned. On failure no chunk is lost and no artifact appears.
    pub async fn merge(
        &self,
        fingerprint: &str,
        total: u32,
        name: &str,
    ) -> Result<PathBuf, StoreError> {
        let dest = self.artifacts.path(name)?;

        // Per-fingerprint lock: serializes against concurrent chunk puts
        // and duplicate merge invocations for the same upload.
        let session = self.sessions.session(fingerprint);
        let mut state = session.lock().await;

        if state.merged || self.artifacts.exists(name).await? {
            self.chunks.remove_all(fingerprint).await?;
            state.merged = true;
            tracing::info!(fingerprint, name, "already merged, returning existing artifact");
            return Ok(dest);
        }

        if !self.chunks.dir_exists(fingerprint).await? {
            return Err(StoreError::NothingToMerge {
                fingerprint: fingerprint.to_string(),
            });
        }

        let stored = self.chunks.list(fingerprint).await?;
        if total == 0 || stored.len() != total as usize {
            return Err(StoreError::ChunkCountMismatch {
                declared: total,
                stored: stored.len() as u32,
            });
        }
        if let Some(index) = (0..total).find(|i| !stored.contains(i)) {
            return Err(StoreError::MissingChunk { index });
        }

        let tmp = self.artifacts.staging_path(name);
        if let Err(e) = self.write_merged(fingerprint, total, &tmp).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp, &dest).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        // The artifact is durable; chunk cleanup failures only leak disk
        // space, so they are logged rather than failing the merge.
        if let Err(e) = self.chunks.remove_all(fingerprint).await {
            tracing::warn!(fingerprint, error = %e, "failed to remove merged chunk directory");
        }

        state.merged = true;
        drop(state);
        self.sessions.remove(fingerprint);

        tracing::info!(fingerprint, total, name, "merge complete");
        Ok(dest)
    }

    /// Appends chunks `0..total` in index order into `tmp` and syncs it.
    async fn write_merged(
        &self,
        fingerprint: &str,
        total: u32,
        tmp: &std::path::Path,
    ) -> Result<(), StoreError> {
        let mut dest = fs::File::create(tmp).await?;
        for index in 0..total {
            let chunk_path = self.chunks.chunk_path(fingerprint, index);
            let data = fs::read(&chunk_path).await?;
            dest.write_all(&data).await?;
        }
        dest.sync_all().await?;
        Ok(())
    }
}
