//! On-disk chunk storage, one directory per fingerprint.
//!
//! Layout: `<root>/<fingerprint>/<fingerprint>-<index>`. Writes are staged
//! to a dot-prefixed temp file in the same directory and renamed into
//! place, so a partially written chunk is never visible to [`list`] or the
//! merge engine.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use chunkferry_transfer::validate_fingerprint;

use crate::StoreError;

/// Result of a chunk `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The chunk was written.
    Stored,
    /// A chunk file for this `(fingerprint, index)` already existed; the
    /// incoming bytes were discarded and the call succeeded as a no-op.
    AlreadyPresent,
}

/// Chunk persistence rooted at the upload directory.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// The upload root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the chunks of one fingerprint.
    pub fn chunk_dir(&self, fingerprint: &str) -> PathBuf {
        self.root.join(fingerprint)
    }

    /// Path of one chunk file.
    pub fn chunk_path(&self, fingerprint: &str, index: u32) -> PathBuf {
        self.chunk_dir(fingerprint)
            .join(format!("{fingerprint}-{index}"))
    }

    /// Persists one chunk. Idempotent: if the chunk file already exists the
    /// call reports [`PutOutcome::AlreadyPresent`] without rewriting it.
    ///
    /// Safe under concurrent calls for the same key: each writer stages to
    /// its own temp file and the rename is atomic.
    pub async fn put(
        &self,
        fingerprint: &str,
        index: u32,
        bytes: &[u8],
    ) -> Result<PutOutcome, StoreError> {
        validate_fingerprint(fingerprint).map_err(|e| StoreError::InvalidKey(e.to_string()))?;

        let dir = self.chunk_dir(fingerprint);
        fs::create_dir_all(&dir).await?;

        let dest = self.chunk_path(fingerprint, index);
        if fs::try_exists(&dest).await? {
            tracing::debug!(fingerprint, index, "chunk already present, skipping write");
            return Ok(PutOutcome::AlreadyPresent);
        }

        let tmp = dir.join(format!(".stage-{index}-{}", Uuid::new_v4()));
        let result = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, &dest).await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(fingerprint, index, size = bytes.len(), "chunk stored");
        Ok(PutOutcome::Stored)
    }

    /// Indices currently stored for `fingerprint`.
    ///
    /// Staging temp files are excluded. A missing directory yields an
    /// empty set; contiguity is not assumed.
    pub async fn list(&self, fingerprint: &str) -> Result<BTreeSet<u32>, StoreError> {
        validate_fingerprint(fingerprint).map_err(|e| StoreError::InvalidKey(e.to_string()))?;

        let dir = self.chunk_dir(fingerprint);
        let mut indices = BTreeSet::new();

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(indices),
            Err(e) => return Err(e.into()),
        };

        let prefix = format!("{fingerprint}-");
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str()
                && let Some(rest) = name.strip_prefix(&prefix)
                && let Ok(index) = rest.parse::<u32>()
            {
                indices.insert(index);
            }
        }

        Ok(indices)
    }

    /// `true` if a chunk directory exists for `fingerprint`.
    pub async fn dir_exists(&self, fingerprint: &str) -> Result<bool, StoreError> {
        validate_fingerprint(fingerprint).map_err(|e| StoreError::InvalidKey(e.to_string()))?;
        Ok(fs::try_exists(&self.chunk_dir(fingerprint)).await?)
    }

    /// Removes every file under the fingerprint's directory and the
    /// directory itself. A missing directory is not an error.
    pub async fn remove_all(&self, fingerprint: &str) -> Result<(), StoreError> {
        validate_fingerprint(fingerprint).map_err(|e| StoreError::InvalidKey(e.to_string()))?;

        let dir = self.chunk_dir(fingerprint);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::debug!(fingerprint, "chunk directory removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
