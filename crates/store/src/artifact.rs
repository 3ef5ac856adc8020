//! Final artifact storage in the shared output directory.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use chunkferry_transfer::validate_artifact_name;

use crate::StoreError;

/// Finished-file storage. Artifacts live directly under the output root,
/// named by the caller-supplied artifact name.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// The output root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an artifact with this name lives (or would live) at.
    pub fn path(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_artifact_name(name).map_err(|e| StoreError::InvalidKey(e.to_string()))?;
        Ok(self.root.join(name))
    }

    /// `true` if an artifact with this name exists.
    pub async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(fs::try_exists(&self.path(name)?).await?)
    }

    /// Stores a whole file in one call (the non-chunked upload path).
    ///
    /// Staged to a temp file and renamed, so readers of the output
    /// directory never observe a partial artifact. An existing artifact
    /// with the same name is replaced atomically.
    pub async fn put(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let dest = self.path(name)?;
        let tmp = self.staging_path(name);

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

        tracing::info!(name, size = bytes.len(), "artifact stored");
        Ok(dest)
    }

    /// A fresh dot-prefixed staging path next to the destination.
    ///
    /// Same directory as the final name so the rename never crosses a
    /// filesystem boundary.
    pub(crate) fn staging_path(&self, name: &str) -> PathBuf {
        self.root.join(format!(".{name}.partial-{}", Uuid::new_v4()))
    }
}
