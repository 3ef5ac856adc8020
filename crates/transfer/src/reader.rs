//! Per-chunk file reads with SHA-256 checksums.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::split::ChunkSpan;
use crate::TransferError;

/// One chunk's bytes plus transfer metadata.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 0-based chunk index.
    pub index: u32,
    /// Byte offset within the source file.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
    /// SHA-256 hex checksum of `data`.
    pub checksum: String,
}

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Reads the bytes of one [`ChunkSpan`] from the file at `path`.
///
/// Opens its own handle so concurrent chunk reads never contend on a
/// shared cursor. Blocking; see [`read_chunk_detached`] for async use.
pub fn read_chunk(path: &Path, span: ChunkSpan) -> Result<Chunk, TransferError> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(span.offset))?;

    let mut data = vec![0u8; span.len as usize];
    file.read_exact(&mut data)?;

    let checksum = checksum_bytes(&data);
    Ok(Chunk {
        index: span.index,
        offset: span.offset,
        data,
        checksum,
    })
}

/// Reads a chunk on a blocking worker thread.
pub async fn read_chunk_detached(path: PathBuf, span: ChunkSpan) -> Result<Chunk, TransferError> {
    tokio::task::spawn_blocking(move || read_chunk(&path, span))
        .await
        .map_err(|e| TransferError::Worker(e.to_string()))?
}
