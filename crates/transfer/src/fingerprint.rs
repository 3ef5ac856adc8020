//! Sampled file fingerprinting.
//!
//! Instead of hashing the whole file, a short sample is taken at every
//! half-chunk boundary and folded into an incremental MD5. The result is a
//! stable identity for resume and dedup that touches only
//! `O(file_size / chunk_size)` bytes, at the cost of not being a
//! cryptographic digest of the full content.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

use crate::TransferError;

/// Bytes sampled at each half-chunk boundary.
pub const SAMPLE_LEN: u64 = 10;

/// Computes the sampled fingerprint of the file at `path`.
///
/// With `half = chunk_size / 2`, samples `[half * i, half * i + SAMPLE_LEN)`
/// for `i = 0, 1, 2, …` while `half * (i + 1) + SAMPLE_LEN <= file_size`,
/// and returns the hex-encoded digest over the concatenated samples.
///
/// Deterministic: the same (content, chunk_size) pair always yields the
/// same fingerprint. Blocking; see [`fingerprint_file_detached`] for use
/// from async code.
pub fn fingerprint_file(path: &Path, chunk_size: u64) -> Result<String, TransferError> {
    if chunk_size < 2 {
        return Err(TransferError::InvalidChunkSize(chunk_size));
    }

    let mut file = File::open(path)?;
    let file_size = file.metadata()?.len();

    let half = chunk_size / 2;
    let mut hasher = Md5::new();
    let mut buf = [0u8; SAMPLE_LEN as usize];

    let mut i: u64 = 0;
    while half * (i + 1) + SAMPLE_LEN <= file_size {
        file.seek(SeekFrom::Start(half * i))?;
        file.read_exact(&mut buf)?;
        hasher.update(buf);
        i += 1;
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Computes the fingerprint on a blocking worker thread.
///
/// The file read runs off the async executor; the caller suspends on the
/// worker's completion message. An I/O failure is delivered to the caller
/// instead of a fingerprint; uploads must not proceed without one.
pub async fn fingerprint_file_detached(
    path: PathBuf,
    chunk_size: u64,
) -> Result<String, TransferError> {
    tokio::task::spawn_blocking(move || fingerprint_file(&path, chunk_size))
        .await
        .map_err(|e| TransferError::Worker(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..200u16).map(|i| (i % 251) as u8).collect();
        let path = create_test_file(dir.path(), "f.bin", &data);

        let a = fingerprint_file(&path, 64).unwrap();
        let b = fingerprint_file(&path, 64).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32); // MD5 = 32 hex chars.
    }

    #[test]
    fn fingerprint_depends_on_sampled_content() {
        let dir = TempDir::new().unwrap();
        let mut data = vec![0u8; 200];
        let path_a = create_test_file(dir.path(), "a.bin", &data);
        // Flip a byte inside the first sample window.
        data[3] = 0xFF;
        let path_b = create_test_file(dir.path(), "b.bin", &data);

        let a = fingerprint_file(&path_a, 64).unwrap();
        let b = fingerprint_file(&path_b, 64).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_depends_on_chunk_size() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let path = create_test_file(dir.path(), "f.bin", &data);

        let a = fingerprint_file(&path, 64).unwrap();
        let b = fingerprint_file(&path, 128).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn small_file_yields_empty_sample_fingerprint() {
        let dir = TempDir::new().unwrap();
        // File too small for even one sample at this chunk size: the
        // fingerprint is the digest of zero samples, still deterministic.
        let path = create_test_file(dir.path(), "tiny.bin", b"abc");
        let a = fingerprint_file(&path, 1024).unwrap();
        let b = fingerprint_file(&path, 1024).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sample_count_matches_rule() {
        let dir = TempDir::new().unwrap();
        // 25 bytes, chunk size 10 => half = 5. Condition 5*(i+1)+10 <= 25
        // holds for i = 0, 1, 2: three samples at offsets 0, 5, 10.
        let data = b"ABCDEFGHIJKLMNOPQRSTUVWXY";
        let path = create_test_file(dir.path(), "f.bin", data);

        let got = fingerprint_file(&path, 10).unwrap();

        let mut hasher = Md5::new();
        hasher.update(&data[0..10]);
        hasher.update(&data[5..15]);
        hasher.update(&data[10..20]);
        assert_eq!(got, hex::encode(hasher.finalize()));
    }

    #[test]
    fn rejects_degenerate_chunk_size() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "f.bin", b"some data here");
        assert!(matches!(
            fingerprint_file(&path, 0),
            Err(TransferError::InvalidChunkSize(0))
        ));
        assert!(matches!(
            fingerprint_file(&path, 1),
            Err(TransferError::InvalidChunkSize(1))
        ));
    }

    #[test]
    fn missing_file_propagates_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("does-not-exist.bin");
        assert!(matches!(
            fingerprint_file(&path, 1024),
            Err(TransferError::Io(_))
        ));
    }

    #[tokio::test]
    async fn detached_matches_blocking() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..500u16).map(|i| (i * 7 % 256) as u8).collect();
        let path = create_test_file(dir.path(), "f.bin", &data);

        let blocking = fingerprint_file(&path, 128).unwrap();
        let detached = fingerprint_file_detached(path, 128).await.unwrap();
        assert_eq!(blocking, detached);
    }

    #[tokio::test]
    async fn detached_propagates_read_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.bin");
        let result = fingerprint_file_detached(path, 1024).await;
        assert!(matches!(result, Err(TransferError::Io(_))));
    }
}
