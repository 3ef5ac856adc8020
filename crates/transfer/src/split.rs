//! Pure chunk planning: which byte ranges make up each chunk.
//!
//! No bytes are read here; the orchestrator reads each span lazily so at
//! most one chunk per in-flight transfer is held in memory.

use crate::TransferError;

/// One planned chunk: a contiguous byte range of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// 0-based chunk index, contiguous, no gaps.
    pub index: u32,
    /// Byte offset of the first byte.
    pub offset: u64,
    /// Length in bytes; only the last chunk may be shorter than the
    /// chunk size.
    pub len: u64,
}

/// Number of chunks for a file: `ceil(file_size / chunk_size)`.
pub fn chunk_count(file_size: u64, chunk_size: u64) -> Result<u32, TransferError> {
    if chunk_size < 2 {
        return Err(TransferError::InvalidChunkSize(chunk_size));
    }
    Ok(file_size.div_ceil(chunk_size) as u32)
}

/// Lazy sequence of [`ChunkSpan`]s covering `[0, file_size)` with no gaps
/// or overlaps. Restartable: call again for a fresh iterator.
pub fn chunk_spans(
    file_size: u64,
    chunk_size: u64,
) -> Result<impl Iterator<Item = ChunkSpan> + Clone, TransferError> {
    let count = chunk_count(file_size, chunk_size)?;
    Ok((0..count).map(move |index| {
        let offset = index as u64 * chunk_size;
        ChunkSpan {
            index,
            offset,
            len: chunk_size.min(file_size - offset),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_is_ceiling() {
        assert_eq!(chunk_count(0, 10).unwrap(), 0);
        assert_eq!(chunk_count(1, 10).unwrap(), 1);
        assert_eq!(chunk_count(10, 10).unwrap(), 1);
        assert_eq!(chunk_count(11, 10).unwrap(), 2);
        assert_eq!(chunk_count(25, 10).unwrap(), 3);
    }

    #[test]
    fn spans_cover_file_without_gaps_or_overlaps() {
        let spans: Vec<ChunkSpan> = chunk_spans(25, 10).unwrap().collect();
        assert_eq!(spans.len(), 3);

        let mut expected_offset = 0;
        for (i, span) in spans.iter().enumerate() {
            assert_eq!(span.index as usize, i);
            assert_eq!(span.offset, expected_offset);
            assert!(span.len > 0);
            expected_offset += span.len;
        }
        assert_eq!(expected_offset, 25);
        assert_eq!(spans[2].len, 5); // short tail
    }

    #[test]
    fn exact_multiple_has_full_tail() {
        let spans: Vec<ChunkSpan> = chunk_spans(30, 10).unwrap().collect();
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[2].len, 10);
    }

    #[test]
    fn empty_file_yields_no_spans() {
        assert_eq!(chunk_spans(0, 10).unwrap().count(), 0);
    }

    #[test]
    fn iterator_is_restartable() {
        let spans = chunk_spans(100, 32).unwrap();
        let first: Vec<ChunkSpan> = spans.clone().collect();
        let second: Vec<ChunkSpan> = spans.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_degenerate_chunk_size() {
        assert!(chunk_count(100, 0).is_err());
        assert!(chunk_spans(100, 1).is_err());
    }
}
