//! The upload orchestrator.
//!
//! Drives one file to a fully-merged state: background fingerprint,
//! resume probe, bounded-parallel upload of the missing chunks with
//! bounded retries, then a single merge request whose response is
//! authoritative.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use chunkferry_protocol::messages::{
    CheckChunksRequest, ChunkReceivedResponse, ChunkSetResponse, FileStoredResponse, MergeRequest,
    MergeResponse, UploadFileRequest,
};
use chunkferry_protocol::{Message, MessageType};
use chunkferry_transfer::{
    ChunkSpan, DEFAULT_CHUNK_SIZE, chunk_count, chunk_spans, fingerprint_file_detached,
    read_chunk_detached,
};

use crate::connection::ServerConnection;
use crate::{CHUNK_RETRY_ATTEMPTS, ClientError, PARALLEL_CHUNK_UPLOADS, RETRY_BACKOFF};

/// Progress events emitted while an upload runs.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// Fingerprint computation started.
    Fingerprinting,
    /// Resume probe answered: `already_stored` of `total` chunks are
    /// already on the server.
    Probed {
        fingerprint: String,
        already_stored: usize,
        total: u32,
    },
    /// One chunk acknowledged.
    ChunkUploaded {
        index: u32,
        bytes: u64,
        already_present: bool,
    },
    /// Merge succeeded; the upload is complete.
    Merged { path: String },
}

/// Uploads files to one server connection.
pub struct FileUploader {
    conn: Arc<dyn ServerConnection>,
    cancel: CancellationToken,
}

impl FileUploader {
    pub fn new(conn: Arc<dyn ServerConnection>) -> Self {
        Self {
            conn,
            cancel: CancellationToken::new(),
        }
    }

    /// Token for abandoning in-flight uploads. Chunks not yet sent are
    /// simply not issued; chunks already on the server stay there for a
    /// later resume with the same fingerprint.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Uploads `path` in chunks and merges it into the artifact `name`.
    ///
    /// A `chunk_size` of 0 selects [`DEFAULT_CHUNK_SIZE`].
    ///
    /// Returns the server-side artifact path. On a chunk failure after
    /// all retries the error names the failing index; the upload is
    /// resumable because persisted chunks survive on the server.
    pub async fn upload(
        &self,
        path: &Path,
        name: &str,
        chunk_size: u64,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<String, ClientError> {
        self.check_cancelled()?;
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        let _ = events_tx.send(UploadEvent::Fingerprinting).await;

        // A read failure here aborts the upload before any network
        // activity; never upload without a valid fingerprint.
        let file_size = tokio::fs::metadata(path).await?.len();
        let fingerprint = fingerprint_file_detached(path.to_path_buf(), chunk_size).await?;
        let total = chunk_count(file_size, chunk_size)?;
        debug!(%fingerprint, file_size, total, "fingerprint computed");

        self.check_cancelled()?;
        let present = self.check_chunks(&fingerprint).await?;
        let _ = events_tx
            .send(UploadEvent::Probed {
                fingerprint: fingerprint.clone(),
                already_stored: present.len(),
                total,
            })
            .await;

        let missing: Vec<ChunkSpan> = chunk_spans(file_size, chunk_size)?
            .filter(|span| !present.contains(&span.index))
            .collect();
        debug!(
            %fingerprint,
            resumed = present.len(),
            missing = missing.len(),
            "uploading missing chunks"
        );

        stream::iter(
            missing
                .into_iter()
                .map(|span| self.upload_chunk(path, &fingerprint, span, events_tx)),
        )
        .buffer_unordered(PARALLEL_CHUNK_UPLOADS)
        .try_collect::<Vec<()>>()
        .await?;

        self.check_cancelled()?;
        let merged = self.merge(&fingerprint, total, name).await?;
        let _ = events_tx
            .send(UploadEvent::Merged {
                path: merged.clone(),
            })
            .await;
        Ok(merged)
    }

    /// Uploads a small file in one request, bypassing fingerprinting and
    /// chunking entirely.
    pub async fn upload_whole(&self, path: &Path, name: &str) -> Result<String, ClientError> {
        self.check_cancelled()?;

        let data = tokio::fs::read(path).await?;
        let req = UploadFileRequest {
            name: name.to_string(),
            data,
        };
        let resp = self
            .conn
            .send_request(MessageType::UploadFile, &serde_json::to_value(&req)?)
            .await?;
        let stored: FileStoredResponse = expect_payload(&resp, MessageType::FileStored)?;
        Ok(stored.path)
    }

    /// Resume probe. Idempotent and side-effect-free on the server.
    async fn check_chunks(&self, fingerprint: &str) -> Result<BTreeSet<u32>, ClientError> {
        let req = CheckChunksRequest {
            fingerprint: fingerprint.to_string(),
        };
        let resp = self
            .conn
            .send_request(MessageType::CheckChunks, &serde_json::to_value(&req)?)
            .await?;
        let set: ChunkSetResponse = expect_payload(&resp, MessageType::ChunkSet)?;
        Ok(set.indices.into_iter().collect())
    }

    /// Uploads one chunk with bounded retries.
    async fn upload_chunk(
        &self,
        path: &Path,
        fingerprint: &str,
        span: ChunkSpan,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<(), ClientError> {
        let mut attempt = 1u32;
        loop {
            self.check_cancelled()?;
            match self.try_send_chunk(path, fingerprint, span).await {
                Ok(already_present) => {
                    let _ = events_tx
                        .send(UploadEvent::ChunkUploaded {
                            index: span.index,
                            bytes: span.len,
                            already_present,
                        })
                        .await;
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < CHUNK_RETRY_ATTEMPTS => {
                    warn!(
                        index = span.index,
                        attempt,
                        error = %e,
                        "chunk upload failed, retrying"
                    );
                    tokio::time::sleep(RETRY_BACKOFF).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(ClientError::ChunkFailed {
                        index: span.index,
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    /// One chunk upload attempt: lazy read, binary frame, ack.
    async fn try_send_chunk(
        &self,
        path: &Path,
        fingerprint: &str,
        span: ChunkSpan,
    ) -> Result<bool, ClientError> {
        let chunk = read_chunk_detached(path.to_path_buf(), span).await?;
        let header = serde_json::json!({
            "fingerprint": fingerprint,
            "index": chunk.index,
            "checksum": chunk.checksum,
        });
        let resp = self.conn.send_chunk(&header, &chunk.data).await?;
        let ack: ChunkReceivedResponse = expect_payload(&resp, MessageType::ChunkReceived)?;
        Ok(ack.already_present)
    }

    async fn merge(
        &self,
        fingerprint: &str,
        total: u32,
        name: &str,
    ) -> Result<String, ClientError> {
        let req = MergeRequest {
            fingerprint: fingerprint.to_string(),
            total,
            name: name.to_string(),
        };
        let resp = self
            .conn
            .send_request(MessageType::MergeUpload, &serde_json::to_value(&req)?)
            .await?;
        let merged: MergeResponse = expect_payload(&resp, MessageType::MergeResult)?;
        Ok(merged.path)
    }

    fn check_cancelled(&self) -> Result<(), ClientError> {
        if self.cancel.is_cancelled() {
            Err(ClientError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Checks the reply type and parses its payload.
fn expect_payload<T: DeserializeOwned>(
    msg: &Message,
    want: MessageType,
) -> Result<T, ClientError> {
    if msg.msg_type != want {
        return Err(ClientError::UnexpectedResponse {
            expected: message_type_name(want),
        });
    }
    msg.parse_payload()?.ok_or(ClientError::UnexpectedResponse {
        expected: message_type_name(want),
    })
}

fn message_type_name(msg_type: MessageType) -> &'static str {
    match msg_type {
        MessageType::ChunkSet => "chunk_set",
        MessageType::ChunkReceived => "chunk_received",
        MessageType::MergeResult => "merge_result",
        MessageType::FileStored => "file_stored",
        _ => "response",
    }
}
