//! The production [`Handler`]: wires protocol operations to the chunk
//! store, artifact store, and merge engine.

use std::path::PathBuf;

use chunkferry_protocol::messages::{
    CheckChunksRequest, ChunkReceivedResponse, ChunkSetResponse, FileStoredResponse, MergeRequest,
    MergeResponse, UploadFileRequest,
};
use chunkferry_protocol::frame::ChunkFrameHeader;
use chunkferry_protocol::{Message, MessageType};
use chunkferry_store::{
    ArtifactStore, ChunkStore, MergeEngine, PutOutcome, SessionRegistry, StoreError,
};
use chunkferry_transfer::checksum_bytes;

use crate::connection::Sender;
use crate::handler::{Handler, HandlerFuture};

/// Upload handler over a single storage root.
///
/// Chunk directories and finished artifacts share the root: chunks under
/// `<root>/<fingerprint>/`, artifacts at `<root>/<name>`.
pub struct UploadHandler {
    chunks: ChunkStore,
    artifacts: ArtifactStore,
    sessions: SessionRegistry,
    merge: MergeEngine,
}

impl UploadHandler {
    /// Creates the handler, initializing the storage root.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let chunks = ChunkStore::new(&root).await?;
        let artifacts = ArtifactStore::new(&root).await?;
        let sessions = SessionRegistry::new();
        let merge = MergeEngine::new(chunks.clone(), artifacts.clone(), sessions.clone());
        Ok(Self {
            chunks,
            artifacts,
            sessions,
            merge,
        })
    }

    /// The chunk store backing this handler.
    pub fn chunk_store(&self) -> &ChunkStore {
        &self.chunks
    }

    /// The artifact store backing this handler.
    pub fn artifact_store(&self) -> &ArtifactStore {
        &self.artifacts
    }
}

/// Maps a store error onto a wire error code.
///
/// Validation failures are the client's fault (400), merge-precondition
/// failures are retryable integrity conflicts (409), everything else is a
/// server-side storage fault (500).
fn error_code(e: &StoreError) -> i32 {
    match e {
        StoreError::InvalidKey(_) => 400,
        e if e.is_integrity() => 409,
        _ => 500,
    }
}

impl Handler for UploadHandler {
    fn on_check_chunks(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let req: CheckChunksRequest = match msg.parse_payload() {
                Ok(Some(req)) => req,
                _ => {
                    let _ = sender.send_error(&msg, 400, "missing or invalid payload");
                    return;
                }
            };

            match self.chunks.list(&req.fingerprint).await {
                Ok(indices) => {
                    tracing::debug!(
                        fingerprint = %req.fingerprint,
                        stored = indices.len(),
                        "resume probe"
                    );
                    let resp = ChunkSetResponse {
                        fingerprint: req.fingerprint,
                        indices: indices.into_iter().collect(),
                    };
                    if let Ok(reply) = msg.reply(MessageType::ChunkSet, Some(&resp)) {
                        let _ = sender.send_msg(reply);
                    }
                }
                Err(e) => {
                    let _ = sender.send_error(&msg, error_code(&e), e.to_string());
                }
            }
        })
    }

    fn on_chunk_frame(
        &self,
        sender: Sender,
        header: ChunkFrameHeader,
        data: Vec<u8>,
    ) -> HandlerFuture<'_> {
        Box::pin(async move {
            if !header.checksum.is_empty() && checksum_bytes(&data) != header.checksum {
                tracing::warn!(
                    fingerprint = %header.fingerprint,
                    index = header.index,
                    "chunk checksum mismatch"
                );
                let _ = sender.send_msg(Message::error(
                    &header.id,
                    400,
                    "chunk checksum mismatch",
                ));
                return;
            }

            // Hold the fingerprint lock across the put so a concurrent
            // merge never consumes the directory mid-write.
            let session = self.sessions.session(&header.fingerprint);
            let mut state = session.lock().await;

            match self.chunks.put(&header.fingerprint, header.index, &data).await {
                Ok(outcome) => {
                    state.received.insert(header.index);

                    let resp = ChunkReceivedResponse {
                        fingerprint: header.fingerprint,
                        index: header.index,
                        already_present: outcome == PutOutcome::AlreadyPresent,
                    };
                    if let Ok(reply) = Message::new(&header.id, MessageType::ChunkReceived, Some(&resp)) {
                        let _ = sender.send_msg(reply);
                    }
                }
                Err(e) => {
                    let _ = sender.send_msg(Message::error(
                        &header.id,
                        error_code(&e),
                        e.to_string(),
                    ));
                }
            }
        })
    }

    fn on_merge(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let req: MergeRequest = match msg.parse_payload() {
                Ok(Some(req)) => req,
                _ => {
                    let _ = sender.send_error(&msg, 400, "missing or invalid payload");
                    return;
                }
            };

            match self.merge.merge(&req.fingerprint, req.total, &req.name).await {
                Ok(path) => {
                    let resp = MergeResponse {
                        fingerprint: req.fingerprint,
                        path: path.to_string_lossy().into_owned(),
                    };
                    if let Ok(reply) = msg.reply(MessageType::MergeResult, Some(&resp)) {
                        let _ = sender.send_msg(reply);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        fingerprint = %req.fingerprint,
                        total = req.total,
                        error = %e,
                        "merge failed"
                    );
                    let _ = sender.send_error(&msg, error_code(&e), e.to_string());
                }
            }
        })
    }

    fn on_upload_file(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let req: UploadFileRequest = match msg.parse_payload() {
                Ok(Some(req)) => req,
                _ => {
                    let _ = sender.send_error(&msg, 400, "missing or invalid payload");
                    return;
                }
            };

            match self.artifacts.put(&req.name, &req.data).await {
                Ok(path) => {
                    let resp = FileStoredResponse {
                        name: req.name,
                        path: path.to_string_lossy().into_owned(),
                    };
                    if let Ok(reply) = msg.reply(MessageType::FileStored, Some(&resp)) {
                        let _ = sender.send_msg(reply);
                    }
                }
                Err(e) => {
                    let _ = sender.send_error(&msg, error_code(&e), e.to_string());
                }
            }
        })
    }
}
