//! WebSocket transport with request-response correlation.
//!
//! Every outgoing request carries a UUID; the read pump routes the
//! server's reply to the matching oneshot. Control requests and binary
//! chunk frames share the socket and the pending map.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite;

use chunkferry_protocol::constants::{WS_CHUNK_TIMEOUT, WS_MAX_MESSAGE_SIZE, WS_REQUEST_TIMEOUT};
use chunkferry_protocol::{Message, MessageType};

use crate::ClientError;
use crate::connection::{ResponseFuture, ServerConnection};

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>;

/// WebSocket connection to an upload server.
pub struct WsConnection {
    write_tx: mpsc::Sender<tungstenite::Message>,
    pending: PendingMap,
    cancel: tokio_util::sync::CancellationToken,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
}

impl WsConnection {
    /// Connects to the server at `url` (e.g. `ws://host:port`).
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let mut ws_config = tokio_tungstenite::tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false).await?;
        let (mut sink, mut stream) = ws_stream.split();

        let (write_tx, mut write_rx) = mpsc::channel::<tungstenite::Message>(256);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let cancel = tokio_util::sync::CancellationToken::new();

        let write_handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = sink.send(tungstenite::Message::Close(None)).await;
                            break;
                        }
                        queued = write_rx.recv() => match queued {
                            Some(frame) => {
                                if sink.send(frame).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                }
            })
        };

        let read_handle = {
            let pending = Arc::clone(&pending);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        frame = stream.next() => match frame {
                            Some(Ok(tungstenite::Message::Text(text))) => {
                                route_reply(&pending, text.as_str()).await;
                            }
                            Some(Ok(tungstenite::Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!("read error: {e}");
                                break;
                            }
                        }
                    }
                }
                // Dropping the senders wakes every in-flight request with
                // a closed-channel error.
                pending.lock().await.clear();
            })
        };

        Ok(Self {
            write_tx,
            pending,
            cancel,
            _read_handle: read_handle,
            _write_handle: write_handle,
        })
    }

    /// Gracefully closes the connection.
    pub async fn close(&self) {
        self.cancel.cancel();
        let _ = self.write_tx.send(tungstenite::Message::Close(None)).await;
    }

    async fn request(
        &self,
        id: String,
        frame: tungstenite::Message,
        timeout: std::time::Duration,
    ) -> Result<Message, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self.write_tx.send(frame).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(ClientError::Closed);
        }

        let result = tokio::time::timeout(timeout, rx).await;
        self.pending.lock().await.remove(&id);

        match result {
            Ok(Ok(resp)) => {
                if let Some(err) = &resp.error {
                    return Err(ClientError::Server {
                        code: err.code,
                        message: err.message.clone(),
                    });
                }
                Ok(resp)
            }
            Ok(Err(_)) => Err(ClientError::Closed),
            Err(_) => Err(ClientError::Timeout),
        }
    }
}

async fn route_reply(pending: &PendingMap, text: &str) {
    let msg: Message = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!("dropping unparseable reply: {e}");
            return;
        }
    };

    match pending.lock().await.remove(&msg.id) {
        Some(tx) => {
            let _ = tx.send(msg);
        }
        None => {
            tracing::debug!(id = %msg.id, "reply with no pending request");
        }
    }
}

impl ServerConnection for WsConnection {
    fn send_request(
        &self,
        msg_type: MessageType,
        payload: &serde_json::Value,
    ) -> ResponseFuture<'_> {
        let id = uuid::Uuid::new_v4().to_string();
        let msg = Message::new(&id, msg_type, Some(payload));

        Box::pin(async move {
            let json = serde_json::to_string(&msg?)?;
            self.request(
                id,
                tungstenite::Message::Text(json.into()),
                WS_REQUEST_TIMEOUT,
            )
            .await
        })
    }

    fn send_chunk(&self, header: &serde_json::Value, data: &[u8]) -> ResponseFuture<'_> {
        let id = uuid::Uuid::new_v4().to_string();

        // Inject the request id into the header for correlation.
        let mut header = header.clone();
        if let Some(obj) = header.as_object_mut() {
            obj.insert("id".into(), serde_json::Value::String(id.clone()));
        }
        let frame = chunkferry_protocol::encode_chunk_frame(&header, data);

        Box::pin(async move {
            // Chunk frames get the longer timeout: the server stages the
            // payload to disk before acknowledging.
            self.request(
                id,
                tungstenite::Message::Binary(frame?.into()),
                WS_CHUNK_TIMEOUT,
            )
            .await
        })
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
        self._read_handle.abort();
        self._write_handle.abort();
    }
}
