//! Per-connection plumbing: a write pump feeding the WebSocket sink, a
//! read loop dispatching frames, and the cloneable [`Sender`] handed to
//! handler methods.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{WebSocketStream, tungstenite};
use tokio_util::sync::CancellationToken;

use chunkferry_protocol::Message;
use chunkferry_protocol::frame::parse_chunk_frame;

use crate::SEND_BUFFER_SIZE;
use crate::ServerError;
use crate::handler::Handler;

/// Outbound half of a connection, cloneable into handler tasks.
#[derive(Debug, Clone)]
pub struct Sender {
    tx: mpsc::Sender<tungstenite::Message>,
}

impl Sender {
    /// Queues a JSON envelope for sending.
    pub fn send_msg(&self, msg: Message) -> Result<(), ServerError> {
        let json = serde_json::to_string(&msg)?;
        self.tx
            .try_send(tungstenite::Message::Text(json.into()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ServerError::SendBufferFull,
                mpsc::error::TrySendError::Closed(_) => ServerError::Closed,
            })
    }

    /// Queues an error reply for `request`.
    pub fn send_error(
        &self,
        request: &Message,
        code: i32,
        text: impl Into<String>,
    ) -> Result<(), ServerError> {
        self.send_msg(request.reply_error(code, text))
    }
}

/// Runs one client connection to completion.
///
/// Splits the socket into a write pump (draining an mpsc queue) and a
/// read loop. Every parsed message is dispatched on its own task so a
/// slow merge cannot stall chunk puts arriving on the same socket.
pub(crate) async fn run_connection<H: Handler>(
    ws_stream: WebSocketStream<TcpStream>,
    peer_addr: SocketAddr,
    handler: Arc<H>,
    cancel: CancellationToken,
) {
    let (mut sink, mut stream) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<tungstenite::Message>(SEND_BUFFER_SIZE);
    let sender = Sender { tx };

    let write_cancel = cancel.clone();
    let write_pump = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = write_cancel.cancelled() => {
                    let _ = sink.send(tungstenite::Message::Close(None)).await;
                    break;
                }
                queued = rx.recv() => match queued {
                    Some(frame) => {
                        if sink.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = stream.next() => match frame {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    dispatch_text(&handler, &sender, text.as_str(), peer_addr);
                }
                Some(Ok(tungstenite::Message::Binary(data))) => {
                    dispatch_binary(&handler, &sender, &data, peer_addr);
                }
                Some(Ok(tungstenite::Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // ping/pong handled by the protocol layer
                Some(Err(e)) => {
                    tracing::warn!(%peer_addr, "read error: {e}");
                    break;
                }
            }
        }
    }

    handler.on_disconnected().await;
    write_pump.abort();
    tracing::info!(%peer_addr, "connection closed");
}

fn dispatch_text<H: Handler>(handler: &Arc<H>, sender: &Sender, text: &str, peer: SocketAddr) {
    let msg: Message = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!(%peer, "dropping unparseable text frame: {e}");
            return;
        }
    };

    let handler = Arc::clone(handler);
    let sender = sender.clone();
    tokio::spawn(async move {
        use chunkferry_protocol::MessageType::*;
        match msg.msg_type {
            CheckChunks => handler.on_check_chunks(sender, msg).await,
            MergeUpload => handler.on_merge(sender, msg).await,
            UploadFile => handler.on_upload_file(sender, msg).await,
            Ping => handler.on_ping(sender, msg).await,
            other => {
                tracing::warn!(?other, id = %msg.id, "unexpected message type");
                let _ = sender.send_error(&msg, 400, format!("unexpected message type {other:?}"));
            }
        }
    });
}

fn dispatch_binary<H: Handler>(handler: &Arc<H>, sender: &Sender, data: &[u8], peer: SocketAddr) {
    let (header, payload) = match parse_chunk_frame(data) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(%peer, "dropping malformed binary frame: {e}");
            return;
        }
    };

    let handler = Arc::clone(handler);
    let sender = sender.clone();
    tokio::spawn(async move {
        handler.on_chunk_frame(sender, header, payload).await;
    });
}
