//! Handler trait for processing client messages.
//!
//! Implementors provide the storage logic while the server framework owns
//! connection management, routing, and the binary frame codec. Default
//! implementations reply "not implemented" so a handler only overrides
//! the operations it supports.

use std::future::Future;
use std::pin::Pin;

use chunkferry_protocol::frame::ChunkFrameHeader;
use chunkferry_protocol::{Message, MessageType};

use crate::connection::Sender;

/// A boxed future returned by handler methods.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Trait for handling messages from an upload client.
///
/// Each method receives a `sender` for replies and the parsed request.
/// Every dispatched message runs on its own task, so implementations must
/// tolerate interleaved calls for the same fingerprint.
pub trait Handler: Send + Sync + 'static {
    /// Called for `check_chunks` (resume probe).
    fn on_check_chunks(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let _ = sender.send_error(&msg, 501, "check_chunks not implemented");
        })
    }

    /// Called for `merge_upload`.
    fn on_merge(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let _ = sender.send_error(&msg, 501, "merge_upload not implemented");
        })
    }

    /// Called for `upload_file` (whole-file direct upload).
    fn on_upload_file(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let _ = sender.send_error(&msg, 501, "upload_file not implemented");
        })
    }

    /// Called for `ping`.
    fn on_ping(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            if let Ok(reply) = msg.reply::<()>(MessageType::Pong, None) {
                let _ = sender.send_msg(reply);
            }
        })
    }

    /// Called for a binary chunk frame.
    fn on_chunk_frame(
        &self,
        sender: Sender,
        header: ChunkFrameHeader,
        data: Vec<u8>,
    ) -> HandlerFuture<'_> {
        let _ = data;
        Box::pin(async move {
            let _ = sender.send_msg(Message::error(
                header.id,
                501,
                "chunk upload not implemented",
            ));
        })
    }

    /// Called when the client disconnects (cleanup hook).
    fn on_disconnected(&self) -> HandlerFuture<'_> {
        Box::pin(async {})
    }
}
