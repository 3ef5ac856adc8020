//! Transport abstraction for the upload orchestrator.
//!
//! Using a trait keeps the orchestrator decoupled from the WebSocket
//! client and testable with mocks.

use std::future::Future;
use std::pin::Pin;

use chunkferry_protocol::{Message, MessageType};

use crate::ClientError;

/// A boxed future resolving to the server's reply.
pub type ResponseFuture<'a> = Pin<Box<dyn Future<Output = Result<Message, ClientError>> + Send + 'a>>;

/// Abstract connection to an upload server.
pub trait ServerConnection: Send + Sync {
    /// Sends a JSON control request and waits for the correlated response.
    fn send_request(&self, msg_type: MessageType, payload: &serde_json::Value)
    -> ResponseFuture<'_>;

    /// Sends one chunk as a binary frame (JSON header + raw bytes) and
    /// waits for the correlated response.
    fn send_chunk(&self, header: &serde_json::Value, data: &[u8]) -> ResponseFuture<'_>;
}
