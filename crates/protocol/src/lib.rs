//! Wire protocol for chunkferry client-server communication.
//!
//! Control messages travel as JSON text frames wrapped in [`Message`]
//! envelopes; chunk payloads travel as binary frames encoded by the
//! [`frame`] codec. Both sides of the wire depend on this crate and
//! nothing else shared.

pub mod constants;
pub mod envelope;
pub mod frame;
pub mod messages;

pub use constants::MessageType;
pub use envelope::{Message, WireError};
pub use frame::{ChunkFrameHeader, FrameError, encode_chunk_frame, parse_chunk_frame};
