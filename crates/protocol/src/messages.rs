//! Request and response payloads carried inside [`Message`](crate::Message)
//! envelopes. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Resume probe: which chunk indices does the server already hold?
///
/// Idempotent and side-effect-free; the client calls it before uploading
/// and may call it again at any point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckChunksRequest {
    pub fingerprint: String,
}

/// Asks the server to assemble all chunks of `fingerprint` into the final
/// artifact named `name`. `total` is the client's chunk count; the merge
/// fails unless exactly that many chunks are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub fingerprint: String,
    pub total: u32,
    pub name: String,
}

/// Non-chunked direct upload for small files, bypassing fingerprinting.
///
/// The `data` field is base64-encoded in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Indices currently stored for a fingerprint. Not necessarily contiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSetResponse {
    pub fingerprint: String,
    pub indices: Vec<u32>,
}

/// Acknowledges one binary chunk frame.
///
/// `already_present` is `true` when the server skipped the write because a
/// chunk file for this `(fingerprint, index)` already existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReceivedResponse {
    pub fingerprint: String,
    pub index: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub already_present: bool,
}

/// Merge succeeded; `path` is the final artifact location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    pub fingerprint: String,
    pub path: String,
}

/// Whole-file upload stored; `path` is the artifact location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStoredResponse {
    pub name: String,
    pub path: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_false(v: &bool) -> bool {
    !v
}

/// Base64 serde module for byte fields embedded in JSON payloads.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
