//! Validation for names that end up as filesystem paths on the server.
//!
//! Both the fingerprint (a directory name) and the artifact name (a file
//! name) come from the client; each must stay a single path component.

use std::path::{Component, Path};

use crate::TransferError;

/// Validates a fingerprint before it is used as a directory key.
///
/// Fingerprints are hex digests, so anything outside ASCII alphanumerics
/// is rejected outright. That rules out separators, traversal, and
/// control characters in one check.
pub fn validate_fingerprint(fingerprint: &str) -> Result<(), TransferError> {
    if fingerprint.is_empty() {
        return Err(TransferError::InvalidName("empty fingerprint".into()));
    }
    if fingerprint.len() > 64 {
        return Err(TransferError::InvalidName(format!(
            "fingerprint too long: {} chars",
            fingerprint.len()
        )));
    }
    if !fingerprint.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(TransferError::InvalidName(format!(
            "fingerprint must be alphanumeric: {fingerprint}"
        )));
    }
    Ok(())
}

/// Validates an artifact name before it is joined onto the output
/// directory.
///
/// Rejects empty names, absolute paths, traversal, and anything that is
/// not exactly one normal path component.
pub fn validate_artifact_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }

    let path = Path::new(name);
    if path.is_absolute() {
        return Err(TransferError::InvalidName(format!(
            "absolute path not allowed: {name}"
        )));
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(TransferError::InvalidName(format!(
            "name must be a single path component: {name}"
        ))),
    }
}
