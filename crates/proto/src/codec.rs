//! JSON codec for transport payloads.
//!
//! The channel transport moves typed messages directly; this codec is the
//! byte form used by the shared-buffer frame and by anything that needs to
//! persist or inspect traffic.

use std::fmt;

use crate::messages::{ToHost, ToWorker};

#[derive(Debug)]
pub struct CodecError(serde_json::Error);

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payload codec error: {}", self.0)
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

pub fn encode_to_host(message: &ToHost) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(CodecError)
}

pub fn decode_to_host(bytes: &[u8]) -> Result<ToHost, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError)
}

pub fn encode_to_worker(message: &ToWorker) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(CodecError)
}

pub fn decode_to_worker(bytes: &[u8]) -> Result<ToWorker, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError)
}

/// Byte form of a full-document skeleton, used by the shared-buffer mode.
pub fn encode_skeleton(skeleton: &crate::records::NodeSkeleton) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(skeleton).map_err(CodecError)
}

pub fn decode_skeleton(bytes: &[u8]) -> Result<crate::records::NodeSkeleton, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError)
}
