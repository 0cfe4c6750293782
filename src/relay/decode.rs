//! Upstream body decoding.
//!
//! # Design Decisions
//! - Binary content types always win over the requested mode
//! - A structured parse that fails falls back to raw bytes; it never fails the call
//! - The raw bytes are kept even when parsing succeeds, so relaying is byte-exact

use bytes::Bytes;

use crate::relay::outcome::RelayBody;
use crate::relay::spec::ResponseMode;

const BINARY_PREFIXES: &[&str] = &["image/", "audio/", "video/"];
const BINARY_TYPES: &[&str] = &["application/octet-stream", "application/pdf"];

/// Whether a content type must be relayed as opaque bytes.
pub fn is_binary_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    BINARY_TYPES.contains(&essence.as_str())
        || BINARY_PREFIXES.iter().any(|prefix| essence.starts_with(prefix))
}

/// Decode `bytes` according to `mode` and the response content type.
pub fn decode_body(mode: ResponseMode, content_type: Option<&str>, bytes: Bytes) -> RelayBody {
    if content_type.is_some_and(is_binary_content_type) {
        return RelayBody::Raw(bytes);
    }

    match mode {
        ResponseMode::RawBinary => RelayBody::Raw(bytes),
        ResponseMode::Structured => match serde_json::from_slice(&bytes) {
            Ok(value) => RelayBody::Structured { value, raw: bytes },
            Err(e) => {
                if !bytes.is_empty() {
                    tracing::trace!(error = %e, "Body is not JSON, relaying raw bytes");
                }
                RelayBody::Raw(bytes)
            }
        },
    }
}
