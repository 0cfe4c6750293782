//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate the per-call correlation ID (UUID v4)
//! - Decode the caller's JSON into a validated `RequestSpec`
//!
//! # Design Decisions
//! - Correlation ID is generated by the relay, never taken from the caller
//! - Empty bodies decode to an empty description so they fail on the URL check

use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::relay::{RelayRequest, RequestSpec, ValidationError};

/// Identifier joining the request and outcome log records of one call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Decode and validate a relay request body.
pub fn parse_relay_request(body: &Bytes) -> Result<RequestSpec, ValidationError> {
    let request: RelayRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RelayRequest::default()
    } else {
        serde_json::from_slice(body).map_err(|e| ValidationError::MalformedBody(e.to_string()))?
    };
    RequestSpec::try_from(request)
}
