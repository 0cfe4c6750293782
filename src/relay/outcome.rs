//! Result of a relay call.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;

use crate::relay::error::TransportFailure;

/// Upstream body as captured by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayBody {
    /// Parsed document plus the exact bytes it was parsed from.
    Structured { value: Value, raw: Bytes },
    /// Exact bytes, no charset interpretation.
    Raw(Bytes),
}

impl RelayBody {
    /// Bytes as received from upstream (after decompression).
    pub fn as_bytes(&self) -> &Bytes {
        match self {
            RelayBody::Structured { raw, .. } => raw,
            RelayBody::Raw(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            RelayBody::Structured { raw, .. } => raw,
            RelayBody::Raw(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn structured(&self) -> Option<&Value> {
        match self {
            RelayBody::Structured { value, .. } => Some(value),
            RelayBody::Raw(_) => None,
        }
    }
}

/// An HTTP response received from upstream, whatever its status.
#[derive(Debug, Clone)]
pub struct CompletedResponse {
    pub status: StatusCode,
    /// Upstream headers minus `transfer-encoding`; multi-values preserved.
    pub headers: HeaderMap,
    pub body: RelayBody,
    pub content_type: Option<String>,
}

/// What the engine produced for one call.
#[derive(Debug, Clone)]
pub enum UpstreamOutcome {
    Completed(CompletedResponse),
    Failed(TransportFailure),
}

impl UpstreamOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, UpstreamOutcome::Completed(_))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamOutcome::Completed(response) => Some(response.status),
            UpstreamOutcome::Failed(_) => None,
        }
    }
}

impl From<Result<CompletedResponse, TransportFailure>> for UpstreamOutcome {
    fn from(result: Result<CompletedResponse, TransportFailure>) -> Self {
        match result {
            Ok(response) => UpstreamOutcome::Completed(response),
            Err(failure) => UpstreamOutcome::Failed(failure),
        }
    }
}
