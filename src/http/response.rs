//! Response construction.
//!
//! # Responsibilities
//! - Write a completed upstream response verbatim: status, headers, bytes
//! - Map transport failures to 500 with a small `{message, code}` body
//! - Map validation errors to 400 with `{error}`
//!
//! # Design Decisions
//! - Caller-facing error bodies never include the cause chain
//! - An upstream `content-length` survives only if it matches the relayed
//!   body; otherwise the server frames the body itself

use axum::{
    body::Body,
    http::{header::CONTENT_LENGTH, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::relay::{CompletedResponse, TransportFailure, UpstreamOutcome, ValidationError};

impl IntoResponse for UpstreamOutcome {
    fn into_response(self) -> Response {
        match self {
            UpstreamOutcome::Completed(response) => completed_response(response),
            UpstreamOutcome::Failed(failure) => failure_response(&failure),
        }
    }
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn completed_response(completed: CompletedResponse) -> Response {
    let CompletedResponse { status, mut headers, body, .. } = completed;
    let bytes = body.into_bytes();
    drop_stale_content_length(&mut headers, bytes.len());

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn failure_response(failure: &TransportFailure) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "message": failure.message,
            "code": failure.code.as_str(),
        })),
    )
        .into_response()
}

fn drop_stale_content_length(headers: &mut HeaderMap, body_len: usize) {
    let matches = headers
        .get_all(CONTENT_LENGTH)
        .iter()
        .all(|v| v.to_str().ok().and_then(|s| s.trim().parse::<usize>().ok()) == Some(body_len));
    if !matches {
        headers.remove(CONTENT_LENGTH);
    }
}
