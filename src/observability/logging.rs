//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Redact sensitive headers before they reach a log line
//! - Shape the per-call request and outcome records
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and environment
//! - Records are plain values; building and emitting are separate steps

use std::collections::BTreeMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::http::request::CorrelationId;
use crate::relay::{FailureCode, HeaderBag, HeaderValues, RequestSpec, ResponseMode, UpstreamOutcome};

/// Replacement for sensitive header values.
pub const REDACTED: &str = "[REDACTED]";

/// Headers whose values never reach the logs (compared case-insensitively).
pub const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "x-api-key"];

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "http_relay={level},tower_http={level}",
            level = config.log_level
        ))
    });

    let json = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .try_init()
}

/// Copy of `headers` with sensitive values replaced by [`REDACTED`].
pub fn sanitize(headers: &HeaderBag) -> HeaderBag {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive(name) {
                HeaderValues::Single(REDACTED.to_string())
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}

fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS.iter().any(|s| s.eq_ignore_ascii_case(name))
}

/// When a relay call started, in both clocks.
#[derive(Debug, Clone, Copy)]
pub struct StartTime {
    instant: Instant,
    wall: SystemTime,
}

impl StartTime {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: SystemTime::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.instant.elapsed().as_millis() as u64
    }

    pub fn unix_ms(&self) -> u64 {
        self.wall
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn instant(&self) -> Instant {
        self.instant
    }
}

/// Emitted once per call, before the outbound request starts.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogRecord {
    pub correlation_id: CorrelationId,
    pub started_at_ms: u64,
    pub url: String,
    pub method: String,
    pub headers: HeaderBag,
    pub query_params: BTreeMap<String, Value>,
    pub response_mode: ResponseMode,
    pub timeout_ms: u64,
    pub body_size: usize,
}

impl RequestLogRecord {
    pub fn emit(&self) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            method = %self.method,
            url = %self.url,
            headers = %to_json(&self.headers),
            query_params = %to_json(&self.query_params),
            response_mode = %self.response_mode,
            timeout_ms = self.timeout_ms,
            body_size = self.body_size,
            "Relaying request"
        );
    }
}

/// Emitted when upstream produced a response.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseLogRecord {
    pub correlation_id: CorrelationId,
    pub elapsed_ms: u64,
    pub status: u16,
    pub content_type: Option<String>,
    pub body_size: usize,
}

/// Emitted when the call never produced a response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorLogRecord {
    pub correlation_id: CorrelationId,
    pub elapsed_ms: u64,
    pub message: String,
    pub code: FailureCode,
    pub causes: Vec<String>,
}

/// The second record of a call.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutcomeLogRecord {
    Response(ResponseLogRecord),
    Error(ErrorLogRecord),
}

impl OutcomeLogRecord {
    pub fn correlation_id(&self) -> &CorrelationId {
        match self {
            OutcomeLogRecord::Response(r) => &r.correlation_id,
            OutcomeLogRecord::Error(e) => &e.correlation_id,
        }
    }

    pub fn emit(&self) {
        match self {
            OutcomeLogRecord::Response(r) => tracing::info!(
                correlation_id = %r.correlation_id,
                elapsed_ms = r.elapsed_ms,
                status = r.status,
                content_type = r.content_type.as_deref().unwrap_or(""),
                body_size = r.body_size,
                "Upstream responded"
            ),
            OutcomeLogRecord::Error(e) => tracing::error!(
                correlation_id = %e.correlation_id,
                elapsed_ms = e.elapsed_ms,
                code = %e.code,
                error = %e.message,
                causes = ?e.causes,
                "Relay failed"
            ),
        }
    }
}

/// Build the record logged before the outbound call.
pub fn build_request_log(correlation_id: &CorrelationId, spec: &RequestSpec, start: &StartTime) -> RequestLogRecord {
    RequestLogRecord {
        correlation_id: correlation_id.clone(),
        started_at_ms: start.unix_ms(),
        url: spec.url.clone(),
        method: spec.method.to_string(),
        headers: sanitize(&spec.headers),
        query_params: spec.query_params.clone(),
        response_mode: spec.response_mode,
        timeout_ms: spec.timeout_ms,
        body_size: spec.body.as_ref().map_or(0, |b| b.serialized_len()),
    }
}

/// Build the record logged once the engine returns.
pub fn build_outcome_log(correlation_id: &CorrelationId, outcome: &UpstreamOutcome, start: &StartTime) -> OutcomeLogRecord {
    let elapsed_ms = start.elapsed_ms();
    match outcome {
        UpstreamOutcome::Completed(response) => OutcomeLogRecord::Response(ResponseLogRecord {
            correlation_id: correlation_id.clone(),
            elapsed_ms,
            status: response.status.as_u16(),
            content_type: response.content_type.clone(),
            body_size: response.body.len(),
        }),
        UpstreamOutcome::Failed(failure) => OutcomeLogRecord::Error(ErrorLogRecord {
            correlation_id: correlation_id.clone(),
            elapsed_ms,
            message: failure.message.clone(),
            code: failure.code,
            causes: failure.causes.clone(),
        }),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
