//! Relay error taxonomy.
//!
//! Upstream error statuses are not errors here; they are `Completed`
//! outcomes. Only two things fail: the caller's description
//! (`ValidationError`) and the transport (`TransportFailure`).

use std::error::Error as StdError;
use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

/// Rejections raised before the engine runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("URL is required")]
    MissingUrl,

    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    #[error("Invalid request body: {0}")]
    MalformedBody(String),
}

/// Short machine identifier for a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureCode {
    #[serde(rename = "ETIMEDOUT")]
    Timeout,
    #[serde(rename = "ECONNREFUSED")]
    ConnectionRefused,
    #[serde(rename = "ECONNRESET")]
    ConnectionReset,
    #[serde(rename = "ENOTFOUND")]
    DnsFailure,
    #[serde(rename = "ERR_TLS")]
    Tls,
    #[serde(rename = "ECONNECT")]
    Connect,
    #[serde(rename = "ERR_FR_TOO_MANY_REDIRECTS")]
    TooManyRedirects,
    #[serde(rename = "ERR_INVALID_URL")]
    InvalidUrl,
    #[serde(rename = "ERR_BAD_REQUEST")]
    BadRequest,
    #[serde(rename = "ERR_BAD_RESPONSE")]
    BadResponse,
    #[serde(rename = "ERR_NETWORK")]
    Network,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::Timeout => "ETIMEDOUT",
            FailureCode::ConnectionRefused => "ECONNREFUSED",
            FailureCode::ConnectionReset => "ECONNRESET",
            FailureCode::DnsFailure => "ENOTFOUND",
            FailureCode::Tls => "ERR_TLS",
            FailureCode::Connect => "ECONNECT",
            FailureCode::TooManyRedirects => "ERR_FR_TOO_MANY_REDIRECTS",
            FailureCode::InvalidUrl => "ERR_INVALID_URL",
            FailureCode::BadRequest => "ERR_BAD_REQUEST",
            FailureCode::BadResponse => "ERR_BAD_RESPONSE",
            FailureCode::Network => "ERR_NETWORK",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outbound call never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({code})")]
pub struct TransportFailure {
    pub message: String,
    pub code: FailureCode,
    /// Rendered source chain, outermost first. Logged, never sent to callers.
    pub causes: Vec<String>,
}

impl TransportFailure {
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            causes: Vec::new(),
        }
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(error: reqwest::Error) -> Self {
        let causes = source_chain(&error);
        let code = classify(&error, &causes);
        let message = match causes.last() {
            Some(root) => format!("{}: {}", error, root),
            None => error.to_string(),
        };
        Self { message, code, causes }
    }
}

fn source_chain(error: &(dyn StdError + 'static)) -> Vec<String> {
    let mut causes = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }
    causes
}

fn io_kind(error: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut current = error.source();
    while let Some(cause) = current {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = cause.source();
    }
    None
}

fn classify(error: &reqwest::Error, causes: &[String]) -> FailureCode {
    let mentions = |needle: &str| causes.iter().any(|c| c.to_ascii_lowercase().contains(needle));
    let kind = io_kind(error);

    if error.is_timeout() || kind == Some(io::ErrorKind::TimedOut) {
        FailureCode::Timeout
    } else if error.is_redirect() {
        FailureCode::TooManyRedirects
    } else if error.is_builder() {
        FailureCode::BadRequest
    } else if kind == Some(io::ErrorKind::ConnectionRefused) {
        FailureCode::ConnectionRefused
    } else if kind == Some(io::ErrorKind::ConnectionReset) {
        FailureCode::ConnectionReset
    } else if mentions("dns error") || mentions("failed to lookup address") {
        FailureCode::DnsFailure
    } else if mentions("certificate") || mentions("tls") || mentions("handshake") {
        FailureCode::Tls
    } else if error.is_connect() {
        FailureCode::Connect
    } else if error.is_body() || error.is_decode() {
        FailureCode::BadResponse
    } else {
        FailureCode::Network
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_strings_match_serde() {
        for code in [
            FailureCode::Timeout,
            FailureCode::ConnectionRefused,
            FailureCode::DnsFailure,
            FailureCode::TooManyRedirects,
            FailureCode::Network,
        ] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, serde_json::Value::String(code.as_str().to_string()));
        }
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(ValidationError::MissingUrl.to_string(), "URL is required");
        assert_eq!(
            ValidationError::InvalidMethod("G T".into()).to_string(),
            "Invalid method: G T"
        );
    }

    #[tokio::test]
    async fn test_refused_connection_is_classified() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap()
            .get(format!("http://{}", addr))
            .send()
            .await
            .unwrap_err();
        let failure = TransportFailure::from(err);
        assert_eq!(failure.code, FailureCode::ConnectionRefused);
        assert!(!failure.causes.is_empty());
    }
}
