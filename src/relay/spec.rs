//! Request description accepted by the relay.
//!
//! # Responsibilities
//! - Deserialize the caller's JSON description (`RelayRequest`)
//! - Validate required fields and apply defaults (`RequestSpec`)
//! - Translate the description into outbound URL, headers and body
//!
//! # Design Decisions
//! - Wire type is fully optional; validation happens in one place
//! - Header values are a tagged variant, never duck-typed arrays
//! - Redirect behaviour is reduced to a single `RedirectPolicy` value

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use url::Url;

use crate::relay::error::{FailureCode, TransportFailure, ValidationError};

/// Default outbound timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default redirect cap when following is enabled.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// One or more values for a single header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValues {
    Single(String),
    Multi(Vec<String>),
}

impl HeaderValues {
    /// Iterate over every value in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            HeaderValues::Single(v) => std::slice::from_ref(v),
            HeaderValues::Multi(vs) => vs,
        };
        values.iter().map(String::as_str)
    }
}

impl From<&str> for HeaderValues {
    fn from(value: &str) -> Self {
        HeaderValues::Single(value.to_string())
    }
}

impl From<Vec<String>> for HeaderValues {
    fn from(values: Vec<String>) -> Self {
        HeaderValues::Multi(values)
    }
}

impl Serialize for HeaderValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HeaderValues::Single(v) => serializer.serialize_str(v),
            HeaderValues::Multi(vs) => vs.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for HeaderValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| scalar_to_string(item).ok_or("header list items must be scalars"))
                .collect::<Result<Vec<_>, _>>()
                .map(HeaderValues::Multi)
                .map_err(serde::de::Error::custom),
            other => scalar_to_string(other)
                .map(HeaderValues::Single)
                .ok_or_else(|| serde::de::Error::custom("header value must be a string or a list of strings")),
        }
    }
}

/// Header name → value(s).
pub type HeaderBag = BTreeMap<String, HeaderValues>;

/// Outbound request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Structured document, serialized as JSON.
    Json(Value),
    /// Text sent verbatim.
    Text(String),
    /// Opaque bytes sent verbatim.
    Bytes(Bytes),
}

impl RequestBody {
    /// Size of the payload once serialized for the wire.
    pub fn serialized_len(&self) -> usize {
        match self {
            RequestBody::Json(value) => serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0),
            RequestBody::Text(text) => text.len(),
            RequestBody::Bytes(bytes) => bytes.len(),
        }
    }
}

impl<'de> Deserialize<'de> for RequestBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(text) => RequestBody::Text(text),
            other => RequestBody::Json(other),
        })
    }
}

/// How the upstream body should be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum ResponseMode {
    #[default]
    #[serde(rename = "structured", alias = "json")]
    Structured,
    #[serde(rename = "raw-binary", alias = "arraybuffer", alias = "binary")]
    RawBinary,
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Structured => f.write_str("structured"),
            ResponseMode::RawBinary => f.write_str("raw-binary"),
        }
    }
}

/// Redirect strategy the engine applies to one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedirectPolicy {
    /// Follow up to `max` redirects; exceeding it fails the call.
    Follow { max: usize },
    /// Surface the first 3xx as the response.
    Disabled,
}

/// Caller-supplied JSON, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub url: Option<String>,
    pub method: Option<String>,
    pub headers: Option<HeaderBag>,
    pub body: Option<RequestBody>,
    #[serde(alias = "params")]
    pub query_params: Option<BTreeMap<String, Value>>,
    #[serde(alias = "responseType")]
    pub response_mode: Option<ResponseMode>,
    #[serde(alias = "timeout")]
    pub timeout_ms: Option<u64>,
    pub follow_redirects: Option<bool>,
    pub max_redirects: Option<usize>,
}

/// Validated, immutable request description.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub url: String,
    pub method: Method,
    pub headers: HeaderBag,
    pub body: Option<RequestBody>,
    pub query_params: BTreeMap<String, Value>,
    pub response_mode: ResponseMode,
    /// Milliseconds; 0 disables the timeout.
    pub timeout_ms: u64,
    pub follow_redirects: bool,
    pub max_redirects: usize,
}

impl RequestSpec {
    /// A `GET` to `url` with every other field defaulted.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: HeaderBag::new(),
            body: None,
            query_params: BTreeMap::new(),
            response_mode: ResponseMode::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    pub fn redirect_policy(&self) -> RedirectPolicy {
        if !self.follow_redirects || self.max_redirects == 0 {
            RedirectPolicy::Disabled
        } else {
            RedirectPolicy::Follow { max: self.max_redirects }
        }
    }

    /// Case-insensitive lookup in the caller's headers.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
    }

    /// `None` when the caller asked for no timeout.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Target URL with query parameters appended.
    pub fn target_url(&self) -> Result<Url, TransportFailure> {
        let mut url = Url::parse(&self.url).map_err(|e| {
            TransportFailure::new(FailureCode::InvalidUrl, format!("Invalid URL '{}': {}", self.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportFailure::new(
                FailureCode::InvalidUrl,
                format!("Unsupported URL scheme '{}'", url.scheme()),
            ));
        }

        let pairs: Vec<(&str, String)> = self
            .query_params
            .iter()
            .flat_map(|(key, value)| query_values(value).into_iter().map(move |v| (key.as_str(), v)))
            .collect();
        if !pairs.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in pairs {
                query.append_pair(key, &value);
            }
        }
        Ok(url)
    }

    /// Outbound header map; multi-valued entries become repeated headers.
    pub fn header_map(&self) -> Result<HeaderMap, TransportFailure> {
        let mut map = HeaderMap::new();
        for (name, values) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportFailure::new(FailureCode::BadRequest, format!("Invalid header name '{}': {}", name, e))
            })?;
            for value in values.iter() {
                let header_value = HeaderValue::from_str(value).map_err(|e| {
                    TransportFailure::new(
                        FailureCode::BadRequest,
                        format!("Invalid value for header '{}': {}", name, e),
                    )
                })?;
                map.append(header_name.clone(), header_value);
            }
        }
        Ok(map)
    }
}

impl TryFrom<RelayRequest> for RequestSpec {
    type Error = ValidationError;

    fn try_from(request: RelayRequest) -> Result<Self, Self::Error> {
        let url = match request.url {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Err(ValidationError::MissingUrl),
        };

        let method = match request.method {
            Some(m) if !m.is_empty() => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                .map_err(|_| ValidationError::InvalidMethod(m))?,
            _ => Method::GET,
        };

        Ok(Self {
            url,
            method,
            headers: request.headers.unwrap_or_default(),
            body: request.body,
            query_params: request.query_params.unwrap_or_default(),
            response_mode: request.response_mode.unwrap_or_default(),
            timeout_ms: request.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            follow_redirects: request.follow_redirects.unwrap_or(true),
            max_redirects: request.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS),
        })
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn query_values(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().flat_map(query_values).collect(),
        Value::Object(_) => vec![value.to_string()],
        other => scalar_to_string(other.clone()).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<RequestSpec, ValidationError> {
        let request: RelayRequest = serde_json::from_value(value).unwrap();
        RequestSpec::try_from(request)
    }

    #[test]
    fn test_defaults_applied() {
        let spec = parse(json!({ "url": "http://example.com" })).unwrap();
        assert_eq!(spec.method, Method::GET);
        assert_eq!(spec.response_mode, ResponseMode::Structured);
        assert_eq!(spec.timeout_ms, 30_000);
        assert!(spec.follow_redirects);
        assert_eq!(spec.max_redirects, 5);
        assert!(spec.body.is_none());
    }

    #[test]
    fn test_missing_or_empty_url_rejected() {
        assert_eq!(parse(json!({})).unwrap_err(), ValidationError::MissingUrl);
        assert_eq!(parse(json!({ "url": "" })).unwrap_err(), ValidationError::MissingUrl);
        assert_eq!(parse(json!({ "url": null })).unwrap_err(), ValidationError::MissingUrl);
    }

    #[test]
    fn test_method_is_case_insensitive() {
        let spec = parse(json!({ "url": "http://x", "method": "post" })).unwrap();
        assert_eq!(spec.method, Method::POST);

        let err = parse(json!({ "url": "http://x", "method": "BAD METHOD" })).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidMethod(_)));
    }

    #[test]
    fn test_wire_aliases() {
        let spec = parse(json!({
            "url": "http://x",
            "responseType": "arraybuffer",
            "timeout": 0,
            "params": { "q": "rust" }
        }))
        .unwrap();
        assert_eq!(spec.response_mode, ResponseMode::RawBinary);
        assert_eq!(spec.timeout(), None);
        assert_eq!(spec.query_params.get("q"), Some(&json!("rust")));
    }

    #[test]
    fn test_redirect_policy() {
        let mut spec = RequestSpec::get("http://x");
        assert_eq!(spec.redirect_policy(), RedirectPolicy::Follow { max: 5 });

        spec.max_redirects = 0;
        assert_eq!(spec.redirect_policy(), RedirectPolicy::Disabled);

        spec.max_redirects = 10;
        spec.follow_redirects = false;
        assert_eq!(spec.redirect_policy(), RedirectPolicy::Disabled);
    }

    #[test]
    fn test_header_values_single_and_multi() {
        let spec = parse(json!({
            "url": "http://x",
            "headers": { "x-one": "a", "x-many": ["b", "c"], "x-num": 5 }
        }))
        .unwrap();
        let map = spec.header_map().unwrap();
        assert_eq!(map.get("x-one").unwrap(), "a");
        let many: Vec<_> = map.get_all("x-many").iter().collect();
        assert_eq!(many, vec!["b", "c"]);
        assert_eq!(map.get("x-num").unwrap(), "5");
    }

    #[test]
    fn test_invalid_header_is_bad_request() {
        let mut spec = RequestSpec::get("http://x");
        spec.headers.insert("bad header".into(), "v".into());
        assert_eq!(spec.header_map().unwrap_err().code, FailureCode::BadRequest);
    }

    #[test]
    fn test_target_url_appends_query() {
        let mut spec = RequestSpec::get("http://example.com/search?lang=en");
        spec.query_params.insert("q".into(), json!("a b"));
        spec.query_params.insert("tag".into(), json!(["x", "y"]));
        spec.query_params.insert("skip".into(), Value::Null);
        let url = spec.target_url().unwrap();
        assert_eq!(url.as_str(), "http://example.com/search?lang=en&q=a+b&tag=x&tag=y");
    }

    #[test]
    fn test_target_url_rejects_garbage() {
        let spec = RequestSpec::get("not a url");
        assert_eq!(spec.target_url().unwrap_err().code, FailureCode::InvalidUrl);

        let spec = RequestSpec::get("ftp://example.com/file");
        assert_eq!(spec.target_url().unwrap_err().code, FailureCode::InvalidUrl);
    }

    #[test]
    fn test_body_variants() {
        let spec = parse(json!({ "url": "http://x", "body": "raw text" })).unwrap();
        assert_eq!(spec.body, Some(RequestBody::Text("raw text".into())));

        let spec = parse(json!({ "url": "http://x", "body": { "a": 1 } })).unwrap();
        let body = spec.body.unwrap();
        assert_eq!(body, RequestBody::Json(json!({ "a": 1 })));
        assert_eq!(body.serialized_len(), r#"{"a":1}"#.len());
    }
}
