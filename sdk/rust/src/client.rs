use std::collections::BTreeMap;

use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;

/// Description of one outbound call, as the relay expects it on the wire.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub query_params: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mode: Option<String>, // "structured" or "raw-binary"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_redirects: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_redirects: Option<usize>,
}

impl RelayCall {
    pub fn get(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.query_params.insert(key.to_string(), value.into());
        self
    }

    /// Append `value` to header `name`, keeping earlier values.
    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        let value = Value::String(value.to_string());
        match self.headers.remove(name) {
            Some(Value::Array(mut values)) => {
                values.push(value);
                self.headers.insert(name.to_string(), Value::Array(values));
            }
            Some(existing) => {
                self.headers.insert(name.to_string(), Value::Array(vec![existing, value]));
            }
            None => {
                self.headers.insert(name.to_string(), value);
            }
        }
        self
    }

    pub fn raw_binary(mut self) -> Self {
        self.response_mode = Some("raw-binary".to_string());
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn no_redirects(mut self) -> Self {
        self.follow_redirects = Some(false);
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = Some(max);
        self
    }
}

pub struct RelayClient {
    client: Client,
    relay_url: String,
}

impl RelayClient {
    /// Client for the relay at `relay_url`.
    ///
    /// Redirects are never followed here: a 3xx from the relay is the
    /// upstream's own redirect, relayed because the call asked for it.
    pub fn new(relay_url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().redirect(Policy::none()).no_proxy().build()?;
        Ok(Self::with_client(relay_url, client))
    }

    /// Use a caller-built client. It should not follow redirects.
    pub fn with_client(relay_url: &str, client: Client) -> Self {
        Self {
            client,
            relay_url: relay_url.trim_end_matches('/').to_string(),
        }
    }

    /// Ask the relay to perform `call`. The returned response is the relayed
    /// upstream response, or the relay's own 400/500.
    pub async fn relay(&self, call: &RelayCall) -> Result<Response, reqwest::Error> {
        self.client
            .post(format!("{}/proxy", self.relay_url))
            .json(call)
            .send()
            .await
    }

    /// Liveness probe; true when the relay answers `{"status":"ok"}`.
    pub async fn health(&self) -> Result<bool, reqwest::Error> {
        let resp = self.client
            .get(format!("{}/health", self.relay_url))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Ok(false);
        }
        let body: Value = resp.json().await?;
        Ok(body.get("status").and_then(Value::as_str) == Some("ok"))
    }
}
