//! Outbound call execution.
//!
//! # Responsibilities
//! - Build the outbound request from a `RequestSpec`
//! - Apply the per-call redirect policy and timeout
//! - Capture status, headers and body into an `UpstreamOutcome`
//!
//! # Design Decisions
//! - One pooled client from an injected `ClientFactory`; it never follows
//!   redirects, the engine walks the chain under the call's `RedirectPolicy`
//! - The timeout is a deadline for the whole chain, body included
//! - Any received status is a completed call; only transport errors fail
//! - `transfer-encoding` is dropped here; `content-length` is left to the adapter

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, CONTENT_TYPE, TRANSFER_ENCODING};
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder, Response};

use crate::config::UpstreamConfig;
use crate::relay::decode::decode_body;
use crate::relay::error::{FailureCode, TransportFailure};
use crate::relay::outcome::{CompletedResponse, UpstreamOutcome};
use crate::relay::redirect;
use crate::relay::spec::{RedirectPolicy, RequestBody, RequestSpec, ResponseMode};

/// Source of the HTTP client used for outbound calls.
///
/// Clients handed out must not follow redirects themselves.
pub trait ClientFactory: Send + Sync {
    fn client(&self) -> Result<Client, reqwest::Error>;
}

/// Builds one client on first use and shares it for connection pooling.
pub struct PooledClients {
    config: UpstreamConfig,
    client: OnceLock<Client>,
    built: AtomicUsize,
}

impl PooledClients {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            config,
            client: OnceLock::new(),
            built: AtomicUsize::new(0),
        }
    }

    /// Number of clients built so far.
    pub fn built(&self) -> usize {
        self.built.load(Ordering::Relaxed)
    }

    fn build(&self) -> Result<Client, reqwest::Error> {
        let mut builder = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_millis(self.config.connect_timeout_ms))
            .pool_idle_timeout(Duration::from_secs(self.config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(self.config.pool_max_idle_per_host);

        if let Some(user_agent) = &self.config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        if !self.config.use_system_proxy {
            builder = builder.no_proxy();
        }

        let client = builder.build()?;
        self.built.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Built upstream client");
        Ok(client)
    }
}

impl ClientFactory for PooledClients {
    fn client(&self) -> Result<Client, reqwest::Error> {
        if let Some(client) = self.client.get() {
            return Ok(client.clone());
        }

        let client = self.build()?;
        Ok(self.client.get_or_init(|| client).clone())
    }
}

/// Executes relay calls.
#[derive(Clone)]
pub struct RelayEngine {
    clients: Arc<dyn ClientFactory>,
}

impl RelayEngine {
    pub fn new(clients: Arc<dyn ClientFactory>) -> Self {
        Self { clients }
    }

    /// Engine backed by pooled clients built from `config`.
    pub fn from_config(config: UpstreamConfig) -> Self {
        Self::new(Arc::new(PooledClients::new(config)))
    }

    /// Perform the call described by `spec`.
    pub async fn execute(&self, spec: &RequestSpec) -> UpstreamOutcome {
        self.try_execute(spec).await.into()
    }

    async fn try_execute(&self, spec: &RequestSpec) -> Result<CompletedResponse, TransportFailure> {
        let mut url = spec.target_url()?;
        let mut headers = spec.header_map()?;
        let client = self.clients.client()?;

        let policy = spec.redirect_policy();
        let deadline = spec.timeout().map(|timeout| Instant::now() + timeout);
        let mut method = spec.method.clone();
        let mut body = spec.body.as_ref();
        let mut redirects = 0;

        loop {
            let mut request = client.request(method.clone(), url.clone()).headers(headers.clone());
            if let Some(deadline) = deadline {
                request = request.timeout(remaining(deadline)?);
            }
            let response = attach_body(request, body, spec).send().await?;

            let next = match policy {
                RedirectPolicy::Follow { max } => {
                    redirect::location(response.status(), response.headers()).map(|loc| (max, loc.to_string()))
                }
                RedirectPolicy::Disabled => None,
            };
            let Some((max, location)) = next else {
                return read_response(response, spec.response_mode).await;
            };
            if redirects == max {
                return Err(redirect::too_many(max));
            }

            let hop = redirect::next_hop(&url, response.status(), &method, &location)?;
            tracing::debug!(status = %response.status(), location = %hop.url, "Following redirect");
            redirect::prepare_headers(&url, &hop, &mut headers);
            if !hop.keep_body {
                body = None;
            }
            url = hop.url;
            method = hop.method;
            redirects += 1;
        }
    }
}

/// Time left before `deadline`; an exhausted budget is a timeout.
fn remaining(deadline: Instant) -> Result<Duration, TransportFailure> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(TransportFailure::new(FailureCode::Timeout, "Timeout exceeded"));
    }
    Ok(left)
}

fn attach_body(request: RequestBuilder, body: Option<&RequestBody>, spec: &RequestSpec) -> RequestBuilder {
    match body {
        Some(RequestBody::Json(value)) if !spec.has_header(CONTENT_TYPE.as_str()) => request.json(value),
        Some(RequestBody::Json(value)) => request.body(value.to_string()),
        Some(RequestBody::Text(text)) => request.body(text.clone()),
        Some(RequestBody::Bytes(bytes)) => request.body(bytes.clone()),
        None => request,
    }
}

async fn read_response(response: Response, mode: ResponseMode) -> Result<CompletedResponse, TransportFailure> {
    let status = response.status();
    let mut headers: HeaderMap = response.headers().clone();
    headers.remove(TRANSFER_ENCODING);
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response.bytes().await?;
    let body = decode_body(mode, content_type.as_deref(), bytes);

    Ok(CompletedResponse {
        status,
        headers,
        body,
        content_type,
    })
}
