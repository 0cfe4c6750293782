//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the relay and health handlers
//! - Wire up middleware (tracing, body limit)
//! - Bind server to listener with graceful shutdown
//! - Run one relay per inbound call: log, execute, log, respond

use axum::{
    extract::{DefaultBodyLimit, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::RelayConfig;
use crate::http::request::{parse_relay_request, CorrelationId};
use crate::observability::logging::{build_outcome_log, build_request_log, StartTime};
use crate::observability::metrics;
use crate::relay::{RelayEngine, RequestSpec, UpstreamOutcome};

/// Path of the relay endpoint.
pub const RELAY_PATH: &str = "/proxy";

/// Path of the liveness probe.
pub const HEALTH_PATH: &str = "/health";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: RelayEngine,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        let engine = RelayEngine::from_config(config.upstream.clone());
        Self::with_engine(config, engine)
    }

    /// Create a server around an existing engine.
    pub fn with_engine(config: RelayConfig, engine: RelayEngine) -> Self {
        let router = Self::build_router(&config, AppState { engine });
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        Router::new()
            .route(RELAY_PATH, post(relay_handler))
            .route(HEALTH_PATH, get(health_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(DefaultBodyLimit::disable())
                    .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes)),
            )
    }

    /// Router for in-process use (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Relay handler: validate, execute, write the outcome verbatim.
async fn relay_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let spec = match parse_relay_request(&body) {
        Ok(spec) => spec,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected relay request");
            return e.into_response();
        }
    };

    relay(&state.engine, &spec).await.into_response()
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Execute one relay call with its request and outcome log records.
pub async fn relay(engine: &RelayEngine, spec: &RequestSpec) -> UpstreamOutcome {
    let correlation_id = CorrelationId::new();
    let start = StartTime::now();
    let method = spec.method.as_str();

    build_request_log(&correlation_id, spec, &start).emit();
    let outcome = engine.execute(spec).await;
    build_outcome_log(&correlation_id, &outcome, &start).emit();

    match &outcome {
        UpstreamOutcome::Completed(response) => metrics::record_relay(method, response.status.as_u16(), &start),
        UpstreamOutcome::Failed(failure) => metrics::record_failure(method, failure.code, &start),
    }
    outcome
}
