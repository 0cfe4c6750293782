//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Each relay call produces:
//!     → logging.rs (request record before the call, outcome record after)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Correlation ID is passed explicitly, never stored globally
//! - Sensitive headers are redacted before a record is built

pub mod logging;
pub mod metrics;
