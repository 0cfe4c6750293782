//! Relay engine subsystem.
//!
//! # Data Flow
//! ```text
//! RelayRequest (caller JSON)
//!     → spec.rs (validate, defaults → RequestSpec)
//!     → engine.rs (outbound call, timeout, redirect.rs hops under the policy)
//!     → decode.rs (binary override, structured parse with raw fallback)
//!     → UpstreamOutcome::Completed | UpstreamOutcome::Failed
//! ```

pub mod decode;
pub mod engine;
pub mod error;
pub mod outcome;
pub mod redirect;
pub mod spec;

pub use engine::{ClientFactory, PooledClients, RelayEngine};
pub use error::{FailureCode, TransportFailure, ValidationError};
pub use outcome::{CompletedResponse, RelayBody, UpstreamOutcome};
pub use spec::{HeaderBag, HeaderValues, RedirectPolicy, RelayRequest, RequestBody, RequestSpec, ResponseMode};
