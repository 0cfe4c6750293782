//! Client for the http-relay service.

pub mod client;

pub use client::{RelayCall, RelayClient};
