//! Adaptive firmware/status query engine for networked devices
//!
//! Polls devices over TCP (with opportunistic TLS upgrade) or a lightweight
//! CoAP transport, tuning per-device timeouts and retry budgets from the
//! observed latency history.
//!
//! # Features
//!
//! - Per-device adaptive timeouts (2x observed average) and retry budgets
//! - TLS capability probing with a 24h freshness cache and graceful
//!   downgrade on handshake failure
//! - Declaration-ordered address-prefix rules selecting protocol and
//!   command dialect
//! - Subnet liveness sweep and CoAP multicast discovery
//!
//! Queries to different addresses are independent; queries to the SAME
//! address must be serialized by the caller (the caches assume a single
//! writer per key).

// Core modules
pub mod cache;
pub mod coap;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod logging;
pub mod policy;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use engine::QueryEngine;
pub use error::{QueryError, Result};
pub use protocol::{Protocol, QueryKind, TransportPlan};
