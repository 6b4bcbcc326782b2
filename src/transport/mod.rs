//! Wire transports
//!
//! The session state machine talks to devices through the [`DeviceTransport`]
//! trait: one bounded exchange per call, plus a dedicated TLS capability
//! probe. The production implementation is [`tcp::TcpTransport`]; tests swap
//! in a scripted double.

pub mod tcp;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use tcp::TcpTransport;

/// Maximum bytes read from a device response.
pub const RESPONSE_BUFFER_SIZE: usize = 1024;

/// One wire exchange: connect, optional TLS upgrade, send, bounded read.
#[derive(Debug, Clone)]
pub struct ExchangeRequest<'a> {
    /// Device address (IP or hostname)
    pub address: &'a str,
    /// Device query port
    pub port: u16,
    /// Dialect command to send as raw bytes
    pub command: &'a str,
    /// Bound on the whole exchange, connect included
    pub attempt_timeout: Duration,
    /// Fixed bound on connection establishment
    pub connect_timeout: Duration,
    /// Attempt a TLS upgrade after connecting
    pub use_tls: bool,
}

/// Outcome of a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeReply {
    /// Decoded response payload
    pub payload: String,
    /// The TLS upgrade failed and the exchange completed unencrypted
    pub tls_downgraded: bool,
}

/// A transport able to run one query exchange against a device.
///
/// Errors returned from [`exchange`](DeviceTransport::exchange) are already
/// classified into the retry taxonomy (`Timeout`, `ConnectionRefused`,
/// `Transport`); the session never sees raw I/O errors.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Run one complete exchange. The connection is closed on every exit
    /// path before this returns; nothing is reused across calls.
    async fn exchange(&self, request: ExchangeRequest<'_>) -> Result<ExchangeReply>;

    /// Dedicated capability probe: connect, attempt a TLS handshake, discard
    /// the connection. The result reflects the handshake outcome alone.
    async fn probe_tls(&self, address: &str, port: u16, timeout: Duration) -> bool;
}
