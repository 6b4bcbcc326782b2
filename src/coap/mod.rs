//! Lightweight transport collaborator (CoAP)
//!
//! The core treats this transport as opaque: one GET to a resource path
//! yields a byte payload or nothing, a single call is authoritative, and no
//! retry or cache logic applies. Also carries the multicast discovery sweep
//! for lightweight devices.

use crate::config::LightweightSettings;
use async_trait::async_trait;
use coap_lite::{CoapRequest, Packet, RequestType};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Resource path answering firmware queries.
pub const FIRMWARE_RESOURCE: &str = "/firmware";

/// Resource path answering status queries.
pub const STATUS_RESOURCE: &str = "/status";

/// Well-known resource used by the multicast discovery sweep.
pub const DISCOVERY_RESOURCE: &str = "/.well-known/core";

/// Contract of the lightweight transport: GET a resource at an address,
/// receive a payload or nothing. Failures collapse to `None`.
#[async_trait]
pub trait LightweightClient: Send + Sync {
    async fn get(&self, address: &str, resource: &str) -> Option<Vec<u8>>;
}

/// CoAP client over a per-request UDP socket.
pub struct CoapClient {
    port: u16,
    timeout: Duration,
}

impl CoapClient {
    pub fn new(settings: &LightweightSettings) -> Self {
        Self {
            port: settings.port,
            timeout: settings.timeout,
        }
    }

    async fn request(&self, address: &str, resource: &str) -> std::io::Result<Option<Vec<u8>>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;

        let mut request: CoapRequest<SocketAddr> = CoapRequest::new();
        request.set_method(RequestType::Get);
        request.set_path(resource);
        request.message.header.message_id = rand::random();

        let encoded = match request.message.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(resource, error = %e, "failed to encode CoAP request");
                return Ok(None);
            }
        };

        socket.send_to(&encoded, (address, self.port)).await?;

        let mut buffer = [0u8; 1152];
        let received =
            tokio::time::timeout(self.timeout, socket.recv_from(&mut buffer)).await;
        match received {
            Ok(Ok((len, _peer))) => match Packet::from_bytes(&buffer[..len]) {
                Ok(packet) => Ok(Some(packet.payload)),
                Err(e) => {
                    warn!(address, error = %e, "malformed CoAP response");
                    Ok(None)
                }
            },
            Ok(Err(e)) => Err(e),
            Err(_) => {
                debug!(address, resource, "CoAP request timed out");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl LightweightClient for CoapClient {
    async fn get(&self, address: &str, resource: &str) -> Option<Vec<u8>> {
        match self.request(address, resource).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(address, resource, error = %e, "CoAP request failed");
                None
            }
        }
    }
}

/// Multicast discovery sweep: GET `/.well-known/core` at the configured
/// group and collect responder addresses until the timeout elapses.
pub async fn discover(settings: &LightweightSettings) -> Vec<String> {
    let mut responders = Vec::new();

    let socket = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(socket) => socket,
        Err(e) => {
            warn!(error = %e, "CoAP discovery socket unavailable");
            return responders;
        }
    };

    let mut request: CoapRequest<SocketAddr> = CoapRequest::new();
    request.set_method(RequestType::Get);
    request.set_path(DISCOVERY_RESOURCE);
    request.message.header.message_id = rand::random();

    let encoded = match request.message.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "failed to encode CoAP discovery request");
            return responders;
        }
    };

    if let Err(e) = socket
        .send_to(&encoded, (settings.multicast_address.as_str(), settings.port))
        .await
    {
        warn!(error = %e, "CoAP discovery send failed");
        return responders;
    }

    let deadline = tokio::time::Instant::now() + settings.timeout;
    let mut buffer = [0u8; 1152];
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, socket.recv_from(&mut buffer)).await {
            Ok(Ok((len, peer))) => {
                if Packet::from_bytes(&buffer[..len]).is_ok() {
                    let address = peer.ip().to_string();
                    if !responders.contains(&address) {
                        responders.push(address);
                    }
                }
            }
            Ok(Err(e)) => {
                debug!(error = %e, "CoAP discovery receive error");
                break;
            }
            Err(_) => break,
        }
    }

    debug!(count = responders.len(), "CoAP discovery finished");
    responders
}
