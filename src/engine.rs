//! Query orchestrator
//!
//! The public façade: selects a transport plan for the address, routes the
//! query to the lightweight collaborator or the TCP session, and exposes the
//! operational cache resets. One engine instance owns its caches; multiple
//! independent engines never share state.

use crate::cache::{CapabilityCache, PerformanceCache};
use crate::coap::{self, CoapClient, LightweightClient};
use crate::config::EngineConfig;
use crate::error::{QueryError, Result};
use crate::protocol::{self, Protocol, QueryKind, TransportPlan};
use crate::session::TransportSession;
use crate::transport::{DeviceTransport, TcpTransport};
use std::sync::Arc;
use tracing::{info, warn};

/// Adaptive device query engine.
pub struct QueryEngine {
    config: EngineConfig,
    capabilities: Arc<CapabilityCache>,
    performance: Arc<PerformanceCache>,
    session: TransportSession,
    lightweight: Arc<dyn LightweightClient>,
}

impl QueryEngine {
    /// Create an engine with the production transports.
    pub fn new(config: EngineConfig) -> Self {
        let transport: Arc<dyn DeviceTransport> = Arc::new(TcpTransport::new());
        let lightweight: Arc<dyn LightweightClient> =
            Arc::new(CoapClient::new(&config.lightweight));
        Self::with_parts(config, transport, lightweight)
    }

    /// Create an engine with injected collaborators.
    pub fn with_parts(
        config: EngineConfig,
        transport: Arc<dyn DeviceTransport>,
        lightweight: Arc<dyn LightweightClient>,
    ) -> Self {
        let capabilities = Arc::new(CapabilityCache::new());
        let performance = Arc::new(PerformanceCache::new());
        let session = TransportSession::new(
            transport,
            capabilities.clone(),
            performance.clone(),
            config.tcp.clone(),
        );
        Self {
            config,
            capabilities,
            performance,
            session,
            lightweight,
        }
    }

    /// Query the firmware version of one device.
    pub async fn get_firmware_version(&self, address: &str) -> Result<String> {
        let plan = self.plan_for(address)?;
        info!(address, protocol = ?plan.protocol, dialect = %plan.dialect, "querying firmware version");

        match plan.protocol {
            Protocol::Lightweight => {
                // a single lightweight call is authoritative
                match self.lightweight.get(address, coap::FIRMWARE_RESOURCE).await {
                    Some(payload) => Ok(decode_payload(&payload)),
                    None => Err(QueryError::transport(format!(
                        "lightweight firmware query to {address} returned no data"
                    ))),
                }
            }
            Protocol::Tcp => {
                let command = self
                    .config
                    .protocols
                    .command(&plan.dialect, QueryKind::Firmware);
                self.session.execute(address, &command).await
            }
        }
    }

    /// Query the status of one device.
    ///
    /// Unlike the firmware query, a failed lightweight status query falls
    /// through to the TCP session path.
    pub async fn get_status(&self, address: &str) -> Result<String> {
        let plan = self.plan_for(address)?;
        info!(address, protocol = ?plan.protocol, dialect = %plan.dialect, "querying status");

        if plan.protocol == Protocol::Lightweight {
            if let Some(payload) = self.lightweight.get(address, coap::STATUS_RESOURCE).await {
                return Ok(decode_payload(&payload));
            }
            warn!(address, "lightweight status query failed, falling back to TCP");
        }

        let command = self
            .config
            .protocols
            .command(&plan.dialect, QueryKind::Status);
        self.session.execute(address, &command).await
    }

    /// Drop all cached TLS capability entries.
    pub async fn clear_capability_cache(&self) {
        self.capabilities.clear().await;
        info!("capability cache cleared");
    }

    /// Drop all cached latency history.
    pub async fn clear_performance_cache(&self) {
        self.performance.clear().await;
        info!("performance cache cleared");
    }

    /// The engine's resolved configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared capability cache (probe outcomes per address).
    pub fn capability_cache(&self) -> &Arc<CapabilityCache> {
        &self.capabilities
    }

    /// Shared performance cache (latency history per address).
    pub fn performance_cache(&self) -> &Arc<PerformanceCache> {
        &self.performance
    }

    fn plan_for(&self, address: &str) -> Result<TransportPlan> {
        if address.is_empty() {
            return Err(QueryError::invalid_input("device address is empty"));
        }
        Ok(protocol::select_plan(address, &self.config.protocols))
    }
}

fn decode_payload(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}
