//! Transport session: the adaptive query state machine
//!
//! One `execute` call runs the full attempt sequence against a device:
//! resolve the derived timeout and retry budget, resolve encryption from the
//! capability cache (probing when enabled), then attempt strictly
//! sequentially until success, a terminal failure, or budget exhaustion.
//! Cache writes from attempt N are committed before attempt N+1 starts.

use crate::cache::{CapabilityCache, PerformanceCache};
use crate::config::TcpSettings;
use crate::error::{QueryError, Result};
use crate::policy;
use crate::transport::{DeviceTransport, ExchangeRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Executes query attempt sequences against devices, feeding outcomes back
/// into the caches.
pub struct TransportSession {
    transport: Arc<dyn DeviceTransport>,
    capabilities: Arc<CapabilityCache>,
    performance: Arc<PerformanceCache>,
    settings: TcpSettings,
}

impl TransportSession {
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        capabilities: Arc<CapabilityCache>,
        performance: Arc<PerformanceCache>,
        settings: TcpSettings,
    ) -> Self {
        Self {
            transport,
            capabilities,
            performance,
            settings,
        }
    }

    /// Run the retry loop for one command against one device.
    ///
    /// Never panics past this boundary; every terminal state is a typed
    /// result. `ConnectionRefused` short-circuits, everything else exhausts
    /// the budget.
    pub async fn execute(&self, address: &str, command: &str) -> Result<String> {
        let attempt_timeout = self
            .performance
            .derived_timeout(address, self.settings.default_timeout)
            .await;
        let budget = self
            .performance
            .derived_retry_budget(address, self.settings.retries)
            .await;
        let use_tls = self.resolve_tls(address).await;

        let mut last_elapsed = Duration::ZERO;

        for attempt in 0..budget {
            let started = Instant::now();
            let outcome = self
                .transport
                .exchange(ExchangeRequest {
                    address,
                    port: self.settings.port,
                    command,
                    attempt_timeout,
                    connect_timeout: self.settings.connect_timeout,
                    use_tls,
                })
                .await;
            let elapsed = started.elapsed();
            last_elapsed = elapsed;

            match outcome {
                Ok(reply) => {
                    // only successful attempts feed the latency history
                    self.performance.record_sample(address, elapsed).await;
                    info!(
                        address,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        downgraded = reply.tls_downgraded,
                        "device query succeeded"
                    );
                    return Ok(reply.payload);
                }
                Err(QueryError::Timeout(detail)) => {
                    warn!(address, attempt, %detail, "attempt timed out");
                    if attempt + 1 < budget {
                        sleep(self.settings.timeout_retry_pause).await;
                    }
                }
                Err(refused @ QueryError::ConnectionRefused(_)) => {
                    // a refused port will not spontaneously start accepting
                    error!(address, attempt, error = %refused, "connection refused, aborting retries");
                    return Err(refused);
                }
                Err(other) => {
                    let delay = policy::backoff_delay(
                        attempt,
                        self.settings.backoff_factor,
                        self.settings.backoff_unit,
                    );
                    warn!(
                        address,
                        attempt,
                        error = %other,
                        delay_ms = delay.as_millis() as u64,
                        "transport error, backing off"
                    );
                    if attempt + 1 < budget {
                        sleep(delay).await;
                    }
                }
            }
        }

        error!(
            address,
            attempts = budget,
            last_elapsed_ms = last_elapsed.as_millis() as u64,
            "device query failed after exhausting retries"
        );
        Err(QueryError::ExhaustedRetries {
            address: address.to_string(),
            attempts: budget,
            last_elapsed,
        })
    }

    /// Decide whether this query should attempt the TLS upgrade.
    ///
    /// Cache hit wins; on a miss a dedicated probe runs if enabled (and its
    /// result is recorded before the first attempt); otherwise the configured
    /// preference applies.
    async fn resolve_tls(&self, address: &str) -> bool {
        match self.capabilities.lookup(address).await {
            Some(supported) => supported,
            None if self.settings.enable_tls_probe => {
                let supported = self
                    .transport
                    .probe_tls(address, self.settings.port, self.settings.connect_timeout)
                    .await;
                self.capabilities.record(address, supported).await;
                info!(address, supported, "TLS capability probe recorded");
                supported
            }
            None => self.settings.use_tls,
        }
    }
}
