//! Shared test doubles: scripted transports standing in for real devices.

#![allow(dead_code)]

use async_trait::async_trait;
use device_query_rust::coap::LightweightClient;
use device_query_rust::config::{
    DialectCommands, EngineConfig, PlanDefaults, PrefixRule, ProtocolTable, TcpSettings,
};
use device_query_rust::error::{QueryError, Result};
use device_query_rust::transport::{DeviceTransport, ExchangeReply, ExchangeRequest};
use device_query_rust::Protocol;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One recorded wire exchange.
#[derive(Debug, Clone)]
pub struct SeenExchange {
    pub address: String,
    pub command: String,
    pub use_tls: bool,
}

/// Scripted transport: pops one preloaded outcome per exchange and records
/// what the session asked for.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<ExchangeReply>>>,
    seen: Mutex<Vec<SeenExchange>>,
    probes: AtomicU32,
    probe_result: bool,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<ExchangeReply>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
            probes: AtomicU32::new(0),
            probe_result: false,
        }
    }

    pub fn with_probe_result(mut self, result: bool) -> Self {
        self.probe_result = result;
        self
    }

    pub fn exchange_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn probe_count(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenExchange> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceTransport for ScriptedTransport {
    async fn exchange(&self, request: ExchangeRequest<'_>) -> Result<ExchangeReply> {
        self.seen.lock().unwrap().push(SeenExchange {
            address: request.address.to_string(),
            command: request.command.to_string(),
            use_tls: request.use_tls,
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(QueryError::transport("script exhausted")))
    }

    async fn probe_tls(&self, _address: &str, _port: u16, _timeout: Duration) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.probe_result
    }
}

/// Scripted lightweight client: pops one preloaded payload per call.
pub struct ScriptedLightweight {
    replies: Mutex<VecDeque<Option<Vec<u8>>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedLightweight {
    pub fn new(replies: Vec<Option<Vec<u8>>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LightweightClient for ScriptedLightweight {
    async fn get(&self, address: &str, resource: &str) -> Option<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((address.to_string(), resource.to_string()));
        self.replies.lock().unwrap().pop_front().flatten()
    }
}

/// A successful exchange reply.
pub fn ok_reply(payload: &str) -> Result<ExchangeReply> {
    Ok(ExchangeReply {
        payload: payload.to_string(),
        tls_downgraded: false,
    })
}

/// A successful exchange reply that had to downgrade from TLS.
pub fn downgraded_reply(payload: &str) -> Result<ExchangeReply> {
    Ok(ExchangeReply {
        payload: payload.to_string(),
        tls_downgraded: true,
    })
}

/// TCP settings with millisecond pauses so retry tests stay fast.
pub fn fast_tcp_settings() -> TcpSettings {
    TcpSettings {
        timeout_retry_pause: Duration::from_millis(5),
        backoff_unit: Duration::from_millis(5),
        ..TcpSettings::default()
    }
}

/// Engine configuration with vendor-a TCP devices on 10.0.1.* and
/// lightweight devices on 10.0.2.*.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig {
        tcp: fast_tcp_settings(),
        ..EngineConfig::default()
    };
    config.protocols = ProtocolTable {
        rules: vec![
            PrefixRule {
                prefix: "10.0.1.".to_string(),
                protocol: Protocol::Tcp,
                dialect: "vendor-a".to_string(),
            },
            PrefixRule {
                prefix: "10.0.2.".to_string(),
                protocol: Protocol::Lightweight,
                dialect: "generic".to_string(),
            },
        ],
        default: PlanDefaults::default(),
        ..ProtocolTable::default()
    };
    config.protocols.dialects.insert(
        "vendor-a".to_string(),
        DialectCommands {
            firmware: "FETCH_FW_VER".to_string(),
            status: "QUERY_STATUS".to_string(),
        },
    );
    config
}
