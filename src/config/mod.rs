//! Configuration for the query engine
//!
//! A resolved configuration object is handed to the engine at construction;
//! nothing reads configuration ambiently. Durations are human-readable in the
//! TOML form ("5s", "500ms") via `humantime_serde`.

use crate::error::{QueryError, Result};
use crate::logging::LoggingSettings;
use crate::policy;
use crate::protocol::{Protocol, QueryKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// TCP query settings
    pub tcp: TcpSettings,

    /// Address-prefix protocol/dialect table
    pub protocols: ProtocolTable,

    /// Subnet scan settings
    pub network: NetworkSettings,

    /// Lightweight (CoAP) transport settings
    pub lightweight: LightweightSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// TCP query settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpSettings {
    /// Device query port
    pub port: u16,

    /// Per-attempt timeout when no latency history exists
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Base retry count when no latency history exists
    pub retries: u32,

    /// Fixed bound on connection establishment
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Probe unknown devices for TLS support before querying
    pub enable_tls_probe: bool,

    /// TLS preference when no capability information is available
    pub use_tls: bool,

    /// Pause before retrying after a timeout
    #[serde(with = "humantime_serde")]
    pub timeout_retry_pause: Duration,

    /// Base of the exponential backoff between failed attempts
    pub backoff_factor: u32,

    /// One backoff unit; the delay is `backoff_unit * factor^attempt`
    #[serde(with = "humantime_serde")]
    pub backoff_unit: Duration,
}

impl Default for TcpSettings {
    fn default() -> Self {
        Self {
            port: 9000,
            default_timeout: policy::DEFAULT_TIMEOUT,
            retries: policy::DEFAULT_RETRY_BUDGET,
            connect_timeout: policy::CONNECT_TIMEOUT,
            enable_tls_probe: false,
            use_tls: false,
            timeout_retry_pause: policy::TIMEOUT_RETRY_PAUSE,
            backoff_factor: policy::BACKOFF_FACTOR,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// One declaration-ordered address-prefix rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixRule {
    /// Literal address prefix; first match wins
    pub prefix: String,

    /// Wire protocol for matching devices
    pub protocol: Protocol,

    /// Device-family command dialect
    pub dialect: String,
}

/// Fallback plan when no prefix rule matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanDefaults {
    pub protocol: Protocol,
    pub dialect: String,
}

impl Default for PlanDefaults {
    fn default() -> Self {
        Self {
            protocol: Protocol::Tcp,
            dialect: "generic".to_string(),
        }
    }
}

/// Command strings for one device family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialectCommands {
    pub firmware: String,
    pub status: String,
}

impl DialectCommands {
    fn generic() -> Self {
        Self {
            firmware: "GET_FIRMWARE".to_string(),
            status: "GET_STATUS".to_string(),
        }
    }
}

/// Address-prefix protocol/dialect table.
///
/// Rules are matched in declaration order, not sorted by specificity;
/// configuration authors are responsible for putting more specific prefixes
/// first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolTable {
    pub rules: Vec<PrefixRule>,
    pub default: PlanDefaults,
    pub dialects: HashMap<String, DialectCommands>,
}

impl Default for ProtocolTable {
    fn default() -> Self {
        let mut dialects = HashMap::new();
        dialects.insert("generic".to_string(), DialectCommands::generic());
        Self {
            rules: Vec::new(),
            default: PlanDefaults::default(),
            dialects,
        }
    }
}

impl ProtocolTable {
    /// Command string for a dialect and query kind, falling back to the
    /// default dialect's table and finally the built-in generic commands.
    pub fn command(&self, dialect: &str, kind: QueryKind) -> String {
        let commands = self
            .dialects
            .get(dialect)
            .or_else(|| self.dialects.get(&self.default.dialect))
            .cloned()
            .unwrap_or_else(DialectCommands::generic);
        match kind {
            QueryKind::Firmware => commands.firmware,
            QueryKind::Status => commands.status,
        }
    }
}

/// Subnet scan settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Subnet to enumerate, e.g. "192.168.1.0/24"
    pub cidr: String,

    /// Port probed during the liveness sweep
    pub probe_port: u16,

    /// Per-host probe timeout during the sweep
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Minimum delay between successive query submissions (caller-side rate
    /// limit; the engine itself never schedules)
    #[serde(with = "humantime_serde")]
    pub rate_limit_delay: Duration,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            cidr: "192.168.1.0/24".to_string(),
            probe_port: 80,
            probe_timeout: Duration::from_secs(2),
            rate_limit_delay: Duration::from_millis(500),
        }
    }
}

/// Lightweight (CoAP) transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightweightSettings {
    /// CoAP UDP port
    pub port: u16,

    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Multicast group for lightweight device discovery
    pub multicast_address: String,
}

impl Default for LightweightSettings {
    fn default() -> Self {
        Self {
            port: 5683,
            timeout: Duration::from_secs(2),
            multicast_address: "224.0.1.187".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            QueryError::config(format!(
                "failed to read {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| QueryError::config(format!("invalid configuration: {e}")))?;
        Ok(config)
    }

    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply environment overrides onto this configuration.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("DEVICE_QUERY_PORT") {
            self.tcp.port = port
                .parse()
                .map_err(|e| QueryError::config(format!("invalid DEVICE_QUERY_PORT: {e}")))?;
        }
        if let Ok(cidr) = std::env::var("DEVICE_QUERY_CIDR") {
            self.network.cidr = cidr;
        }
        if let Ok(use_tls) = std::env::var("DEVICE_QUERY_USE_TLS") {
            self.tcp.use_tls = use_tls.to_lowercase() == "true" || use_tls == "1";
        }
        if let Ok(probe) = std::env::var("DEVICE_QUERY_TLS_PROBE") {
            self.tcp.enable_tls_probe = probe.to_lowercase() == "true" || probe == "1";
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.tcp.port == 0 {
            return Err(QueryError::config("tcp.port must be non-zero"));
        }
        if self.tcp.retries == 0 {
            return Err(QueryError::config("tcp.retries must be at least 1"));
        }
        if self.tcp.backoff_factor == 0 {
            return Err(QueryError::config("tcp.backoff_factor must be at least 1"));
        }
        if self.tcp.default_timeout.is_zero() || self.tcp.connect_timeout.is_zero() {
            return Err(QueryError::config("timeouts must be greater than zero"));
        }
        if !self.network.cidr.contains('/') {
            return Err(QueryError::config(format!(
                "network.cidr is not CIDR notation: {}",
                self.network.cidr
            )));
        }
        for rule in &self.protocols.rules {
            if rule.prefix.is_empty() {
                return Err(QueryError::config("protocol rule with empty prefix"));
            }
            if rule.dialect.is_empty() {
                return Err(QueryError::config(format!(
                    "protocol rule for prefix {} has an empty dialect",
                    rule.prefix
                )));
            }
        }
        for (name, commands) in &self.protocols.dialects {
            if commands.firmware.is_empty() || commands.status.is_empty() {
                return Err(QueryError::config(format!(
                    "dialect {name} has an empty command"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = EngineConfig::default();
        config.validate().expect("default config must be valid");
        assert_eq!(config.tcp.port, 9000);
        assert_eq!(config.tcp.retries, 3);
        assert_eq!(config.tcp.default_timeout, Duration::from_secs(5));
        assert!(!config.tcp.use_tls);
    }

    #[test]
    fn command_lookup_falls_back_to_generic() {
        let table = ProtocolTable::default();
        assert_eq!(table.command("generic", QueryKind::Firmware), "GET_FIRMWARE");
        assert_eq!(table.command("unknown", QueryKind::Status), "GET_STATUS");
    }

    #[test]
    fn parses_full_toml() {
        let raw = r#"
            [tcp]
            port = 12345
            retries = 3
            use_tls = true
            default_timeout = "5s"
            timeout_retry_pause = "1s"

            [network]
            cidr = "10.0.0.0/24"
            rate_limit_delay = "500ms"

            [protocols]
            rules = [
                { prefix = "10.0.1.", protocol = "tcp", dialect = "vendor-a" },
                { prefix = "10.0.", protocol = "lightweight", dialect = "generic" },
            ]

            [protocols.default]
            protocol = "tcp"
            dialect = "generic"

            [protocols.dialects.vendor-a]
            firmware = "FETCH_FW_VER"
            status = "QUERY_STATUS"

            [protocols.dialects.generic]
            firmware = "GET_FIRMWARE"
            status = "GET_STATUS"
        "#;
        let config: EngineConfig = toml::from_str(raw).expect("toml parses");
        config.validate().expect("valid");
        assert_eq!(config.tcp.port, 12345);
        assert!(config.tcp.use_tls);
        assert_eq!(config.protocols.rules.len(), 2);
        assert_eq!(
            config.protocols.command("vendor-a", QueryKind::Firmware),
            "FETCH_FW_VER"
        );
        assert_eq!(config.network.rate_limit_delay, Duration::from_millis(500));
        // untouched sections keep their defaults
        assert_eq!(config.lightweight.port, 5683);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.tcp.retries = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.network.cidr = "not-a-subnet".to_string();
        assert!(config.validate().is_err());
    }
}
