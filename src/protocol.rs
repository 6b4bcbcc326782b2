//! Protocol selection
//!
//! Maps a device address to a transport plan using the configured
//! address-prefix rules. Selection is deterministic and order-sensitive:
//! rules are tried in declaration order and the first matching prefix wins.

use crate::config::ProtocolTable;
use serde::{Deserialize, Serialize};

/// Wire protocol for a device query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Raw command/response over TCP, optionally TLS-upgraded
    Tcp,
    /// Request/response over the constrained-device transport (CoAP)
    Lightweight,
}

/// Which device property a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Firmware,
    Status,
}

/// Resolved (protocol, command dialect) pair for one device address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPlan {
    pub protocol: Protocol,
    pub dialect: String,
}

/// Resolve the transport plan for `address`.
///
/// First prefix rule for which `address.starts_with(prefix)` wins; the
/// configured default applies when nothing matches.
pub fn select_plan(address: &str, table: &ProtocolTable) -> TransportPlan {
    for rule in &table.rules {
        if address.starts_with(&rule.prefix) {
            return TransportPlan {
                protocol: rule.protocol,
                dialect: rule.dialect.clone(),
            };
        }
    }
    TransportPlan {
        protocol: table.default.protocol,
        dialect: table.default.dialect.clone(),
    }
}
