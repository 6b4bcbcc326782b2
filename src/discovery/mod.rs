//! Network discovery: subnet liveness sweep
//!
//! Enumerates the hosts of a CIDR subnet and probes each with a short TCP
//! connect, concurrently. Produces the sequence of responsive addresses the
//! driver feeds to the query engine; one call is one finite, non-restartable
//! sweep.

use crate::error::{QueryError, Result};
use futures::stream::{self, StreamExt};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Concurrent probe fan-out bound.
const SCAN_CONCURRENCY: usize = 256;

/// Widest subnet the sweep will enumerate.
const MAX_PREFIX_SPAN: u32 = 16;

/// Probe every host in `cidr` with a TCP connect to `probe_port`, returning
/// the responsive addresses in address order.
pub async fn scan_network(
    cidr: &str,
    probe_port: u16,
    probe_timeout: Duration,
) -> Result<Vec<String>> {
    let hosts = enumerate_hosts(cidr)?;
    info!(cidr, hosts = hosts.len(), "scanning subnet for responsive devices");

    let outcomes = stream::iter(hosts.into_iter().map(|host| async move {
        let alive = matches!(
            tokio::time::timeout(probe_timeout, TcpStream::connect((host, probe_port))).await,
            Ok(Ok(_))
        );
        (host, alive)
    }))
    .buffer_unordered(SCAN_CONCURRENCY)
    .collect::<Vec<_>>()
    .await;

    let mut responsive: Vec<Ipv4Addr> = outcomes
        .into_iter()
        .filter_map(|(host, alive)| alive.then_some(host))
        .collect();
    responsive.sort();

    debug!(cidr, responsive = responsive.len(), "subnet sweep finished");
    Ok(responsive.into_iter().map(|host| host.to_string()).collect())
}

/// Expand a `a.b.c.d/len` subnet into its host addresses.
///
/// Network and broadcast addresses are skipped for ordinary prefixes; /31
/// and /32 keep every address. Subnets wider than /16 are rejected rather
/// than swept.
fn enumerate_hosts(cidr: &str) -> Result<Vec<Ipv4Addr>> {
    let (addr_part, len_part) = cidr
        .split_once('/')
        .ok_or_else(|| QueryError::invalid_input(format!("not CIDR notation: {cidr}")))?;

    let base: Ipv4Addr = addr_part
        .trim()
        .parse()
        .map_err(|e| QueryError::invalid_input(format!("bad subnet address {addr_part}: {e}")))?;
    let prefix_len: u32 = len_part
        .trim()
        .parse()
        .map_err(|e| QueryError::invalid_input(format!("bad prefix length {len_part}: {e}")))?;

    if prefix_len > 32 {
        return Err(QueryError::invalid_input(format!(
            "prefix length out of range: /{prefix_len}"
        )));
    }
    if prefix_len < MAX_PREFIX_SPAN {
        return Err(QueryError::invalid_input(format!(
            "subnet too large to sweep: /{prefix_len} (limit /{MAX_PREFIX_SPAN})"
        )));
    }

    let mask = u32::MAX << (32 - prefix_len);
    let network = u32::from(base) & mask;

    let hosts = match prefix_len {
        32 => vec![base],
        31 => vec![Ipv4Addr::from(network), Ipv4Addr::from(network + 1)],
        _ => {
            let span = 1u32 << (32 - prefix_len);
            // skip network and broadcast addresses
            (network + 1..network + span - 1)
                .map(Ipv4Addr::from)
                .collect()
        }
    };
    Ok(hosts)
}
