//! IP chain resolution over the `Received:` headers.
//!
//! The origin is read from the *last* `Received:` entry only, the hop
//! nearest the declared sender. This is a best-effort heuristic: entries
//! are not checked against claimed hostnames and forged headers are not
//! detected, so the result is a lead, not an authenticated trace.

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{ForensicError, Result};
use crate::model::evidence::ReceivedChain;

static RE_BRACKETED_IPV4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\]").unwrap()
});

/// One `Received:` entry annotated for display.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Hop {
    /// Position in the chain, 0 = newest.
    pub index: usize,
    pub raw: String,
    pub ips: Vec<Ipv4Addr>,
}

/// Extract the originating IPv4 address from the earliest hop.
///
/// Fails with `NoReceivedHeader` on an empty chain and with `NoIpFound` when
/// the last entry holds no bracketed IPv4 literal, even if earlier ones do.
pub fn origin_ip(chain: &ReceivedChain) -> Result<Ipv4Addr> {
    let earliest = chain.earliest().ok_or(ForensicError::NoReceivedHeader)?;
    let ip = bracketed_ips(earliest)
        .into_iter()
        .next()
        .ok_or(ForensicError::NoIpFound)?;

    debug!(%ip, hops = chain.len(), "Resolved origin IP");
    if !is_public(ip) {
        warn!(%ip, "Origin IP is not publicly routable");
    }
    Ok(ip)
}

/// Every bracketed IPv4 literal in one header value, in order.
///
/// Literals with an octet above 255 match the pattern but are not addresses
/// and are skipped.
pub fn bracketed_ips(header: &str) -> Vec<Ipv4Addr> {
    RE_BRACKETED_IPV4
        .captures_iter(header)
        .filter_map(|caps| caps[1].parse::<Ipv4Addr>().ok())
        .collect()
}

/// Annotate every entry of the chain with its bracketed addresses.
pub fn hops(chain: &ReceivedChain) -> Vec<Hop> {
    chain
        .iter()
        .enumerate()
        .map(|(index, raw)| Hop {
            index,
            raw: raw.to_string(),
            ips: bracketed_ips(raw),
        })
        .collect()
}

/// `false` for private, loopback, link-local, shared (CGNAT), documentation,
/// benchmarking, multicast, reserved, broadcast and unspecified addresses.
pub fn is_public(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    let shared = a == 100 && (64..128).contains(&b);
    let benchmarking = a == 198 && (b == 18 || b == 19);
    let reserved = a >= 240;
    let this_network = a == 0;
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_documentation()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || shared
        || benchmarking
        || reserved
        || this_network)
}
