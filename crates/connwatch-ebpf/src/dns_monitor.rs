//! Resolver record consumer.
//!
//! Feeds the DNS correlation cache from the `getaddrinfo` probes. Each record
//! carries one resolved address; a lookup returning several addresses
//! produces several records.
//!
//! Layout (packed, little-endian): `pid: u32`, `af: u32`, `ip4: u32`,
//! `ip6: [u8; 16]`, `host: [u8; 80]`.

use std::net::IpAddr;

use connwatch_common::constants::{AF_INET, AF_INET6, DNS_HOST_LEN};
use connwatch_core::addr::{ipv4_from_raw, ipv6_from_raw};
use connwatch_core::dns_cache::DnsCache;

use crate::channel::{ChannelError, ChannelRecord, EventChannel};
use crate::event::{DecodeError, c_string, read_u32_le, read_u64_le};
use crate::net_monitor::ConsumerStats;

/// Size of a resolver record.
pub const DNS_EVENT_LEN: usize = 28 + DNS_HOST_LEN;

/// One address handed out by `getaddrinfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsEvent {
    /// Process that called the resolver.
    pub pid: u32,
    /// Raw family of the resolved address.
    pub address_family: u32,
    /// The resolved address, for `AF_INET` and `AF_INET6` only.
    pub address: Option<IpAddr>,
    /// Name that was looked up.
    pub hostname: String,
}

impl DnsEvent {
    /// Decodes one resolver record.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if `raw` is shorter than the layout.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() < DNS_EVENT_LEN {
            return Err(DecodeError::Truncated {
                channel: "dns",
                expected: DNS_EVENT_LEN,
                actual: raw.len(),
            });
        }

        let address_family = read_u32_le(raw, 4);
        let address = if address_family == u32::from(AF_INET) {
            Some(IpAddr::V4(ipv4_from_raw(read_u32_le(raw, 8))))
        } else if address_family == u32::from(AF_INET6) {
            Some(IpAddr::V6(ipv6_from_raw(
                read_u64_le(raw, 12),
                read_u64_le(raw, 20),
            )))
        } else {
            None
        };

        Ok(Self {
            pid: read_u32_le(raw, 0),
            address_family,
            address,
            hostname: c_string(&raw[28..DNS_EVENT_LEN]),
        })
    }
}

/// Reads resolver records until the channel closes, recording each
/// `(address, pid) -> hostname` pair in `cache`.
///
/// Records with another family or an empty hostname are skipped.
pub async fn consume_dns_events<C: EventChannel>(mut channel: C, cache: &DnsCache) -> ConsumerStats {
    let mut stats = ConsumerStats::new("dns");
    tracing::debug!("dns consumer started");

    loop {
        match channel.next_record().await {
            Err(ChannelError::Closed) => break,
            Err(ChannelError::Read(message)) => stats.read_error(&message),
            Ok(ChannelRecord::Lost(count)) => stats.lost(count),
            Ok(ChannelRecord::Sample(raw)) => match DnsEvent::decode(&raw) {
                Ok(event) => match event.address {
                    Some(addr) if !event.hostname.is_empty() => {
                        tracing::trace!(pid = event.pid, %addr, host = %event.hostname, "resolution");
                        cache.record_resolution(addr, event.pid, event.hostname);
                        stats.emitted += 1;
                    }
                    _ => tracing::debug!(
                        pid = event.pid,
                        af = event.address_family,
                        "skipping resolution without usable address"
                    ),
                },
                Err(e) => stats.decode_error(&e),
            },
        }
    }

    stats.finish()
}
