//! DNS correlation cache.
//!
//! Maps `(destination address, pid)` to the hostname that process most
//! recently resolved to that address. The DNS probe consumer writes while the
//! connect consumers read, so both maps are sharded concurrent maps.
//!
//! Entries never expire and the cache is unbounded: every distinct
//! `(address, pid)` pair observed stays resident for the life of the process.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use dashmap::DashMap;

use crate::addr::{ipv4_to_u32, ipv6_halves};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Ipv4Key {
    addr: u32,
    pid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Ipv6Key {
    hi: u64,
    lo: u64,
    pid: u32,
}

/// Hostnames observed by the `getaddrinfo` probe, keyed by address and pid.
#[derive(Debug, Default)]
pub struct DnsCache {
    ipv4: DashMap<Ipv4Key, String>,
    ipv6: DashMap<Ipv6Key, String>,
}

impl DnsCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `pid` resolved `hostname` to `addr`.
    ///
    /// Overwrites any hostname previously recorded for the same pair.
    pub fn record_resolution(&self, addr: IpAddr, pid: u32, hostname: impl Into<String>) {
        let hostname = hostname.into();
        match addr {
            IpAddr::V4(v4) => {
                let _ = self.ipv4.insert(ipv4_key(v4, pid), hostname);
            }
            IpAddr::V6(v6) => {
                let _ = self.ipv6.insert(ipv6_key(v6, pid), hostname);
            }
        }
    }

    /// Returns the hostname `pid` resolved to `addr`, if any.
    ///
    /// Only an exact `(address, pid)` match counts. An IPv4-mapped IPv6
    /// address with no entry of its own falls back to the IPv4 entry of the
    /// embedded address, since resolvers may hand out either form.
    #[must_use]
    pub fn lookup_hostname(&self, addr: IpAddr, pid: u32) -> Option<String> {
        match addr {
            IpAddr::V4(v4) => self.lookup_ipv4(v4, pid),
            IpAddr::V6(v6) => self
                .ipv6
                .get(&ipv6_key(v6, pid))
                .map(|entry| entry.value().clone())
                .or_else(|| v6.to_ipv4_mapped().and_then(|v4| self.lookup_ipv4(v4, pid))),
        }
    }

    /// Total number of cached pairs across both families.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ipv4.len() + self.ipv6.len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    fn lookup_ipv4(&self, addr: Ipv4Addr, pid: u32) -> Option<String> {
        self.ipv4
            .get(&ipv4_key(addr, pid))
            .map(|entry| entry.value().clone())
    }
}

fn ipv4_key(addr: Ipv4Addr, pid: u32) -> Ipv4Key {
    Ipv4Key {
        addr: ipv4_to_u32(addr),
        pid,
    }
}

fn ipv6_key(addr: Ipv6Addr, pid: u32) -> Ipv6Key {
    let (hi, lo) = ipv6_halves(addr);
    Ipv6Key { hi, lo, pid }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn v4(literal: &str) -> IpAddr {
        literal.parse().expect("literal")
    }

    #[test]
    fn returns_cached_hostname_for_same_pid() {
        let cache = DnsCache::new();
        cache.record_resolution(v4("140.82.121.4"), 21, "github.com");
        assert_eq!(
            cache.lookup_hostname(v4("140.82.121.4"), 21).as_deref(),
            Some("github.com")
        );
    }

    #[test]
    fn does_not_leak_hostname_to_other_pid() {
        let cache = DnsCache::new();
        cache.record_resolution(v4("140.82.121.4"), 21, "github.com");
        assert_eq!(cache.lookup_hostname(v4("140.82.121.4"), 33), None);
    }

    #[test]
    fn does_not_return_hostname_for_other_address() {
        let cache = DnsCache::new();
        cache.record_resolution(v4("140.82.121.4"), 21, "github.com");
        assert_eq!(cache.lookup_hostname(v4("6.159.96.7"), 21), None);
    }

    #[test]
    fn last_write_wins() {
        let cache = DnsCache::new();
        cache.record_resolution(v4("151.101.1.69"), 21, "stackoverflow.com");
        cache.record_resolution(v4("151.101.1.69"), 21, "reddit.com");
        assert_eq!(
            cache.lookup_hostname(v4("151.101.1.69"), 21).as_deref(),
            Some("reddit.com")
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn ipv6_entries_are_keyed_by_address_and_pid() {
        let cache = DnsCache::new();
        let addr = v4("2606:50c0:8000::153");
        cache.record_resolution(addr, 21, "github.io");
        assert_eq!(cache.lookup_hostname(addr, 21).as_deref(), Some("github.io"));
        assert_eq!(cache.lookup_hostname(addr, 33), None);
        assert_eq!(cache.lookup_hostname(v4("2606:50c0:8000::154"), 21), None);
    }

    #[test]
    fn ipv4_mapped_lookup_falls_back_to_ipv4_entry() {
        let cache = DnsCache::new();
        cache.record_resolution(v4("93.184.216.34"), 7, "example.com");
        assert_eq!(
            cache
                .lookup_hostname(v4("::ffff:93.184.216.34"), 7)
                .as_deref(),
            Some("example.com")
        );
        assert_eq!(cache.lookup_hostname(v4("::ffff:93.184.216.34"), 8), None);
    }

    #[test]
    fn ipv6_entry_takes_precedence_over_mapped_fallback() {
        let cache = DnsCache::new();
        cache.record_resolution(v4("93.184.216.34"), 7, "v4.example.com");
        cache.record_resolution(v4("::ffff:93.184.216.34"), 7, "v6.example.com");
        assert_eq!(
            cache
                .lookup_hostname(v4("::ffff:93.184.216.34"), 7)
                .as_deref(),
            Some("v6.example.com")
        );
    }

    #[test]
    fn concurrent_writers_and_readers_see_consistent_entries() {
        let cache = Arc::new(DnsCache::new());
        let writers: Vec<_> = (0..4u32)
            .map(|pid| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for octet in 0..=255u8 {
                        let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, octet));
                        cache.record_resolution(addr, pid, format!("host-{pid}-{octet}"));
                        let _ = cache.lookup_hostname(addr, pid);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().expect("writer thread");
        }

        assert_eq!(cache.len(), 4 * 256);
        assert_eq!(
            cache
                .lookup_hostname(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)), 2)
                .as_deref(),
            Some("host-2-9")
        );
    }
}
