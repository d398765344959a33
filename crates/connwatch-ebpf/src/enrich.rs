//! Turns decoded connect events into enriched records.

use std::sync::Arc;

use connwatch_common::types::EnrichedRecord;
use connwatch_core::asn::AsLookup;
use connwatch_core::dns_cache::DnsCache;
use connwatch_core::identity::ProcessResolver;
use tokio::sync::mpsc;

use crate::event::ConnectEvent;

/// Destination for enriched records.
pub trait RecordSink: Send + Sync {
    /// Delivers one record. Must not block for long; consumers call it inline.
    fn emit(&self, record: EnrichedRecord);
}

impl RecordSink for mpsc::UnboundedSender<EnrichedRecord> {
    fn emit(&self, record: EnrichedRecord) {
        if self.send(record).is_err() {
            tracing::debug!("record receiver dropped, discarding record");
        }
    }
}

/// Attaches AS ownership, hostname, and process identity to connect events.
///
/// Shared read-only between the per-family consumers. The procfs reads and
/// the passwd lookup block inline, so consumers expect a multi-thread runtime.
pub struct Enricher {
    as_lookup: Arc<AsLookup>,
    dns_cache: Arc<DnsCache>,
    resolver: Arc<dyn ProcessResolver>,
}

impl Enricher {
    /// Builds an enricher over the given lookups.
    #[must_use]
    pub fn new(
        as_lookup: Arc<AsLookup>,
        dns_cache: Arc<DnsCache>,
        resolver: Arc<dyn ProcessResolver>,
    ) -> Self {
        Self {
            as_lookup,
            dns_cache,
            resolver,
        }
    }

    /// Builds the record for one event. Lookups that miss leave their field
    /// empty.
    #[must_use]
    pub fn enrich(&self, event: &ConnectEvent) -> EnrichedRecord {
        let header = event.header();
        let destination = event.destination();

        let (as_info, hostname) = destination.map_or((None, None), |dest| {
            (
                self.as_lookup.lookup(dest.ip()).cloned(),
                self.dns_cache.lookup_hostname(dest.ip(), header.pid),
            )
        });

        EnrichedRecord {
            timestamp: chrono::Utc::now(),
            kernel_time_us: header.timestamp_us,
            address_family: header.family(),
            pid: header.pid,
            uid: header.uid,
            process_path: self.resolver.executable_path(header.pid),
            process_args: self.resolver.command_line(header.pid),
            user: self.resolver.username(header.uid),
            comm: header.comm(),
            destination,
            hostname,
            as_info,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Resolver answering from fixed values, with pid 0 treated as exited.
    pub(crate) struct StaticResolver;

    impl ProcessResolver for StaticResolver {
        fn executable_path(&self, pid: u32) -> String {
            if pid == 0 {
                String::new()
            } else {
                format!("/usr/bin/proc{pid}")
            }
        }

        fn command_line(&self, pid: u32) -> String {
            if pid == 0 {
                String::new()
            } else {
                "--verbose".into()
            }
        }

        fn username(&self, uid: u32) -> String {
            if uid == 1000 {
                "alice".into()
            } else {
                uid.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use connwatch_common::types::AsInfo;
    use connwatch_core::asn::{Ipv4AsTable, Ipv6AsTable};

    use super::testing::StaticResolver;
    use super::*;
    use crate::event::{ConnectFamily, fixtures};

    fn cogent_lookup() -> AsLookup {
        let mut ipv4 = Ipv4AsTable::new();
        ipv4.insert(
            641_662_976,
            641_667_071,
            AsInfo {
                as_number: 174,
                description: "COGENT-174 - Cogent Communications".into(),
            },
        );
        AsLookup::from_tables(ipv4, Ipv6AsTable::new())
    }

    fn enricher(lookup: AsLookup, cache: Arc<DnsCache>) -> Enricher {
        Enricher::new(Arc::new(lookup), cache, Arc::new(StaticResolver))
    }

    #[test]
    fn enriches_ipv4_event_with_as_and_hostname() {
        let cache = Arc::new(DnsCache::new());
        let dest = Ipv4Addr::new(38, 63, 2, 254);
        cache.record_resolution(dest.into(), 21, "cogentco.com");

        let raw = fixtures::ipv4(21, dest, 443);
        let event = ConnectEvent::decode(ConnectFamily::Ipv4, &raw).expect("decode");
        let record = enricher(cogent_lookup(), cache).enrich(&event);

        assert_eq!(record.pid, 21);
        assert_eq!(record.user, "alice");
        assert_eq!(record.comm, "curl");
        assert_eq!(record.process_path, "/usr/bin/proc21");
        assert_eq!(record.process_args, "--verbose");
        assert_eq!(record.kernel_time_us, 1_234_567);
        assert_eq!(record.hostname.as_deref(), Some("cogentco.com"));
        assert_eq!(record.as_info.map(|info| info.as_number), Some(174));
        assert_eq!(record.destination.map(|d| d.port()), Some(443));
    }

    #[test]
    fn unknown_destination_leaves_fields_empty() {
        let raw = fixtures::ipv4(33, Ipv4Addr::new(192, 0, 2, 1), 80);
        let event = ConnectEvent::decode(ConnectFamily::Ipv4, &raw).expect("decode");
        let record = enricher(cogent_lookup(), Arc::new(DnsCache::new())).enrich(&event);

        assert!(record.as_info.is_none());
        assert!(record.hostname.is_none());
    }

    #[test]
    fn ipv6_without_database_has_no_as_info() {
        let cache = Arc::new(DnsCache::new());
        let dest: Ipv6Addr = "2606:50c0:8000::153".parse().expect("addr");
        cache.record_resolution(dest.into(), 5, "github.io");

        let raw = fixtures::ipv6(5, dest, 443);
        let event = ConnectEvent::decode(ConnectFamily::Ipv6, &raw).expect("decode");
        let record = enricher(cogent_lookup(), cache).enrich(&event);

        assert!(record.as_info.is_none());
        assert_eq!(record.hostname.as_deref(), Some("github.io"));
    }

    #[test]
    fn other_family_has_no_destination_and_unknown_user_is_numeric() {
        let raw = fixtures::header(0, 4242, 16, "ip");
        let event = ConnectEvent::decode(ConnectFamily::Other, &raw).expect("decode");
        let record = enricher(AsLookup::new(), Arc::new(DnsCache::new())).enrich(&event);

        assert!(record.destination.is_none());
        assert!(record.hostname.is_none());
        assert!(record.as_info.is_none());
        assert_eq!(record.user, "4242");
        assert!(record.process_path.is_empty());
        assert!(record.process_args.is_empty());
        assert_eq!(record.address_family.to_string(), "AF_NETLINK");
    }

    #[test]
    fn unbounded_sender_is_a_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel::<EnrichedRecord>();
        let raw = fixtures::header(1, 1000, 16, "ip");
        let event = ConnectEvent::decode(ConnectFamily::Other, &raw).expect("decode");
        let record = enricher(AsLookup::new(), Arc::new(DnsCache::new())).enrich(&event);

        tx.emit(record.clone());
        assert_eq!(rx.try_recv().expect("record"), record);

        drop(rx);
        tx.emit(record);
    }
}
