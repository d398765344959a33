//! Connect probe.
//!
//! A kprobe on the LSM connect hook sees every `connect(2)` after address
//! validation and before the protocol handler runs, for every socket family.

use crate::event::ConnectFamily;

/// Kernel function the connect kprobe is attached to.
pub const CONNECT_PROBE_TARGET: &str = "security_socket_connect";

/// Name of the kprobe program inside the BPF object.
pub const CONNECT_PROGRAM_NAME: &str = "kprobe_security_socket_connect";

/// Perf event array receiving IPv4 connect records.
pub const IPV4_EVENTS_MAP: &str = "ipv4_events";

/// Perf event array receiving IPv6 connect records.
pub const IPV6_EVENTS_MAP: &str = "ipv6_events";

/// Perf event array receiving records for every other family.
pub const OTHER_EVENTS_MAP: &str = "other_socket_events";

/// Map name for a connect channel.
#[must_use]
pub const fn events_map(family: ConnectFamily) -> &'static str {
    match family {
        ConnectFamily::Ipv4 => IPV4_EVENTS_MAP,
        ConnectFamily::Ipv6 => IPV6_EVENTS_MAP,
        ConnectFamily::Other => OTHER_EVENTS_MAP,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_family_has_a_distinct_map() {
        let maps: Vec<_> = ConnectFamily::ALL.iter().map(|f| events_map(*f)).collect();
        assert_eq!(maps, ["ipv4_events", "ipv6_events", "other_socket_events"]);
    }
}
