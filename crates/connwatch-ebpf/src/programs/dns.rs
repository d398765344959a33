//! Resolver probes.
//!
//! The entry probe stashes the `node` argument of `getaddrinfo(3)` per thread;
//! the return probe walks the result list and emits one record per address.

/// libc symbol both resolver probes attach to.
pub const DNS_PROBE_SYMBOL: &str = "getaddrinfo";

/// Name of the entry uprobe program.
pub const DNS_ENTRY_PROGRAM_NAME: &str = "getaddrinfo_entry";

/// Name of the return uprobe program.
pub const DNS_RETURN_PROGRAM_NAME: &str = "getaddrinfo_return";

/// Perf event array receiving resolution records.
pub const DNS_EVENTS_MAP: &str = "dns_events";
