//! Domain primitive types used across the connwatch workspace.

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Linux socket address family names, indexed by family number.
const AF_NAMES: [&str; 46] = [
    "AF_UNSPEC",
    "AF_UNIX",
    "AF_INET",
    "AF_AX25",
    "AF_IPX",
    "AF_APPLETALK",
    "AF_NETROM",
    "AF_BRIDGE",
    "AF_ATMPVC",
    "AF_X25",
    "AF_INET6",
    "AF_ROSE",
    "AF_DECnet",
    "AF_NETBEUI",
    "AF_SECURITY",
    "AF_KEY",
    "AF_NETLINK",
    "AF_PACKET",
    "AF_ASH",
    "AF_ECONET",
    "AF_ATMSVC",
    "AF_RDS",
    "AF_SNA",
    "AF_IRDA",
    "AF_PPPOX",
    "AF_WANPIPE",
    "AF_LLC",
    "AF_IB",
    "AF_MPLS",
    "AF_CAN",
    "AF_TIPC",
    "AF_BLUETOOTH",
    "AF_IUCV",
    "AF_RXRPC",
    "AF_ISDN",
    "AF_PHONET",
    "AF_IEEE802154",
    "AF_CAIF",
    "AF_ALG",
    "AF_NFC",
    "AF_VSOCK",
    "AF_KCM",
    "AF_QIPCRTR",
    "AF_SMC",
    "AF_XDP",
    "AF_MCTP",
];

/// Socket address family as reported by the kernel.
///
/// Displays as the Linux `AF_*` name, or as the bare number when the
/// family is not known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct AddressFamily(u16);

impl AddressFamily {
    /// Wraps a raw family number.
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the `AF_*` name, if the family is known.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        AF_NAMES.get(usize::from(self.0)).copied()
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl Serialize for AddressFamily {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Ownership of an address range by an autonomous system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AsInfo {
    /// Autonomous system number.
    pub as_number: u32,
    /// Owner name or description as published in the database.
    pub description: String,
}

impl fmt::Display for AsInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AS{} ({})", self.as_number, self.description)
    }
}

/// One outbound connection attempt with all the context connwatch could attach.
///
/// Every enrichment field degrades to an empty string or `None` when the
/// corresponding lookup misses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedRecord {
    /// Wall-clock time at which the record was assembled.
    pub timestamp: DateTime<Utc>,
    /// Kernel monotonic timestamp of the connect call, in microseconds.
    pub kernel_time_us: u64,
    /// Address family of the socket.
    pub address_family: AddressFamily,
    /// Process id (thread group id) of the caller.
    pub pid: u32,
    /// Numeric user id of the caller.
    pub uid: u32,
    /// Resolved executable path, empty if the process is gone.
    pub process_path: String,
    /// Process arguments without argv\[0\], joined by spaces.
    pub process_args: String,
    /// Username, or the decimal uid when it cannot be resolved.
    pub user: String,
    /// Kernel task command name.
    pub comm: String,
    /// Destination address and port, absent for non-IP families.
    pub destination: Option<SocketAddr>,
    /// Hostname the process resolved before connecting, if correlated.
    pub hostname: Option<String>,
    /// Autonomous system owning the destination, if known.
    pub as_info: Option<AsInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_family_displays_name() {
        assert_eq!(AddressFamily::new(10).to_string(), "AF_INET6");
        assert_eq!(AddressFamily::new(2).to_string(), "AF_INET");
        assert_eq!(AddressFamily::new(45).to_string(), "AF_MCTP");
    }

    #[test]
    fn unknown_family_displays_number() {
        assert_eq!(AddressFamily::new(55).to_string(), "55");
        assert_eq!(AddressFamily::new(55).name(), None);
    }

    #[test]
    fn as_info_display_includes_number_and_name() {
        let info = AsInfo {
            as_number: 174,
            description: "COGENT-174 - Cogent Communications".into(),
        };
        assert_eq!(info.to_string(), "AS174 (COGENT-174 - Cogent Communications)");
    }

    #[test]
    fn record_serializes_family_as_label() {
        let record = EnrichedRecord {
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            kernel_time_us: 42,
            address_family: AddressFamily::new(2),
            pid: 7,
            uid: 0,
            process_path: "/usr/bin/curl".into(),
            process_args: "https://github.com".into(),
            user: "root".into(),
            comm: "curl".into(),
            destination: Some("140.82.121.4:443".parse().expect("socket addr")),
            hostname: Some("github.com".into()),
            as_info: None,
        };
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["address_family"], "AF_INET");
        assert_eq!(json["destination"], "140.82.121.4:443");
        assert_eq!(json["hostname"], "github.com");
        assert!(json["as_info"].is_null());
    }
}
