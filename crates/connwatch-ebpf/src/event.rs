//! Decoding of raw connect records.
//!
//! The kernel program writes packed, little-endian records into one perf
//! array per address family:
//!
//! | offset | field    | type      |
//! |--------|----------|-----------|
//! | 0      | `ts_us`  | `u64`     |
//! | 8      | `pid`    | `u32`     |
//! | 12     | `uid`    | `u32`     |
//! | 16     | `af`     | `u16`     |
//! | 18     | `task`   | `[u8; 16]`|
//!
//! followed by `daddr: u32, dport: u16` for IPv4 and
//! `daddr: u64 + u64, dport: u16` for IPv6. Samples may carry trailing perf
//! padding; anything shorter than the layout is rejected.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use connwatch_common::constants::{AF_INET, AF_INET6, TASK_COMM_LEN};
use connwatch_common::types::AddressFamily;
use connwatch_core::addr::{ipv4_from_raw, ipv6_from_raw};
use thiserror::Error;

/// Size of the header shared by every connect record.
pub const HEADER_LEN: usize = 18 + TASK_COMM_LEN;
/// Size of an IPv4 connect record.
pub const IPV4_EVENT_LEN: usize = HEADER_LEN + 4 + 2;
/// Size of an IPv6 connect record.
pub const IPV6_EVENT_LEN: usize = HEADER_LEN + 16 + 2;
/// Size of a connect record for any other family.
pub const OTHER_EVENT_LEN: usize = HEADER_LEN;

/// Which connect channel a record came from; selects the binary layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectFamily {
    /// `AF_INET` destinations.
    Ipv4,
    /// `AF_INET6` destinations.
    Ipv6,
    /// Every other family except `AF_UNIX` and `AF_UNSPEC`.
    Other,
}

impl ConnectFamily {
    /// All connect channels, in the order they are attached.
    pub const ALL: [Self; 3] = [Self::Ipv4, Self::Ipv6, Self::Other];

    /// Channel name used in logs and statistics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
            Self::Other => "other",
        }
    }

    /// Minimum sample length for this channel.
    #[must_use]
    pub const fn record_len(self) -> usize {
        match self {
            Self::Ipv4 => IPV4_EVENT_LEN,
            Self::Ipv6 => IPV6_EVENT_LEN,
            Self::Other => OTHER_EVENT_LEN,
        }
    }
}

impl fmt::Display for ConnectFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reasons a raw sample could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The sample is shorter than the channel's layout.
    #[error("{channel} record truncated: got {actual} bytes, need {expected}")]
    Truncated {
        /// Channel the sample arrived on.
        channel: &'static str,
        /// Minimum length of the layout.
        expected: usize,
        /// Length actually received.
        actual: usize,
    },

    /// The sample's family field disagrees with its channel.
    #[error("{channel} record carries address family {family}")]
    FamilyMismatch {
        /// Channel the sample arrived on.
        channel: &'static str,
        /// Family found in the header.
        family: u16,
    },
}

/// Fields shared by every connect record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    /// Kernel monotonic time of the call, in microseconds.
    pub timestamp_us: u64,
    /// Thread group id of the caller.
    pub pid: u32,
    /// Real uid of the caller.
    pub uid: u32,
    /// Raw `sa_family` of the destination.
    pub address_family: u16,
    /// NUL-padded task command name.
    pub comm: [u8; TASK_COMM_LEN],
}

impl EventHeader {
    /// Command name up to the first NUL.
    #[must_use]
    pub fn comm(&self) -> String {
        c_string(&self.comm)
    }

    /// Address family label of the destination.
    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        AddressFamily::new(self.address_family)
    }

    fn decode(raw: &[u8]) -> Self {
        let mut comm = [0u8; TASK_COMM_LEN];
        comm.copy_from_slice(&raw[18..HEADER_LEN]);
        Self {
            timestamp_us: read_u64_le(raw, 0),
            pid: read_u32_le(raw, 8),
            uid: read_u32_le(raw, 12),
            address_family: read_u16_le(raw, 16),
            comm,
        }
    }
}

/// One decoded connect record, tagged by the channel's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectEvent {
    /// Connect to an IPv4 destination.
    Ipv4 {
        /// Common fields.
        header: EventHeader,
        /// `sin_addr`, read as a little-endian `u32`.
        dest_addr: u32,
        /// Destination port in host order.
        dest_port: u16,
    },
    /// Connect to an IPv6 destination.
    Ipv6 {
        /// Common fields.
        header: EventHeader,
        /// First eight bytes of `sin6_addr`, read as a little-endian `u64`.
        dest_addr_hi: u64,
        /// Last eight bytes of `sin6_addr`, read as a little-endian `u64`.
        dest_addr_lo: u64,
        /// Destination port in host order.
        dest_port: u16,
    },
    /// Connect on any other family; carries no destination.
    Other {
        /// Common fields.
        header: EventHeader,
    },
}

impl ConnectEvent {
    /// Decodes a sample received on `family`'s channel.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] for short samples and
    /// [`DecodeError::FamilyMismatch`] when an IP channel carries a record
    /// of another family.
    pub fn decode(family: ConnectFamily, raw: &[u8]) -> Result<Self, DecodeError> {
        let expected = family.record_len();
        if raw.len() < expected {
            return Err(DecodeError::Truncated {
                channel: family.name(),
                expected,
                actual: raw.len(),
            });
        }

        let header = EventHeader::decode(raw);
        let required = match family {
            ConnectFamily::Ipv4 => Some(AF_INET),
            ConnectFamily::Ipv6 => Some(AF_INET6),
            ConnectFamily::Other => None,
        };
        if let Some(af) = required {
            if header.address_family != af {
                return Err(DecodeError::FamilyMismatch {
                    channel: family.name(),
                    family: header.address_family,
                });
            }
        }

        Ok(match family {
            ConnectFamily::Ipv4 => Self::Ipv4 {
                header,
                dest_addr: read_u32_le(raw, HEADER_LEN),
                dest_port: read_u16_le(raw, HEADER_LEN + 4),
            },
            ConnectFamily::Ipv6 => Self::Ipv6 {
                header,
                dest_addr_hi: read_u64_le(raw, HEADER_LEN),
                dest_addr_lo: read_u64_le(raw, HEADER_LEN + 8),
                dest_port: read_u16_le(raw, HEADER_LEN + 16),
            },
            ConnectFamily::Other => Self::Other { header },
        })
    }

    /// The common header.
    #[must_use]
    pub const fn header(&self) -> &EventHeader {
        match self {
            Self::Ipv4 { header, .. } | Self::Ipv6 { header, .. } | Self::Other { header } => {
                header
            }
        }
    }

    /// Destination address and port, if the family carries one.
    #[must_use]
    pub fn destination(&self) -> Option<SocketAddr> {
        match *self {
            Self::Ipv4 {
                dest_addr,
                dest_port,
                ..
            } => Some(SocketAddr::new(IpAddr::V4(ipv4_from_raw(dest_addr)), dest_port)),
            Self::Ipv6 {
                dest_addr_hi,
                dest_addr_lo,
                dest_port,
                ..
            } => Some(SocketAddr::new(
                IpAddr::V6(ipv6_from_raw(dest_addr_hi, dest_addr_lo)),
                dest_port,
            )),
            Self::Other { .. } => None,
        }
    }
}

/// Text up to the first NUL, decoded lossily.
pub(crate) fn c_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

// Callers check the sample length against the layout before reading.
pub(crate) fn read_u16_le(raw: &[u8], offset: usize) -> u16 {
    let mut out = [0u8; 2];
    out.copy_from_slice(&raw[offset..offset + 2]);
    u16::from_le_bytes(out)
}

pub(crate) fn read_u32_le(raw: &[u8], offset: usize) -> u32 {
    let mut out = [0u8; 4];
    out.copy_from_slice(&raw[offset..offset + 4]);
    u32::from_le_bytes(out)
}

pub(crate) fn read_u64_le(raw: &[u8], offset: usize) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&raw[offset..offset + 8]);
    u64::from_le_bytes(out)
}

/// Encoders mirroring the kernel layouts, shared by the crate's tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn header(pid: u32, uid: u32, af: u16, comm: &str) -> Vec<u8> {
        let mut raw = Vec::with_capacity(IPV6_EVENT_LEN);
        raw.extend_from_slice(&1_234_567u64.to_le_bytes());
        raw.extend_from_slice(&pid.to_le_bytes());
        raw.extend_from_slice(&uid.to_le_bytes());
        raw.extend_from_slice(&af.to_le_bytes());
        let mut task = [0u8; TASK_COMM_LEN];
        let len = comm.len().min(TASK_COMM_LEN);
        task[..len].copy_from_slice(&comm.as_bytes()[..len]);
        raw.extend_from_slice(&task);
        raw
    }

    pub(crate) fn ipv4(pid: u32, addr: std::net::Ipv4Addr, port: u16) -> Vec<u8> {
        let mut raw = header(pid, 1000, AF_INET, "curl");
        raw.extend_from_slice(&addr.octets());
        raw.extend_from_slice(&port.to_le_bytes());
        raw
    }

    pub(crate) fn ipv6(pid: u32, addr: std::net::Ipv6Addr, port: u16) -> Vec<u8> {
        let mut raw = header(pid, 1000, AF_INET6, "curl");
        raw.extend_from_slice(&addr.octets());
        raw.extend_from_slice(&port.to_le_bytes());
        raw
    }
}
