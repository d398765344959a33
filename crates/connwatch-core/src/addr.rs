//! Conversions between raw kernel address fields and `std::net` types.
//!
//! Kernel records carry addresses exactly as they sit in `sockaddr_in` /
//! `sockaddr_in6` (network byte order) but are decoded as little-endian
//! integers. Rebuilding the address from the little-endian bytes therefore
//! restores the original octet order.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Rebuilds an IPv4 address from a `sin_addr` field decoded as a little-endian `u32`.
#[must_use]
pub const fn ipv4_from_raw(raw: u32) -> Ipv4Addr {
    let [a, b, c, d] = raw.to_le_bytes();
    Ipv4Addr::new(a, b, c, d)
}

/// Rebuilds an IPv6 address from a `sin6_addr` field decoded as two little-endian `u64` halves.
#[must_use]
pub fn ipv6_from_raw(hi: u64, lo: u64) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets[..8].copy_from_slice(&hi.to_le_bytes());
    octets[8..].copy_from_slice(&lo.to_le_bytes());
    Ipv6Addr::from(octets)
}

/// Numeric form of an IPv4 address as used by the AS database (most significant octet first).
#[must_use]
pub fn ipv4_to_u32(addr: Ipv4Addr) -> u32 {
    u32::from(addr)
}

/// Unsigned 128-bit form of an IPv6 address; ordering matches byte-lexicographic ordering.
#[must_use]
pub fn ipv6_to_u128(addr: Ipv6Addr) -> u128 {
    u128::from(addr)
}

/// Splits an IPv6 address into its upper and lower 64-bit halves.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn ipv6_halves(addr: Ipv6Addr) -> (u64, u64) {
    let value = ipv6_to_u128(addr);
    ((value >> 64) as u64, value as u64)
}
