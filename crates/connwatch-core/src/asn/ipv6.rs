//! Linear IPv6 range table.

use std::io::BufRead;
use std::net::{IpAddr, Ipv6Addr};

use connwatch_common::types::AsInfo;

use crate::addr::ipv6_to_u128;

#[derive(Debug, Clone)]
struct Ipv6Range {
    start: u128,
    end: u128,
    info: AsInfo,
}

/// AS ownership table for IPv6 destinations, kept in file order.
#[derive(Debug, Clone, Default)]
pub struct Ipv6AsTable {
    ranges: Vec<Ipv6Range>,
}

impl Ipv6AsTable {
    /// Creates an empty table; every lookup returns `None`.
    #[must_use]
    pub const fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Parses a whitespace-separated `ip2asn-v6` database.
    ///
    /// Only lines with exactly five fields (`start end as_number <ignored>
    /// name`) and parsable address literals are kept. IPv4 literals are
    /// stored in their IPv4-mapped form. A malformed AS number reads as zero.
    ///
    /// # Errors
    ///
    /// Returns an error only if the underlying reader fails.
    pub fn parse<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut table = Self::new();
        let mut skipped = 0usize;

        for line in reader.split(b'\n') {
            let line = line?;
            let line = String::from_utf8_lossy(&line);
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [start, end, as_number, _, name] = fields.as_slice() else {
                skipped += 1;
                continue;
            };
            let (Some(start), Some(end)) = (parse_ip(start), parse_ip(end)) else {
                skipped += 1;
                continue;
            };

            table.insert(
                start,
                end,
                AsInfo {
                    as_number: as_number.parse().unwrap_or(0),
                    description: (*name).to_owned(),
                },
            );
        }

        tracing::debug!(entries = table.len(), skipped, "parsed IPv6 AS table");
        Ok(table)
    }

    /// Appends a range after every range already loaded.
    pub fn insert(&mut self, start: Ipv6Addr, end: Ipv6Addr, info: AsInfo) {
        self.ranges.push(Ipv6Range {
            start: ipv6_to_u128(start),
            end: ipv6_to_u128(end),
            info,
        });
    }

    /// Returns the owner of `addr`, or `None` when no loaded range covers it.
    #[must_use]
    pub fn lookup(&self, addr: Ipv6Addr) -> Option<&AsInfo> {
        let value = ipv6_to_u128(addr);
        self.ranges
            .iter()
            .find(|range| range.start <= value && value <= range.end)
            .map(|range| &range.info)
    }

    /// Number of ranges in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether the table holds no ranges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

fn parse_ip(literal: &str) -> Option<Ipv6Addr> {
    match literal.parse::<IpAddr>().ok()? {
        IpAddr::V6(v6) => Some(v6),
        IpAddr::V4(v4) => Some(v4.to_ipv6_mapped()),
    }
}
