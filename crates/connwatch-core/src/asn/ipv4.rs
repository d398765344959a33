//! Bucketed IPv4 range table.
//!
//! Ranges are grouped by the most significant octet of their start address.
//! A lookup only scans the bucket of the queried address and returns the
//! first range in file order that contains it.

use std::io::BufRead;
use std::net::Ipv4Addr;

use connwatch_common::types::AsInfo;

use crate::addr::ipv4_to_u32;

const BUCKETS: usize = 256;

#[derive(Debug, Clone)]
struct Ipv4Range {
    start: u32,
    end: u32,
    info: AsInfo,
}

impl Ipv4Range {
    const fn contains(&self, addr: u32) -> bool {
        self.start <= addr && addr <= self.end
    }
}

/// AS ownership table for IPv4 destinations.
#[derive(Debug, Clone)]
pub struct Ipv4AsTable {
    buckets: Vec<Vec<Ipv4Range>>,
    len: usize,
}

impl Ipv4AsTable {
    /// Creates an empty table; every lookup returns `None`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: (0..BUCKETS).map(|_| Vec::new()).collect(),
            len: 0,
        }
    }

    /// Parses a tab-separated `ip2asn-v4-u32` database.
    ///
    /// Each row is `start end as_number <ignored> description ...` with
    /// decimal addresses. Malformed numbers read as zero rather than failing
    /// the load, rows owned by AS 0 are unassigned space and are skipped, and
    /// rows whose start lies above their end cannot match anything and are
    /// dropped too.
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
            let mut fields = line.trim_end_matches('\r').split('\t');

            let start = parse_u32(fields.next());
            let end = parse_u32(fields.next());
            let as_number = parse_u32(fields.next());
            let description = fields.nth(1).unwrap_or_default().to_owned();

            if as_number == 0 || start > end {
                skipped += 1;
                continue;
            }
            table.insert(start, end, AsInfo { as_number, description });
        }

        tracing::debug!(entries = table.len, skipped, "parsed IPv4 AS table");
        Ok(table)
    }

    /// Appends a range after every range already in its bucket.
    pub fn insert(&mut self, start: u32, end: u32, info: AsInfo) {
        let bucket = bucket_of(start);
        self.buckets[bucket].push(Ipv4Range { start, end, info });
        self.len += 1;
    }

    /// Returns the owner of `addr`, or `None` when no loaded range covers it.
    #[must_use]
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<&AsInfo> {
        let value = ipv4_to_u32(addr);
        self.buckets[bucket_of(value)]
            .iter()
            .find(|range| range.contains(value))
            .map(|range| &range.info)
    }

    /// Number of ranges in the table.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the table holds no ranges.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Ipv4AsTable {
    fn default() -> Self {
        Self::new()
    }
}

const fn bucket_of(value: u32) -> usize {
    (value >> 24) as usize
}

fn parse_u32(field: Option<&str>) -> u32 {
    field.and_then(|f| f.trim().parse().ok()).unwrap_or(0)
}
