//! Autonomous system lookup.
//!
//! Two independently loaded tables answer "which AS owns this address":
//! a bucketed table for IPv4 and a linear range list for IPv6. Both keep
//! first-match-wins semantics in file order, so results stay identical to
//! what the published `ip2asn` databases produce with existing tooling.
//!
//! Tables are built once at startup and are read-only afterwards; share an
//! [`AsLookup`] between consumers through an `Arc`.

mod ipv4;
mod ipv6;

use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use connwatch_common::error::{ConnwatchError, Result};
use connwatch_common::types::AsInfo;

pub use ipv4::Ipv4AsTable;
pub use ipv6::Ipv6AsTable;

/// Owns the IPv4 and IPv6 AS tables.
#[derive(Debug, Clone, Default)]
pub struct AsLookup {
    ipv4: Ipv4AsTable,
    ipv6: Ipv6AsTable,
}

impl AsLookup {
    /// Creates a lookup with empty tables; every address is unknown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a lookup from already built tables.
    #[must_use]
    pub const fn from_tables(ipv4: Ipv4AsTable, ipv6: Ipv6AsTable) -> Self {
        Self { ipv4, ipv6 }
    }

    /// Loads the IPv4 database at `path`, replacing the current IPv4 table.
    ///
    /// Returns the number of ranges loaded. On error the previous table is
    /// kept, so a lookup that was never loaded keeps answering "unknown".
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn load_ipv4(&mut self, path: &Path) -> Result<usize> {
        let table = Ipv4AsTable::parse(open(path)?).map_err(|e| io_error(path, e))?;
        tracing::info!(path = %path.display(), entries = table.len(), "loaded IPv4 AS database");
        self.ipv4 = table;
        Ok(self.ipv4.len())
    }

    /// Loads the IPv6 database at `path`, replacing the current IPv6 table.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn load_ipv6(&mut self, path: &Path) -> Result<usize> {
        let table = Ipv6AsTable::parse(open(path)?).map_err(|e| io_error(path, e))?;
        tracing::info!(path = %path.display(), entries = table.len(), "loaded IPv6 AS database");
        self.ipv6 = table;
        Ok(self.ipv6.len())
    }

    /// Returns the AS owning `addr`, dispatching on its family.
    #[must_use]
    pub fn lookup(&self, addr: IpAddr) -> Option<&AsInfo> {
        match addr {
            IpAddr::V4(v4) => self.lookup_ipv4(v4),
            IpAddr::V6(v6) => self.lookup_ipv6(v6),
        }
    }

    /// Returns the AS owning an IPv4 address.
    #[must_use]
    pub fn lookup_ipv4(&self, addr: Ipv4Addr) -> Option<&AsInfo> {
        self.ipv4.lookup(addr)
    }

    /// Returns the AS owning an IPv6 address.
    #[must_use]
    pub fn lookup_ipv6(&self, addr: Ipv6Addr) -> Option<&AsInfo> {
        self.ipv6.lookup(addr)
    }

    /// Number of IPv4 ranges loaded.
    #[must_use]
    pub const fn ipv4_entries(&self) -> usize {
        self.ipv4.len()
    }

    /// Number of IPv6 ranges loaded.
    #[must_use]
    pub fn ipv6_entries(&self) -> usize {
        self.ipv6.len()
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> ConnwatchError {
    ConnwatchError::Io {
        path: path.to_path_buf(),
        source,
    }
}
