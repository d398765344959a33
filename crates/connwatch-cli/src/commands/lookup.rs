//! `connwatch lookup`: one-shot AS lookup.

use std::io::Write;
use std::net::IpAddr;
use std::path::PathBuf;

use clap::Args;
use connwatch_common::constants::{DEFAULT_IPV4_AS_DB, DEFAULT_IPV6_AS_DB};
use connwatch_common::types::AsInfo;
use connwatch_core::asn::AsLookup;

use super::AsDbArgs;

/// Arguments for the `lookup` command.
#[derive(Args, Debug)]
pub struct LookupArgs {
    /// IPv4 or IPv6 address to look up.
    pub address: IpAddr,

    /// AS databases; the default path is used for the address's family.
    #[command(flatten)]
    pub databases: AsDbArgs,
}

/// Executes the `lookup` command.
///
/// # Errors
///
/// Returns an error if the database for the address's family cannot be read.
pub fn execute(args: &LookupArgs) -> anyhow::Result<()> {
    let mut lookup = AsLookup::new();
    match args.address {
        IpAddr::V4(_) => {
            let path = args
                .databases
                .ipv4_db
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IPV4_AS_DB));
            let _ = lookup.load_ipv4(&path)?;
        }
        IpAddr::V6(_) => {
            let path = args
                .databases
                .ipv6_db
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IPV6_AS_DB));
            let _ = lookup.load_ipv6(&path)?;
        }
    }

    let line = describe(args.address, lookup.lookup(args.address));
    writeln!(std::io::stdout().lock(), "{line}")?;
    Ok(())
}

/// One output line: the address and its owner, or `unknown`.
pub fn describe(address: IpAddr, info: Option<&AsInfo>) -> String {
    info.map_or_else(
        || format!("{address}\tunknown"),
        |info| format!("{address}\t{info}"),
    )
}
