//! CLI command definitions and dispatch.

pub mod lookup;
pub mod trace;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use connwatch_core::asn::AsLookup;

/// connwatch: trace outbound connections with process, DNS, and AS context.
#[derive(Parser, Debug)]
#[command(name = "connwatch", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Write logs to stderr as JSON lines.
    #[arg(long, global = true, env = "CONNWATCH_LOG_JSON")]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream enriched connect events until interrupted.
    Trace(trace::TraceArgs),
    /// Look up the autonomous system owning an address.
    Lookup(lookup::LookupArgs),
}

/// AS database locations shared by the subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct AsDbArgs {
    /// IPv4 AS database (ip2asn-v4-u32 TSV).
    #[arg(long, env = "CONNWATCH_IPV4_DB")]
    pub ipv4_db: Option<PathBuf>,

    /// IPv6 AS database (ip2asn-v6 TSV).
    #[arg(long, env = "CONNWATCH_IPV6_DB")]
    pub ipv6_db: Option<PathBuf>,
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Trace(args) => trace::execute(args),
        Command::Lookup(args) => lookup::execute(&args),
    }
}

/// Loads whichever AS databases are given. A database that fails to load is
/// logged and left empty, so its family reports no AS.
pub(crate) fn load_as_databases(ipv4: Option<&Path>, ipv6: Option<&Path>) -> AsLookup {
    let mut lookup = AsLookup::new();
    if let Some(path) = ipv4 {
        if let Err(e) = lookup.load_ipv4(path) {
            tracing::warn!(error = %e, "IPv4 AS database unavailable, continuing without it");
        }
    }
    if let Some(path) = ipv6 {
        if let Err(e) = lookup.load_ipv6(path) {
            tracing::warn!(error = %e, "IPv6 AS database unavailable, continuing without it");
        }
    }
    lookup
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_trace_flags() {
        let cli = Cli::parse_from([
            "connwatch",
            "--log-json",
            "trace",
            "-a",
            "--format",
            "json",
            "--perf-pages",
            "64",
            "--no-dns",
        ]);
        assert!(cli.log_json);
        let Command::Trace(args) = cli.command else {
            panic!("expected trace");
        };
        assert!(args.all);
        assert!(args.no_dns);
        assert_eq!(args.perf_pages, Some(64));
    }

    #[test]
    fn parses_lookup_address() {
        let cli = Cli::parse_from(["connwatch", "lookup", "38.63.2.254", "--ipv4-db", "/tmp/db"]);
        let Command::Lookup(args) = cli.command else {
            panic!("expected lookup");
        };
        assert_eq!(args.address.to_string(), "38.63.2.254");
        assert_eq!(args.databases.ipv4_db, Some(PathBuf::from("/tmp/db")));
    }

    #[test]
    fn missing_database_degrades_to_empty_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "641662976\t641667071\t174\tUS\tCOGENT-174").unwrap();

        let lookup = load_as_databases(Some(file.path()), Some(Path::new("/nonexistent/v6.tsv")));
        assert_eq!(lookup.ipv4_entries(), 1);
        assert_eq!(lookup.ipv6_entries(), 0);
    }
}
