//! `connwatch trace`: stream enriched connect events.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use connwatch_common::config::ConnwatchConfig;
use connwatch_common::constants::{DEFAULT_BPF_OBJECT, DEFAULT_IPV4_AS_DB};
use connwatch_core::dns_cache::DnsCache;
use connwatch_core::identity::ProcfsResolver;
use connwatch_ebpf::channel::Shutdown;
use connwatch_ebpf::enrich::{Enricher, RecordSink};
use connwatch_ebpf::net_monitor::spawn_monitors;
use connwatch_ebpf::tracer;

use super::{AsDbArgs, load_as_databases};
use crate::output::{JsonSink, OutputFormat, TableSink};

/// Arguments for the `trace` command.
#[derive(Args, Debug)]
pub struct TraceArgs {
    /// Print AS ownership and process command lines; loads the default IPv4
    /// AS database unless one is given.
    #[arg(short, long)]
    pub all: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// AS databases.
    #[command(flatten)]
    pub databases: AsDbArgs,

    /// Compiled BPF object with the connect and resolver probes.
    #[arg(long, env = "CONNWATCH_BPF_OBJECT", default_value = DEFAULT_BPF_OBJECT)]
    pub bpf_object: PathBuf,

    /// Pages per CPU for each perf buffer (power of two).
    #[arg(long)]
    pub perf_pages: Option<usize>,

    /// Do not attach the resolver probes; hostnames stay empty.
    #[arg(long)]
    pub no_dns: bool,
}

impl TraceArgs {
    /// Builds the session configuration from the flags.
    pub fn config(&self) -> ConnwatchConfig {
        let ipv4_as_db = self
            .databases
            .ipv4_db
            .clone()
            .or_else(|| self.all.then(|| PathBuf::from(DEFAULT_IPV4_AS_DB)));
        ConnwatchConfig {
            ipv4_as_db,
            ipv6_as_db: self.databases.ipv6_db.clone(),
            bpf_object: self.bpf_object.clone(),
            perf_pages: self.perf_pages,
            trace_dns: !self.no_dns,
            ..ConnwatchConfig::default()
        }
    }
}

/// Executes the `trace` command.
///
/// Attaches the kernel probes, then prints one record per connect until
/// Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the probes cannot be
/// attached.
pub fn execute(args: TraceArgs) -> anyhow::Result<()> {
    let config = args.config();
    config.validate()?;

    let as_lookup = Arc::new(load_as_databases(
        config.ipv4_as_db.as_deref(),
        config.ipv6_as_db.as_deref(),
    ));
    let dns_cache = Arc::new(DnsCache::new());
    let enricher = Arc::new(Enricher::new(
        as_lookup,
        Arc::clone(&dns_cache),
        Arc::new(ProcfsResolver::with_root(&config.proc_root)),
    ));
    let table = (args.format == OutputFormat::Table).then(|| TableSink::new(args.all));
    let header = table.as_ref().map(TableSink::header);
    let sink: Arc<dyn RecordSink> = match table {
        Some(table) => Arc::new(table),
        None => Arc::new(JsonSink),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let shutdown = Arc::new(Shutdown::new());
        let (channels, attachment) = tracer::attach(&config, &shutdown)?;

        let handler = Arc::clone(&shutdown);
        ctrlc::set_handler(move || handler.trigger())
            .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

        tracing::info!(
            dns = attachment.dns_attached(),
            "tracing outbound connections, press Ctrl+C to stop"
        );
        if let Some(header) = header {
            crate::output::write_line(&header);
        }

        let stats = spawn_monitors(channels, enricher, dns_cache, sink).join().await;
        drop(attachment);

        let lost: u64 = stats.iter().map(|s| s.lost_samples).sum();
        tracing::info!(
            records = stats.iter().filter(|s| s.channel != "dns").map(|s| s.emitted).sum::<u64>(),
            lost,
            "stopped"
        );
        Ok::<(), anyhow::Error>(())
    })
}
