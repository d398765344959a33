//! Kernel attachment.
//!
//! Loads the compiled BPF object, attaches the connect kprobe and the
//! resolver uprobes, and turns every perf array into a [`QueueChannel`] fed
//! by one reader task per online CPU. Requires the `ebpf` feature and Linux;
//! elsewhere [`attach`] reports [`ConnwatchError::Unsupported`].

use std::fmt;

use connwatch_common::config::ConnwatchConfig;
#[cfg(not(all(target_os = "linux", feature = "ebpf")))]
use connwatch_common::error::ConnwatchError;
use connwatch_common::error::Result;

use crate::channel::{QueueChannel, Shutdown};
use crate::net_monitor::ProbeChannels;

/// Records buffered between the per-CPU readers and a consumer.
pub const QUEUE_CAPACITY: usize = 4096;

/// Keeps the loaded programs attached. Dropping it detaches every probe.
pub struct Attachment {
    #[cfg(all(target_os = "linux", feature = "ebpf"))]
    _bpf: aya::Ebpf,
    dns_attached: bool,
}

impl Attachment {
    /// Whether the resolver probes are attached.
    #[must_use]
    pub const fn dns_attached(&self) -> bool {
        self.dns_attached
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("dns_attached", &self.dns_attached)
            .finish_non_exhaustive()
    }
}

/// Loads and attaches the kernel instrumentation.
///
/// Must be called from within a tokio runtime; the per-CPU readers are
/// spawned onto it and stop when `shutdown` triggers.
///
/// # Errors
///
/// Returns [`ConnwatchError::Attach`] if the object cannot be loaded or the
/// connect probe cannot be attached, and [`ConnwatchError::Unsupported`] when
/// built without kernel support. Failing to attach the resolver probes is not
/// an error; the returned channels then carry no `dns` channel.
#[cfg(all(target_os = "linux", feature = "ebpf"))]
pub fn attach(
    config: &ConnwatchConfig,
    shutdown: &Shutdown,
) -> Result<(ProbeChannels<QueueChannel>, Attachment)> {
    linux::attach(config, shutdown)
}

/// Loads and attaches the kernel instrumentation.
///
/// # Errors
///
/// Always returns [`ConnwatchError::Unsupported`] in this build.
#[cfg(not(all(target_os = "linux", feature = "ebpf")))]
pub fn attach(
    _config: &ConnwatchConfig,
    _shutdown: &Shutdown,
) -> Result<(ProbeChannels<QueueChannel>, Attachment)> {
    Err(ConnwatchError::Unsupported {
        message: "kernel tracing requires Linux and the `ebpf` feature".into(),
    })
}

#[cfg(all(target_os = "linux", feature = "ebpf"))]
mod linux {
    use std::path::Path;

    use aya::Ebpf;
    use aya::maps::MapData;
    use aya::maps::perf::{AsyncPerfEventArray, AsyncPerfEventArrayBuffer};
    use aya::programs::{KProbe, UProbe};
    use aya::util::online_cpus;
    use bytes::BytesMut;
    use connwatch_common::config::ConnwatchConfig;
    use connwatch_common::constants::LIBC_PATHS;
    use connwatch_common::error::{ConnwatchError, Result};
    use nix::sys::resource::{RLIM_INFINITY, Resource, setrlimit};

    use super::{Attachment, QUEUE_CAPACITY};
    use crate::channel::{ChannelFeed, QueueChannel, Shutdown, ShutdownSignal, queue_channel};
    use crate::dns_monitor::DNS_EVENT_LEN;
    use crate::event::ConnectFamily;
    use crate::net_monitor::ProbeChannels;
    use crate::programs::connect::{CONNECT_PROBE_TARGET, CONNECT_PROGRAM_NAME, events_map};
    use crate::programs::dns::{
        DNS_ENTRY_PROGRAM_NAME, DNS_EVENTS_MAP, DNS_PROBE_SYMBOL, DNS_RETURN_PROGRAM_NAME,
    };

    /// Samples fetched per perf read.
    const READ_BATCH: usize = 16;

    pub(super) fn attach(
        config: &ConnwatchConfig,
        shutdown: &Shutdown,
    ) -> Result<(ProbeChannels<QueueChannel>, Attachment)> {
        raise_memlock_limit();

        let mut bpf = Ebpf::load_file(&config.bpf_object).map_err(|e| {
            ConnwatchError::attach(format!("loading {}: {e}", config.bpf_object.display()))
        })?;

        let program: &mut KProbe = bpf
            .program_mut(CONNECT_PROGRAM_NAME)
            .ok_or_else(|| missing_program(CONNECT_PROGRAM_NAME))?
            .try_into()
            .map_err(ConnwatchError::attach)?;
        program.load().map_err(ConnwatchError::attach)?;
        let _ = program
            .attach(CONNECT_PROBE_TARGET, 0)
            .map_err(|e| ConnwatchError::attach(format!("{CONNECT_PROBE_TARGET}: {e}")))?;
        tracing::info!(function = CONNECT_PROBE_TARGET, "attached connect probe");

        let cpus = online_cpus()
            .map_err(|(path, e)| ConnwatchError::attach(format!("reading {path}: {e}")))?;
        let pages = config.perf_pages;

        let mut open_family = |family: ConnectFamily| {
            open_channel(
                &mut bpf,
                events_map(family),
                family.record_len(),
                &cpus,
                pages,
                shutdown,
            )
        };
        let ipv4 = open_family(ConnectFamily::Ipv4)?;
        let ipv6 = open_family(ConnectFamily::Ipv6)?;
        let other = open_family(ConnectFamily::Other)?;

        let dns = if config.trace_dns {
            match attach_resolver_probes(&mut bpf) {
                Ok(libc) => {
                    tracing::info!(libc = %libc, symbol = DNS_PROBE_SYMBOL, "attached resolver probes");
                    match open_channel(&mut bpf, DNS_EVENTS_MAP, DNS_EVENT_LEN, &cpus, pages, shutdown) {
                        Ok(channel) => Some(channel),
                        Err(e) => {
                            tracing::warn!(error = %e, "resolver events unavailable, hostnames disabled");
                            None
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to attach resolver probes, hostnames disabled");
                    None
                }
            }
        } else {
            tracing::info!("resolver probes disabled");
            None
        };

        let dns_attached = dns.is_some();
        Ok((
            ProbeChannels {
                ipv4,
                ipv6,
                other,
                dns,
            },
            Attachment {
                _bpf: bpf,
                dns_attached,
            },
        ))
    }

    // Kernels before 5.11 charge BPF maps against RLIMIT_MEMLOCK.
    fn raise_memlock_limit() {
        if let Err(e) = setrlimit(Resource::RLIMIT_MEMLOCK, RLIM_INFINITY, RLIM_INFINITY) {
            tracing::warn!(error = %e, "failed to raise RLIMIT_MEMLOCK");
        }
    }

    fn missing_program(name: &str) -> ConnwatchError {
        ConnwatchError::attach(format!("program {name} not found in BPF object"))
    }

    /// Attaches both resolver probes against the first libc that accepts
    /// them, returning its path.
    fn attach_resolver_probes(bpf: &mut Ebpf) -> Result<String> {
        for name in [DNS_ENTRY_PROGRAM_NAME, DNS_RETURN_PROGRAM_NAME] {
            let program: &mut UProbe = bpf
                .program_mut(name)
                .ok_or_else(|| missing_program(name))?
                .try_into()
                .map_err(ConnwatchError::attach)?;
            program.load().map_err(ConnwatchError::attach)?;
        }

        let mut last_error = None;
        for libc in LIBC_PATHS.iter().copied().filter(|p| Path::new(p).exists()) {
            match attach_uprobes_to(bpf, libc) {
                Ok(()) => return Ok(libc.to_owned()),
                Err(e) => {
                    tracing::debug!(libc, error = %e, "resolver probe attach failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ConnwatchError::attach("no libc found")))
    }

    fn attach_uprobes_to(bpf: &mut Ebpf, libc: &str) -> Result<()> {
        for name in [DNS_ENTRY_PROGRAM_NAME, DNS_RETURN_PROGRAM_NAME] {
            let program: &mut UProbe = bpf
                .program_mut(name)
                .ok_or_else(|| missing_program(name))?
                .try_into()
                .map_err(ConnwatchError::attach)?;
            let _ = program
                .attach(Some(DNS_PROBE_SYMBOL), 0, libc, None)
                .map_err(|e| ConnwatchError::attach(format!("{name} on {libc}: {e}")))?;
        }
        Ok(())
    }

    fn open_channel(
        bpf: &mut Ebpf,
        map: &'static str,
        record_len: usize,
        cpus: &[u32],
        pages: Option<usize>,
        shutdown: &Shutdown,
    ) -> Result<QueueChannel> {
        let map_data = bpf
            .take_map(map)
            .ok_or_else(|| ConnwatchError::attach(format!("map {map} not found in BPF object")))?;
        let mut array = AsyncPerfEventArray::try_from(map_data).map_err(ConnwatchError::attach)?;

        let (feed, channel) = queue_channel(QUEUE_CAPACITY, shutdown.signal());
        for &cpu in cpus {
            let buf = array
                .open(cpu, pages)
                .map_err(|e| ConnwatchError::attach(format!("{map} on cpu {cpu}: {e}")))?;
            drop(tokio::spawn(forward(
                map,
                cpu,
                buf,
                record_len,
                feed.clone(),
                shutdown.signal(),
            )));
        }
        tracing::debug!(map, cpus = cpus.len(), "opened perf array");
        Ok(channel)
    }

    /// Copies one CPU's perf samples into the shared queue until shutdown or
    /// until the consumer is gone.
    async fn forward(
        map: &'static str,
        cpu: u32,
        mut buf: AsyncPerfEventArrayBuffer<MapData>,
        record_len: usize,
        feed: ChannelFeed,
        mut shutdown: ShutdownSignal,
    ) {
        let mut buffers: Vec<BytesMut> = (0..READ_BATCH)
            .map(|_| BytesMut::with_capacity(record_len))
            .collect();

        loop {
            let result = tokio::select! {
                biased;
                () = shutdown.wait() => break,
                result = buf.read_events(&mut buffers) => result,
            };

            let open = match result {
                Ok(events) => {
                    let mut open = true;
                    if events.lost > 0 {
                        open = feed.lost(u64::try_from(events.lost).unwrap_or(u64::MAX)).await;
                    }
                    for sample in buffers.iter_mut().take(events.read) {
                        if !open {
                            break;
                        }
                        open = feed.sample(sample.to_vec()).await;
                        sample.clear();
                    }
                    open
                }
                Err(e) => feed.error(format!("{map} on cpu {cpu}: {e}")).await,
            };
            if !open {
                break;
            }
        }

        tracing::debug!(map, cpu, "perf reader stopped");
    }
}
