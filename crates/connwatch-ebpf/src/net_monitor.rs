//! Connect event consumers.
//!
//! One consumer runs per address family. Each reads its channel in a loop,
//! decodes, enriches, and emits one record at a time, so records of one family
//! come out in the order the kernel produced them. There is no ordering across
//! families.

use std::sync::Arc;

use connwatch_core::dns_cache::DnsCache;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::channel::{ChannelError, ChannelRecord, EventChannel};
use crate::dns_monitor::consume_dns_events;
use crate::enrich::{Enricher, RecordSink};
use crate::event::{ConnectEvent, ConnectFamily};

/// Counters reported by a consumer when its channel closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStats {
    /// Channel the consumer read from.
    pub channel: &'static str,
    /// Records emitted (connect) or resolutions recorded (DNS).
    pub emitted: u64,
    /// Samples that could not be decoded.
    pub decode_errors: u64,
    /// Transient read failures.
    pub read_errors: u64,
    /// Samples the kernel reported as dropped.
    pub lost_samples: u64,
}

impl ConsumerStats {
    pub(crate) const fn new(channel: &'static str) -> Self {
        Self {
            channel,
            emitted: 0,
            decode_errors: 0,
            read_errors: 0,
            lost_samples: 0,
        }
    }

    pub(crate) fn read_error(&mut self, message: &str) {
        self.read_errors += 1;
        tracing::warn!(channel = self.channel, error = message, "failed to read event buffer");
    }

    pub(crate) fn lost(&mut self, count: u64) {
        self.lost_samples += count;
        tracing::warn!(channel = self.channel, lost = count, "kernel dropped events");
    }

    pub(crate) fn decode_error(&mut self, error: &dyn std::error::Error) {
        self.decode_errors += 1;
        tracing::warn!(channel = self.channel, %error, "dropping undecodable record");
    }

    pub(crate) fn finish(self) -> Self {
        tracing::info!(
            channel = self.channel,
            emitted = self.emitted,
            decode_errors = self.decode_errors,
            read_errors = self.read_errors,
            lost = self.lost_samples,
            "consumer stopped"
        );
        self
    }
}

/// Reads connect records for `family` until the channel closes.
///
/// Read errors, lost samples, and undecodable records are logged and
/// skipped. Returns the counters once the channel reports
/// [`ChannelError::Closed`].
pub async fn consume_connect_events<C: EventChannel>(
    family: ConnectFamily,
    mut channel: C,
    enricher: &Enricher,
    sink: &dyn RecordSink,
) -> ConsumerStats {
    let mut stats = ConsumerStats::new(family.name());
    tracing::debug!(channel = stats.channel, "connect consumer started");

    loop {
        match channel.next_record().await {
            Err(ChannelError::Closed) => break,
            Err(ChannelError::Read(message)) => stats.read_error(&message),
            Ok(ChannelRecord::Lost(count)) => stats.lost(count),
            Ok(ChannelRecord::Sample(raw)) => match ConnectEvent::decode(family, &raw) {
                Ok(event) => {
                    sink.emit(enricher.enrich(&event));
                    stats.emitted += 1;
                }
                Err(e) => stats.decode_error(&e),
            },
        }
    }

    stats.finish()
}

/// The channels a kernel attachment hands to the consumers.
#[derive(Debug)]
pub struct ProbeChannels<C> {
    /// IPv4 connect records.
    pub ipv4: C,
    /// IPv6 connect records.
    pub ipv6: C,
    /// Connect records for every other family.
    pub other: C,
    /// Resolver records; absent when the DNS probes are not attached.
    pub dns: Option<C>,
}

/// Join handles of the spawned consumers.
#[derive(Debug)]
pub struct MonitorHandles {
    handles: Vec<JoinHandle<ConsumerStats>>,
}

impl MonitorHandles {
    /// Number of running consumers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no consumer was spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every consumer to finish and returns their counters.
    ///
    /// A consumer that panicked is logged and left out.
    pub async fn join(self) -> Vec<ConsumerStats> {
        let mut stats = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            match handle.await {
                Ok(s) => stats.push(s),
                Err(e) => tracing::error!(error = %e, "consumer task failed"),
            }
        }
        stats
    }
}

/// Spawns one consumer task per connect family, plus one for the resolver
/// channel when present.
///
/// Must be called from within a tokio runtime.
pub fn spawn_monitors<C>(
    channels: ProbeChannels<C>,
    enricher: Arc<Enricher>,
    dns_cache: Arc<DnsCache>,
    sink: Arc<dyn RecordSink>,
) -> MonitorHandles
where
    C: EventChannel + 'static,
{
    let ProbeChannels {
        ipv4,
        ipv6,
        other,
        dns,
    } = channels;

    let mut handles = Vec::with_capacity(4);
    for (family, channel) in [
        (ConnectFamily::Ipv4, ipv4),
        (ConnectFamily::Ipv6, ipv6),
        (ConnectFamily::Other, other),
    ] {
        let enricher = Arc::clone(&enricher);
        let sink = Arc::clone(&sink);
        handles.push(tokio::spawn(async move {
            consume_connect_events(family, channel, &enricher, sink.as_ref()).await
        }));
    }

    if let Some(channel) = dns {
        handles.push(tokio::spawn(async move {
            consume_dns_events(channel, &dns_cache).await
        }));
    }

    tracing::info!(consumers = handles.len(), "event consumers started");
    MonitorHandles { handles }
}
