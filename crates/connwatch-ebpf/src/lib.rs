//! # connwatch-ebpf
//!
//! Kernel event consumption for connwatch.
//!
//! - [`event`] decodes the raw connect records written by the kernel probe.
//! - [`channel`] is the reader abstraction between perf buffers and consumers,
//!   including the shutdown signal.
//! - [`net_monitor`] and [`dns_monitor`] run one consumer per channel.
//! - [`enrich`] attaches AS, hostname, and process context to each event.
//! - [`tracer`] loads and attaches the BPF object. It needs the `ebpf`
//!   feature and a Linux host with BPF support.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod channel;
pub mod dns_monitor;
pub mod enrich;
pub mod event;
pub mod net_monitor;
pub mod programs;
pub mod tracer;
