//! System-wide constants and default paths.

/// Default location of the IPv4 AS database (`ip2asn-v4-u32.tsv`).
pub const DEFAULT_IPV4_AS_DB: &str = "./as/ip2asn-v4-u32.tsv";

/// Default location of the IPv6 AS database (`ip2asn-v6.tsv`).
pub const DEFAULT_IPV6_AS_DB: &str = "./as/ip2asn-v6.tsv";

/// Default location of the compiled kernel instrumentation object.
pub const DEFAULT_BPF_OBJECT: &str = "/usr/lib/connwatch/connwatch.bpf.o";

/// Mount point of the process table.
pub const PROC_ROOT: &str = "/proc";

/// Candidate libc locations for the `getaddrinfo` probes, tried in order.
pub const LIBC_PATHS: &[&str] = &[
    "/lib/x86_64-linux-gnu/libc.so.6",
    "/lib/aarch64-linux-gnu/libc.so.6",
    "/usr/lib/libc.so.6",
    "/lib64/libc.so.6",
];

/// Length of the kernel task command name buffer.
pub const TASK_COMM_LEN: usize = 16;

/// Length of the hostname buffer in DNS resolution records.
pub const DNS_HOST_LEN: usize = 80;

/// IPv4.
pub const AF_INET: u16 = 2;
/// IPv6.
pub const AF_INET6: u16 = 10;
