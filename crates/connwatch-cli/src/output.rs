//! Record formatting for the terminal.
//!
//! Records from the per-family consumers arrive concurrently; each line is
//! written under the stdout lock so lines never interleave.

use std::io::Write;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use connwatch_common::types::{AsInfo, EnrichedRecord};
use connwatch_ebpf::enrich::RecordSink;

/// How records are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Fixed-width columns with a header line.
    Table,
    /// One JSON object per line.
    Json,
}

/// Prints records as aligned table rows.
#[derive(Debug)]
pub struct TableSink {
    start: DateTime<Utc>,
    show_process: bool,
}

impl TableSink {
    /// Creates a table whose TIME column counts seconds from now.
    /// `show_process` adds the PROCESS column.
    pub fn new(show_process: bool) -> Self {
        Self::starting_at(Utc::now(), show_process)
    }

    fn starting_at(start: DateTime<Utc>, show_process: bool) -> Self {
        Self {
            start,
            show_process,
        }
    }

    /// The header line.
    pub fn header(&self) -> String {
        self.row(
            "TIME",
            "AF",
            "PID",
            "USER",
            "PCOMM",
            "DESTINATION",
            "HOST",
            "AS-INFO",
            "PROCESS",
        )
    }

    /// One formatted row for `record`.
    pub fn line(&self, record: &EnrichedRecord) -> String {
        let elapsed = (record.timestamp - self.start)
            .to_std()
            .unwrap_or_default()
            .as_secs_f64();
        self.row(
            &format!("{elapsed:.6}"),
            &record.address_family.to_string(),
            &record.pid.to_string(),
            &record.user,
            &record.comm,
            &format_destination(record.destination),
            record.hostname.as_deref().unwrap_or(""),
            &format_as(record.as_info.as_ref()),
            &format_process(&record.process_path, &record.process_args),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn row(
        &self,
        time: &str,
        family: &str,
        pid: &str,
        user: &str,
        comm: &str,
        destination: &str,
        host: &str,
        as_info: &str,
        process: &str,
    ) -> String {
        let mut row = format!(
            "{time:<12} {family:<14} {pid:<6} {user:<16} {comm:<16} {destination:<24} {host:<24} {as_info}"
        );
        if self.show_process {
            row.push_str(&format!("\t{process}"));
        }
        row.trim_end().to_owned()
    }
}

impl RecordSink for TableSink {
    fn emit(&self, record: EnrichedRecord) {
        write_line(&self.line(&record));
    }
}

/// Prints records as JSON lines.
#[derive(Debug, Clone, Copy)]
pub struct JsonSink;

impl RecordSink for JsonSink {
    fn emit(&self, record: EnrichedRecord) {
        match serde_json::to_string(&record) {
            Ok(line) => write_line(&line),
            Err(e) => tracing::warn!(error = %e, pid = record.pid, "failed to serialize record"),
        }
    }
}

/// `address:port`, or empty for families without a destination.
pub fn format_destination(destination: Option<SocketAddr>) -> String {
    destination.map(|d| d.to_string()).unwrap_or_default()
}

/// `AS<number> (<description>)`, or empty when unknown.
pub fn format_as(info: Option<&AsInfo>) -> String {
    info.map(ToString::to_string).unwrap_or_default()
}

/// Executable path followed by the arguments.
pub fn format_process(path: &str, args: &str) -> String {
    if args.is_empty() {
        path.to_owned()
    } else {
        format!("{path} {args}")
    }
}

/// Writes one line to stdout. A closed stdout is not an error worth
/// stopping for.
pub(crate) fn write_line(line: &str) {
    let mut out = std::io::stdout().lock();
    if let Err(e) = writeln!(out, "{line}") {
        tracing::debug!(error = %e, "failed to write record");
    }
}

#[cfg(test)]
mod tests {
    use connwatch_common::types::AddressFamily;

    use super::*;

    fn record() -> EnrichedRecord {
        EnrichedRecord {
            timestamp: DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::milliseconds(1500),
            kernel_time_us: 7,
            address_family: AddressFamily::new(2),
            pid: 21,
            uid: 1000,
            process_path: "/usr/bin/curl".into(),
            process_args: "-s https://github.com".into(),
            user: "alice".into(),
            comm: "curl".into(),
            destination: Some("140.82.121.4:443".parse().unwrap()),
            hostname: Some("github.com".into()),
            as_info: Some(AsInfo {
                as_number: 36459,
                description: "GITHUB".into(),
            }),
        }
    }

    #[test]
    fn header_lists_columns() {
        let table = TableSink::starting_at(DateTime::<Utc>::UNIX_EPOCH, false);
        let columns: Vec<_> = table.header().split_whitespace().map(str::to_owned).collect();
        assert_eq!(
            columns,
            ["TIME", "AF", "PID", "USER", "PCOMM", "DESTINATION", "HOST", "AS-INFO"]
        );

        let all = TableSink::starting_at(DateTime::<Utc>::UNIX_EPOCH, true);
        assert!(all.header().ends_with("\tPROCESS"));
    }

    #[test]
    fn row_contains_enriched_fields() {
        let table = TableSink::starting_at(DateTime::<Utc>::UNIX_EPOCH, true);
        let line = table.line(&record());
        assert!(line.starts_with("1.500000 "));
        for field in [
            "AF_INET",
            "21",
            "alice",
            "curl",
            "140.82.121.4:443",
            "github.com",
            "AS36459 (GITHUB)",
            "/usr/bin/curl -s https://github.com",
        ] {
            assert!(line.contains(field), "{field} missing from {line}");
        }
    }

    #[test]
    fn record_before_start_shows_zero() {
        let table = TableSink::starting_at(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::hours(1), false);
        assert!(table.line(&record()).starts_with("0.000000 "));
    }

    #[test]
    fn missing_fields_format_as_empty() {
        assert_eq!(format_destination(None), "");
        assert_eq!(format_as(None), "");
        assert_eq!(format_process("", ""), "");
        assert_eq!(format_process("/bin/ls", ""), "/bin/ls");
        assert_eq!(
            format_destination(Some("[::1]:53".parse().unwrap())),
            "[::1]:53"
        );
    }

    #[test]
    fn json_line_is_one_object() {
        let line = serde_json::to_string(&record()).unwrap();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["pid"], 21);
        assert_eq!(value["as_info"]["as_number"], 36459);
    }
}
