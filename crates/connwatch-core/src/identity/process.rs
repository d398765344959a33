//! Per-process lookups under a procfs root.

use std::path::Path;

/// Resolves `<root>/<pid>/exe` through every symlink.
///
/// Fails (returning an empty string) when the process is gone or its
/// executable no longer exists on disk.
pub(super) fn executable_path(root: &Path, pid: u32) -> String {
    let link = root.join(pid.to_string()).join("exe");
    match std::fs::canonicalize(&link) {
        Ok(resolved) => resolved.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::debug!(pid, path = %link.display(), error = %e, "could not resolve executable path");
            String::new()
        }
    }
}

/// Reads `<root>/<pid>/cmdline` and renders the arguments after argv\[0\].
pub(super) fn command_line(root: &Path, pid: u32) -> String {
    let path = root.join(pid.to_string()).join("cmdline");
    match std::fs::read(&path) {
        Ok(data) => parse_cmdline(&data),
        Err(e) => {
            tracing::debug!(pid, path = %path.display(), error = %e, "could not read command line");
            String::new()
        }
    }
}

/// Renders a NUL-separated argument vector without its first element.
///
/// Trailing NULs are ignored; arguments are joined with single spaces.
#[must_use]
pub fn parse_cmdline(data: &[u8]) -> String {
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    if end == 0 {
        return String::new();
    }
    data[..end]
        .split(|&b| b == 0)
        .skip(1)
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}
