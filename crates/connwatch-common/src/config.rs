//! Runtime configuration model for connwatch.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Root configuration for a tracing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnwatchConfig {
    /// IPv4 AS database to load, if any.
    pub ipv4_as_db: Option<PathBuf>,
    /// IPv6 AS database to load, if any.
    pub ipv6_as_db: Option<PathBuf>,
    /// Compiled kernel instrumentation object.
    pub bpf_object: PathBuf,
    /// Pages per CPU for each perf buffer. `None` keeps the loader default.
    pub perf_pages: Option<usize>,
    /// Whether to attach the `getaddrinfo` probes for hostname correlation.
    pub trace_dns: bool,
    /// Root of the process table.
    pub proc_root: PathBuf,
}

impl Default for ConnwatchConfig {
    fn default() -> Self {
        Self {
            ipv4_as_db: None,
            ipv6_as_db: None,
            bpf_object: PathBuf::from(constants::DEFAULT_BPF_OBJECT),
            perf_pages: None,
            trace_dns: true,
            proc_root: PathBuf::from(constants::PROC_ROOT),
        }
    }
}

impl ConnwatchConfig {
    /// Checks values that would only fail later, deep inside probe setup.
    ///
    /// # Errors
    ///
    /// Returns an error if the perf page count is not a power of two.
    pub fn validate(&self) -> crate::error::Result<()> {
        if let Some(pages) = self.perf_pages {
            if pages == 0 || !pages.is_power_of_two() {
                return Err(crate::error::ConnwatchError::Config {
                    message: format!("perf buffer page count must be a power of two, got {pages}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_traces_dns_from_proc() {
        let config = ConnwatchConfig::default();
        assert!(config.trace_dns);
        assert_eq!(config.proc_root, PathBuf::from("/proc"));
        assert!(config.ipv4_as_db.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_odd_page_counts() {
        let config = ConnwatchConfig {
            perf_pages: Some(3),
            ..ConnwatchConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ConnwatchConfig {
            perf_pages: Some(0),
            ..ConnwatchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_power_of_two_pages() {
        let config = ConnwatchConfig {
            perf_pages: Some(16),
            ..ConnwatchConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
