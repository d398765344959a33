//! Process and user identity resolution.
//!
//! Enrichment happens after the kernel event fired, so short-lived processes
//! are routinely gone by the time we look. Every resolver method is
//! best-effort and returns an empty (or numeric) value instead of an error.

mod process;
mod user;

use std::path::PathBuf;

pub use process::parse_cmdline;

/// Source of process metadata for enrichment.
pub trait ProcessResolver: Send + Sync {
    /// Executable path of `pid`, or an empty string.
    fn executable_path(&self, pid: u32) -> String;

    /// Arguments of `pid` without argv\[0\], joined by spaces, or an empty string.
    fn command_line(&self, pid: u32) -> String;

    /// Username for `uid`, or its decimal form.
    fn username(&self, uid: u32) -> String;
}

/// Resolves process metadata from a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcfsResolver {
    root: PathBuf,
}

impl ProcfsResolver {
    /// Resolver reading from `/proc`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(connwatch_common::constants::PROC_ROOT)
    }

    /// Resolver reading from an alternative procfs root.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcfsResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessResolver for ProcfsResolver {
    fn executable_path(&self, pid: u32) -> String {
        process::executable_path(&self.root, pid)
    }

    fn command_line(&self, pid: u32) -> String {
        process::command_line(&self.root, pid)
    }

    fn username(&self, uid: u32) -> String {
        user::username(uid)
    }
}
