//! UID-to-username resolution.

/// Looks `uid` up in the system user database, falling back to its decimal form.
#[cfg(unix)]
pub(super) fn username(uid: u32) -> String {
    use nix::unistd::{Uid, User};

    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        Ok(None) => {
            tracing::debug!(uid, "no user entry for uid");
            uid.to_string()
        }
        Err(e) => {
            tracing::debug!(uid, error = %e, "user lookup failed");
            uid.to_string()
        }
    }
}

/// Stub for non-Unix platforms: always the decimal uid.
#[cfg(not(unix))]
pub(super) fn username(uid: u32) -> String {
    uid.to_string()
}
