//! # connwatch-core
//!
//! Lookup engines used to enrich outbound connection events:
//! - **Address codec**: raw kernel address fields to `std::net` types.
//! - **AS lookup**: autonomous system ownership from `ip2asn` databases.
//! - **DNS cache**: hostname correlation keyed by address and pid.
//! - **Identity**: executable path, arguments, and username of a process.
//!
//! Every engine is an explicitly constructed value; callers own them and
//! share them across consumers with `Arc`.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod addr;
pub mod asn;
pub mod dns_cache;
pub mod identity;
