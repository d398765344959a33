//! Names of the kernel programs, probe targets, and maps in the BPF object.
//!
//! The object file is built out of tree and installed next to the binary;
//! these names are the contract between it and the loader in
//! [`crate::tracer`].

pub mod connect;
pub mod dns;
