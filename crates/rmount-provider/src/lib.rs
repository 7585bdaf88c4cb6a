//! # rmount – provider
//!
//! Host-facing surface of the mount bridge. One `ProviderBridge` per mounted
//! target turns replication-host requests (enumerate, stat, fetch, create,
//! modify, delete) into remote operations and classifies every failure into
//! the four-kind taxonomy the host understands.

pub mod provider;
