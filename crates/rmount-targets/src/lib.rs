//! # rmount-targets
//!
//! The set of configured remote targets: a JSON-backed registry, the one-time
//! migration of the legacy single-target record, the credential-store seam
//! and the live mount bindings.

pub mod targets;
