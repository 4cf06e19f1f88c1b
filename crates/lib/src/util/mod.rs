//! Shared utilities.
//!
//! Content hashing and directory copying used by the fingerprint store and
//! the orchestrator.

pub mod fs;
pub mod hash;
