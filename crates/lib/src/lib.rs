//! autobuild-lib: dependency resolution, incremental builds and a repository proxy
//!
//! This crate provides the pieces the `autobuild` binary wires together:
//! - `index`: scans a source tree for module descriptors
//! - `graph`: resolves a package's transitive dependency graph
//! - `orchestrate`: builds local packages in dependency order, skipping unchanged ones
//! - `proxy`: serves the artifact store over the repository HTTP layout

pub mod config;
pub mod consts;
pub mod coord;
pub mod descriptor;
pub mod diagnostics;
pub mod fingerprint;
pub mod graph;
pub mod index;
pub mod mirror;
pub mod orchestrate;
pub mod platform;
pub mod proxy;
pub mod store;
pub mod util;
pub mod version;
