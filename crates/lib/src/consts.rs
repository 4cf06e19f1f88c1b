//! Fixed names shared across the crate.

/// Application name, used for platform directories.
pub const APP_NAME: &str = "autobuild";

/// File name of a module descriptor inside a source directory.
pub const DESCRIPTOR_FILE: &str = "pom.xml";

/// Extension of a published descriptor in the repository layout.
pub const DESCRIPTOR_EXT: &str = "pom";

/// File name of the synthesized version listing.
pub const METADATA_FILE: &str = "maven-metadata.xml";

/// Chunk size used when hashing file contents.
pub const HASH_CHUNK_SIZE: usize = 8192;
