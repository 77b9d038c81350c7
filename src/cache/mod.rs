//! Persistent artifact cache for built daemon binaries
//!
//! Expensive builds are keyed by `(namespace, version)` and copied into
//! a cache root that survives restarts. Entries are immutable once
//! written: the same key is never rebuilt and stored files are never
//! overwritten.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   <namespace>/
//!     .cache_index          {"<version>": "<root>/<namespace>/<binary>"}
//!     <binary>
//! ```

pub mod index;
pub mod store;

pub use index::{VersionIndex, INDEX_FILENAME};
pub use store::{ArtifactCache, CachedArtifact};
