//! # Postcode Shards Store
//!
//! Where release artifacts live at rest. Provides trait-based access to shard
//! blobs, the manifest and its signature, with filesystem and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`ShardSource`] - Read-only access used by consumers
//! - [`ShardSink`] - Write access used when publishing a release
//! - [`FsShardStore`] - A release directory on disk
//! - [`MemoryShardStore`] - In-memory storage for tests and embedding
//!
//! ## Layout
//!
//! ```text
//! <root>/manifest.txt
//! <root>/manifest.sig
//! <root>/shard_<KEY>.bin
//! ```
//!
//! ## Design Notes
//!
//! - **Immutable artifacts**: consumers never write; a new release goes into a
//!   new directory or store.
//! - **Absence is not an error**: reads return `Ok(None)` for missing files so
//!   the loader can tell "no such shard" apart from I/O failure.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use fs::FsShardStore;
pub use memory::MemoryShardStore;
pub use traits::{ShardSink, ShardSource, MANIFEST_FILE, SIGNATURE_FILE};
