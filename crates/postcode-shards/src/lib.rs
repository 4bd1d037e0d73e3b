//! # Postcode Shards
//!
//! Signed, selectively loadable postcode lookup data.
//!
//! ## Overview
//!
//! A national postcode table is too large to ship to every consumer in one
//! piece. This crate splits it into shards keyed by a prefix of the postcode,
//! publishes a signed manifest of shard digests, and lets a consumer load only
//! the shards its queries touch, verifying each one against the manifest
//! before serving from it.
//!
//! - **Build**: partition records by shard key and encode each shard
//! - **Release**: compute the manifest and sign it
//! - **Load**: verify the manifest, then each shard on demand
//! - **Query**: exact-match lookup by normalized postcode
//!
//! ## Key Concepts
//!
//! - **Shard**: all records sharing one shard key, stored as `shard_<KEY>.bin`.
//! - **Manifest**: `blake3 length name` for every shard, signed with Ed25519.
//! - **Fail closed**: a store whose manifest does not verify serves nothing;
//!   a shard that does not verify serves nothing for its keys.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use postcode_shards::{build_release, publish, read_records, ShardStore, ShardsConfig};
//! use postcode_shards::core::Keypair;
//! use postcode_shards::store::FsShardStore;
//!
//! fn example() -> postcode_shards::Result<()> {
//!     let config = ShardsConfig::default();
//!     let keypair = Keypair::generate();
//!
//!     // Build and publish
//!     let csv = std::fs::File::open("nspl.csv").unwrap();
//!     let (records, _) = read_records(std::io::BufReader::new(csv), &config.columns)?;
//!     let release = build_release(records, &keypair, &config)?;
//!     publish(&release, &FsShardStore::create("release")?)?;
//!
//!     // Load and query
//!     let store = ShardStore::open(FsShardStore::open("release")?, keypair.public_key(), config)?;
//!     for hit in store.search(&["SW1A 1AA"])? {
//!         println!("{} -> {:?}", hit.input, hit.outcome);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `postcode_shards::core` - Records, codec, manifest and crypto
//! - `postcode_shards::store` - Shard storage abstraction and backends

pub mod builder;
pub mod config;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod release;

// Re-export component crates
pub use postcode_shards_core as core;
pub use postcode_shards_store as store;

// Re-export main types for convenience
pub use builder::{BuildReport, BuiltShard, BuiltShards, Shard, ShardBuilder};
pub use config::{ColumnMap, ShardsConfig};
pub use dataset::{read_records, DatasetReport};
pub use error::{Result, ShardFailure, ShardsError};
pub use loader::{
    AuditReport, LoadedShard, LookupOutcome, SearchHit, ShardState, ShardStore, StoreState,
};
pub use release::{
    build_release, parse_signature_file, publish, sign_published, sign_shards,
    signature_file_contents, Release, SignedManifest,
};

// Re-export commonly used core types
pub use postcode_shards_core::{
    normalize, Compression, Ed25519PublicKey, Keypair, Manifest, NormalizedKey, Record,
    RecordFields, ShardKey, ShardKeyRule,
};
