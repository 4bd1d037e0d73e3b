//! # Postcode Shards Core
//!
//! Pure primitives for distributing a postcode table as signed shards:
//! records and shard keys, the shard codec, manifests and trust checks.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over byte buffers and cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Record`] - One postcode row, keyed by a [`NormalizedKey`]
//! - [`ShardKey`] - Partition identifier derived by a [`ShardKeyRule`]
//! - [`Manifest`] - Canonical ledger of shard digests for one release
//! - [`Blake3Hash`] - Content digest of a shard blob
//!
//! ## Trust
//!
//! A manifest is signed with Ed25519 over its canonical bytes. Consumers check
//! the signature with [`verify_manifest`] and each shard with [`verify_shard`].

pub mod codec;
pub mod crypto;
pub mod error;
pub mod manifest;
pub mod record;
pub mod verify;

pub use codec::{decode, encode, Compression, SHARD_FORMAT_VERSION};
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CoreError, Result};
pub use manifest::{build_manifest, sign_manifest, Manifest, ManifestEntry, MANIFEST_HEADER};
pub use record::{normalize, shard_key_of, NormalizedKey, Record, RecordFields, ShardKey, ShardKeyRule};
pub use verify::{check_shard, verify_manifest, verify_shard};
