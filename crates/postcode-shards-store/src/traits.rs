//! Source and sink traits: the abstract interface for release artifacts.
//!
//! This lets the loader and the publisher stay storage-agnostic.
//! Implementations include a directory on disk and an in-memory map.

use std::sync::Arc;

use bytes::Bytes;
use postcode_shards_core::ShardKey;

use crate::error::{Result, StoreError};

/// File name of the canonical manifest.
pub const MANIFEST_FILE: &str = "manifest.txt";

/// File name of the hex-encoded manifest signature.
pub const SIGNATURE_FILE: &str = "manifest.sig";

/// Read-only access to one release.
///
/// All reads return `Ok(None)` when the artifact does not exist.
pub trait ShardSource: Send + Sync {
    /// Read the manifest bytes.
    fn read_manifest(&self) -> Result<Option<Bytes>>;

    /// Read the signature file contents.
    fn read_signature(&self) -> Result<Option<Bytes>>;

    /// Read one shard blob by file name.
    fn read_shard(&self, shard_name: &str) -> Result<Option<Bytes>>;

    /// List the shard file names present, sorted.
    fn list_shards(&self) -> Result<Vec<String>>;
}

/// Write access used when publishing a release.
pub trait ShardSink: Send + Sync {
    /// Write one shard blob.
    fn write_shard(&self, shard_name: &str, bytes: &[u8]) -> Result<()>;

    /// Write the manifest bytes.
    fn write_manifest(&self, bytes: &[u8]) -> Result<()>;

    /// Write the signature file contents.
    fn write_signature(&self, bytes: &[u8]) -> Result<()>;
}

impl<S: ShardSource + ?Sized> ShardSource for Arc<S> {
    fn read_manifest(&self) -> Result<Option<Bytes>> {
        (**self).read_manifest()
    }

    fn read_signature(&self) -> Result<Option<Bytes>> {
        (**self).read_signature()
    }

    fn read_shard(&self, shard_name: &str) -> Result<Option<Bytes>> {
        (**self).read_shard(shard_name)
    }

    fn list_shards(&self) -> Result<Vec<String>> {
        (**self).list_shards()
    }
}

impl<S: ShardSink + ?Sized> ShardSink for Arc<S> {
    fn write_shard(&self, shard_name: &str, bytes: &[u8]) -> Result<()> {
        (**self).write_shard(shard_name, bytes)
    }

    fn write_manifest(&self, bytes: &[u8]) -> Result<()> {
        (**self).write_manifest(bytes)
    }

    fn write_signature(&self, bytes: &[u8]) -> Result<()> {
        (**self).write_signature(bytes)
    }
}

/// Reject anything that is not `shard_<KEY>.bin`.
pub(crate) fn check_shard_name(shard_name: &str) -> Result<()> {
    if ShardKey::from_shard_name(shard_name).is_none() {
        return Err(StoreError::InvalidName(shard_name.to_string()));
    }
    Ok(())
}
