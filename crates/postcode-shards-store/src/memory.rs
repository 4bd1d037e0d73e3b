//! In-memory implementation of the source and sink traits.
//!
//! Primarily for tests. It has the same semantics as the filesystem store
//! but keeps everything in memory, and exposes fault-injection helpers.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;

use crate::error::{Result, StoreError};
use crate::traits::{check_shard_name, ShardSink, ShardSource};

/// In-memory release storage. Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct MemoryShardStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    manifest: Option<Bytes>,
    signature: Option<Bytes>,
    shards: BTreeMap<String, Bytes>,
}

impl MemoryShardStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }

    /// Modify a stored shard in place. Returns false if the shard is absent.
    pub fn tamper_shard(&self, shard_name: &str, f: impl FnOnce(&mut Vec<u8>)) -> Result<bool> {
        let mut inner = self.write()?;
        let Some(existing) = inner.shards.get_mut(shard_name) else {
            return Ok(false);
        };
        let mut data = existing.to_vec();
        f(&mut data);
        *existing = Bytes::from(data);
        Ok(true)
    }

    /// Delete a stored shard. Returns false if the shard is absent.
    pub fn remove_shard(&self, shard_name: &str) -> Result<bool> {
        Ok(self.write()?.shards.remove(shard_name).is_some())
    }

    /// Delete the manifest signature.
    pub fn remove_signature(&self) -> Result<()> {
        self.write()?.signature = None;
        Ok(())
    }
}

impl ShardSource for MemoryShardStore {
    fn read_manifest(&self) -> Result<Option<Bytes>> {
        Ok(self.read()?.manifest.clone())
    }

    fn read_signature(&self) -> Result<Option<Bytes>> {
        Ok(self.read()?.signature.clone())
    }

    fn read_shard(&self, shard_name: &str) -> Result<Option<Bytes>> {
        check_shard_name(shard_name)?;
        Ok(self.read()?.shards.get(shard_name).cloned())
    }

    fn list_shards(&self) -> Result<Vec<String>> {
        Ok(self.read()?.shards.keys().cloned().collect())
    }
}

impl ShardSink for MemoryShardStore {
    fn write_shard(&self, shard_name: &str, bytes: &[u8]) -> Result<()> {
        check_shard_name(shard_name)?;
        self.write()?
            .shards
            .insert(shard_name.to_string(), Bytes::copy_from_slice(bytes));
        Ok(())
    }

    fn write_manifest(&self, bytes: &[u8]) -> Result<()> {
        self.write()?.manifest = Some(Bytes::copy_from_slice(bytes));
        Ok(())
    }

    fn write_signature(&self, bytes: &[u8]) -> Result<()> {
        self.write()?.signature = Some(Bytes::copy_from_slice(bytes));
        Ok(())
    }
}
