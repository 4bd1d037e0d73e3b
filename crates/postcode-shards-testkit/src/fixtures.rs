//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use postcode_shards::{build_release, publish, Release, Result, ShardStore, ShardsConfig};
use postcode_shards_core::{Compression, Ed25519PublicKey, Keypair, Record};
use postcode_shards_store::MemoryShardStore;

use crate::vectors::scenario_a_records;

/// Configuration used by fixtures: default rule, no compression.
///
/// Uncompressed shards keep single-byte tampering easy to reason about.
pub fn test_config() -> ShardsConfig {
    ShardsConfig {
        compression: Compression::Identity,
        ..ShardsConfig::default()
    }
}

/// A release built from known records and published to memory.
pub struct ReleaseFixture {
    pub keypair: Keypair,
    pub config: ShardsConfig,
    pub release: Release,
    pub storage: Arc<MemoryShardStore>,
}

impl ReleaseFixture {
    /// Build and publish under a random keypair.
    pub fn new(records: Vec<Record>) -> Result<Self> {
        Self::with_records(rand::random(), records, test_config())
    }

    /// Build and publish with a deterministic keypair from seed.
    pub fn with_records(seed: [u8; 32], records: Vec<Record>, config: ShardsConfig) -> Result<Self> {
        let keypair = Keypair::from_seed(&seed);
        let release = build_release(records, &keypair, &config)?;
        let storage = Arc::new(MemoryShardStore::new());
        publish(&release, storage.as_ref())?;
        Ok(Self {
            keypair,
            config,
            release,
            storage,
        })
    }

    /// The two-record release: `AB1 2CD` in shard `A`, `ZZ9 9ZZ` in shard `Z`.
    pub fn scenario_a() -> Self {
        match Self::with_records([0x42; 32], scenario_a_records(), test_config()) {
            Ok(fixture) => fixture,
            Err(e) => panic!("scenario A release failed to build: {e}"),
        }
    }

    /// The signer's public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// A fresh consumer store over the published artifacts, trust established.
    pub fn open_store(&self) -> Result<ShardStore<Arc<MemoryShardStore>>> {
        ShardStore::open(Arc::clone(&self.storage), self.public_key(), self.config.clone())
    }

    /// A fresh consumer store that has not read anything yet.
    pub fn unopened_store(&self) -> ShardStore<Arc<MemoryShardStore>> {
        ShardStore::new(Arc::clone(&self.storage), self.public_key(), self.config.clone())
    }

    /// A consumer store that expects a different signer.
    pub fn store_with_key(&self, public_key: Ed25519PublicKey) -> ShardStore<Arc<MemoryShardStore>> {
        ShardStore::new(Arc::clone(&self.storage), public_key, self.config.clone())
    }

    /// Flip one bit of a published shard. Returns false if the shard is absent.
    pub fn flip_shard_bit(&self, shard_name: &str, byte: usize, bit: u8) -> bool {
        self.storage
            .tamper_shard(shard_name, |data| {
                if let Some(b) = data.get_mut(byte) {
                    *b ^= 1 << (bit % 8);
                }
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postcode_shards::StoreState;
    use postcode_shards_store::ShardSource;

    #[test]
    fn test_scenario_a_fixture() {
        let fixture = ReleaseFixture::scenario_a();
        assert_eq!(
            fixture.storage.list_shards().unwrap(),
            vec!["shard_A.bin", "shard_Z.bin"]
        );

        let store = fixture.open_store().unwrap();
        assert_eq!(store.state(), StoreState::ManifestTrusted);
    }

    #[test]
    fn test_random_keys_differ() {
        let a = ReleaseFixture::new(scenario_a_records()).unwrap();
        let b = ReleaseFixture::new(scenario_a_records()).unwrap();
        assert_ne!(a.public_key(), b.public_key());
        assert_eq!(a.release.shards(), b.release.shards());
    }

    #[test]
    fn test_unopened_store_is_unloaded() {
        let fixture = ReleaseFixture::scenario_a();
        assert_eq!(fixture.unopened_store().state(), StoreState::Unloaded);
    }

    #[test]
    fn test_flip_missing_shard() {
        let fixture = ReleaseFixture::scenario_a();
        assert!(!fixture.flip_shard_bit("shard_Q.bin", 0, 0));
        assert!(fixture.flip_shard_bit("shard_A.bin", 0, 0));
    }
}
