//! Shard builder: partitions a dataset by shard key and encodes each shard.

use std::collections::BTreeMap;

use postcode_shards_core::{encode, shard_key_of, Compression, Record, ShardKey, ShardKeyRule};

use crate::config::ShardsConfig;
use crate::error::{Result, ShardsError};

/// The records that share one shard key, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    key: ShardKey,
    records: Vec<Record>,
}

impl Shard {
    /// The shard's key.
    pub fn key(&self) -> &ShardKey {
        &self.key
    }

    /// The file name this shard is published under.
    pub fn name(&self) -> String {
        self.key.shard_name()
    }

    /// The shard's records, in input order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

/// Counts from one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Records placed into a shard.
    pub placed: usize,
    /// Records whose key the shard key rule rejected.
    pub skipped: usize,
    /// Shards produced.
    pub shards: usize,
}

/// One shard together with its encoded bytes.
#[derive(Debug, Clone)]
pub struct BuiltShard {
    pub shard: Shard,
    pub bytes: Vec<u8>,
}

/// Output of [`ShardBuilder::build`], ordered by shard key.
#[derive(Debug, Clone)]
pub struct BuiltShards {
    shards: BTreeMap<ShardKey, BuiltShard>,
    report: BuildReport,
}

impl BuiltShards {
    /// Look up one built shard.
    pub fn get(&self, key: &ShardKey) -> Option<&BuiltShard> {
        self.shards.get(key)
    }

    /// All built shards, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = (&ShardKey, &BuiltShard)> {
        self.shards.iter()
    }

    /// `(shard name, encoded bytes)` pairs, ready for a manifest or a sink.
    pub fn named_bytes(&self) -> impl Iterator<Item = (String, &[u8])> {
        self.shards
            .values()
            .map(|built| (built.shard.name(), built.bytes.as_slice()))
    }

    /// Number of shards.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// True if there are no shards. Never the case for a successful build.
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Counts from the build.
    pub fn report(&self) -> BuildReport {
        self.report
    }
}

/// Partitions records into shards and encodes them.
#[derive(Debug, Clone)]
pub struct ShardBuilder {
    rule: ShardKeyRule,
    compression: Compression,
}

impl ShardBuilder {
    /// Create a builder with an explicit rule and compression.
    pub fn new(rule: ShardKeyRule, compression: Compression) -> Self {
        Self { rule, compression }
    }

    /// Create a builder from configuration.
    pub fn from_config(config: &ShardsConfig) -> Self {
        Self::new(config.rule, config.compression)
    }

    /// Stable partition of records by shard key.
    ///
    /// Every usable record lands in exactly one shard, keeping input order.
    /// Fails with [`ShardsError::EmptyInput`] if no record is usable.
    pub fn partition(
        &self,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<(BTreeMap<ShardKey, Shard>, BuildReport)> {
        let mut shards: BTreeMap<ShardKey, Shard> = BTreeMap::new();
        let mut report = BuildReport::default();

        for record in records {
            let key = match shard_key_of(record.key(), &self.rule) {
                Ok(key) => key,
                Err(e) => {
                    report.skipped += 1;
                    tracing::warn!(key = %record.key(), error = %e, "record has no shard");
                    continue;
                }
            };
            shards
                .entry(key.clone())
                .or_insert_with(|| Shard {
                    key,
                    records: Vec::new(),
                })
                .records
                .push(record);
            report.placed += 1;
        }

        if report.placed == 0 {
            return Err(ShardsError::EmptyInput);
        }
        report.shards = shards.len();

        Ok((shards, report))
    }

    /// Partition and encode.
    pub fn build(&self, records: impl IntoIterator<Item = Record>) -> Result<BuiltShards> {
        let (shards, report) = self.partition(records)?;

        let mut built = BTreeMap::new();
        for (key, shard) in shards {
            let bytes = encode(shard.records(), self.compression)?;
            tracing::info!(
                shard = %key,
                records = shard.records().len(),
                bytes = bytes.len(),
                "encoded shard"
            );
            built.insert(key, BuiltShard { shard, bytes });
        }

        Ok(BuiltShards {
            shards: built,
            report,
        })
    }
}
