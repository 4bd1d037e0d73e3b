//! Configuration shared by the build and the consumer side.
//!
//! The shard key rule and compression must be identical at build and load
//! time. Deployments usually ship this as a JSON file next to the public key.

use std::path::Path;

use postcode_shards_core::{Compression, ShardKeyRule};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShardsError};

/// Names of the dataset columns that make up a record.
///
/// Defaults follow the National Statistics Postcode Lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub key: String,
    pub easting: String,
    pub northing: String,
    pub region: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            key: "pcd".into(),
            easting: "oseast1m".into(),
            northing: "osnrth1m".into(),
            region: "rgn".into(),
        }
    }
}

/// Configuration for building and loading shards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardsConfig {
    /// How record keys map to shards.
    pub rule: ShardKeyRule,
    /// Envelope around each shard body.
    pub compression: Compression,
    /// Dataset columns read at build time.
    pub columns: ColumnMap,
    /// Upper bound on shards loaded concurrently by one query.
    pub max_parallel_loads: usize,
}

impl Default for ShardsConfig {
    fn default() -> Self {
        Self {
            rule: ShardKeyRule::default(),
            compression: Compression::default(),
            columns: ColumnMap::default(),
            max_parallel_loads: 4,
        }
    }
}

impl ShardsConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ShardsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ShardsError::Config(format!("cannot read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_json(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.max_parallel_loads == 0 {
            return Err(ShardsError::Config("max_parallel_loads must be at least 1".into()));
        }
        Ok(())
    }
}
