//! Record model: postcode rows, key normalization and shard key derivation.
//!
//! Keys are normalized before any keyed operation, so `"ab1 2cd"`, `"AB1 2CD"`
//! and `"AB12CD"` all address the same record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;

use crate::error::{CoreError, Result};

/// Prefix and suffix of a shard file name: `shard_<KEY>.bin`.
const SHARD_NAME_PREFIX: &str = "shard_";
const SHARD_NAME_SUFFIX: &str = ".bin";

/// A postcode with case and whitespace canonicalized.
///
/// Produced only by [`normalize`], including when deserialized. May be empty;
/// use [`NormalizedKey::is_well_formed`] or [`Record::new`] when a usable key
/// is required.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct NormalizedKey(String);

impl NormalizedKey {
    /// Get the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if normalization left nothing behind.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if the key is non-empty and entirely ASCII alphanumeric.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_alphanumeric())
    }
}

impl fmt::Debug for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NormalizedKey({:?})", self.0)
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NormalizedKey {
    fn from(raw: String) -> Self {
        normalize(&raw)
    }
}

impl AsRef<str> for NormalizedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a raw key: strip all whitespace and uppercase the rest.
///
/// Pure and idempotent: `normalize(normalize(x).as_str()) == normalize(x)`.
pub fn normalize(raw: &str) -> NormalizedKey {
    NormalizedKey(
        raw.chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect(),
    )
}

/// Identifier of one shard, derived from a record key.
///
/// Always non-empty ASCII alphanumeric, so it is safe to embed in a file name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardKey(String);

impl ShardKey {
    /// Validate and wrap a shard key.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidKey(key));
        }
        Ok(Self(key))
    }

    /// Get the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The file name this shard is published under.
    pub fn shard_name(&self) -> String {
        format!("{SHARD_NAME_PREFIX}{}{SHARD_NAME_SUFFIX}", self.0)
    }

    /// Recover the shard key from a shard file name.
    pub fn from_shard_name(name: &str) -> Option<Self> {
        let key = name
            .strip_prefix(SHARD_NAME_PREFIX)?
            .strip_suffix(SHARD_NAME_SUFFIX)?;
        Self::new(key).ok()
    }
}

impl fmt::Debug for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShardKey({})", self.0)
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a normalized key maps to its shard.
///
/// The same rule must be configured at build time and at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShardKeyRule {
    /// The first `len` characters of the key (the whole key if shorter).
    Prefix { len: NonZeroUsize },
    /// The leading alphabetic run of the key: the UK postcode area.
    Area,
}

impl ShardKeyRule {
    /// One shard per leading character.
    pub const FIRST_CHAR: Self = Self::Prefix { len: NonZeroUsize::MIN };
}

impl Default for ShardKeyRule {
    fn default() -> Self {
        Self::FIRST_CHAR
    }
}

/// Derive the shard key of a normalized key.
///
/// Fails with [`CoreError::InvalidKey`] if the key is empty or the derived
/// shard key is not ASCII alphanumeric.
pub fn shard_key_of(key: &NormalizedKey, rule: &ShardKeyRule) -> Result<ShardKey> {
    if key.is_empty() {
        return Err(CoreError::InvalidKey(String::new()));
    }

    let derived: String = match rule {
        ShardKeyRule::Prefix { len } => key.as_str().chars().take(len.get()).collect(),
        ShardKeyRule::Area => key
            .as_str()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect(),
    };

    ShardKey::new(derived).map_err(|_| CoreError::InvalidKey(key.as_str().to_string()))
}

/// The typed columns of a postcode row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordFields {
    /// Grid easting; absent for postcodes published without a location.
    pub easting: Option<i64>,
    /// Grid northing; absent for postcodes published without a location.
    pub northing: Option<i64>,
    /// Region code.
    pub region: String,
}

/// One postcode row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct Record {
    key: NormalizedKey,
    /// The row's typed columns.
    pub fields: RecordFields,
}

impl Record {
    /// Create a record, normalizing the raw key.
    ///
    /// Fails with [`CoreError::InvalidKey`] unless the normalized key is
    /// non-empty ASCII alphanumeric.
    pub fn new(raw_key: &str, fields: RecordFields) -> Result<Self> {
        let key = normalize(raw_key);
        if !key.is_well_formed() {
            return Err(CoreError::InvalidKey(raw_key.to_string()));
        }
        Ok(Self { key, fields })
    }

    /// The record's normalized key.
    pub fn key(&self) -> &NormalizedKey {
        &self.key
    }
}

/// Wire shape of a [`Record`] before its key is checked.
#[derive(Deserialize)]
struct RawRecord {
    key: String,
    fields: RecordFields,
}

impl TryFrom<RawRecord> for Record {
    type Error = CoreError;

    fn try_from(raw: RawRecord) -> Result<Self> {
        Record::new(&raw.key, raw.fields)
    }
}
