//! Error types for building, publishing and loading releases.

use postcode_shards_core::CoreError;
use postcode_shards_store::StoreError;
use thiserror::Error;

/// Errors that can occur during postcode shard operations.
#[derive(Debug, Error)]
pub enum ShardsError {
    /// Core error (codec, manifest, keys).
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The dataset produced no usable records.
    #[error("dataset contains no usable records")]
    EmptyInput,

    /// A required dataset column is not in the header row.
    #[error("dataset is missing column {0:?}")]
    MissingColumn(String),

    /// The dataset text could not be parsed.
    #[error("dataset line {line}: {message}")]
    Dataset { line: usize, message: String },

    /// The release manifest could not be trusted.
    #[error("manifest signature invalid: {0}")]
    SignatureInvalid(String),

    /// The destination already holds release artifacts.
    #[error("release destination is not empty: {0}")]
    ReleaseExists(String),

    /// The store already failed to establish trust and refuses all queries.
    #[error("store failed: {0}")]
    StoreFailed(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Why a single shard is not trusted.
///
/// Stored in the shard's failed slot, so lookups can report it per key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardFailure {
    /// Verified bytes that do not decode, or decode inconsistently.
    #[error("corrupt shard: {0}")]
    CorruptShard(String),

    /// Bytes that do not match the manifest entry.
    #[error("digest mismatch: {0}")]
    DigestMismatch(String),

    /// Shard at rest without a manifest entry, or the other way round.
    #[error("missing manifest entry: {0}")]
    MissingManifestEntry(String),

    /// The shard could not be read.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result type for postcode shard operations.
pub type Result<T> = std::result::Result<T, ShardsError>;
