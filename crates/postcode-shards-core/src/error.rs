//! Error types for postcode shards core.

use thiserror::Error;

/// Core errors that can occur while handling records, shards and manifests.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    #[error("corrupt shard: {0}")]
    CorruptShard(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("invalid signature")]
    SignatureInvalid,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
