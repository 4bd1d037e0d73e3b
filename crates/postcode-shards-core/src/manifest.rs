//! Release manifests: the ledger of shard digests that gets signed.
//!
//! Canonical text form, one entry per line, sorted by shard name:
//!
//! ```text
//! postcode-shards manifest v1
//! <blake3 hex> <byte length> <shard name>
//! ```
//!
//! The same shard set always serializes to identical bytes, and only those
//! bytes are accepted back by [`Manifest::parse`].

use std::collections::BTreeMap;

use crate::crypto::{Blake3Hash, Ed25519Signature, Keypair};
use crate::error::{CoreError, Result};

/// First line of every manifest.
pub const MANIFEST_HEADER: &str = "postcode-shards manifest v1";

/// The declared identity of one shard blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// File name the shard is published under.
    pub shard_name: String,
    /// Blake3 digest of the shard bytes.
    pub digest: Blake3Hash,
    /// Length of the shard bytes.
    pub byte_length: u64,
}

impl ManifestEntry {
    /// Describe the given shard bytes.
    pub fn for_bytes(shard_name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            shard_name: shard_name.into(),
            digest: Blake3Hash::hash(bytes),
            byte_length: bytes.len() as u64,
        }
    }
}

/// Mapping from shard name to entry for every shard in one release.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Look up the entry for a shard name.
    pub fn entry(&self, shard_name: &str) -> Option<&ManifestEntry> {
        self.entries.get(shard_name)
    }

    /// True if the manifest lists the shard.
    pub fn contains(&self, shard_name: &str) -> bool {
        self.entries.contains_key(shard_name)
    }

    /// All entries, ordered by shard name.
    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.values()
    }

    /// All shard names, in order.
    pub fn shard_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to canonical bytes. These are the bytes that get signed.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::with_capacity(MANIFEST_HEADER.len() + 1 + self.entries.len() * 96);
        out.push_str(MANIFEST_HEADER);
        out.push('\n');
        for entry in self.entries.values() {
            out.push_str(&entry.digest.to_hex());
            out.push(' ');
            out.push_str(&entry.byte_length.to_string());
            out.push(' ');
            out.push_str(&entry.shard_name);
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Parse canonical manifest bytes.
    ///
    /// Anything that would not re-serialize to the same bytes is rejected.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| CoreError::MalformedManifest("not UTF-8".into()))?;

        let body = text
            .strip_prefix(MANIFEST_HEADER)
            .and_then(|rest| rest.strip_prefix('\n'))
            .ok_or_else(|| CoreError::MalformedManifest("missing header".into()))?;

        let mut manifest = Manifest::default();
        for (index, line) in body.split_terminator('\n').enumerate() {
            let entry = parse_line(line)
                .ok_or_else(|| CoreError::MalformedManifest(format!("bad entry on line {}", index + 2)))?;
            manifest.insert(entry)?;
        }

        if manifest.to_bytes() != bytes {
            return Err(CoreError::MalformedManifest("not in canonical form".into()));
        }

        Ok(manifest)
    }

    fn insert(&mut self, entry: ManifestEntry) -> Result<()> {
        validate_shard_name(&entry.shard_name)?;
        if self.entries.contains_key(&entry.shard_name) {
            return Err(CoreError::MalformedManifest(format!(
                "duplicate entry for {}",
                entry.shard_name
            )));
        }
        self.entries.insert(entry.shard_name.clone(), entry);
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<ManifestEntry> {
    let mut parts = line.split(' ');
    let digest = Blake3Hash::from_hex(parts.next()?).ok()?;
    let byte_length = parts.next()?.parse().ok()?;
    let shard_name = parts.next()?.to_string();
    if parts.next().is_some() {
        return None;
    }
    Some(ManifestEntry {
        shard_name,
        digest,
        byte_length,
    })
}

fn validate_shard_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control() || c == '/') {
        return Err(CoreError::MalformedManifest(format!("invalid shard name {name:?}")));
    }
    Ok(())
}

/// Compute the manifest for a set of named shard blobs.
///
/// Fails with [`CoreError::MalformedManifest`] on duplicate or unusable shard names.
pub fn build_manifest<N, B, I>(shards: I) -> Result<Manifest>
where
    I: IntoIterator<Item = (N, B)>,
    N: Into<String>,
    B: AsRef<[u8]>,
{
    let mut manifest = Manifest::default();
    for (name, bytes) in shards {
        manifest.insert(ManifestEntry::for_bytes(name, bytes.as_ref()))?;
    }
    Ok(manifest)
}

/// Sign exactly the given canonical manifest bytes.
pub fn sign_manifest(manifest_bytes: &[u8], keypair: &Keypair) -> Ed25519Signature {
    keypair.sign(manifest_bytes)
}
