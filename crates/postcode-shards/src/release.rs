//! Release assembly: build shards, sign the manifest, publish the artifacts.
//!
//! A release is produced once per data drop and is immutable. Re-running a
//! build on identical input with the same key and configuration produces
//! byte-identical artifacts.

use std::collections::BTreeMap;

use postcode_shards_core::{
    build_manifest, sign_manifest, Ed25519Signature, Keypair, Manifest, Record,
};
use postcode_shards_store::{ShardSink, ShardSource};

use crate::builder::{BuildReport, ShardBuilder};
use crate::config::ShardsConfig;
use crate::error::{Result, ShardsError};

/// A manifest together with its canonical bytes and signature.
#[derive(Debug, Clone)]
pub struct SignedManifest {
    pub manifest: Manifest,
    pub manifest_bytes: Vec<u8>,
    pub signature: Ed25519Signature,
}

impl SignedManifest {
    /// Contents of the signature file: lowercase hex and a newline.
    pub fn signature_file(&self) -> String {
        signature_file_contents(&self.signature)
    }
}

/// Every artifact of one release.
#[derive(Debug, Clone)]
pub struct Release {
    shards: BTreeMap<String, Vec<u8>>,
    signed: SignedManifest,
    report: BuildReport,
}

impl Release {
    /// Encoded shards by file name.
    pub fn shards(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.shards
    }

    /// The signed manifest.
    pub fn signed_manifest(&self) -> &SignedManifest {
        &self.signed
    }

    /// Counts from the build.
    pub fn report(&self) -> BuildReport {
        self.report
    }
}

/// Format a signature as the contents of a signature file.
pub fn signature_file_contents(signature: &Ed25519Signature) -> String {
    format!("{}\n", signature.to_hex())
}

/// Parse the contents of a signature file.
///
/// Only the exact form [`signature_file_contents`] writes is accepted:
/// lowercase hex with at most one trailing newline. Any other spelling of the
/// same bytes is treated as damage.
pub fn parse_signature_file(contents: &[u8]) -> Option<Ed25519Signature> {
    let text = std::str::from_utf8(contents).ok()?;
    let body = text.strip_suffix('\n').unwrap_or(text);
    let signature = Ed25519Signature::from_hex(body).ok()?;
    (signature.to_hex() == body).then_some(signature)
}

/// Compute and sign the manifest for a set of named shard blobs.
pub fn sign_shards<N, B, I>(shards: I, keypair: &Keypair) -> Result<SignedManifest>
where
    I: IntoIterator<Item = (N, B)>,
    N: Into<String>,
    B: AsRef<[u8]>,
{
    let manifest = build_manifest(shards)?;
    let manifest_bytes = manifest.to_bytes();
    let signature = sign_manifest(&manifest_bytes, keypair);
    tracing::info!(
        entries = manifest.len(),
        signer = ?keypair.public_key(),
        "signed manifest"
    );
    Ok(SignedManifest {
        manifest,
        manifest_bytes,
        signature,
    })
}

/// Build shards from records and sign the resulting shard set.
pub fn build_release(
    records: impl IntoIterator<Item = Record>,
    keypair: &Keypair,
    config: &ShardsConfig,
) -> Result<Release> {
    let built = ShardBuilder::from_config(config).build(records)?;
    let shards: BTreeMap<String, Vec<u8>> = built
        .named_bytes()
        .map(|(name, bytes)| (name, bytes.to_vec()))
        .collect();
    let signed = sign_shards(&shards, keypair)?;

    Ok(Release {
        shards,
        signed,
        report: built.report(),
    })
}

/// Write a release into an empty destination.
///
/// Shards go first and the signature last, so a reader that sees a
/// signature also sees every shard it covers. A destination that already
/// holds shards, a manifest or a signature is refused with
/// [`ShardsError::ReleaseExists`]: leftovers from an older release would sit
/// at rest without a manifest entry.
pub fn publish<K>(release: &Release, sink: &K) -> Result<()>
where
    K: ShardSource + ShardSink + ?Sized,
{
    let leftovers = sink.list_shards()?;
    if !leftovers.is_empty() {
        return Err(ShardsError::ReleaseExists(format!(
            "{} shard(s) present, e.g. {}",
            leftovers.len(),
            leftovers[0]
        )));
    }
    if sink.read_manifest()?.is_some() || sink.read_signature()?.is_some() {
        return Err(ShardsError::ReleaseExists("manifest or signature present".into()));
    }

    for (name, bytes) in &release.shards {
        sink.write_shard(name, bytes)?;
    }
    sink.write_manifest(&release.signed.manifest_bytes)?;
    sink.write_signature(release.signed.signature_file().as_bytes())?;
    tracing::info!(shards = release.shards.len(), "published release");
    Ok(())
}

/// Sign the shards already present in a store and write manifest and signature.
///
/// Covers exactly the shards the store lists, so the manifest is complete
/// for what is at rest.
pub fn sign_published<T>(store: &T, keypair: &Keypair) -> Result<SignedManifest>
where
    T: ShardSource + ShardSink + ?Sized,
{
    let mut shards = BTreeMap::new();
    for name in store.list_shards()? {
        // Listed a moment ago; a shard that vanished since is simply not signed.
        if let Some(bytes) = store.read_shard(&name)? {
            shards.insert(name, bytes);
        }
    }

    let signed = sign_shards(&shards, keypair)?;
    store.write_manifest(&signed.manifest_bytes)?;
    store.write_signature(signed.signature_file().as_bytes())?;
    Ok(signed)
}
