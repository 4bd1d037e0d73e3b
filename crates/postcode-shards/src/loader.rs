//! Store loader and query engine.
//!
//! A [`ShardStore`] serves lookups from one release. Trust is explicit and
//! observable:
//!
//! ```text
//! Unloaded --verify manifest--> ManifestTrusted --verify shard--> ShardLoaded(key)
//!     \                                \
//!      `--> Failed (whole store)        `--> Failed (that key only)
//! ```
//!
//! A store whose manifest signature does not verify never serves a lookup. A
//! shard that fails verification is reported as untrusted for its keys while
//! other shards keep working. Failures are terminal: the same store never
//! re-reads an artifact it has rejected.
//!
//! Loaded shards are shared immutably. Reads and verification run outside the
//! cache lock; the first result inserted for a key wins, so concurrent loads
//! of the same shard converge.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use postcode_shards_core::{
    check_shard, decode, normalize, shard_key_of, verify_manifest, Ed25519PublicKey,
    Manifest, NormalizedKey, Record, ShardKey,
};
use postcode_shards_store::ShardSource;

use crate::config::ShardsConfig;
use crate::error::{Result, ShardFailure, ShardsError};
use crate::release::parse_signature_file;

/// Trust state of the store as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreState {
    /// Nothing read yet.
    Unloaded,
    /// The manifest signature verified.
    ManifestTrusted,
    /// Trust could not be established. Terminal.
    Failed(String),
}

/// State of one shard key within a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardState {
    /// Not requested yet.
    NotLoaded,
    /// Verified, decoded and indexed.
    Loaded,
    /// Neither listed in the manifest nor present at rest.
    Absent,
    /// Rejected. Terminal for this store.
    Failed(ShardFailure),
}

/// Result of looking up one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The record stored under the key.
    Found(Record),
    /// No record for the key.
    NotFound,
    /// The key's shard is not trusted.
    Untrusted(ShardFailure),
}

impl LookupOutcome {
    /// The record, if found.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Found(record) => Some(record),
            _ => None,
        }
    }

    /// True for [`LookupOutcome::Untrusted`].
    pub fn is_untrusted(&self) -> bool {
        matches!(self, Self::Untrusted(_))
    }
}

/// One answer from [`ShardStore::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// The input as given.
    pub input: String,
    /// The input after normalization.
    pub key: NormalizedKey,
    pub outcome: LookupOutcome,
}

/// Differences between the manifest and what is at rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Listed in the manifest but not present at rest.
    pub missing_at_rest: Vec<String>,
    /// Present at rest but not listed in the manifest.
    pub unlisted_at_rest: Vec<String>,
}

impl AuditReport {
    /// True if manifest and storage agree exactly.
    pub fn is_consistent(&self) -> bool {
        self.missing_at_rest.is_empty() && self.unlisted_at_rest.is_empty()
    }
}

/// A verified, decoded shard with an exact-match index.
#[derive(Debug)]
pub struct LoadedShard {
    key: ShardKey,
    records: Vec<Record>,
    index: HashMap<NormalizedKey, usize>,
}

impl LoadedShard {
    fn new(key: ShardKey, records: Vec<Record>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            // First occurrence wins for duplicated keys.
            index.entry(record.key().clone()).or_insert(i);
        }
        Self { key, records, index }
    }

    /// The shard's key.
    pub fn key(&self) -> &ShardKey {
        &self.key
    }

    /// Exact-match lookup.
    pub fn get(&self, key: &NormalizedKey) -> Option<&Record> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    /// All records, in published order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

#[derive(Debug, Clone)]
enum ShardSlot {
    Loaded(Arc<LoadedShard>),
    Absent,
    Failed(ShardFailure),
}

#[derive(Debug, Clone)]
enum TrustState {
    Unloaded,
    Trusted(Arc<Manifest>),
    Failed(String),
}

/// Serves exact-match lookups from one signed release.
pub struct ShardStore<S: ShardSource> {
    source: S,
    public_key: Ed25519PublicKey,
    config: ShardsConfig,
    trust: RwLock<TrustState>,
    shards: RwLock<HashMap<ShardKey, ShardSlot>>,
}

impl<S: ShardSource> ShardStore<S> {
    /// Create an unloaded store. Nothing is read until trust is requested.
    pub fn new(source: S, public_key: Ed25519PublicKey, config: ShardsConfig) -> Self {
        Self {
            source,
            public_key,
            config,
            trust: RwLock::new(TrustState::Unloaded),
            shards: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store and establish trust in its manifest.
    pub fn open(source: S, public_key: Ed25519PublicKey, config: ShardsConfig) -> Result<Self> {
        let store = Self::new(source, public_key, config);
        store.trust_manifest()?;
        Ok(store)
    }

    /// The underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The store's trust state.
    pub fn state(&self) -> StoreState {
        match &*self.trust.read().unwrap_or_else(PoisonError::into_inner) {
            TrustState::Unloaded => StoreState::Unloaded,
            TrustState::Trusted(_) => StoreState::ManifestTrusted,
            TrustState::Failed(reason) => StoreState::Failed(reason.clone()),
        }
    }

    /// The state of one shard key.
    pub fn shard_state(&self, key: &ShardKey) -> ShardState {
        match self.cached(key) {
            None => ShardState::NotLoaded,
            Some(ShardSlot::Loaded(_)) => ShardState::Loaded,
            Some(ShardSlot::Absent) => ShardState::Absent,
            Some(ShardSlot::Failed(failure)) => ShardState::Failed(failure),
        }
    }

    /// Move from Unloaded to ManifestTrusted, or to Failed.
    ///
    /// The first failure is returned as [`ShardsError::SignatureInvalid`] (or
    /// the storage error that prevented verification); afterwards the store
    /// answers [`ShardsError::StoreFailed`] without reading anything again.
    pub fn trust_manifest(&self) -> Result<Arc<Manifest>> {
        match &*self.trust.read().unwrap_or_else(PoisonError::into_inner) {
            TrustState::Trusted(manifest) => return Ok(Arc::clone(manifest)),
            TrustState::Failed(reason) => return Err(ShardsError::StoreFailed(reason.clone())),
            TrustState::Unloaded => {}
        }

        let outcome = self.establish_trust();

        let mut trust = self.trust.write().unwrap_or_else(PoisonError::into_inner);
        match &*trust {
            // Another caller got there first.
            TrustState::Trusted(manifest) => return Ok(Arc::clone(manifest)),
            TrustState::Failed(reason) => return Err(ShardsError::StoreFailed(reason.clone())),
            TrustState::Unloaded => {}
        }

        match outcome {
            Ok(manifest) => {
                tracing::info!(shards = manifest.len(), "manifest trusted");
                let manifest = Arc::new(manifest);
                *trust = TrustState::Trusted(Arc::clone(&manifest));
                Ok(manifest)
            }
            Err(err) => {
                tracing::error!(error = %err, "refusing release: manifest not trusted");
                *trust = TrustState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    fn establish_trust(&self) -> Result<Manifest> {
        let manifest_bytes = self
            .source
            .read_manifest()?
            .ok_or_else(|| ShardsError::SignatureInvalid("manifest missing".into()))?;
        let signature_file = self
            .source
            .read_signature()?
            .ok_or_else(|| ShardsError::SignatureInvalid("signature missing".into()))?;

        let signature = parse_signature_file(&signature_file).ok_or_else(|| {
            ShardsError::SignatureInvalid("signature file is not lowercase hex".into())
        })?;

        if !verify_manifest(&manifest_bytes, signature.as_bytes(), &self.public_key) {
            return Err(ShardsError::SignatureInvalid(format!(
                "not signed by {:?}",
                self.public_key
            )));
        }

        Manifest::parse(&manifest_bytes).map_err(|e| ShardsError::SignatureInvalid(e.to_string()))
    }

    fn cached(&self, key: &ShardKey) -> Option<ShardSlot> {
        self.shards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Bring one shard into ShardLoaded or Failed.
    ///
    /// Only a store-level trust failure is an error; shard problems are
    /// recorded in the slot.
    fn load_shard(&self, key: &ShardKey) -> Result<ShardSlot> {
        let manifest = self.trust_manifest()?;
        if let Some(slot) = self.cached(key) {
            return Ok(slot);
        }

        let slot = self.read_and_verify(&manifest, key);
        match &slot {
            ShardSlot::Loaded(shard) => {
                tracing::debug!(shard = %key, records = shard.records().len(), "shard loaded")
            }
            ShardSlot::Absent => tracing::debug!(shard = %key, "no such shard"),
            ShardSlot::Failed(failure) => {
                tracing::warn!(shard = %key, %failure, "shard rejected")
            }
        }

        let mut shards = self.shards.write().unwrap_or_else(PoisonError::into_inner);
        Ok(shards.entry(key.clone()).or_insert(slot).clone())
    }

    fn read_and_verify(&self, manifest: &Manifest, key: &ShardKey) -> ShardSlot {
        let name = key.shard_name();
        let bytes = match self.source.read_shard(&name) {
            Ok(bytes) => bytes,
            Err(e) => return ShardSlot::Failed(ShardFailure::Io(e.to_string())),
        };

        let (entry, bytes) = match (manifest.entry(&name), bytes) {
            (Some(entry), Some(bytes)) => (entry, bytes),
            (None, None) => return ShardSlot::Absent,
            (None, Some(_)) => {
                return ShardSlot::Failed(ShardFailure::MissingManifestEntry(format!(
                    "{name} is not listed in the manifest"
                )))
            }
            (Some(_), None) => {
                return ShardSlot::Failed(ShardFailure::MissingManifestEntry(format!(
                    "{name} is listed but not present"
                )))
            }
        };

        if let Err(e) = check_shard(&bytes, entry) {
            return ShardSlot::Failed(ShardFailure::DigestMismatch(e.to_string()));
        }

        let records = match decode(&bytes, self.config.compression) {
            Ok(records) => records,
            Err(e) => return ShardSlot::Failed(ShardFailure::CorruptShard(e.to_string())),
        };

        // Signed bytes under a different key rule still must not be served.
        for record in &records {
            if shard_key_of(record.key(), &self.config.rule).ok().as_ref() != Some(key) {
                return ShardSlot::Failed(ShardFailure::CorruptShard(format!(
                    "record {} does not belong in shard {key}",
                    record.key()
                )));
            }
        }

        ShardSlot::Loaded(Arc::new(LoadedShard::new(key.clone(), records)))
    }

    /// Load several shards, up to `max_parallel_loads` at a time.
    fn load_many(&self, keys: &[ShardKey]) -> Result<Vec<ShardSlot>> {
        self.trust_manifest()?;

        let workers = self.config.max_parallel_loads.max(1);
        if workers == 1 || keys.len() <= 1 {
            return keys.iter().map(|key| self.load_shard(key)).collect();
        }

        let mut slots = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(workers) {
            let results: Vec<Result<ShardSlot>> = std::thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|key| scope.spawn(move || self.load_shard(key)))
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                    .collect()
            });
            for result in results {
                slots.push(result?);
            }
        }
        Ok(slots)
    }

    /// Load the given shards concurrently and report their states.
    pub fn preload(&self, keys: &[ShardKey]) -> Result<BTreeMap<ShardKey, ShardState>> {
        self.load_many(keys)?;
        Ok(keys
            .iter()
            .map(|key| (key.clone(), self.shard_state(key)))
            .collect())
    }

    /// Get a loaded shard, loading it on demand.
    ///
    /// Returns `Ok(None)` for a shard that does not exist and
    /// `Err` carrying the [`ShardFailure`] message for a rejected one.
    pub fn shard(
        &self,
        key: &ShardKey,
    ) -> Result<std::result::Result<Option<Arc<LoadedShard>>, ShardFailure>> {
        Ok(match self.load_shard(key)? {
            ShardSlot::Loaded(shard) => Ok(Some(shard)),
            ShardSlot::Absent => Ok(None),
            ShardSlot::Failed(failure) => Err(failure),
        })
    }

    /// Exact-match lookup of normalized keys.
    ///
    /// Only the shards the keys map to are loaded. A store-level trust
    /// failure is returned before any shard is read.
    pub fn lookup<I>(&self, keys: I) -> Result<BTreeMap<NormalizedKey, LookupOutcome>>
    where
        I: IntoIterator<Item = NormalizedKey>,
    {
        self.trust_manifest()?;

        let mut results = BTreeMap::new();
        let mut wanted: BTreeMap<ShardKey, Vec<NormalizedKey>> = BTreeMap::new();
        for key in keys {
            match shard_key_of(&key, &self.config.rule) {
                Ok(shard) => wanted.entry(shard).or_default().push(key),
                Err(_) => {
                    results.insert(key, LookupOutcome::NotFound);
                }
            }
        }

        let shard_keys: Vec<ShardKey> = wanted.keys().cloned().collect();
        let slots = self.load_many(&shard_keys)?;

        for ((_, keys), slot) in wanted.into_iter().zip(slots) {
            for key in keys {
                let outcome = match &slot {
                    ShardSlot::Loaded(shard) => match shard.get(&key) {
                        Some(record) => LookupOutcome::Found(record.clone()),
                        None => LookupOutcome::NotFound,
                    },
                    ShardSlot::Absent => LookupOutcome::NotFound,
                    ShardSlot::Failed(failure) => LookupOutcome::Untrusted(failure.clone()),
                };
                results.insert(key, outcome);
            }
        }

        Ok(results)
    }

    /// Look up raw postcodes as a user typed them.
    ///
    /// Each input is normalized; an input that cannot be a key is simply not
    /// found. Results follow input order.
    pub fn search<T: AsRef<str>>(&self, inputs: &[T]) -> Result<Vec<SearchHit>> {
        let keys: Vec<NormalizedKey> = inputs.iter().map(|raw| normalize(raw.as_ref())).collect();
        let results = self.lookup(keys.iter().cloned())?;

        Ok(inputs
            .iter()
            .zip(keys)
            .map(|(input, key)| SearchHit {
                input: input.as_ref().to_string(),
                outcome: results.get(&key).cloned().unwrap_or(LookupOutcome::NotFound),
                key,
            })
            .collect())
    }

    /// Compare the trusted manifest with the shards present at rest.
    pub fn audit(&self) -> Result<AuditReport> {
        let manifest = self.trust_manifest()?;
        let at_rest = self.source.list_shards()?;

        let missing_at_rest = manifest
            .shard_names()
            .filter(|name| at_rest.binary_search_by(|n| n.as_str().cmp(name)).is_err())
            .map(String::from)
            .collect();
        let unlisted_at_rest = at_rest
            .into_iter()
            .filter(|name| !manifest.contains(name))
            .collect();

        let report = AuditReport {
            missing_at_rest,
            unlisted_at_rest,
        };
        if !report.is_consistent() {
            tracing::warn!(?report, "release is inconsistent with its manifest");
        }
        Ok(report)
    }
}
