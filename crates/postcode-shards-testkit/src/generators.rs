//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use postcode_shards_core::{Keypair, NormalizedKey, Record, RecordFields};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a UK-shaped postcode in display form, e.g. `EC1A 1BB`.
pub fn postcode() -> impl Strategy<Value = String> {
    "[A-Z]{1,2}[0-9][0-9A-Z]? [0-9][A-Z]{2}".prop_map(String::from)
}

/// Generate the same postcode as a user might type it.
pub fn typed_postcode() -> impl Strategy<Value = (String, String)> {
    (postcode(), any::<bool>(), any::<bool>()).prop_map(|(pc, lower, spaced)| {
        let mut typed = if lower { pc.to_lowercase() } else { pc.clone() };
        if spaced {
            typed = format!("  {}  ", typed.replace(' ', "   "));
        }
        (pc, typed)
    })
}

/// Generate an optional grid coordinate.
pub fn coordinate() -> impl Strategy<Value = Option<i64>> {
    prop::option::of(0i64..=1_300_000)
}

/// Generate a region code.
pub fn region() -> impl Strategy<Value = String> {
    "[ENSW][0-9]{8}".prop_map(String::from)
}

/// Generate one record with a postcode key.
pub fn record() -> impl Strategy<Value = Record> {
    (postcode(), coordinate(), coordinate(), region()).prop_map(|(key, easting, northing, region)| {
        match Record::new(
            &key,
            RecordFields {
                easting,
                northing,
                region,
            },
        ) {
            Ok(record) => record,
            Err(e) => panic!("generated postcode {key:?} rejected: {e}"),
        }
    })
}

/// Parameters for generating a dataset.
#[derive(Debug, Clone)]
pub struct DatasetParams {
    /// Records with distinct keys, in input order.
    pub records: Vec<Record>,
}

impl DatasetParams {
    /// Records keyed by normalized postcode.
    pub fn by_key(&self) -> BTreeMap<NormalizedKey, Record> {
        self.records
            .iter()
            .map(|r| (r.key().clone(), r.clone()))
            .collect()
    }
}

/// Generate a non-empty dataset of up to `max_len` records with distinct keys.
pub fn dataset(max_len: usize) -> impl Strategy<Value = DatasetParams> {
    prop::collection::vec(record(), 1..=max_len.max(1)).prop_map(|records| {
        let mut seen = std::collections::BTreeSet::new();
        let records = records
            .into_iter()
            .filter(|r| seen.insert(r.key().clone()))
            .collect();
        DatasetParams { records }
    })
}

impl Arbitrary for DatasetParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: ()) -> Self::Strategy {
        dataset(40).boxed()
    }
}
