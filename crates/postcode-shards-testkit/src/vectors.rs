//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the uncompressed shard body, so any implementation that
//! encodes the same records must produce the same bytes and therefore the same
//! manifest digests.

use postcode_shards_core::{decode, encode, Compression, Record, RecordFields};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// `(raw key, easting, northing, region)` in shard order.
    pub records: &'static [(&'static str, Option<i64>, Option<i64>, &'static str)],
    /// Expected uncompressed shard body (hex).
    pub expected_body: &'static str,
}

impl GoldenVector {
    /// The vector's records.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .iter()
            .map(|&(key, easting, northing, region)| {
                let fields = RecordFields {
                    easting,
                    northing,
                    region: region.to_string(),
                };
                match Record::new(key, fields) {
                    Ok(record) => record,
                    Err(e) => panic!("vector {:?} has a bad key {key:?}: {e}", self.name),
                }
            })
            .collect()
    }
}

/// The Scenario A dataset: one record for each of shards `A` and `Z`.
pub fn scenario_a_records() -> Vec<Record> {
    let mut records = all_vectors()[0].records();
    records.extend(all_vectors()[1].records());
    records
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "shard A, one record",
            // [1, [["AB12CD", 1, 2, "X"]]]
            records: &[("AB1 2CD", Some(1), Some(2), "X")],
            expected_body: "82 01 81 84 66 414231324344 01 02 6158",
        },
        GoldenVector {
            name: "shard Z, one record",
            // [1, [["ZZ99ZZ", 3, 4, "Y"]]]
            records: &[("ZZ9 9ZZ", Some(3), Some(4), "Y")],
            expected_body: "82 01 81 84 66 5a5a39395a5a 03 04 6159",
        },
        GoldenVector {
            name: "null and negative coordinates",
            // [1, [["E17AA", null, -25, ""]]]
            records: &[("E1 7AA", None, Some(-25), "")],
            expected_body: "82 01 81 84 65 4531374141 f6 3818 60",
        },
        GoldenVector {
            name: "empty shard body",
            records: &[],
            expected_body: "820180",
        },
    ]
}

/// Decode a vector's hex, ignoring spaces used for grouping.
fn body_bytes(vector: &GoldenVector) -> Result<Vec<u8>, hex::FromHexError> {
    let compact: String = vector.expected_body.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(compact)
}

/// Check every vector: encode matches the bytes and the bytes decode back.
///
/// Returns `(name, passed, detail)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|vector| {
            let records = vector.records();
            let outcome = body_bytes(vector)
                .map_err(|e| format!("bad hex: {e}"))
                .and_then(|expected| {
                    let encoded = encode(&records, Compression::Identity).map_err(|e| e.to_string())?;
                    if encoded != expected {
                        return Err(format!("encoded {}", hex::encode(&encoded)));
                    }
                    let decoded = decode(&expected, Compression::Identity).map_err(|e| e.to_string())?;
                    if decoded != records {
                        return Err("decoded records differ".to_string());
                    }
                    Ok(())
                });
            match outcome {
                Ok(()) => (vector.name.to_string(), true, String::new()),
                Err(detail) => (vector.name.to_string(), false, detail),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_pass() {
        for (name, ok, detail) in verify_all_vectors() {
            assert!(ok, "{name}: {detail}");
        }
    }

    #[test]
    fn test_scenario_a_records() {
        let records = scenario_a_records();
        let keys: Vec<_> = records.iter().map(|r| r.key().as_str()).collect();
        assert_eq!(keys, vec!["AB12CD", "ZZ99ZZ"]);
    }
}
