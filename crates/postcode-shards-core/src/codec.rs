//! Shard codec: deterministic CBOR body inside an optional zstd envelope.
//!
//! The body follows RFC 8949 Core Deterministic Encoding:
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats, no tags
//!
//! Layout:
//!
//! ```text
//! [version, [[key, easting | null, northing | null, region], ...]]
//! ```
//!
//! The same records in the same order always produce identical bytes, so shard
//! digests are reproducible across builds. Decoding re-encodes what it parsed
//! and rejects anything that does not match byte for byte.

use std::borrow::Cow;

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::record::{Record, RecordFields};

/// Version tag written at the start of every shard body.
pub const SHARD_FORMAT_VERSION: u64 = 1;

/// zstd level used by [`Compression::default`].
pub const DEFAULT_ZSTD_LEVEL: i32 = 19;

/// Number of columns in an encoded record.
const RECORD_ARITY: usize = 4;

/// Byte envelope applied around the CBOR body.
///
/// Chosen by configuration at build and load time; never inferred from data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Compression {
    /// The CBOR body as is.
    Identity,
    /// The CBOR body compressed as a single zstd frame.
    Zstd { level: i32 },
}

impl Default for Compression {
    fn default() -> Self {
        Self::Zstd {
            level: DEFAULT_ZSTD_LEVEL,
        }
    }
}

/// Encode an ordered sequence of records into shard bytes.
pub fn encode(records: &[Record], compression: Compression) -> Result<Vec<u8>> {
    let body = encode_body(records);
    match compression {
        Compression::Identity => Ok(body),
        Compression::Zstd { level } => zstd::bulk::compress(&body, level)
            .map_err(|e| CoreError::EncodingError(format!("zstd: {e}"))),
    }
}

/// Decode shard bytes back into the exact record sequence that was encoded.
///
/// Fails with [`CoreError::CorruptShard`] on malformed, truncated or
/// non-canonical input.
pub fn decode(bytes: &[u8], compression: Compression) -> Result<Vec<Record>> {
    let body: Cow<'_, [u8]> = match compression {
        Compression::Identity => Cow::Borrowed(bytes),
        Compression::Zstd { .. } => Cow::Owned(
            zstd::decode_all(bytes).map_err(|e| CoreError::CorruptShard(format!("zstd: {e}")))?,
        ),
    };

    let value: Value = ciborium::from_reader(body.as_ref())
        .map_err(|e| CoreError::CorruptShard(e.to_string()))?;
    let records = value_to_records(&value)?;

    // Catches trailing bytes, indefinite lengths and oversized integer heads.
    if encode_body(&records) != body.as_ref() {
        return Err(CoreError::CorruptShard("non-canonical encoding".into()));
    }

    Ok(records)
}

/// Encode the CBOR body for a record sequence.
fn encode_body(records: &[Record]) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_uint(&mut buf, 4, 2);
    encode_uint(&mut buf, 0, SHARD_FORMAT_VERSION);
    encode_uint(&mut buf, 4, records.len() as u64);
    for record in records {
        encode_record(&mut buf, record);
    }
    buf
}

fn encode_record(buf: &mut Vec<u8>, record: &Record) {
    encode_uint(buf, 4, RECORD_ARITY as u64);
    encode_text(buf, record.key().as_str());
    encode_optional_int(buf, record.fields.easting);
    encode_optional_int(buf, record.fields.northing);
    encode_text(buf, &record.fields.region);
}

fn encode_optional_int(buf: &mut Vec<u8>, value: Option<i64>) {
    match value {
        Some(n) => encode_int(buf, n),
        None => buf.push(0xf6),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_int(buf: &mut Vec<u8>, n: i64) {
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn corrupt(msg: &str) -> CoreError {
    CoreError::CorruptShard(msg.to_string())
}

fn value_to_records(value: &Value) -> Result<Vec<Record>> {
    let top = match value {
        Value::Array(top) if top.len() == 2 => top,
        _ => return Err(corrupt("expected [version, records]")),
    };

    match &top[0] {
        Value::Integer(i) if u64::try_from(*i).ok() == Some(SHARD_FORMAT_VERSION) => {}
        Value::Integer(i) => {
            let v: i128 = (*i).into();
            return Err(CoreError::CorruptShard(format!("unsupported shard version: {v}")));
        }
        _ => return Err(corrupt("missing version")),
    }

    let rows = match &top[1] {
        Value::Array(rows) => rows,
        _ => return Err(corrupt("expected record array")),
    };

    rows.iter().map(value_to_record).collect()
}

fn value_to_record(value: &Value) -> Result<Record> {
    let cols = match value {
        Value::Array(cols) if cols.len() == RECORD_ARITY => cols,
        _ => return Err(corrupt("record must be a 4-element array")),
    };

    let key = match &cols[0] {
        Value::Text(s) => s,
        _ => return Err(corrupt("record key must be text")),
    };

    let easting = optional_int(&cols[1])?;
    let northing = optional_int(&cols[2])?;

    let region = match &cols[3] {
        Value::Text(s) => s.clone(),
        _ => return Err(corrupt("region must be text")),
    };

    let record = Record::new(
        key,
        RecordFields {
            easting,
            northing,
            region,
        },
    )
    .map_err(|_| CoreError::CorruptShard(format!("invalid record key {key:?}")))?;

    // A stored key must already be normalized.
    if record.key().as_str() != key {
        return Err(CoreError::CorruptShard(format!("unnormalized record key {key:?}")));
    }

    Ok(record)
}

fn optional_int(value: &Value) -> Result<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::Integer(i) => i64::try_from(*i)
            .map(Some)
            .map_err(|_| corrupt("coordinate out of range")),
        _ => Err(corrupt("coordinate must be an integer or null")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(key: &str, easting: Option<i64>, northing: Option<i64>, region: &str) -> Record {
        Record::new(
            key,
            RecordFields {
                easting,
                northing,
                region: region.into(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_exact_body_bytes() {
        let records = vec![record("AB1 2CD", Some(1), Some(2), "X")];
        let bytes = encode(&records, Compression::Identity).unwrap();

        let mut expected = vec![0x82, 0x01, 0x81, 0x84, 0x66];
        expected.extend_from_slice(b"AB12CD");
        expected.extend_from_slice(&[0x01, 0x02, 0x61, b'X']);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_null_and_negative_coordinates() {
        let records = vec![record("ZZ99ZZ", None, Some(-25), "")];
        let bytes = encode(&records, Compression::Identity).unwrap();

        // ... 0xf6 (null), 0x38 0x18 (-25), 0x60 (empty text)
        assert_eq!(&bytes[bytes.len() - 4..], &[0xf6, 0x38, 0x18, 0x60]);
        assert_eq!(decode(&bytes, Compression::Identity).unwrap(), records);
    }

    #[test]
    fn test_roundtrip_identity_and_zstd() {
        let records = vec![
            record("AB1 2CD", Some(394251), Some(806376), "S99999999"),
            record("AB1 0AA", None, None, "S99999999"),
            record("AB10 1AB", Some(1), Some(2), "X"),
        ];

        for compression in [Compression::Identity, Compression::Zstd { level: 3 }] {
            let bytes = encode(&records, compression).unwrap();
            assert_eq!(decode(&bytes, compression).unwrap(), records);
        }
    }

    #[test]
    fn test_empty_sequence_roundtrip() {
        let bytes = encode(&[], Compression::Identity).unwrap();
        assert_eq!(bytes, vec![0x82, 0x01, 0x80]);
        assert!(decode(&bytes, Compression::Identity).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_input_is_corrupt() {
        let records = vec![record("E1 7AA", Some(10), Some(20), "E12000007")];
        let bytes = encode(&records, Compression::Identity).unwrap();

        for len in 0..bytes.len() {
            assert!(
                matches!(
                    decode(&bytes[..len], Compression::Identity),
                    Err(CoreError::CorruptShard(_))
                ),
                "prefix of length {len} decoded"
            );
        }
    }

    #[test]
    fn test_trailing_bytes_are_corrupt() {
        let mut bytes = encode(&[record("E17AA", None, None, "R")], Compression::Identity).unwrap();
        bytes.push(0x00);
        assert!(matches!(
            decode(&bytes, Compression::Identity),
            Err(CoreError::CorruptShard(_))
        ));
    }

    #[test]
    fn test_non_minimal_integer_is_corrupt() {
        // Version 1 written with a one-byte argument instead of inline.
        let bytes = vec![0x82, 0x18, 0x01, 0x80];
        assert!(matches!(
            decode(&bytes, Compression::Identity),
            Err(CoreError::CorruptShard(_))
        ));
    }

    #[test]
    fn test_unknown_version_is_corrupt() {
        let bytes = vec![0x82, 0x02, 0x80];
        let err = decode(&bytes, Compression::Identity).unwrap_err();
        assert!(err.to_string().contains("unsupported shard version"));
    }

    #[test]
    fn test_unnormalized_key_is_corrupt() {
        let mut bytes = vec![0x82, 0x01, 0x81, 0x84, 0x66];
        bytes.extend_from_slice(b"ab12cd");
        bytes.extend_from_slice(&[0xf6, 0xf6, 0x60]);
        assert!(matches!(
            decode(&bytes, Compression::Identity),
            Err(CoreError::CorruptShard(_))
        ));
    }

    #[test]
    fn test_zstd_rejects_raw_body() {
        let bytes = encode(&[record("A1", None, None, "R")], Compression::Identity).unwrap();
        assert!(matches!(
            decode(&bytes, Compression::Zstd { level: 3 }),
            Err(CoreError::CorruptShard(_))
        ));
    }

    fn arb_record() -> impl Strategy<Value = Record> {
        (
            "[A-Z][A-Z0-9]{1,7}",
            any::<Option<i64>>(),
            any::<Option<i64>>(),
            "[A-Z0-9]{0,9}",
        )
            .prop_map(|(key, e, n, region)| record(&key, e, n, &region))
    }

    proptest! {
        #[test]
        fn test_roundtrip(records in prop::collection::vec(arb_record(), 0..64)) {
            let bytes = encode(&records, Compression::Identity).unwrap();
            prop_assert_eq!(decode(&bytes, Compression::Identity).unwrap(), records);
        }

        #[test]
        fn test_encode_deterministic(records in prop::collection::vec(arb_record(), 0..64)) {
            let compression = Compression::Zstd { level: 3 };
            let b1 = encode(&records, compression).unwrap();
            let b2 = encode(&records, compression).unwrap();
            prop_assert_eq!(b1, b2);
        }
    }
}
