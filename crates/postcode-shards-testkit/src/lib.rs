//! # Postcode Shards Testkit
//!
//! Testing utilities for postcode shards.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known shard bytes for cross-platform verification
//! - **Generators**: Proptest strategies for records and datasets
//! - **Fixtures**: A published release in memory, ready to tamper with
//!
//! ## Golden Vectors
//!
//! ```rust
//! use postcode_shards_testkit::vectors::verify_all_vectors;
//!
//! for (name, ok, detail) in verify_all_vectors() {
//!     assert!(ok, "{name}: {detail}");
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use postcode_shards_testkit::fixtures::ReleaseFixture;
//!
//! let fixture = ReleaseFixture::scenario_a();
//! let store = fixture.open_store().unwrap();
//! let hits = store.search(&["ab1 2cd"]).unwrap();
//! assert!(hits[0].outcome.record().is_some());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{test_config, ReleaseFixture};
pub use generators::{dataset, postcode, record, DatasetParams};
pub use vectors::{all_vectors, scenario_a_records, verify_all_vectors, GoldenVector};
