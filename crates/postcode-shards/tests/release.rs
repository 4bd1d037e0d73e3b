//! Build a release from CSV, publish it to a directory and query it back.

use std::fs;

use postcode_shards::store::{FsShardStore, MANIFEST_FILE, SIGNATURE_FILE};
use postcode_shards::{
    build_release, publish, read_records, sign_published, Keypair, LookupOutcome, ShardFailure,
    ShardStore, ShardsConfig, ShardsError,
};

const DATASET: &str = "\
pcd,pcd2,pcds,oseast1m,osnrth1m,rgn
AB1 0AA,AB1  0AA,AB1 0AA,385386,801193,S99999999
AB1 0AB,AB1  0AB,AB1 0AB,385177,801314,S99999999
B1 1AA,B1  1AA,B1 1AA,406689,286822,E12000005
EC1A 1BB,EC1A 1BB,EC1A 1BB,531924,181458,E12000007
ZE3 9JZ,ZE3  9JZ,ZE3 9JZ,,,S99999999
";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn keypair() -> Keypair {
    Keypair::from_seed(&[0x5a; 32])
}

fn publish_dataset(dir: &std::path::Path, config: &ShardsConfig) -> postcode_shards::Release {
    let (records, report) = read_records(DATASET.as_bytes(), &config.columns).unwrap();
    assert_eq!(report.accepted, 5);

    let release = build_release(records, &keypair(), config).unwrap();
    publish(&release, &FsShardStore::create(dir).unwrap()).unwrap();
    release
}

#[test]
fn filesystem_round_trip() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = ShardsConfig::default();
    publish_dataset(dir.path(), &config);

    let mut files: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    files.sort();
    assert_eq!(
        files,
        vec![
            "manifest.sig",
            "manifest.txt",
            "shard_A.bin",
            "shard_B.bin",
            "shard_E.bin",
            "shard_Z.bin"
        ]
    );

    let source = FsShardStore::open(dir.path()).unwrap();
    let store = ShardStore::open(source, keypair().public_key(), config).unwrap();
    let hits = store
        .search(&["ab1 0ab", "EC1A1BB", "ze3 9jz", "SW1A 1AA"])
        .unwrap();

    assert_eq!(hits[0].outcome.record().unwrap().fields.easting, Some(385177));
    assert_eq!(hits[1].outcome.record().unwrap().fields.region, "E12000007");
    assert_eq!(hits[2].outcome.record().unwrap().fields.easting, None);
    assert_eq!(hits[3].outcome, LookupOutcome::NotFound);
    assert!(store.audit().unwrap().is_consistent());
}

#[test]
fn rebuild_is_byte_identical() {
    init_tracing();
    let config = ShardsConfig::default();
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    publish_dataset(first.path(), &config);
    publish_dataset(second.path(), &config);

    for name in ["shard_A.bin", "shard_Z.bin", MANIFEST_FILE, SIGNATURE_FILE] {
        assert_eq!(
            fs::read(first.path().join(name)).unwrap(),
            fs::read(second.path().join(name)).unwrap(),
            "{name} differs between builds"
        );
    }
}

#[test]
fn manifest_file_format() {
    let dir = tempfile::tempdir().unwrap();
    let release = publish_dataset(dir.path(), &ShardsConfig::default());

    let text = fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("postcode-shards manifest v1"));
    for (line, (name, bytes)) in lines.zip(release.shards()) {
        let fields: Vec<_> = line.split(' ').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].len(), 64);
        assert_eq!(fields[1], bytes.len().to_string());
        assert_eq!(fields[2], name.as_str());
    }

    let sig = fs::read_to_string(dir.path().join(SIGNATURE_FILE)).unwrap();
    assert_eq!(sig.len(), 129);
    assert!(sig.ends_with('\n'));
}

#[test]
fn corrupted_file_on_disk_is_isolated() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = ShardsConfig::default();
    publish_dataset(dir.path(), &config);

    let path = dir.path().join("shard_B.bin");
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x80;
    fs::write(&path, bytes).unwrap();

    let store = ShardStore::open(FsShardStore::open(dir.path()).unwrap(), keypair().public_key(), config)
        .unwrap();
    let hits = store.search(&["B1 1AA", "AB1 0AA"]).unwrap();
    assert!(matches!(
        hits[0].outcome,
        LookupOutcome::Untrusted(ShardFailure::DigestMismatch(_))
    ));
    assert!(hits[1].outcome.record().is_some());
}

#[test]
fn deleted_signature_on_disk_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let config = ShardsConfig::default();
    publish_dataset(dir.path(), &config);
    fs::remove_file(dir.path().join(SIGNATURE_FILE)).unwrap();

    let source = FsShardStore::open(dir.path()).unwrap();
    assert!(matches!(
        ShardStore::open(source, keypair().public_key(), config),
        Err(ShardsError::SignatureInvalid(_))
    ));
}

#[test]
fn resign_after_adding_a_shard() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = ShardsConfig::default();
    let release = publish_dataset(dir.path(), &config);

    // An operator drops in a shard from another build and re-signs.
    let extra = build_release(
        read_records(
            "pcd,oseast1m,osnrth1m,rgn\nM1 1AE,384000,398000,E12000002\n".as_bytes(),
            &config.columns,
        )
        .unwrap()
        .0,
        &keypair(),
        &config,
    )
    .unwrap();
    let fs_store = FsShardStore::open(dir.path()).unwrap();
    publish_shards_only(&extra, &fs_store);
    let signed = sign_published(&fs_store, &keypair()).unwrap();

    assert_eq!(signed.manifest.len(), release.signed_manifest().manifest.len() + 1);
    let store = ShardStore::open(fs_store, keypair().public_key(), config).unwrap();
    assert!(store.search(&["m1 1ae"]).unwrap()[0].outcome.record().is_some());
}

fn publish_shards_only(release: &postcode_shards::Release, sink: &FsShardStore) {
    use postcode_shards::store::ShardSink;
    for (name, bytes) in release.shards() {
        sink.write_shard(name, bytes).unwrap();
    }
}

#[test]
fn republishing_into_same_directory_is_refused() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = ShardsConfig::default();
    let release_of = |csv: &str| {
        let (records, _) = read_records(csv.as_bytes(), &config.columns).unwrap();
        build_release(records, &keypair(), &config).unwrap()
    };
    let v1 = release_of("pcd,oseast1m,osnrth1m,rgn\nAB1 2CD,1,2,X\nM1 1AE,384000,398000,E12000002\n");
    let v2 = release_of("pcd,oseast1m,osnrth1m,rgn\nAB1 2CD,1,2,X\n");

    publish(&v1, &FsShardStore::create(dir.path()).unwrap()).unwrap();
    assert!(matches!(
        publish(&v2, &FsShardStore::open(dir.path()).unwrap()),
        Err(ShardsError::ReleaseExists(_))
    ));

    // The directory still holds a consistent v1.
    let store = ShardStore::open(FsShardStore::open(dir.path()).unwrap(), keypair().public_key(), config.clone())
        .unwrap();
    assert!(store.audit().unwrap().is_consistent());
    assert!(store.search(&["M1 1AE"]).unwrap()[0].outcome.record().is_some());

    // A fresh directory is where v2 belongs.
    let fresh = tempfile::tempdir().unwrap();
    publish(&v2, &FsShardStore::create(fresh.path()).unwrap()).unwrap();
    let store = ShardStore::open(FsShardStore::open(fresh.path()).unwrap(), keypair().public_key(), config)
        .unwrap();
    assert_eq!(store.search(&["M1 1AE"]).unwrap()[0].outcome, LookupOutcome::NotFound);
    assert!(store.audit().unwrap().is_consistent());
}

#[test]
fn missing_release_directory() {
    assert!(FsShardStore::open("/nonexistent/postcode-shards-release").is_err());
}
