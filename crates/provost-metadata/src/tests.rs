use semver::Version;

use provost_core::{ArtifactId, Channel, ChannelConfig, ManagedArtifact, Repository, ResolutionStrategy};

use super::*;

fn sample_channel() -> Channel {
    Channel {
        name: "stable".to_string(),
        strategy: ResolutionStrategy::Latest,
        repositories: vec![Repository::new("central", "https://repo.example.test")],
    }
}

fn sample_artifact(name: &str, version: &str) -> ManagedArtifact {
    ManagedArtifact::new(
        ArtifactId::new("org.example", name),
        Version::parse(version).expect("valid version"),
    )
}

fn seed_installation(dir: &std::path::Path) -> InstallationMetadata {
    let manifest = InstalledManifest::new(
        vec![sample_channel()],
        vec![sample_artifact("foo", "1.0.0")],
    );
    let config = ChannelConfig::new(vec![sample_channel()]);
    InstallationMetadata::create(dir, manifest, config).expect("must create installation")
}

#[test]
fn open_missing_installation_fails() {
    let tmp = tempfile::tempdir().expect("must create tempdir");
    let err = InstallationMetadata::open(tmp.path().join("nowhere")).expect_err("must fail");
    assert!(err.to_string().contains("not a provost installation"));
}

#[test]
fn create_then_reopen_round_trips_state() {
    let tmp = tempfile::tempdir().expect("must create tempdir");
    {
        let metadata = seed_installation(tmp.path());
        assert_eq!(metadata.artifacts().len(), 1);
        assert_eq!(metadata.channel_config().channels.len(), 1);
    }

    let metadata = InstallationMetadata::open(tmp.path()).expect("must reopen");
    assert_eq!(metadata.artifacts()[0].to_string(), "org.example:foo@1.0.0");
    assert_eq!(metadata.channel_config().channels[0].name, "stable");
}

#[test]
fn lock_excludes_concurrent_opens() {
    let tmp = tempfile::tempdir().expect("must create tempdir");
    let first = seed_installation(tmp.path());

    let err = InstallationMetadata::open(tmp.path()).expect_err("second open must fail");
    assert!(err.to_string().contains("another operation"));

    drop(first);
    InstallationMetadata::open(tmp.path()).expect("lock released on drop");
}

#[test]
fn set_manifest_is_not_persisted_until_record_provision() {
    let tmp = tempfile::tempdir().expect("must create tempdir");
    let mut metadata = seed_installation(tmp.path());

    metadata.set_manifest(vec![sample_artifact("foo", "1.1.0")]);
    drop(metadata);

    let metadata = InstallationMetadata::open(tmp.path()).expect("must reopen");
    assert_eq!(metadata.artifacts()[0].version.to_string(), "1.0.0");
}

#[test]
fn record_provision_commits_manifest_and_appends_history() {
    let tmp = tempfile::tempdir().expect("must create tempdir");
    let mut metadata = seed_installation(tmp.path());

    metadata.set_manifest(vec![
        sample_artifact("foo", "1.1.0"),
        sample_artifact("bar", "2.0.0"),
    ]);
    metadata.record_provision(false).expect("must commit");
    let layout = metadata.layout().clone();
    drop(metadata);

    let metadata = InstallationMetadata::open(tmp.path()).expect("must reopen");
    assert_eq!(metadata.artifacts().len(), 2);
    assert_eq!(metadata.artifacts()[0].version.to_string(), "1.1.0");

    let records = read_provision_records(&layout).expect("must read history");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, ProvisionKind::Update);
    assert_eq!(records[0].artifact_count, 2);
}

#[test]
fn history_keeps_every_commit_within_the_same_second() {
    let tmp = tempfile::tempdir().expect("must create tempdir");
    let mut metadata = seed_installation(tmp.path());

    // Back-to-back commits usually share a unix-second timestamp; each one
    // must still leave its own record.
    metadata.set_manifest(vec![sample_artifact("foo", "1.1.0")]);
    metadata.record_provision(false).expect("must commit");
    metadata.set_manifest(vec![sample_artifact("foo", "1.2.0")]);
    metadata.record_provision(false).expect("must commit");

    let records = read_provision_records(metadata.layout()).expect("must read history");
    assert_eq!(records.len(), 2);
}

#[test]
fn colliding_history_timestamps_get_distinct_files() {
    let tmp = tempfile::tempdir().expect("must create tempdir");
    let layout = InstallationLayout::new(tmp.path());
    layout.ensure_base_dirs().expect("must create dirs");

    let record = ProvisionRecord {
        kind: ProvisionKind::Update,
        recorded_at_unix: 1_771_001_234,
        artifact_count: 1,
    };
    crate::history::append_provision_record(&layout, &record).expect("must append first");
    crate::history::append_provision_record(&layout, &record).expect("must append second");

    let records = read_provision_records(&layout).expect("must read history");
    assert_eq!(records.len(), 2);
}

#[test]
fn full_reprovision_records_provision_kind() {
    let tmp = tempfile::tempdir().expect("must create tempdir");
    let mut metadata = seed_installation(tmp.path());

    metadata.record_provision(true).expect("must commit");
    let records = read_provision_records(metadata.layout()).expect("must read history");
    assert_eq!(records[0].kind, ProvisionKind::Provision);
}

#[test]
fn manifest_rejects_unsupported_version() {
    let err = InstalledManifest::from_toml_str("version = 9\n").expect_err("must reject");
    assert!(err.to_string().contains("unsupported manifest version 9"));
}

#[test]
fn layout_paths_sit_under_state_dir() {
    let layout = InstallationLayout::new("/opt/app");
    assert_eq!(layout.state_dir(), std::path::Path::new("/opt/app/.provost"));
    assert_eq!(
        layout.manifest_path(),
        layout.state_dir().join("manifest.toml")
    );
    assert_eq!(
        layout.channels_path(),
        layout.state_dir().join("channels.toml")
    );
    assert_eq!(layout.cache_record_path(), layout.cache_dir().join("artifacts.toml"));
    assert_eq!(layout.lock_path(), layout.state_dir().join("lock"));
}
