use std::collections::HashMap;
use std::fs;

use semver::Version;

use provost_core::{ArtifactId, Channel, ManagedArtifact, Repository, ResolutionStrategy};
use provost_metadata::InstallationLayout;
use provost_resolver::{ResolveError, ResolverSession};

use super::*;

fn version(value: &str) -> Version {
    Version::parse(value).expect("valid version")
}

fn managed(name: &str, value: &str) -> ManagedArtifact {
    ManagedArtifact::new(ArtifactId::new("org.example", name), version(value))
}

struct ScriptedSession {
    versions: HashMap<ArtifactId, Version>,
}

impl ScriptedSession {
    fn new(entries: &[(&str, &str)]) -> Self {
        let versions = entries
            .iter()
            .map(|(name, value)| (ArtifactId::new("org.example", *name), version(value)))
            .collect();
        Self { versions }
    }
}

impl ResolverSession for ScriptedSession {
    fn resolve_latest(&mut self, id: &ArtifactId) -> Result<Version, ResolveError> {
        self.versions
            .get(id)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound { id: id.clone() })
    }
}

#[test]
fn provisioning_config_round_trip() {
    let config = ProvisioningConfig {
        version: 1,
        feature_packs: vec![managed("base-pack", "1.0.0")],
        layers: vec!["web".to_string(), "metrics".to_string()],
    };

    let serialized = config.to_toml_string().expect("must serialize");
    let parsed = ProvisioningConfig::from_toml_str(&serialized).expect("must parse");
    assert_eq!(parsed, config);
}

#[test]
fn provisioning_config_rejects_unsupported_version() {
    let err = ProvisioningConfig::from_toml_str("version = 4\n").expect_err("must reject");
    assert!(err.to_string().contains("unsupported provisioning config version 4"));
}

#[test]
fn resolving_provisioner_returns_resolved_set() {
    let session = ScriptedSession::new(&[("base-pack", "1.1.0"), ("foo", "2.0.0")]);
    let config = ProvisioningConfig {
        version: 1,
        feature_packs: vec![managed("base-pack", "1.0.0")],
        layers: Vec::new(),
    };
    let mut provisioner = ResolvingProvisioner::new(
        session,
        config.clone(),
        vec![ArtifactId::new("org.example", "foo")],
    );

    let outcome = provisioner
        .provision(&config, &ProvisioningOptions::default())
        .expect("must provision");

    assert_eq!(
        outcome.artifacts,
        vec![managed("base-pack", "1.1.0"), managed("foo", "2.0.0")]
    );
}

#[test]
fn resolving_provisioner_reports_unresolved_identities() {
    let session = ScriptedSession::new(&[("base-pack", "1.1.0")]);
    let config = ProvisioningConfig {
        version: 1,
        feature_packs: vec![managed("base-pack", "1.0.0")],
        layers: Vec::new(),
    };
    let mut provisioner = ResolvingProvisioner::new(
        session,
        config.clone(),
        vec![ArtifactId::new("org.example", "bar")],
    );

    let err = provisioner
        .provision(&config, &ProvisioningOptions::default())
        .expect_err("must fail");

    match err {
        ProvisionError::UnresolvedArtifacts { artifacts } => {
            assert_eq!(artifacts, vec![ArtifactId::new("org.example", "bar")]);
        }
        other => panic!("unexpected error kind: {other:?}"),
    }
}

#[test]
fn cache_export_records_coordinates_without_local_content() {
    let tmp = tempfile::tempdir().expect("must create tempdir");
    let layout = InstallationLayout::new(tmp.path());
    layout.ensure_base_dirs().expect("must create dirs");

    let channels = vec![Channel {
        name: "stable".to_string(),
        strategy: ResolutionStrategy::Latest,
        repositories: vec![Repository::new("remote", "https://repo.example.test")],
    }];
    let config = ProvisioningConfig::default();
    let resolved = vec![managed("foo", "1.1.0")];

    CacheExporter::new()
        .cache_artifacts(&channels, &layout, &config, &resolved)
        .expect("must export");

    let records = read_cache_records(&layout).expect("must read records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].artifact, managed("foo", "1.1.0"));
    assert!(records[0].sha256.is_none());
    assert!(records[0].repository_id.is_none());
}

#[test]
fn cache_export_copies_content_from_local_repository() {
    let tmp = tempfile::tempdir().expect("must create tempdir");
    let repo_root = tmp.path().join("repo");
    let content_dir = repo_root.join("org/example/foo");
    fs::create_dir_all(&content_dir).expect("must create repo dirs");
    fs::write(
        content_dir.join("org.example-foo-1.1.0.artifact"),
        b"payload",
    )
    .expect("must write blob");

    let install_dir = tmp.path().join("install");
    let layout = InstallationLayout::new(&install_dir);
    layout.ensure_base_dirs().expect("must create dirs");

    let channels = vec![Channel {
        name: "stable".to_string(),
        strategy: ResolutionStrategy::Latest,
        repositories: vec![Repository::new("local", repo_root.display().to_string())],
    }];
    let resolved = vec![managed("foo", "1.1.0")];

    CacheExporter::new()
        .cache_artifacts(&channels, &layout, &ProvisioningConfig::default(), &resolved)
        .expect("must export");

    let records = read_cache_records(&layout).expect("must read records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].repository_id.as_deref(), Some("local"));
    let digest = records[0].sha256.as_deref().expect("must have digest");
    assert_eq!(digest.len(), 64);

    let blob = layout
        .cache_dir()
        .join("blobs")
        .join("org.example-foo-1.1.0.artifact");
    assert_eq!(fs::read(blob).expect("must read cached blob"), b"payload");
}
