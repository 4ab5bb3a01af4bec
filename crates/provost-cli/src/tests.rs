use std::collections::HashMap;

use clap_complete::Shell;
use semver::Version;

use provost_core::{
    ArtifactId, Channel, ChannelConfig, ManagedArtifact, Repository, ResolutionStrategy,
};
use provost_metadata::{InstallationMetadata, InstalledManifest};
use provost_resolver::{ResolveError, ResolverSession, UpdateFinder};

use crate::commands::{
    format_channel_lines, format_status_lines, format_update_lines, init_shell_lines,
    parse_repository_overrides, resolve_init_shell, status_json,
};
use crate::render::{render_status_line, OutputStyle};

fn version(value: &str) -> Version {
    Version::parse(value).expect("valid version")
}

fn managed(name: &str, value: &str) -> ManagedArtifact {
    ManagedArtifact::new(ArtifactId::new("org.example", name), version(value))
}

struct ScriptedSession(HashMap<ArtifactId, Version>);

impl ResolverSession for ScriptedSession {
    fn resolve_latest(&mut self, id: &ArtifactId) -> Result<Version, ResolveError> {
        self.0
            .get(id)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound { id: id.clone() })
    }
}

fn seeded_installation(dir: &std::path::Path) -> InstallationMetadata {
    let channel = Channel {
        name: "stable".to_string(),
        strategy: ResolutionStrategy::Latest,
        repositories: vec![Repository::new("central", "https://repo.example.test")],
    };
    let manifest = InstalledManifest::new(vec![channel.clone()], vec![managed("foo", "1.0.0")]);
    let config = ChannelConfig::new(vec![channel]);
    InstallationMetadata::create(dir, manifest, config).expect("must create installation")
}

#[test]
fn parses_repository_overrides() {
    let overrides = parse_repository_overrides(&[
        "central::https://repo.example.test".to_string(),
        "local::file:///srv/repo".to_string(),
    ])
    .expect("must parse");

    assert_eq!(
        overrides,
        vec![
            Repository::new("central", "https://repo.example.test"),
            Repository::new("local", "file:///srv/repo"),
        ]
    );
}

#[test]
fn rejects_override_without_separator() {
    let err = parse_repository_overrides(&["central=https://repo".to_string()])
        .expect_err("must reject");
    assert!(err.to_string().contains("expected id::url"));
}

#[test]
fn rejects_override_with_empty_url() {
    let err = parse_repository_overrides(&["central::".to_string()]).expect_err("must reject");
    assert!(err.to_string().contains("must not be empty"));
}

#[test]
fn rejects_duplicate_override_ids() {
    let err = parse_repository_overrides(&[
        "central::https://a.example.test".to_string(),
        "central::https://b.example.test".to_string(),
    ])
    .expect_err("must reject");
    assert!(err.to_string().contains("duplicate repository override"));
}

#[test]
fn formats_update_lines_with_version_transitions() {
    let mut finder = UpdateFinder::new(
        ScriptedSession(HashMap::from([(
            ArtifactId::new("org.example", "foo"),
            version("1.1.0"),
        )])),
        Vec::new(),
        false,
    );
    let updates = finder
        .find_updates(&[managed("foo", "1.0.0")])
        .expect("must find updates");

    let lines = format_update_lines(&updates);
    assert_eq!(lines, vec!["  org.example:foo 1.0.0 -> 1.1.0".to_string()]);
}

#[test]
fn status_lines_list_channels_artifacts_and_history() {
    let tmp = tempfile::tempdir().expect("must create tempdir");
    let metadata = seeded_installation(tmp.path());

    let lines = format_status_lines(&metadata).expect("must format");
    assert!(lines[0].starts_with("installation: "));
    assert!(lines.contains(&"channels: stable".to_string()));
    assert!(lines.contains(&"artifacts (1):".to_string()));
    assert!(lines.contains(&"  org.example:foo@1.0.0".to_string()));
    assert!(lines.contains(&"last operation: none recorded".to_string()));
}

#[test]
fn status_json_carries_artifact_coordinates() {
    let tmp = tempfile::tempdir().expect("must create tempdir");
    let metadata = seeded_installation(tmp.path());

    let rendered = status_json(&metadata).expect("must serialize");
    assert!(rendered.contains("\"org.example\""));
    assert!(rendered.contains("\"1.0.0\""));
    assert!(rendered.contains("\"stable\""));
}

#[test]
fn channel_lines_show_repositories_per_channel() {
    let channels = vec![Channel {
        name: "stable".to_string(),
        strategy: ResolutionStrategy::Latest,
        repositories: vec![
            Repository::new("central", "https://repo.example.test"),
            Repository::new("local", "file:///srv/repo"),
        ],
    }];

    let lines = format_channel_lines(&channels);
    assert_eq!(lines[0], "channel: stable (strategy: latest)");
    assert_eq!(lines[1], "  central https://repo.example.test");
    assert_eq!(lines[2], "  local file:///srv/repo");
}

#[test]
fn channel_lines_report_empty_configuration() {
    assert_eq!(
        format_channel_lines(&[]),
        vec!["no channels configured".to_string()]
    );
}

#[test]
fn plain_status_line_has_no_escape_codes() {
    let line = render_status_line(OutputStyle::Plain, "ok", "installation is up to date");
    assert_eq!(line, "[ok] installation is up to date");
}

#[test]
fn rich_status_line_keeps_the_message() {
    let line = render_status_line(OutputStyle::Rich, "ok", "installation is up to date");
    assert!(line.contains("[ok]"));
    assert!(line.contains("installation is up to date"));
    assert_ne!(line, "[ok] installation is up to date");
}

#[test]
fn explicit_shell_wins_over_environment() {
    let shell = resolve_init_shell(Some(Shell::Fish), Some("/usr/bin/zsh"), false);
    assert_eq!(shell, Shell::Fish);
}

#[test]
fn shell_is_detected_from_environment_path() {
    assert_eq!(
        resolve_init_shell(None, Some("/usr/bin/zsh"), false),
        Shell::Zsh
    );
    assert_eq!(resolve_init_shell(None, Some("pwsh"), false), Shell::PowerShell);
}

#[test]
fn unknown_shell_falls_back_per_platform() {
    assert_eq!(resolve_init_shell(None, Some("/bin/tcsh"), false), Shell::Bash);
    assert_eq!(resolve_init_shell(None, None, true), Shell::PowerShell);
}

#[test]
fn init_shell_snippet_pipes_completions() {
    assert_eq!(
        init_shell_lines(Shell::Bash),
        vec!["source <(provost completions bash)".to_string()]
    );
    assert_eq!(
        init_shell_lines(Shell::Fish),
        vec!["provost completions fish | source".to_string()]
    );
}
