use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap_complete::Shell;

use provost_core::{Channel, Repository};
use provost_metadata::{read_provision_records, InstallationMetadata};
use provost_ops::{UpdateOutcome, Updater};
use provost_resolver::{SessionConfig, UpdateSet};

use crate::render::TerminalRenderer;

const REMOTE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) struct UpdateArgs {
    pub dry_run: bool,
    pub repositories: Vec<String>,
    pub offline: bool,
    pub yes: bool,
}

pub(crate) fn run_status_command(dir: &Path, json: bool) -> Result<()> {
    let metadata = InstallationMetadata::open(dir)?;
    if json {
        println!("{}", status_json(&metadata)?);
        return Ok(());
    }
    for line in format_status_lines(&metadata)? {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn run_channels_command(dir: &Path) -> Result<()> {
    let metadata = InstallationMetadata::open(dir)?;
    for line in format_channel_lines(&metadata.channel_config().channels) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn run_update_command(dir: &Path, args: UpdateArgs) -> Result<()> {
    let overrides = parse_repository_overrides(&args.repositories)?;
    let session_config = SessionConfig {
        offline: args.offline,
        request_timeout: Some(REMOTE_REQUEST_TIMEOUT),
    };

    let renderer = TerminalRenderer::current();
    let mut updater = Updater::open(dir, &overrides, session_config)?;

    let progress = renderer.start_progress("resolve");
    let updates = match updater.find_updates() {
        Ok(updates) => {
            progress.finish_success();
            updates
        }
        Err(err) => {
            progress.finish_abandon();
            return Err(err);
        }
    };

    if updates.is_empty() {
        renderer.print_status("ok", "installation is up to date");
        return Ok(());
    }

    renderer.print_section("updates");
    renderer.print_lines(&format_update_lines(&updates));

    if args.dry_run {
        renderer.print_status("skip", "dry run: nothing applied");
        return Ok(());
    }
    if !args.yes && !confirm("apply these updates?")? {
        renderer.print_status("skip", "aborted: no changes applied");
        return Ok(());
    }

    let progress = renderer.start_progress("update");
    let outcome = match updater.perform_update() {
        Ok(outcome) => {
            progress.finish_success();
            outcome
        }
        Err(err) => {
            progress.finish_abandon();
            return Err(err);
        }
    };

    match outcome {
        UpdateOutcome::NoChanges => {
            // The channels moved between preview and apply.
            renderer.print_status("ok", "installation is up to date");
        }
        UpdateOutcome::Applied {
            updates,
            cache_warning,
        } => {
            renderer.print_status("done", &format!("applied {} update(s)", updates.len()));
            if let Some(warning) = cache_warning {
                eprintln!("warning: {warning}");
            }
        }
    }

    updater.close();
    Ok(())
}

pub(crate) fn parse_repository_overrides(values: &[String]) -> Result<Vec<Repository>> {
    let mut overrides: Vec<Repository> = Vec::with_capacity(values.len());
    for value in values {
        let Some((id, url)) = value.split_once("::") else {
            return Err(anyhow!(
                "invalid repository override '{value}': expected id::url"
            ));
        };
        if id.trim().is_empty() || url.trim().is_empty() {
            return Err(anyhow!(
                "invalid repository override '{value}': id and url must not be empty"
            ));
        }
        if overrides.iter().any(|repo| repo.id == id) {
            return Err(anyhow!("duplicate repository override id '{id}'"));
        }
        overrides.push(Repository::new(id, url));
    }
    Ok(overrides)
}

pub(crate) fn format_status_lines(metadata: &InstallationMetadata) -> Result<Vec<String>> {
    let mut lines = vec![format!(
        "installation: {}",
        metadata.layout().install_dir().display()
    )];

    let channels = &metadata.channel_config().channels;
    if channels.is_empty() {
        lines.push("channels: none configured".to_string());
    } else {
        let names = channels
            .iter()
            .map(|channel| channel.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("channels: {names}"));
    }

    let artifacts = metadata.artifacts();
    if artifacts.is_empty() {
        lines.push("artifacts: none recorded".to_string());
    } else {
        lines.push(format!("artifacts ({}):", artifacts.len()));
        for artifact in artifacts {
            lines.push(format!("  {artifact}"));
        }
    }

    let records = read_provision_records(metadata.layout())?;
    match records.last() {
        Some(record) => lines.push(format!(
            "last operation: {} at unix {}",
            record.kind.as_str(),
            record.recorded_at_unix
        )),
        None => lines.push("last operation: none recorded".to_string()),
    }

    Ok(lines)
}

pub(crate) fn status_json(metadata: &InstallationMetadata) -> Result<String> {
    let records = read_provision_records(metadata.layout())?;
    let value = serde_json::json!({
        "installation": metadata.layout().install_dir().display().to_string(),
        "channels": metadata
            .channel_config()
            .channels
            .iter()
            .map(|channel| channel.name.clone())
            .collect::<Vec<_>>(),
        "artifacts": metadata.artifacts(),
        "recorded_operations": records.len(),
    });
    serde_json::to_string_pretty(&value).context("failed to serialize status output")
}

pub(crate) fn format_channel_lines(channels: &[Channel]) -> Vec<String> {
    if channels.is_empty() {
        return vec!["no channels configured".to_string()];
    }

    let mut lines = Vec::new();
    for channel in channels {
        lines.push(format!(
            "channel: {} (strategy: {})",
            channel.name,
            channel.strategy.as_str()
        ));
        for repository in &channel.repositories {
            lines.push(format!("  {} {}", repository.id, repository.url));
        }
    }
    lines
}

pub(crate) fn format_update_lines(updates: &UpdateSet) -> Vec<String> {
    updates
        .entries()
        .iter()
        .map(|change| format!("  {} {} -> {}", change.id, change.current, change.new))
        .collect()
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush().context("failed to flush stdout")?;

    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

pub(crate) fn resolve_init_shell(
    requested_shell: Option<Shell>,
    shell_env: Option<&str>,
    is_windows: bool,
) -> Shell {
    if let Some(shell) = requested_shell {
        return shell;
    }
    if let Some(shell) = detect_shell_from_env(shell_env) {
        return shell;
    }
    if is_windows {
        Shell::PowerShell
    } else {
        Shell::Bash
    }
}

fn detect_shell_from_env(shell_env: Option<&str>) -> Option<Shell> {
    let shell_value = shell_env?;
    let shell_token = Path::new(shell_value)
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or(shell_value)
        .to_ascii_lowercase();
    match shell_token.as_str() {
        "bash" => Some(Shell::Bash),
        "zsh" => Some(Shell::Zsh),
        "fish" => Some(Shell::Fish),
        "powershell" | "pwsh" => Some(Shell::PowerShell),
        _ => None,
    }
}

pub(crate) fn print_init_shell_snippet(shell: Shell) {
    for line in init_shell_lines(shell) {
        println!("{line}");
    }
}

pub(crate) fn init_shell_lines(shell: Shell) -> Vec<String> {
    match shell {
        Shell::Bash | Shell::Zsh => {
            vec![format!("source <(provost completions {shell})")]
        }
        Shell::Fish => vec!["provost completions fish | source".to_string()],
        Shell::PowerShell => {
            vec!["provost completions powershell | Out-String | Invoke-Expression".to_string()]
        }
        other => vec![format!(
            "# run 'provost completions {other}' and source the output manually"
        )],
    }
}
