mod commands;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use commands::UpdateArgs;

#[derive(Parser, Debug)]
#[command(name = "provost")]
#[command(about = "Channel-based update manager for provisioned installations", long_about = None)]
struct Cli {
    /// Installation directory to operate on.
    #[arg(long, default_value = ".")]
    dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show installed artifacts, channels and the last recorded operation.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Resolve updates from the configured channels and apply them.
    Update {
        /// Show the update set without applying anything.
        #[arg(long)]
        dry_run: bool,
        /// Replace every channel's repositories for this run only (id::url).
        #[arg(long = "repository", value_name = "ID::URL")]
        repositories: Vec<String>,
        /// Never contact remote repositories.
        #[arg(long)]
        offline: bool,
        /// Apply without asking for confirmation.
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Print the persisted channel configuration.
    Channels,
    /// Generate a completion script for the given shell.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print a snippet that wires completions into the current shell.
    InitShell {
        #[arg(value_enum)]
        shell: Option<Shell>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status { json } => commands::run_status_command(&cli.dir, json),
        Commands::Update {
            dry_run,
            repositories,
            offline,
            yes,
        } => commands::run_update_command(
            &cli.dir,
            UpdateArgs {
                dry_run,
                repositories,
                offline,
                yes,
            },
        ),
        Commands::Channels => commands::run_channels_command(&cli.dir),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "provost", &mut std::io::stdout());
            Ok(())
        }
        Commands::InitShell { shell } => {
            let resolved = commands::resolve_init_shell(
                shell,
                std::env::var("SHELL").ok().as_deref(),
                cfg!(windows),
            );
            commands::print_init_shell_snippet(resolved);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests;
