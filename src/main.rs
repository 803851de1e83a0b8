#![forbid(unsafe_code)]

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use fleetctl::cli::{Cli, Commands};
use fleetctl::commands;
use fleetctl::hooks::StdinPrompter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let env_file = resolve_env_file(&cli)?;
    let mut prompter = StdinPrompter;

    match &cli.command {
        Commands::Setup => {
            commands::setup::execute(&cli.manifest, env_file.as_deref(), &mut prompter)?;
        }
        Commands::Repair { identities } => {
            commands::repair::execute(
                &cli.manifest,
                env_file.as_deref(),
                identities,
                &mut prompter,
            )?;
        }
        Commands::EnvExample { output } => {
            commands::env_example::execute(&cli.manifest, output.as_deref())?;
        }
    }

    Ok(())
}

/// An explicit --env-file must exist; the default .env is used only when
/// present.
fn resolve_env_file(cli: &Cli) -> Result<Option<PathBuf>> {
    if let Some(path) = &cli.env_file {
        if !path.exists() {
            bail!("env file not found: {}", path.display());
        }
        return Ok(Some(path.clone()));
    }
    let default = PathBuf::from(".env");
    Ok(default.exists().then_some(default))
}
