use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fleetctl",
    version = env!("FLEETCTL_VERSION"),
    about = "Provision fleets of autonomous agent workloads from declarative identities"
)]
pub struct Cli {
    /// Path to the fleet manifest
    #[arg(long, global = true, default_value = "fleet.toml")]
    pub manifest: PathBuf,

    /// Env file merged under the process environment (defaults to .env if
    /// present)
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve secrets, run lifecycle hooks, and rewrite the manifest
    Setup,

    /// Reconcile discovered identity sources with the manifest, then run
    /// the setup pass
    Repair {
        /// Directory containing identity source directories
        #[arg(long, default_value = "identities")]
        identities: PathBuf,
    },

    /// Write the example environment file without resolving
    EnvExample {
        /// Output path (defaults to .env.example next to the manifest)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_setup() {
        let cli = Cli::try_parse_from(["fleetctl", "setup"]).unwrap();
        assert!(matches!(cli.command, Commands::Setup));
        assert_eq!(cli.manifest, PathBuf::from("fleet.toml"));
    }

    #[test]
    fn test_cli_parses_repair_with_identities() {
        let cli =
            Cli::try_parse_from(["fleetctl", "repair", "--identities", "ids"]).unwrap();
        match cli.command {
            Commands::Repair { identities } => assert_eq!(identities, PathBuf::from("ids")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "fleetctl",
            "setup",
            "--manifest",
            "other.toml",
            "--env-file",
            "custom.env",
        ])
        .unwrap();
        assert_eq!(cli.manifest, PathBuf::from("other.toml"));
        assert_eq!(cli.env_file, Some(PathBuf::from("custom.env")));
    }
}
