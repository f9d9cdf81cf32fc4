//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use providers::ProviderKind;
use std::path::PathBuf;

/// Scout Sync - keeps the scouting calendar and table in line with the league schedule
#[derive(Parser, Debug)]
#[command(
    name = "scout-sync",
    author,
    version,
    about = "Scouting schedule synchronization",
    long_about = "Reconciles scouting assignments between the league schedule feed, \n\
                  a shared calendar, a shared table and a local cache file.\n\n\
                  Each run reads a source and a destination, plans the minimal set of \n\
                  additions, updates and deletions, and applies them to the destination."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SCOUT_SYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "SCOUT_SYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "scout_sync.toml",
        global = true,
        env = "SCOUT_SYNC_CONFIG"
    )]
    pub config: PathBuf,

    /// Prometheus metrics port (disabled when unset)
    #[arg(long, global = true, env = "SCOUT_SYNC_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Contacts as a JSON object {"name": "email"}, merged over the file
    #[arg(long, global = true, env = "SCOUT_SYNC_CONTACTS", hide_env_values = true)]
    pub contacts: Option<String>,

    /// Google credentials as a JSON object, replacing [google]
    #[arg(long, global = true, env = "SCOUT_SYNC_OAUTH", hide_env_values = true)]
    pub oauth: Option<String>,

    /// Google service account key file content (JSON); preferred over OAuth
    #[arg(long, global = true, env = "SCOUT_SYNC_SERVICE_ACCOUNT", hide_env_values = true)]
    pub service_account: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize one store into another
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Store to read the authoritative events from
    #[arg(long, requires = "to", value_parser = parse_kind)]
    pub from: Option<ProviderKind>,

    /// Store to update (calendar or table)
    #[arg(long, requires = "from", value_parser = parse_kind)]
    pub to: Option<ProviderKind>,

    /// Log the planned changes without writing them
    #[arg(long, env = "SCOUT_SYNC_SIMULATE")]
    pub simulate: bool,

    /// Exchange the refresh token for a fresh access token first
    #[arg(long)]
    pub refresh_credentials: bool,
}

fn parse_kind(value: &str) -> Result<ProviderKind, String> {
    value.parse()
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "scout-sync",
            "run",
            "--from",
            "schedule",
            "--to",
            "calendar",
            "--simulate",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.from, Some(ProviderKind::Schedule));
        assert_eq!(args.to, Some(ProviderKind::Calendar));
        assert!(args.simulate);
    }

    #[test]
    fn test_from_requires_to() {
        assert!(Cli::try_parse_from(["scout-sync", "run", "--from", "schedule"]).is_err());
    }

    #[test]
    fn test_unknown_store() {
        let err = Cli::try_parse_from(["scout-sync", "run", "--from", "excel", "--to", "table"])
            .unwrap_err();
        assert!(err.to_string().contains("unknown provider"));
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["scout-sync", "validate", "-c", "other.json", "--json"])
            .unwrap();
        assert_eq!(cli.config, PathBuf::from("other.json"));
    }
}
