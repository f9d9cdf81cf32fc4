//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::SyncBlueprint;
use providers::ProviderKind;
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::{Cli, ValidateArgs};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    timezone: String,
    stores: Vec<String>,
    league_count: usize,
    contact_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(cli: &Cli, args: &ValidateArgs) -> Result<()> {
    info!(config = %cli.config.display(), "Validating configuration");

    let result = validate_config(cli);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(cli: &Cli) -> ValidationResult {
    let config_path = cli.config.display().to_string();

    match load_blueprint(cli) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    timezone: blueprint.common.timezone.to_string(),
                    stores: ProviderKind::ALL
                        .iter()
                        .filter(|kind| kind.is_configured(&blueprint))
                        .map(ToString::to_string)
                        .collect(),
                    league_count: blueprint
                        .schedule
                        .as_ref()
                        .map_or(0, |schedule| schedule.leagues.len()),
                    contact_count: blueprint.contacts.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("{e:#}")),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &SyncBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.calendar.is_none() && blueprint.table.is_none() {
        warnings.push("Neither [calendar] nor [table] configured - no run has a destination".into());
    }

    let has_google_store = blueprint.calendar.is_some() || blueprint.table.is_some();
    if has_google_store && blueprint.google.mode() == "none" {
        warnings.push("No Google credentials - calendar and table cannot connect".into());
    }

    if let Some(schedule) = &blueprint.schedule {
        if schedule.leagues.is_empty() {
            warnings.push("[schedule] has no leagues - the schedule feed cannot connect".into());
        }
        if schedule.arenas.is_empty() {
            warnings.push("schedule.arenas is empty - venues show their raw ids".into());
        }
    }

    if blueprint.calendar.is_some() && blueprint.contacts.is_empty() {
        warnings.push("No contacts - calendar attendees cannot be resolved".into());
    }

    if let Some(cache) = &blueprint.cache {
        if !cache.mirror {
            warnings.push("cache.mirror is off - the snapshot is only written when cache is an endpoint".into());
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Timezone: {}", summary.timezone);
            println!("  Stores: {}", summary.stores.join(", "));
            println!("  Leagues: {}", summary.league_count);
            println!("  Contacts: {}", summary.contact_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
