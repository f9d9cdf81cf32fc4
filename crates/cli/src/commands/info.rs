//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::SyncBlueprint;
use providers::ProviderKind;
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::{Cli, InfoArgs};

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    timezone: String,
    simulate: bool,
    request_timeout_secs: u64,
    fuzzy_fallback: bool,
    stores: Vec<StoreInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    leagues: Vec<LeagueInfo>,
    contacts: Vec<String>,
    credentials: &'static str,
}

#[derive(Serialize)]
struct StoreInfo {
    kind: String,
    configured: bool,
    destination: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

#[derive(Serialize)]
struct LeagueInfo {
    name: String,
    league_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_permanent_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_season_id: Option<u64>,
}

/// Execute the `info` command
pub fn run_info(cli: &Cli, args: &InfoArgs) -> Result<()> {
    info!(config = %cli.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(cli)?;
    let info = build_config_info(&blueprint);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn location(blueprint: &SyncBlueprint, kind: ProviderKind) -> Option<String> {
    match kind {
        ProviderKind::Schedule => blueprint.schedule.as_ref().map(|s| s.base_url.clone()),
        ProviderKind::Cache => blueprint
            .cache
            .as_ref()
            .map(|c| c.path.display().to_string()),
        ProviderKind::Calendar => blueprint.calendar.as_ref().map(|c| c.id.clone()),
        ProviderKind::Table => blueprint
            .table
            .as_ref()
            .map(|t| format!("{} / {}", t.spreadsheet_id, t.sheet_name)),
    }
}

fn build_config_info(blueprint: &SyncBlueprint) -> ConfigInfo {
    let stores = ProviderKind::ALL
        .into_iter()
        .map(|kind| StoreInfo {
            kind: kind.to_string(),
            configured: kind.is_configured(blueprint),
            destination: kind.can_be_destination(),
            location: location(blueprint, kind),
        })
        .collect();

    let leagues = blueprint
        .schedule
        .iter()
        .flat_map(|schedule| &schedule.leagues)
        .map(|league| LeagueInfo {
            name: league.name.clone(),
            league_id: league.league_id.clone(),
            team_permanent_id: league.team_permanent_id,
            team_season_id: league.team_season_id,
        })
        .collect();

    let credentials = blueprint.google.mode();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        timezone: blueprint.common.timezone.to_string(),
        simulate: blueprint.common.simulate,
        request_timeout_secs: blueprint.common.request_timeout_secs,
        fuzzy_fallback: blueprint.matching.fuzzy_fallback,
        stores,
        leagues,
        contacts: blueprint.contacts.keys().cloned().collect(),
        credentials,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("\n=== Configuration ===\n");
    println!("  Version: {}", info.version);
    println!("  Timezone: {}", info.timezone);
    println!("  Simulate: {}", info.simulate);
    println!("  Request timeout: {}s", info.request_timeout_secs);
    println!("  Fuzzy fallback: {}", info.fuzzy_fallback);
    println!("  Google credentials: {}", info.credentials);

    println!("\nStores:");
    for store in &info.stores {
        let role = if store.destination { "source/destination" } else { "source" };
        match &store.location {
            Some(location) => println!("  - {} ({role}): {location}", store.kind),
            None => println!("  - {} ({role}): not configured", store.kind),
        }
    }

    if !info.leagues.is_empty() {
        println!("\nLeagues ({}):", info.leagues.len());
        for league in &info.leagues {
            println!("  - {} [{}]", league.name, league.league_id);
        }
    }

    println!("\nContacts ({}): {}", info.contacts.len(), info.contacts.join(", "));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_build_config_info() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
[common]
timezone = "Europe/Berlin"

[schedule]
[[schedule.leagues]]
name = "U16"
league_id = "4711"
team_permanent_id = 42

[contacts]
Alice = "alice@example.org"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let info = build_config_info(&blueprint);
        assert_eq!(info.leagues.len(), 1);
        assert_eq!(info.contacts, vec!["Alice"]);
        assert_eq!(info.credentials, "none");
        let schedule = info.stores.iter().find(|s| s.kind == "schedule").unwrap();
        assert!(schedule.configured && !schedule.destination);
    }
}
