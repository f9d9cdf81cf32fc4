//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_sync;
pub use validate::run_validate;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::SyncBlueprint;
use tracing::info;

use crate::cli::Cli;
use crate::error::CliError;

/// Load the configuration file and apply the environment overrides
pub fn load_blueprint(cli: &Cli) -> Result<SyncBlueprint> {
    if !cli.config.exists() {
        return Err(CliError::config_not_found(cli.config.display().to_string()).into());
    }

    let mut blueprint = ConfigLoader::load_from_path(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    let mut overridden = false;
    if let Some(contacts) = &cli.contacts {
        let merged = ConfigLoader::merge_contacts_json(&mut blueprint, contacts)
            .context("Invalid SCOUT_SYNC_CONTACTS")?;
        info!(merged, "Contacts merged from environment");
        overridden = true;
    }
    if let Some(oauth) = &cli.oauth {
        ConfigLoader::override_credentials_json(&mut blueprint, oauth)
            .context("Invalid SCOUT_SYNC_OAUTH")?;
        info!("Google credentials taken from environment");
        overridden = true;
    }
    if let Some(key) = &cli.service_account {
        ConfigLoader::override_service_account_json(&mut blueprint, key)
            .context("Invalid SCOUT_SYNC_SERVICE_ACCOUNT")?;
        info!("Google service account taken from environment");
        overridden = true;
    }
    if overridden {
        ConfigLoader::validate(&blueprint).context("Configuration invalid after overrides")?;
    }

    Ok(blueprint)
}
