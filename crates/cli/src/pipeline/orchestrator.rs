//! Pipeline - builds the providers for one run and drives the orchestrator.

use contracts::{ContractError, Provider, SyncBlueprint};
use providers::{AnyMirror, AnyProvider, ProviderKind};
use reconciler::{OrchestratorConfig, SyncOrchestrator};
use tracing::info;

use super::RunSummary;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated configuration, overrides applied
    pub blueprint: SyncBlueprint,

    /// Source store
    pub from: ProviderKind,

    /// Destination store
    pub to: ProviderKind,
}

impl PipelineConfig {
    /// Reject store combinations a run cannot serve
    pub fn check(&self) -> Result<(), CliError> {
        if !self.to.can_be_destination() {
            return Err(CliError::usage(format!(
                "'{}' cannot be a destination, use calendar or table",
                self.to
            )));
        }
        if self.from == self.to {
            return Err(CliError::usage(format!(
                "source and destination are both '{}'",
                self.from
            )));
        }
        for kind in [self.from, self.to] {
            if !kind.is_configured(&self.blueprint) {
                return Err(CliError::usage(format!(
                    "'{kind}' is not configured in the config file"
                )));
            }
        }
        Ok(())
    }
}

/// One reconciliation run
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Build the stores, run once, and hand back what happened
    pub async fn run(self) -> Result<RunSummary, CliError> {
        self.config.check()?;
        let PipelineConfig { blueprint, from, to } = self.config;
        let failed = |e: ContractError| CliError::sync(from.as_str(), to.as_str(), e);

        let source: AnyProvider = from.build(&blueprint).map_err(failed)?;
        let destination: AnyProvider = to.build(&blueprint).map_err(failed)?;
        let mirror = AnyMirror::from_blueprint(&blueprint, &[from, to]);

        info!(
            from = %from,
            to = %to,
            simulate = blueprint.common.simulate,
            mirror = mirror.is_enabled(),
            fuzzy_fallback = blueprint.matching.fuzzy_fallback,
            "Starting sync run"
        );

        let config = OrchestratorConfig {
            simulate: blueprint.common.simulate,
            fuzzy_fallback: blueprint.matching.fuzzy_fallback,
            timezone: blueprint.zone(),
        };
        let mut orchestrator = SyncOrchestrator::with_mirror(source, destination, mirror, config);
        let result = orchestrator.run().await;
        let plan = orchestrator.last_plan().cloned();
        let destination_name = orchestrator.destination().name().to_string();

        let report = result.map_err(failed)?;
        Ok(RunSummary::new(report, plan, destination_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CacheConfig, CommonConfig, ConfigVersion, GoogleCredentials, MatchingConfig};
    use std::collections::BTreeMap;

    fn blueprint() -> SyncBlueprint {
        SyncBlueprint {
            version: ConfigVersion::V1,
            common: CommonConfig {
                timezone: "Europe/Berlin".parse().unwrap(),
                simulate: true,
                request_timeout_secs: 5,
                log_file: None,
            },
            matching: MatchingConfig::default(),
            calendar: None,
            table: None,
            schedule: None,
            cache: Some(CacheConfig {
                path: "cache.json".into(),
                mirror: true,
            }),
            contacts: BTreeMap::new(),
            google: GoogleCredentials::default(),
        }
    }

    #[test]
    fn test_cache_cannot_be_destination() {
        let config = PipelineConfig {
            blueprint: blueprint(),
            from: ProviderKind::Schedule,
            to: ProviderKind::Cache,
        };
        assert!(matches!(config.check(), Err(CliError::Usage { .. })));
    }

    #[test]
    fn test_unconfigured_store() {
        let config = PipelineConfig {
            blueprint: blueprint(),
            from: ProviderKind::Cache,
            to: ProviderKind::Table,
        };
        let err = config.check().unwrap_err().to_string();
        assert!(err.contains("'table' is not configured"), "got: {err}");
    }
}
