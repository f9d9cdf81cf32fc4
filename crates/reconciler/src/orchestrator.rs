//! Sync orchestrator - drives connect → fetch → plan → apply.

use std::time::Instant;

use chrono_tz::Tz;
use contracts::{
    Collection, ContractError, Event, Mirror, NoMirror, Plan, Provider, RunReport,
};
use tracing::{debug, error, info, instrument, warn};

use crate::matching::select_strategy;
use crate::planner::{plan, project, PlanOptions};

/// Run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Connecting,
    Fetching,
    Planning,
    Applying,
    Done,
    Failed,
}

/// Orchestrator switches
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Compute and log the plan, but do not call the mutating provider methods
    pub simulate: bool,
    /// Allow fuzzy matching for provider pairs without identity support
    pub fuzzy_fallback: bool,
    /// Reference zone both collections are normalised to before planning
    pub timezone: Tz,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            simulate: false,
            fuzzy_fallback: false,
            timezone: Tz::UTC,
        }
    }
}

/// One source, one destination, optional mirror
pub struct SyncOrchestrator<S, D, M = NoMirror> {
    source: S,
    destination: D,
    mirror: Option<M>,
    config: OrchestratorConfig,
    state: RunState,
    last_plan: Option<Plan>,
}

impl<S, D> SyncOrchestrator<S, D, NoMirror>
where
    S: Provider,
    D: Provider,
{
    pub fn new(source: S, destination: D, config: OrchestratorConfig) -> Self {
        Self {
            source,
            destination,
            mirror: None,
            config,
            state: RunState::Idle,
            last_plan: None,
        }
    }
}

impl<S, D, M> SyncOrchestrator<S, D, M>
where
    S: Provider,
    D: Provider,
    M: Mirror,
{
    /// Also write the merged result to `mirror` after each run
    pub fn with_mirror(source: S, destination: D, mirror: M, config: OrchestratorConfig) -> Self {
        Self {
            source,
            destination,
            mirror: Some(mirror),
            config,
            state: RunState::Idle,
            last_plan: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Plan computed by the most recent run that reached `Planning`
    pub fn last_plan(&self) -> Option<&Plan> {
        self.last_plan.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn into_parts(self) -> (S, D, Option<M>) {
        (self.source, self.destination, self.mirror)
    }

    /// Execute one reconciliation run.
    ///
    /// Any connect, fetch or mutation error aborts the remaining steps and
    /// leaves the orchestrator in `Failed`. Mutations already applied are not
    /// rolled back; the next run recomputes the diff.
    #[instrument(
        name = "sync_run",
        skip(self),
        fields(source = %self.source.name(), destination = %self.destination.name())
    )]
    pub async fn run(&mut self) -> Result<RunReport, ContractError> {
        let start = Instant::now();
        self.last_plan = None;

        match self.execute(start).await {
            Ok(report) => {
                self.transition(RunState::Done);
                info!(
                    added = report.added,
                    updated = report.updated,
                    deleted = report.deleted,
                    unchanged = report.unchanged,
                    skipped = report.skipped,
                    protected = report.protected,
                    rejected = report.rejected,
                    simulated = report.simulated,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Sync run complete"
                );
                observability::record_run_report(&report);
                Ok(report)
            }
            Err(e) => {
                let failed_in = self.state;
                self.transition(RunState::Failed);
                error!(phase = ?failed_in, kind = ?e.kind(), error = %e, "Sync run failed");
                observability::record_run_failure(self.source.name(), self.destination.name());
                Err(e)
            }
        }
    }

    async fn execute(&mut self, start: Instant) -> Result<RunReport, ContractError> {
        // Connecting
        self.transition(RunState::Connecting);
        if !self.destination.capabilities().writable {
            return Err(ContractError::config_validation(
                "destination",
                format!("provider '{}' is read-only", self.destination.name()),
            ));
        }
        self.source.connect().await?;
        self.destination.connect().await?;

        // Fetching
        self.transition(RunState::Fetching);
        let mut source = self.source.list_events().await?;
        log_rejected(&source);
        let mut destination = self.destination.list_events().await?;
        log_rejected(&destination);
        source.normalize(self.config.timezone);
        destination.normalize(self.config.timezone);
        info!(
            source_events = source.len(),
            destination_events = destination.len(),
            timezone = %self.config.timezone,
            "Collections fetched"
        );

        // Planning
        self.transition(RunState::Planning);
        let source_caps = self.source.capabilities();
        let dest_caps = self.destination.capabilities();
        let options = PlanOptions {
            strategy: select_strategy(&source_caps, &dest_caps, self.config.fuzzy_fallback)?,
            require_datetime: dest_caps.requires_datetime,
        };
        let source_provider = &self.source;
        let plan = plan(
            &source,
            &destination,
            |origin| source_provider.fetch_failed(origin),
            &options,
        );
        log_plan(&plan);

        // Applying
        self.transition(RunState::Applying);
        if self.config.simulate {
            info!(
                changes = plan.add.len() + plan.update.len() + plan.delete.len(),
                "Simulate mode, destination left untouched"
            );
        } else {
            self.apply(&plan).await?;
        }

        if self.mirror.is_some() {
            let mut snapshot = project(&destination, &plan);
            snapshot.extend(
                plan.skipped
                    .iter()
                    .filter(|s| s.matched.is_none())
                    .map(|s| s.event.clone()),
            );
            self.write_mirror(&snapshot).await;
        }

        let report = RunReport {
            source: self.source.name().to_string(),
            destination: self.destination.name().to_string(),
            strategy: plan.strategy,
            added: plan.add.len(),
            updated: plan.update.len(),
            deleted: plan.delete.len(),
            unchanged: plan.unchanged.len(),
            skipped: plan.skipped.len(),
            protected: plan.protected.len(),
            rejected: source.rejected().len() + destination.rejected().len(),
            simulated: self.config.simulate,
            elapsed: start.elapsed(),
        };
        self.last_plan = Some(plan);
        Ok(report)
    }

    /// Fixed order: add, update, delete. Empty batches are not sent.
    async fn apply(&mut self, plan: &Plan) -> Result<(), ContractError> {
        if !plan.add.is_empty() {
            self.destination
                .add_events(&plan.add)
                .await
                .inspect_err(|e| mutation_failed("add", e))?;
        }
        if !plan.update.is_empty() {
            self.destination
                .update_events(&plan.update_batch())
                .await
                .inspect_err(|e| mutation_failed("update", e))?;
        }
        if !plan.delete.is_empty() {
            self.destination
                .delete_events(&plan.delete)
                .await
                .inspect_err(|e| mutation_failed("delete", e))?;
        }
        Ok(())
    }

    async fn write_mirror(&mut self, snapshot: &[Event]) {
        let Some(mirror) = self.mirror.as_mut() else {
            return;
        };
        match mirror.write_snapshot(snapshot).await {
            Ok(()) => debug!(mirror = mirror.name(), events = snapshot.len(), "Mirror written"),
            Err(e) => warn!(mirror = mirror.name(), error = %e, "Mirror write failed"),
        }
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "Run state changed");
        self.state = next;
    }
}

fn mutation_failed(operation: &str, e: &ContractError) {
    error!(
        operation,
        error = %e,
        "Mutation failed, remaining steps aborted (applied changes are kept)"
    );
}

fn log_rejected(collection: &Collection) {
    for rejected in collection.rejected() {
        warn!(
            provider = %rejected.provider,
            record = %rejected.reference,
            reason = %rejected.reason,
            "Record rejected"
        );
    }
    observability::record_records_rejected(collection.provider(), collection.rejected().len());
}

fn log_plan(plan: &Plan) {
    for event in &plan.add {
        info!(operation = "add", event = %event, "Planned");
    }
    for update in &plan.update {
        info!(
            operation = "update",
            key = %update.key,
            old = %update.previous,
            new = %update.merged,
            "Planned"
        );
    }
    for key in &plan.delete {
        info!(operation = "delete", key = %key, "Planned");
    }
    for protected in &plan.protected {
        debug!(key = %protected.key, reason = ?protected.reason, "Protected from deletion");
    }
    for skipped in &plan.skipped {
        warn!(event = %skipped.event, reason = skipped.reason.describe(), "Skipped");
    }
    info!(
        strategy = ?plan.strategy,
        add = plan.add.len(),
        update = plan.update.len(),
        delete = plan.delete.len(),
        unchanged = plan.unchanged.len(),
        protected = plan.protected.len(),
        skipped = plan.skipped.len(),
        "Plan computed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Capabilities, MatchStrategy, Origin, Record, RecordKey};
    use std::sync::{Arc, Mutex};

    /// Minimal provider recording the mutating calls it receives
    #[derive(Default)]
    struct Stub {
        name: &'static str,
        events: Vec<Event>,
        caps: Capabilities,
        fail_connect: bool,
        calls: Vec<&'static str>,
    }

    impl Stub {
        fn new(name: &'static str, events: Vec<Event>) -> Self {
            Self {
                name,
                events,
                ..Default::default()
            }
        }
    }

    impl Provider for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn capabilities(&self) -> Capabilities {
            self.caps
        }

        async fn connect(&mut self) -> Result<(), ContractError> {
            if self.fail_connect {
                return Err(ContractError::connection(self.name, "unreachable"));
            }
            Ok(())
        }

        async fn list_events(&mut self) -> Result<Collection, ContractError> {
            let records = self
                .events
                .iter()
                .enumerate()
                .map(|(i, e)| Record::new(format!("{}-{i}", self.name), e.clone()))
                .collect();
            Ok(Collection::from_records(self.name, records))
        }

        async fn add_events(&mut self, _events: &[Event]) -> Result<(), ContractError> {
            self.calls.push("add");
            Ok(())
        }

        async fn update_events(
            &mut self,
            _updates: &[(RecordKey, Event)],
        ) -> Result<(), ContractError> {
            self.calls.push("update");
            Ok(())
        }

        async fn delete_events(&mut self, _keys: &[RecordKey]) -> Result<(), ContractError> {
            self.calls.push("delete");
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CapturingMirror(Arc<Mutex<Option<Vec<Event>>>>);

    impl Mirror for CapturingMirror {
        fn name(&self) -> &str {
            "capture"
        }

        async fn write_snapshot(&mut self, events: &[Event]) -> Result<(), ContractError> {
            *self.0.lock().unwrap() = Some(events.to_vec());
            Ok(())
        }
    }

    fn game(id: &str, opponent: &str) -> Event {
        Event {
            id: Some(id.into()),
            league: Some("U16".into()),
            opponent: Some(opponent.into()),
            origin: Some(Origin::new("L1", None)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_applies_in_fixed_order() {
        let source = Stub::new("src", vec![game("M1", "Team C"), game("M3", "Team D")]);
        let dest = Stub::new("dst", vec![game("M1", "Team B"), game("M2", "Team E")]);

        let mut orchestrator = SyncOrchestrator::new(source, dest, OrchestratorConfig::default());
        let report = orchestrator.run().await.unwrap();

        assert_eq!(orchestrator.state(), RunState::Done);
        assert_eq!(orchestrator.destination().calls, vec!["add", "update", "delete"]);
        assert_eq!((report.added, report.updated, report.deleted), (1, 1, 1));
        assert!(!report.simulated);
    }

    #[tokio::test]
    async fn test_connect_failure_prevents_mutation() {
        let source = Stub::new("src", vec![game("M3", "Team D")]);
        let mut dest = Stub::new("dst", vec![]);
        dest.fail_connect = true;

        let mut orchestrator = SyncOrchestrator::new(source, dest, OrchestratorConfig::default());
        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, ContractError::Connection { .. }));
        assert_eq!(orchestrator.state(), RunState::Failed);
        assert!(orchestrator.destination().calls.is_empty());
        assert!(orchestrator.last_plan().is_none());
    }

    #[tokio::test]
    async fn test_read_only_destination_rejected() {
        let source = Stub::new("src", vec![]);
        let mut dest = Stub::new("dst", vec![]);
        dest.caps.writable = false;

        let mut orchestrator = SyncOrchestrator::new(source, dest, OrchestratorConfig::default());
        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
    }

    #[tokio::test]
    async fn test_missing_identity_without_fallback_fails_before_mutation() {
        let mut source = Stub::new("src", vec![game("M3", "Team D")]);
        source.caps.identity = false;
        let dest = Stub::new("dst", vec![]);

        let mut orchestrator = SyncOrchestrator::new(source, dest, OrchestratorConfig::default());
        assert!(orchestrator.run().await.is_err());
        assert!(orchestrator.destination().calls.is_empty());
    }

    #[tokio::test]
    async fn test_simulate_still_mirrors_projection() {
        let source = Stub::new("src", vec![game("M1", "Team C"), game("M3", "Team D")]);
        let dest = Stub::new("dst", vec![game("M1", "Team B"), game("M2", "Team E")]);
        let mirror = CapturingMirror::default();
        let config = OrchestratorConfig {
            simulate: true,
            ..Default::default()
        };

        let mut orchestrator = SyncOrchestrator::with_mirror(source, dest, mirror.clone(), config);
        let report = orchestrator.run().await.unwrap();

        assert!(report.simulated);
        assert_eq!(report.changes(), 3);
        assert!(orchestrator.destination().calls.is_empty());

        let snapshot = mirror.0.lock().unwrap().clone().unwrap();
        let ids: Vec<_> = snapshot.iter().filter_map(|e| e.id.as_deref()).collect();
        assert_eq!(ids, vec!["M1", "M3"]);
        assert_eq!(snapshot[0].opponent.as_deref(), Some("Team C"));
    }

    #[tokio::test]
    async fn test_fuzzy_day_taken_in_reference_zone() {
        let mut late = game("M1", "Team B");
        late.id = None;
        late.datetime = Some(chrono::DateTime::parse_from_rfc3339("2024-03-01T23:30:00+00:00").unwrap());
        let mut stored = late.clone();
        stored.datetime = Some(chrono::DateTime::parse_from_rfc3339("2024-03-02T00:30:00+01:00").unwrap());

        let mut source = Stub::new("src", vec![late]);
        source.caps.identity = false;
        let dest = Stub::new("dst", vec![stored]);
        let config = OrchestratorConfig {
            fuzzy_fallback: true,
            timezone: chrono_tz::Europe::Berlin,
            ..Default::default()
        };

        let mut orchestrator = SyncOrchestrator::new(source, dest, config);
        let report = orchestrator.run().await.unwrap();

        assert_eq!(report.strategy, MatchStrategy::Fuzzy);
        assert_eq!((report.added, report.unchanged), (0, 1));
        assert!(orchestrator.destination().calls.is_empty());
    }
}
