//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 规划场景测试 (no-op / 受保护删除 / 新增, 幂等性, 分区)
//! - 编排器端到端测试 (内存 provider + 缓存文件镜像)

#[cfg(test)]
mod fixtures {
    use chrono::{DateTime, FixedOffset};
    use contracts::{Assignees, Event, Origin};

    pub fn at(ts: &str) -> Option<DateTime<FixedOffset>> {
        Some(DateTime::parse_from_rfc3339(ts).unwrap())
    }

    /// Game as the schedule feed reports it: assignees not tracked
    pub fn scheduled(id: &str, league_id: &str) -> Event {
        Event {
            id: Some(id.into()),
            datetime: at("2024-03-01T18:00:00+01:00"),
            league: Some("U16".into()),
            opponent: Some("Team B".into()),
            assignees: Assignees::Unknown,
            origin: Some(Origin::new(league_id, Some(id.into()))),
            ..Default::default()
        }
    }

    /// Same game as stored in a destination, with scouts assigned
    pub fn assigned(id: &str, league_id: &str, scouts: &[&str]) -> Event {
        Event {
            assignees: Assignees::from_names(scouts.iter().copied()),
            ..scheduled(id, league_id)
        }
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{Capabilities, MatchStrategy, RunReport};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(MatchStrategy::default(), MatchStrategy::Identity);
    }

    #[test]
    fn test_default_capabilities() {
        let caps = Capabilities::default();
        assert!(caps.identity && caps.writable && !caps.requires_datetime);
    }

    #[test]
    fn test_report_changes() {
        let report = RunReport {
            added: 1,
            updated: 2,
            deleted: 3,
            unchanged: 10,
            ..Default::default()
        };
        assert_eq!(report.changes(), 6);
    }
}

#[cfg(test)]
mod scenario_tests {
    use std::collections::HashSet;

    use contracts::{Collection, Event, MatchStrategy, Origin, Record, RecordKey};
    use reconciler::{plan, project, PlanOptions};

    use crate::fixtures::{assigned, scheduled};

    fn identity() -> PlanOptions {
        PlanOptions {
            strategy: MatchStrategy::Identity,
            require_datetime: true,
        }
    }

    fn collection(name: &str, events: Vec<Event>) -> Collection {
        let records = events
            .into_iter()
            .enumerate()
            .map(|(idx, event)| Record::new(format!("{name}-{idx}"), event))
            .collect();
        Collection::from_records(name, records)
    }

    #[test]
    fn test_scenario_a_unknown_assignees_are_a_no_op() {
        let source = collection("schedule", vec![scheduled("M1", "L1")]);
        let destination = collection("calendar", vec![assigned("M1", "L1", &["Alice"])]);

        let plan = plan(&source, &destination, |_| false, &identity());
        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, vec![RecordKey::new("calendar-0")]);
    }

    #[test]
    fn test_scenario_b_failed_group_is_protected() {
        let source = collection("schedule", vec![scheduled("M1", "L0")]);
        let destination = collection(
            "calendar",
            vec![assigned("M1", "L0", &["Alice"]), assigned("M2", "L1", &["Bob"])],
        );

        let plan = plan(
            &source,
            &destination,
            |origin: &Origin| origin.group_id == "L1",
            &identity(),
        );
        assert!(plan.delete.is_empty());
        assert_eq!(plan.protected.len(), 1);
        assert_eq!(plan.protected[0].key, RecordKey::new("calendar-1"));
    }

    #[test]
    fn test_scenario_c_new_event_added_once() {
        let source = collection(
            "schedule",
            vec![scheduled("M1", "L1"), scheduled("M3", "L1")],
        );
        let destination = collection("calendar", vec![assigned("M1", "L1", &["Alice"])]);

        let plan = plan(&source, &destination, |_| false, &identity());
        assert_eq!(plan.add, vec![scheduled("M3", "L1")]);
        assert!(plan.update.is_empty());
        assert!(plan.delete.is_empty());
    }

    #[test]
    fn test_replan_after_apply_is_empty() {
        let mut moved = scheduled("M1", "L1");
        moved.location = Some("Halle Nord".into());
        let source = collection(
            "schedule",
            vec![moved, scheduled("M3", "L1")],
        );
        let destination = collection(
            "calendar",
            vec![assigned("M1", "L1", &["Alice"]), assigned("M9", "L1", &[])],
        );

        let first = plan(&source, &destination, |_| false, &identity());
        assert!(!first.is_empty());

        let applied = collection("calendar", project(&destination, &first));
        let second = plan(&source, &applied, |_| false, &identity());
        assert!(second.is_empty(), "second plan: {second:?}");
    }

    #[test]
    fn test_every_destination_record_in_one_partition() {
        let mut changed = scheduled("M2", "L1");
        changed.opponent = Some("Team C".into());
        let source = collection("schedule", vec![scheduled("M1", "L1"), changed]);

        let mut by_hand = assigned("X1", "L1", &["Carol"]);
        by_hand.origin = None;
        let destination = collection(
            "calendar",
            vec![
                assigned("M1", "L1", &["Alice"]),
                assigned("M2", "L1", &["Bob"]),
                assigned("M4", "L1", &[]),
                assigned("M5", "L2", &[]),
                by_hand,
            ],
        );

        let plan = plan(
            &source,
            &destination,
            |origin: &Origin| origin.group_id == "L2",
            &identity(),
        );

        let mut seen = HashSet::new();
        let keys = plan
            .unchanged
            .iter()
            .chain(plan.update.iter().map(|u| &u.key))
            .chain(plan.delete.iter())
            .chain(plan.protected.iter().map(|p| &p.key));
        for key in keys {
            assert!(seen.insert(key.clone()), "{key} in two partitions");
        }
        assert_eq!(seen.len(), destination.len());
        assert_eq!(plan.delete, vec![RecordKey::new("calendar-2")]);
    }
}

#[cfg(test)]
mod e2e_tests {
    use contracts::{
        Assignees, Capabilities, ContractError, Event, MatchStrategy, Provider, RecordKey,
        SkipReason,
    };
    use providers::{CacheProvider, Call, MemoryProvider, Operation};
    use reconciler::{OrchestratorConfig, RunState, SyncOrchestrator};

    use crate::fixtures::{assigned, at, scheduled};

    fn config() -> OrchestratorConfig {
        OrchestratorConfig::default()
    }

    /// Source with one changed, one new game; destination with one stale game
    fn providers() -> (MemoryProvider, MemoryProvider) {
        let mut moved = scheduled("M1", "L1");
        moved.datetime = at("2024-03-01T19:00:00+01:00");
        let source = MemoryProvider::new("schedule")
            .with_events([moved, scheduled("M3", "L1")])
            .with_capabilities(Capabilities {
                writable: false,
                ..Capabilities::default()
            });
        let destination = MemoryProvider::new("calendar")
            .with_events([
                assigned("M1", "L1", &["Alice"]),
                assigned("M2", "L1", &["Bob"]),
            ])
            .with_capabilities(Capabilities {
                requires_datetime: true,
                ..Capabilities::default()
            });
        (source, destination)
    }

    #[tokio::test]
    async fn test_mutations_in_fixed_order() {
        let (source, destination) = providers();
        let journal = destination.journal();
        let mut orchestrator = SyncOrchestrator::new(source, destination, config());

        let report = orchestrator.run().await.unwrap();
        assert_eq!(orchestrator.state(), RunState::Done);
        assert_eq!((report.added, report.updated, report.deleted), (1, 1, 1));
        assert_eq!(report.strategy, MatchStrategy::Identity);

        assert_eq!(
            journal.operations(),
            vec![
                Operation::Connect,
                Operation::List,
                Operation::Add,
                Operation::Update,
                Operation::Delete
            ]
        );

        let events = orchestrator.destination().events();
        let updated = events.iter().find(|e| e.id.as_deref() == Some("M1")).unwrap();
        assert_eq!(updated.datetime, at("2024-03-01T19:00:00+01:00"));
        assert_eq!(updated.assignees, Assignees::Set(vec!["Alice".into()]));
        assert!(events.iter().all(|e| e.id.as_deref() != Some("M2")));
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let (source, destination) = providers();
        let journal = destination.journal();
        let mut orchestrator = SyncOrchestrator::new(source, destination, config());

        orchestrator.run().await.unwrap();
        let mutations_after_first = journal.mutations().len();

        let report = orchestrator.run().await.unwrap();
        assert_eq!(report.changes(), 0);
        assert_eq!(journal.mutations().len(), mutations_after_first);
    }

    #[tokio::test]
    async fn test_connect_failure_prevents_any_mutation() {
        let (source, _) = providers();
        let destination = MemoryProvider::new("calendar")
            .with_events([assigned("M2", "L1", &["Bob"])])
            .fail_on(Operation::Connect);
        let journal = destination.journal();
        let mut orchestrator = SyncOrchestrator::new(source, destination, config());

        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, ContractError::Connection { .. }));
        assert_eq!(orchestrator.state(), RunState::Failed);
        assert!(journal.mutations().is_empty());
        assert_eq!(orchestrator.destination().records().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_update_aborts_without_rollback() {
        let (source, _) = providers();
        let destination = MemoryProvider::new("calendar")
            .with_events([
                assigned("M1", "L1", &["Alice"]),
                assigned("M2", "L1", &["Bob"]),
            ])
            .fail_on(Operation::Update);
        let journal = destination.journal();
        let mut orchestrator = SyncOrchestrator::new(source, destination, config());

        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, ContractError::Mutation { .. }));

        // the add went through and stays; the delete never ran
        let ops: Vec<Operation> = journal.mutations().iter().map(Call::operation).collect();
        assert_eq!(ops, vec![Operation::Add, Operation::Update]);
        let ids: Vec<Option<String>> = orchestrator
            .destination()
            .events()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert!(ids.contains(&Some("M3".into())));
        assert!(ids.contains(&Some("M2".into())));
    }

    #[tokio::test]
    async fn test_failed_league_keeps_its_games() {
        let source = MemoryProvider::new("schedule")
            .with_events([scheduled("M1", "L1")])
            .with_failed_group("L2");
        let destination = MemoryProvider::new("calendar").with_events([
            assigned("M1", "L1", &["Alice"]),
            assigned("M7", "L2", &["Bob"]),
        ]);
        let journal = destination.journal();
        let mut orchestrator = SyncOrchestrator::new(source, destination, config());

        let report = orchestrator.run().await.unwrap();
        assert_eq!(report.deleted, 0);
        assert_eq!(report.protected, 1);
        assert!(journal.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_undated_event_is_skipped_for_calendar() {
        let mut undated = scheduled("M5", "L1");
        undated.datetime = None;
        let source = MemoryProvider::new("schedule").with_events([undated.clone()]);
        let destination = MemoryProvider::new("calendar").with_capabilities(Capabilities {
            requires_datetime: true,
            ..Capabilities::default()
        });
        let mut orchestrator = SyncOrchestrator::new(source, destination, config());

        let report = orchestrator.run().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.added, 0);
        let skipped = &orchestrator.last_plan().unwrap().skipped;
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].event, undated);
        assert_eq!(skipped[0].reason, SkipReason::NoDatetime);
    }

    #[tokio::test]
    async fn test_hand_typed_row_is_not_copied_every_run() {
        let typed_in = Event {
            id: None,
            origin: None,
            ..assigned("", "", &["Alice"])
        };
        let source =
            MemoryProvider::new("table").with_events([typed_in, scheduled("M1", "L1")]);
        let destination = MemoryProvider::new("calendar");
        let mut orchestrator = SyncOrchestrator::new(source, destination, config());

        let first = orchestrator.run().await.unwrap();
        assert_eq!((first.added, first.skipped), (1, 1));
        let skipped = &orchestrator.last_plan().unwrap().skipped;
        assert_eq!(skipped[0].reason, SkipReason::NoIdentity);

        let second = orchestrator.run().await.unwrap();
        assert_eq!(second.changes(), 0);
        assert_eq!(orchestrator.destination().events().len(), 1);
    }

    #[tokio::test]
    async fn test_simulate_writes_mirror_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let (source, destination) = providers();
        let journal = destination.journal();
        let mirror = CacheProvider::new(&path, true);

        let mut orchestrator = SyncOrchestrator::with_mirror(
            source,
            destination,
            mirror,
            OrchestratorConfig {
                simulate: true,
                ..config()
            },
        );
        let report = orchestrator.run().await.unwrap();
        assert!(report.simulated);
        assert_eq!(report.changes(), 3);
        assert!(journal.mutations().is_empty());

        // snapshot shows the state the run would have produced
        let mut reader = CacheProvider::new(&path, false);
        let ids: Vec<Option<String>> = reader
            .list_events()
            .await
            .unwrap()
            .events()
            .map(|e| e.id.clone())
            .collect();
        assert_eq!(ids, vec![Some("M1".into()), Some("M3".into())]);
    }

    #[tokio::test]
    async fn test_cache_as_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = CacheProvider::new(&path, false);
        cache
            .add_events(&[assigned("M1", "L1", &["Alice", "Bob"])])
            .await
            .unwrap();

        let destination = MemoryProvider::new("table")
            .with_record(RecordKey::new("row-2"), assigned("M1", "L1", &["Alice"]));
        let mut orchestrator = SyncOrchestrator::new(cache, destination, config());

        let report = orchestrator.run().await.unwrap();
        assert_eq!(report.updated, 1);
        let events: Vec<Event> = orchestrator.destination().events();
        assert_eq!(
            events[0].assignees,
            Assignees::Set(vec!["Alice".into(), "Bob".into()])
        );
    }

    #[tokio::test]
    async fn test_fuzzy_requires_opt_in() {
        let no_identity = Capabilities {
            identity: false,
            ..Capabilities::default()
        };
        let source = MemoryProvider::new("schedule").with_events([scheduled("M1", "L1")]);
        let destination = MemoryProvider::new("table")
            .with_events([assigned("M9", "L1", &[])])
            .with_capabilities(no_identity);
        let journal = destination.journal();

        let mut strict = SyncOrchestrator::new(source, destination, config());
        let err = strict.run().await.unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
        assert!(journal.mutations().is_empty());

        let (source, destination, _) = strict.into_parts();
        let mut fuzzy = SyncOrchestrator::new(
            source,
            destination,
            OrchestratorConfig {
                fuzzy_fallback: true,
                ..config()
            },
        );
        let report = fuzzy.run().await.unwrap();
        assert_eq!(report.strategy, MatchStrategy::Fuzzy);
        assert_eq!(report.deleted, 0);
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use providers::{AnyMirror, ProviderKind};

    #[test]
    fn test_blueprint_to_providers() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
[common]
timezone = "Europe/Berlin"

[table]
spreadsheet_id = "sheet"
sheet_name = "Spiele"

[cache]
path = "cache.json"

[schedule]
[[schedule.leagues]]
name = "U16"
league_id = "4711"
team_season_id = 7
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        assert!(ProviderKind::Schedule.build(&blueprint).is_ok());
        assert!(ProviderKind::Table.build(&blueprint).is_ok());
        assert!(ProviderKind::Calendar.build(&blueprint).is_err());

        let mirror = AnyMirror::from_blueprint(
            &blueprint,
            &[ProviderKind::Schedule, ProviderKind::Table],
        );
        assert!(mirror.is_enabled());
    }

    #[test]
    fn test_example_config_loads() {
        let content = include_str!("../../../scout_sync.example.toml");
        let blueprint = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();

        assert_eq!(blueprint.schedule.as_ref().unwrap().leagues.len(), 2);
        assert_eq!(
            blueprint.arena_table().display_name("100234"),
            Some("Sporthalle Nord")
        );
        for kind in ProviderKind::ALL {
            assert!(kind.is_configured(&blueprint), "{kind} not configured");
        }
    }
}
