//! 同步运行指标
//!
//! 每次运行结束时基于 `RunReport` 记录计数器与耗时直方图。

use contracts::RunReport;
use metrics::{counter, gauge, histogram};

pub const RUN_OUTCOME_OK: &str = "ok";
pub const RUN_OUTCOME_FAILED: &str = "failed";

/// 从 RunReport 记录指标
///
/// # Example
///
/// ```ignore
/// let report = orchestrator.run().await?;
/// observability::record_run_report(&report);
/// ```
pub fn record_run_report(report: &RunReport) {
    counter!(
        "scout_sync_runs_total",
        "source" => report.source.clone(),
        "destination" => report.destination.clone(),
        "outcome" => RUN_OUTCOME_OK
    )
    .increment(1);

    let simulated = if report.simulated { "true" } else { "false" };
    counter!("scout_sync_events_added_total", "simulated" => simulated)
        .increment(report.added as u64);
    counter!("scout_sync_events_updated_total", "simulated" => simulated)
        .increment(report.updated as u64);
    counter!("scout_sync_events_deleted_total", "simulated" => simulated)
        .increment(report.deleted as u64);
    counter!("scout_sync_events_skipped_total").increment(report.skipped as u64);
    counter!("scout_sync_events_protected_total").increment(report.protected as u64);

    // 当前目标端事件数 (不含删除)
    gauge!(
        "scout_sync_destination_events",
        "destination" => report.destination.clone()
    )
    .set((report.unchanged + report.updated + report.added + report.protected) as f64);

    histogram!("scout_sync_run_duration_ms").record(report.elapsed.as_secs_f64() * 1000.0);
}

/// 记录失败的运行
pub fn record_run_failure(source: &str, destination: &str) {
    counter!(
        "scout_sync_runs_total",
        "source" => source.to_string(),
        "destination" => destination.to_string(),
        "outcome" => RUN_OUTCOME_FAILED
    )
    .increment(1);
}

/// 记录拉取时被剔除的记录数
pub fn record_records_rejected(provider: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        "scout_sync_records_rejected_total",
        "provider" => provider.to_string()
    )
    .increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // Without an installed recorder the macros are no-ops; these only
    // exercise the code paths.
    #[test]
    fn test_record_without_recorder() {
        let report = RunReport {
            source: "schedule".into(),
            destination: "calendar".into(),
            added: 2,
            elapsed: Duration::from_millis(15),
            ..Default::default()
        };
        record_run_report(&report);
        record_run_failure("schedule", "calendar");
        record_records_rejected("table", 0);
        record_records_rejected("table", 3);
    }
}
