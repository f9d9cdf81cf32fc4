//! Run summary printed after a sync.

use contracts::{Plan, ProtectionReason, RunReport};

/// What a run did, for the terminal
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: RunReport,
    pub plan: Option<Plan>,
    pub destination: String,
}

impl RunSummary {
    pub fn new(report: RunReport, plan: Option<Plan>, destination: String) -> Self {
        Self {
            report,
            plan,
            destination,
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let report = &self.report;
        let mode = if report.simulated { " (simulated)" } else { "" };

        println!("\n=== Sync {} -> {}{} ===\n", report.source, report.destination, mode);
        println!("  Strategy:  {:?}", report.strategy);
        println!("  Added:     {}", report.added);
        println!("  Updated:   {}", report.updated);
        println!("  Deleted:   {}", report.deleted);
        println!("  Unchanged: {}", report.unchanged);
        println!("  Protected: {}", report.protected);
        println!("  Skipped:   {}", report.skipped);
        println!("  Rejected:  {}", report.rejected);
        println!("  Duration:  {:.2}s", report.elapsed.as_secs_f64());

        if let Some(plan) = &self.plan {
            print_plan(plan, &self.destination);
        }
        println!();
    }
}

fn print_plan(plan: &Plan, destination: &str) {
    if !plan.add.is_empty() {
        println!("\nAdd to {destination}:");
        for event in &plan.add {
            println!("  + {event}");
        }
    }
    if !plan.update.is_empty() {
        println!("\nUpdate in {destination}:");
        for update in &plan.update {
            println!("  ~ {}", update.previous);
            println!("    {}", update.merged);
        }
    }
    if !plan.delete.is_empty() {
        println!("\nDelete from {destination}:");
        for key in &plan.delete {
            println!("  - {key}");
        }
    }
    if !plan.protected.is_empty() {
        println!("\nKept:");
        for record in &plan.protected {
            println!("  ! {} ({})", record.key, describe(&record.reason));
        }
    }
    if !plan.skipped.is_empty() {
        println!("\nSkipped:");
        for skipped in &plan.skipped {
            println!("  ? {} ({})", skipped.event, skipped.reason.describe());
        }
    }
}

fn describe(reason: &ProtectionReason) -> String {
    match reason {
        ProtectionReason::NoOrigin => "added by hand".to_string(),
        ProtectionReason::FetchFailed { group_id } => format!("league {group_id} not fetched"),
        ProtectionReason::WeakMatch => "fuzzy match, never deleted".to_string(),
    }
}
