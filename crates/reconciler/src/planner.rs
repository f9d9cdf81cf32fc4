//! Reconciliation planner
//!
//! Turns a source collection, a destination collection and the source's
//! fetch-failure signal into a [`Plan`]. Pure computation, no I/O.

use std::collections::HashMap;

use contracts::{
    Collection, Event, MatchStrategy, Origin, Plan, PlannedUpdate, ProtectedRecord,
    ProtectionReason, RecordKey, SkipReason, SkippedEvent,
};
use tracing::debug;

use crate::matching::Matcher;
use crate::protection::protection_for;

/// Planning switches derived from the provider pair
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    pub strategy: MatchStrategy,
    /// Destination cannot store events without a datetime
    pub require_datetime: bool,
}

/// Compute the plan.
///
/// `add`/`update`/`unchanged` follow source order, `delete`/`protected`
/// follow destination order. Every destination record lands in exactly one
/// of `unchanged`, `update`, `delete`, `protected`.
pub fn plan<F>(
    source: &Collection,
    destination: &Collection,
    fetch_failed: F,
    options: &PlanOptions,
) -> Plan
where
    F: Fn(&Origin) -> bool,
{
    let dest_records = destination.records();
    let mut matcher = Matcher::new(options.strategy, dest_records);
    let mut plan = Plan {
        strategy: options.strategy,
        ..Default::default()
    };

    for incoming in source.events() {
        match matcher.claim(incoming) {
            Some(idx) => {
                let current = &dest_records[idx];
                let merged = Event::merge(incoming, &current.event);
                if merged.equivalent(&current.event) {
                    plan.unchanged.push(current.key.clone());
                } else if options.require_datetime && merged.datetime.is_none() {
                    debug!(key = %current.key, event = %incoming, "no datetime, record left as is");
                    plan.unchanged.push(current.key.clone());
                    plan.skipped.push(SkippedEvent {
                        event: incoming.clone(),
                        reason: SkipReason::NoDatetime,
                        matched: Some(current.key.clone()),
                    });
                } else {
                    plan.update.push(PlannedUpdate {
                        key: current.key.clone(),
                        previous: current.event.clone(),
                        merged,
                    });
                }
            }
            None if options.strategy == MatchStrategy::Identity && incoming.identity().is_none() => {
                debug!(event = %incoming, "no id, a created copy could never be matched");
                plan.skipped.push(SkippedEvent {
                    event: incoming.clone(),
                    reason: SkipReason::NoIdentity,
                    matched: None,
                });
            }
            None if options.require_datetime && incoming.datetime.is_none() => {
                debug!(event = %incoming, "no datetime, cannot be created in destination");
                plan.skipped.push(SkippedEvent {
                    event: incoming.clone(),
                    reason: SkipReason::NoDatetime,
                    matched: None,
                });
            }
            None => {
                if plan.add.iter().any(|queued| queued.equivalent(incoming)) {
                    debug!(event = %incoming, "duplicate add dropped");
                    continue;
                }
                plan.add.push(incoming.clone());
            }
        }
    }

    for (idx, record) in dest_records.iter().enumerate() {
        if matcher.is_consumed(idx) {
            continue;
        }
        let reason = protection_for(&record.event, &fetch_failed).or(
            match options.strategy {
                MatchStrategy::Fuzzy => Some(ProtectionReason::WeakMatch),
                MatchStrategy::Identity => None,
            },
        );
        match reason {
            Some(reason) => plan.protected.push(ProtectedRecord {
                key: record.key.clone(),
                reason,
            }),
            None => plan.delete.push(record.key.clone()),
        }
    }

    plan
}

/// Destination state after `plan` is applied.
///
/// Deleted records are dropped, updated records carry their merged value,
/// added events are appended in plan order.
pub fn project(destination: &Collection, plan: &Plan) -> Vec<Event> {
    let updated: HashMap<&RecordKey, &Event> =
        plan.update.iter().map(|u| (&u.key, &u.merged)).collect();

    destination
        .iter()
        .filter(|record| !plan.delete.contains(&record.key))
        .map(|record| {
            updated
                .get(&record.key)
                .map_or_else(|| record.event.clone(), |merged| (*merged).clone())
        })
        .chain(plan.add.iter().cloned())
        .collect()
}
