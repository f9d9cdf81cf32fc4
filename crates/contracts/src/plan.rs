//! Plan - Reconciliation Planner output
//!
//! The add / update / delete triple for one run, plus the bookkeeping that
//! places every destination record in exactly one partition.

use serde::{Deserialize, Serialize};

use crate::{Event, RecordKey};

/// How source and destination events are paired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Equal non-empty `Event::id`
    #[default]
    Identity,
    /// Equal league, calendar day and opponent
    Fuzzy,
}

/// Why a destination record was kept although nothing matched it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionReason {
    /// No origin metadata: added out-of-band
    NoOrigin,
    /// The origin's upstream fetch failed this run
    FetchFailed { group_id: String },
    /// Fuzzy matching never decides deletion
    WeakMatch,
}

/// Why a source event was left out of the add set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Destination requires a datetime
    NoDatetime,
    /// No id under identity matching: a created copy could never be matched again
    NoIdentity,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::NoDatetime => "destination requires a datetime",
            Self::NoIdentity => "event has no id, identity matching cannot track it",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEvent {
    pub event: Event,
    pub reason: SkipReason,
    /// Matched destination record, kept as it is
    pub matched: Option<RecordKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtectedRecord {
    pub key: RecordKey,
    pub reason: ProtectionReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate {
    pub key: RecordKey,
    /// Destination value before the update
    pub previous: Event,
    /// Merged value to write
    pub merged: Event,
}

/// Reconciliation plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub strategy: MatchStrategy,

    /// Source events to create, in source order
    pub add: Vec<Event>,

    /// Matched records whose merged value differs, in source order
    pub update: Vec<PlannedUpdate>,

    /// Unmatched, unprotected destination records, in destination order
    pub delete: Vec<RecordKey>,

    /// Matched records left as they are: up to date, or the merged value
    /// cannot be written (no datetime for a destination that requires one)
    pub unchanged: Vec<RecordKey>,

    /// Unmatched destination records excluded from deletion
    pub protected: Vec<ProtectedRecord>,

    /// Source events that cannot be created in the destination
    pub skipped: Vec<SkippedEvent>,
}

impl Plan {
    /// No mutation is required
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Updates in the shape `Provider::update_events` expects
    pub fn update_batch(&self) -> Vec<(RecordKey, Event)> {
        self.update
            .iter()
            .map(|u| (u.key.clone(), u.merged.clone()))
            .collect()
    }
}
