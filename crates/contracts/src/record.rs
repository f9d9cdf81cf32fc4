//! Record / Collection - provider fetch output
//!
//! A collection pairs every event with its store-native key and keeps the
//! records that failed validation on a side list instead of aborting the fetch.

use std::collections::HashSet;
use std::fmt;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::Event;

/// Store-native record handle (calendar event id, sheet row, cache slot)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One stored event
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: RecordKey,
    pub event: Event,
}

impl Record {
    pub fn new(key: impl Into<RecordKey>, event: Event) -> Self {
        Self {
            key: key.into(),
            event,
        }
    }
}

/// A fetched record that was dropped during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Provider name
    pub provider: String,
    /// Where the record came from (row number, match id, ...)
    pub reference: String,
    /// Why it was dropped
    pub reason: String,
}

impl RejectedRecord {
    pub fn new(
        provider: impl Into<String>,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RejectedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.provider, self.reference, self.reason)
    }
}

/// Provider fetch result
///
/// Event ids are unique within a collection: a second record carrying an
/// already seen id is moved to the rejected list.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    provider: String,
    records: Vec<Record>,
    rejected: Vec<RejectedRecord>,
    seen_ids: HashSet<String>,
}

impl Collection {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }

    pub fn from_records(provider: impl Into<String>, records: Vec<Record>) -> Self {
        let mut collection = Self::new(provider);
        for record in records {
            collection.push(record);
        }
        collection
    }

    /// Add a record; returns `false` if it was rejected as a duplicate id
    pub fn push(&mut self, record: Record) -> bool {
        if let Some(id) = record.event.identity() {
            if !self.seen_ids.insert(id.to_string()) {
                let rejected = RejectedRecord::new(
                    self.provider.clone(),
                    record.key.to_string(),
                    format!("duplicate event id '{id}'"),
                );
                self.rejected.push(rejected);
                return false;
            }
        }
        self.records.push(record);
        true
    }

    pub fn reject(&mut self, reference: impl Into<String>, reason: impl Into<String>) {
        let rejected = RejectedRecord::new(self.provider.clone(), reference, reason);
        self.rejected.push(rejected);
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn rejected(&self) -> &[RejectedRecord] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.records.iter().map(|r| &r.event)
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Move every datetime into the reference zone
    pub fn normalize(&mut self, zone: Tz) {
        for record in &mut self.records {
            let event = std::mem::take(&mut record.event);
            record.event = event.normalized(zone);
        }
    }
}
