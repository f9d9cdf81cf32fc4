//! RunReport - Orchestrator output
//!
//! Counts and timing of one reconciliation run.

use serde::Serialize;
use std::time::Duration;

use crate::MatchStrategy;

/// Outcome of a completed run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Source provider name
    pub source: String,

    /// Destination provider name
    pub destination: String,

    /// Strategy used to pair events
    pub strategy: MatchStrategy,

    /// Events created in the destination
    pub added: usize,

    /// Destination records rewritten
    pub updated: usize,

    /// Destination records removed
    pub deleted: usize,

    /// Matched records already up to date
    pub unchanged: usize,

    /// Source events that could not be planned (e.g. no date)
    pub skipped: usize,

    /// Destination records kept despite having no source match
    pub protected: usize,

    /// Records dropped during fetch validation (both sides)
    pub rejected: usize,

    /// Mutations were computed but not sent
    pub simulated: bool,

    /// Wall time of the run
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl RunReport {
    /// Total mutations planned
    pub fn changes(&self) -> usize {
        self.added + self.updated + self.deleted
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
