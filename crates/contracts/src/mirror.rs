//! Mirror trait - read-only display snapshot output
//!
//! Defines the abstract interface for the cache mirror written after a run.

use crate::{ContractError, Event};

/// Snapshot output trait
///
/// Mirrors receive the complete merged event set; they never feed back
/// into planning.
#[trait_variant::make(Mirror: Send)]
pub trait LocalMirror {
    /// Mirror name (used for logging)
    fn name(&self) -> &str;

    /// Replace the mirrored snapshot
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write_snapshot(&mut self, events: &[Event]) -> Result<(), ContractError>;
}

/// Mirror that discards every snapshot
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMirror;

impl Mirror for NoMirror {
    fn name(&self) -> &str {
        "none"
    }

    async fn write_snapshot(&mut self, _events: &[Event]) -> Result<(), ContractError> {
        Ok(())
    }
}
