//! Provider trait - data store abstraction
//!
//! Every store the engine reads from or writes to (calendar, table, schedule
//! feed, cache file, in-memory stub) implements this trait.

use crate::{Collection, ContractError, Event, Origin, RecordKey};

/// What a provider supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Records carry a stable `Event::id` usable for identity matching
    pub identity: bool,
    /// Events without a datetime cannot be stored
    pub requires_datetime: bool,
    /// Mutations are supported
    pub writable: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            identity: true,
            requires_datetime: false,
            writable: true,
        }
    }
}

/// Data store trait
///
/// All mutating calls respect the `simulate` flag the provider was
/// constructed with: when set, they log the intended effect and succeed
/// without persisting.
#[trait_variant::make(Provider: Send)]
pub trait LocalProvider {
    /// Provider name (used for logging/metrics)
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Verify reachability and credentials
    ///
    /// # Errors
    /// `ContractError::Connection` if the store is unreachable or unauthenticated
    async fn connect(&mut self) -> Result<(), ContractError>;

    /// Fetch the full collection
    ///
    /// Malformed records land in `Collection::rejected`; failed origin groups
    /// are reported through [`LocalProvider::fetch_failed`] afterwards.
    async fn list_events(&mut self) -> Result<Collection, ContractError>;

    async fn add_events(&mut self, events: &[Event]) -> Result<(), ContractError>;

    async fn update_events(&mut self, updates: &[(RecordKey, Event)]) -> Result<(), ContractError>;

    async fn delete_events(&mut self, keys: &[RecordKey]) -> Result<(), ContractError>;

    /// Whether the fetch for this origin failed or was incomplete in the current run
    fn fetch_failed(&self, _origin: &Origin) -> bool {
        false
    }
}
