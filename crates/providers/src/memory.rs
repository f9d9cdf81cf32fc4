//! In-memory provider
//!
//! Backs tests and dry runs. Every call is appended to a shared journal so a
//! caller can assert on call order after handing the provider away.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{
    Capabilities, Collection, ContractError, Event, Origin, Provider, Record, RecordKey,
    RejectedRecord,
};
use tracing::info;

/// Provider operation, as recorded in the journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    List,
    Add,
    Update,
    Delete,
}

/// One journaled call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect,
    List,
    Add(Vec<Event>),
    Update(Vec<(RecordKey, Event)>),
    Delete(Vec<RecordKey>),
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Connect => Operation::Connect,
            Self::List => Operation::List,
            Self::Add(_) => Operation::Add,
            Self::Update(_) => Operation::Update,
            Self::Delete(_) => Operation::Delete,
        }
    }
}

/// Cloneable view of a provider's journal
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    fn lock(&self) -> MutexGuard<'_, Vec<Call>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, call: Call) {
        self.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.lock().iter().map(Call::operation).collect()
    }

    /// Add, update and delete calls only
    pub fn mutations(&self) -> Vec<Call> {
        self.lock()
            .iter()
            .filter(|call| matches!(call, Call::Add(_) | Call::Update(_) | Call::Delete(_)))
            .cloned()
            .collect()
    }
}

pub struct MemoryProvider {
    name: String,
    capabilities: Capabilities,
    simulate: bool,
    records: Vec<Record>,
    rejected: Vec<RejectedRecord>,
    failed_groups: HashSet<String>,
    fail_on: HashSet<Operation>,
    next_key: usize,
    journal: Journal,
}

impl MemoryProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Capabilities::default(),
            simulate: false,
            records: Vec::new(),
            rejected: Vec::new(),
            failed_groups: HashSet::new(),
            fail_on: HashSet::new(),
            next_key: 0,
            journal: Journal::default(),
        }
    }

    /// Seed with events under generated keys
    pub fn with_events(mut self, events: impl IntoIterator<Item = Event>) -> Self {
        for event in events {
            let key = self.generate_key();
            self.records.push(Record::new(key, event));
        }
        self
    }

    /// Seed with a record under a fixed key
    pub fn with_record(mut self, key: impl Into<RecordKey>, event: Event) -> Self {
        self.records.push(Record::new(key, event));
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn simulated(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    /// Report a rejected record on every listing
    pub fn with_rejected(mut self, reference: &str, reason: &str) -> Self {
        self.rejected
            .push(RejectedRecord::new(self.name.clone(), reference, reason));
        self
    }

    /// Report this origin group as failed
    pub fn with_failed_group(mut self, group_id: impl Into<String>) -> Self {
        self.failed_groups.insert(group_id.into());
        self
    }

    /// Make `operation` fail with the matching error kind
    pub fn fail_on(mut self, operation: Operation) -> Self {
        self.fail_on.insert(operation);
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn events(&self) -> Vec<Event> {
        self.records.iter().map(|r| r.event.clone()).collect()
    }

    fn generate_key(&mut self) -> RecordKey {
        let key = RecordKey::new(format!("{}-{}", self.name, self.next_key));
        self.next_key += 1;
        key
    }

    fn check(&self, operation: Operation, key: Option<&RecordKey>) -> Result<(), ContractError> {
        if !self.fail_on.contains(&operation) {
            return Ok(());
        }
        let message = "injected failure";
        Err(match operation {
            Operation::Connect => ContractError::connection(&self.name, message),
            Operation::List => ContractError::fetch(&self.name, "*", message),
            Operation::Add => ContractError::mutation(&self.name, "add", None, message),
            Operation::Update => {
                ContractError::mutation(&self.name, "update", key.map(ToString::to_string), message)
            }
            Operation::Delete => {
                ContractError::mutation(&self.name, "delete", key.map(ToString::to_string), message)
            }
        })
    }

    fn position(&self, key: &RecordKey, operation: &str) -> Result<usize, ContractError> {
        self.records
            .iter()
            .position(|record| &record.key == key)
            .ok_or_else(|| {
                ContractError::mutation(
                    &self.name,
                    operation,
                    Some(key.to_string()),
                    "no such record",
                )
            })
    }
}

impl Provider for MemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn connect(&mut self) -> Result<(), ContractError> {
        self.journal.push(Call::Connect);
        self.check(Operation::Connect, None)
    }

    async fn list_events(&mut self) -> Result<Collection, ContractError> {
        self.journal.push(Call::List);
        self.check(Operation::List, None)?;

        let mut collection = Collection::from_records(self.name.clone(), self.records.clone());
        for rejected in &self.rejected {
            collection.reject(rejected.reference.clone(), rejected.reason.clone());
        }
        Ok(collection)
    }

    async fn add_events(&mut self, events: &[Event]) -> Result<(), ContractError> {
        self.journal.push(Call::Add(events.to_vec()));
        self.check(Operation::Add, None)?;
        if self.simulate {
            info!(provider = %self.name, count = events.len(), simulated = true, "Added events");
            return Ok(());
        }
        for event in events {
            let key = self.generate_key();
            self.records.push(Record::new(key, event.clone()));
        }
        Ok(())
    }

    async fn update_events(&mut self, updates: &[(RecordKey, Event)]) -> Result<(), ContractError> {
        self.journal.push(Call::Update(updates.to_vec()));
        self.check(Operation::Update, updates.first().map(|(key, _)| key))?;
        let positions = updates
            .iter()
            .map(|(key, _)| self.position(key, "update"))
            .collect::<Result<Vec<_>, _>>()?;
        if self.simulate {
            info!(provider = %self.name, count = updates.len(), simulated = true, "Updated events");
            return Ok(());
        }
        for (idx, (_, event)) in positions.into_iter().zip(updates) {
            self.records[idx].event = event.clone();
        }
        Ok(())
    }

    async fn delete_events(&mut self, keys: &[RecordKey]) -> Result<(), ContractError> {
        self.journal.push(Call::Delete(keys.to_vec()));
        self.check(Operation::Delete, keys.first())?;
        for key in keys {
            self.position(key, "delete")?;
        }
        if self.simulate {
            info!(provider = %self.name, count = keys.len(), simulated = true, "Deleted events");
            return Ok(());
        }
        self.records.retain(|record| !keys.contains(&record.key));
        Ok(())
    }

    fn fetch_failed(&self, origin: &Origin) -> bool {
        self.failed_groups.contains(&origin.group_id)
    }
}
