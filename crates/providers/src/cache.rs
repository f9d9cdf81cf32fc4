//! Cache provider - JSON snapshot file
//!
//! The file holds a JSON array of events. It serves both as a read/write
//! store and as the display mirror written after every run.
//!
//! `RecordKey` is the entry's position in the array (`slot-<n>`). Deleted
//! entries are tombstoned until the next write so positions stay stable
//! within a run. Entries that fail to decode are kept verbatim on rewrite.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use contracts::{
    Capabilities, Collection, ContractError, Event, Mirror, Provider, Record, RecordKey,
};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

pub const CACHE_PROVIDER: &str = "cache";

#[derive(Debug, Clone)]
enum Entry {
    Event(Event),
    /// Undecodable entry, written back unchanged
    Raw(Value),
    Removed,
}

pub struct CacheProvider {
    path: PathBuf,
    simulate: bool,
    entries: Option<Vec<Entry>>,
}

fn slot_key(idx: usize) -> RecordKey {
    RecordKey::new(format!("slot-{idx}"))
}

fn slot_index(key: &RecordKey) -> Option<usize> {
    key.as_str().strip_prefix("slot-")?.parse().ok()
}

impl CacheProvider {
    pub fn new(path: impl Into<PathBuf>, simulate: bool) -> Self {
        Self {
            path: path.into(),
            simulate,
            entries: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Vec<Entry>, ContractError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Cache file missing, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.fetch_error(e)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<Value> = serde_json::from_str(&content).map_err(|e| self.fetch_error(e))?;
        Ok(values
            .into_iter()
            .map(|value| match serde_json::from_value::<Event>(value.clone()) {
                Ok(event) => Entry::Event(event),
                Err(_) => Entry::Raw(value),
            })
            .collect())
    }

    fn fetch_error(&self, e: impl std::fmt::Display) -> ContractError {
        ContractError::fetch(CACHE_PROVIDER, self.path.display().to_string(), e.to_string())
    }

    fn loaded(&mut self) -> Result<&mut Vec<Entry>, ContractError> {
        let entries = match self.entries.take() {
            Some(entries) => entries,
            None => self.read_entries()?,
        };
        Ok(self.entries.insert(entries))
    }

    /// Replace the file atomically: write a sibling temp file, then rename
    fn write_file(&self, values: &[Value]) -> std::io::Result<()> {
        let parent = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let mut file = NamedTempFile::new_in(&parent)?;
        serde_json::to_writer_pretty(&mut file, values).map_err(std::io::Error::other)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn persist(&mut self, operation: &str) -> Result<(), ContractError> {
        if self.simulate {
            return Ok(());
        }
        let values = self
            .entries
            .iter()
            .flatten()
            .filter_map(|entry| match entry {
                Entry::Event(event) => serde_json::to_value(event).ok(),
                Entry::Raw(value) => Some(value.clone()),
                Entry::Removed => None,
            })
            .collect::<Vec<_>>();
        self.write_file(&values).map_err(|e| {
            ContractError::mutation(CACHE_PROVIDER, operation, None, e.to_string())
        })
    }

    fn unknown_key(operation: &str, key: &RecordKey) -> ContractError {
        ContractError::mutation(
            CACHE_PROVIDER,
            operation,
            Some(key.to_string()),
            "no such cache entry",
        )
    }
}

impl Provider for CacheProvider {
    fn name(&self) -> &str {
        CACHE_PROVIDER
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn connect(&mut self) -> Result<(), ContractError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(ContractError::connection(
                    CACHE_PROVIDER,
                    format!("directory {} does not exist", parent.display()),
                ));
            }
        }
        Ok(())
    }

    #[instrument(name = "cache_list", skip(self), fields(path = %self.path.display()))]
    async fn list_events(&mut self) -> Result<Collection, ContractError> {
        let entries = self.read_entries()?;
        let mut collection = Collection::new(CACHE_PROVIDER);
        for (idx, entry) in entries.iter().enumerate() {
            match entry {
                Entry::Event(event) => {
                    collection.push(Record::new(slot_key(idx), event.clone()));
                }
                Entry::Raw(_) => collection.reject(slot_key(idx).as_str(), "not a valid event"),
                Entry::Removed => {}
            }
        }
        self.entries = Some(entries);
        info!(events = collection.len(), "Cache listed");
        Ok(collection)
    }

    async fn add_events(&mut self, events: &[Event]) -> Result<(), ContractError> {
        let simulate = self.simulate;
        let entries = self.loaded()?;
        for event in events {
            info!(operation = "add", simulated = simulate, event = %event, "Added event to cache");
            entries.push(Entry::Event(event.clone()));
        }
        self.persist("add")
    }

    async fn update_events(&mut self, updates: &[(RecordKey, Event)]) -> Result<(), ContractError> {
        let simulate = self.simulate;
        let entries = self.loaded()?;
        for (key, event) in updates {
            let slot = slot_index(key)
                .and_then(|idx| entries.get_mut(idx))
                .filter(|entry| !matches!(entry, Entry::Removed))
                .ok_or_else(|| Self::unknown_key("update", key))?;
            info!(operation = "update", simulated = simulate, key = %key, new = %event, "Updated event in cache");
            *slot = Entry::Event(event.clone());
        }
        self.persist("update")
    }

    async fn delete_events(&mut self, keys: &[RecordKey]) -> Result<(), ContractError> {
        let simulate = self.simulate;
        let entries = self.loaded()?;
        for key in keys {
            let slot = slot_index(key)
                .and_then(|idx| entries.get_mut(idx))
                .filter(|entry| !matches!(entry, Entry::Removed))
                .ok_or_else(|| Self::unknown_key("delete", key))?;
            info!(operation = "delete", simulated = simulate, key = %key, "Deleted event in cache");
            *slot = Entry::Removed;
        }
        self.persist("delete")
    }
}

impl Mirror for CacheProvider {
    fn name(&self) -> &str {
        CACHE_PROVIDER
    }

    /// Always written, also in simulate mode
    #[instrument(name = "cache_snapshot", skip(self, events), fields(path = %self.path.display(), count = events.len()))]
    async fn write_snapshot(&mut self, events: &[Event]) -> Result<(), ContractError> {
        let values = events
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ContractError::Other(format!("cannot encode snapshot: {e}")))?;
        self.write_file(&values)?;
        self.entries = Some(events.iter().cloned().map(Entry::Event).collect());
        info!("Cache snapshot written");
        Ok(())
    }
}
