//! Immutable lookup tables injected into the event codecs

use std::collections::{BTreeMap, HashMap};

/// Person name <-> e-mail address
#[derive(Debug, Clone, Default)]
pub struct ContactBook {
    emails: HashMap<String, String>,
    names: HashMap<String, String>,
}

impl ContactBook {
    pub fn new(contacts: &BTreeMap<String, String>) -> Self {
        let emails: HashMap<String, String> = contacts
            .iter()
            .map(|(name, email)| (name.clone(), email.clone()))
            .collect();
        let names = contacts
            .iter()
            .map(|(name, email)| (email.to_lowercase(), name.clone()))
            .collect();
        Self { emails, names }
    }

    pub fn email_for(&self, name: &str) -> Option<&str> {
        self.emails.get(name).map(String::as_str)
    }

    /// E-mail lookup is case-insensitive
    pub fn name_for(&self, email: &str) -> Option<&str> {
        self.names.get(&email.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

/// Venue id -> display name
#[derive(Debug, Clone, Default)]
pub struct ArenaTable(HashMap<String, String>);

impl ArenaTable {
    pub fn new(arenas: &BTreeMap<String, String>) -> Self {
        Self(arenas.clone().into_iter().collect())
    }

    pub fn display_name(&self, code: &str) -> Option<&str> {
        self.0.get(code).map(String::as_str)
    }
}
