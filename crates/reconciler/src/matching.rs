//! Matching engine
//!
//! Pairs source events with destination records, 1:1, under one strategy
//! per run.

use std::collections::HashMap;

use contracts::{Capabilities, ContractError, Event, FuzzyKey, MatchStrategy, Record};

/// Choose the strategy for a provider pair.
///
/// Identity when both sides carry stable ids; fuzzy only when explicitly
/// allowed. The two are never mixed within one run.
pub fn select_strategy(
    source: &Capabilities,
    destination: &Capabilities,
    fuzzy_fallback: bool,
) -> Result<MatchStrategy, ContractError> {
    if source.identity && destination.identity {
        return Ok(MatchStrategy::Identity);
    }
    if fuzzy_fallback {
        return Ok(MatchStrategy::Fuzzy);
    }
    Err(ContractError::config_validation(
        "matching.fuzzy_fallback",
        "provider pair does not support identity matching and fuzzy fallback is disabled",
    ))
}

/// Destination index for one planning pass
#[derive(Debug)]
pub struct Matcher<'a> {
    strategy: MatchStrategy,
    by_id: HashMap<&'a str, usize>,
    by_key: HashMap<FuzzyKey, Vec<usize>>,
    consumed: Vec<bool>,
}

impl<'a> Matcher<'a> {
    pub fn new(strategy: MatchStrategy, destination: &'a [Record]) -> Self {
        let mut by_id = HashMap::new();
        let mut by_key: HashMap<FuzzyKey, Vec<usize>> = HashMap::new();

        for (idx, record) in destination.iter().enumerate() {
            match strategy {
                MatchStrategy::Identity => {
                    if let Some(id) = record.event.identity() {
                        by_id.entry(id).or_insert(idx);
                    }
                }
                MatchStrategy::Fuzzy => {
                    by_key.entry(record.event.fuzzy_key()).or_default().push(idx);
                }
            }
        }

        Self {
            strategy,
            by_id,
            by_key,
            consumed: vec![false; destination.len()],
        }
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Find an unconsumed destination record for `event` and consume it.
    ///
    /// Returns the record's position in the destination slice.
    pub fn claim(&mut self, event: &Event) -> Option<usize> {
        let idx = match self.strategy {
            MatchStrategy::Identity => event
                .identity()
                .and_then(|id| self.by_id.get(id).copied())
                .filter(|&idx| !self.consumed[idx]),
            MatchStrategy::Fuzzy => self
                .by_key
                .get(&event.fuzzy_key())
                .and_then(|candidates| candidates.iter().copied().find(|&i| !self.consumed[i])),
        }?;
        self.consumed[idx] = true;
        Some(idx)
    }

    pub fn is_consumed(&self, idx: usize) -> bool {
        self.consumed.get(idx).copied().unwrap_or(false)
    }
}
