//! Provider construction from a `SyncBlueprint`

use std::fmt;
use std::str::FromStr;

use contracts::{
    Capabilities, Collection, ContractError, Event, Mirror, Origin, Provider, RecordKey,
    SyncBlueprint,
};
use tracing::{debug, instrument};

use crate::cache::{CacheProvider, CACHE_PROVIDER};
use crate::google::{
    CalendarCodec, CalendarProvider, SheetCodec, TableProvider, CALENDAR_PROVIDER, TABLE_PROVIDER,
};
use crate::schedule::{ScheduleProvider, SCHEDULE_PROVIDER};

/// Configurable store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Schedule,
    Cache,
    Calendar,
    Table,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [Self::Schedule, Self::Cache, Self::Calendar, Self::Table];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schedule => SCHEDULE_PROVIDER,
            Self::Cache => CACHE_PROVIDER,
            Self::Calendar => CALENDAR_PROVIDER,
            Self::Table => TABLE_PROVIDER,
        }
    }

    /// Stores a run may write to
    pub fn can_be_destination(&self) -> bool {
        matches!(self, Self::Calendar | Self::Table)
    }

    /// The blueprint carries the section this store needs
    pub fn is_configured(&self, blueprint: &SyncBlueprint) -> bool {
        match self {
            Self::Schedule => blueprint.schedule.is_some(),
            Self::Cache => blueprint.cache.is_some(),
            Self::Calendar => blueprint.calendar.is_some(),
            Self::Table => blueprint.table.is_some(),
        }
    }

    /// Build the provider for this store
    ///
    /// # Errors
    /// `ContractError::ConfigValidation` if the blueprint lacks the store's section
    #[instrument(name = "provider_build", skip(self, blueprint), fields(kind = %self))]
    pub fn build(&self, blueprint: &SyncBlueprint) -> Result<AnyProvider, ContractError> {
        let simulate = blueprint.common.simulate;
        let timeout = blueprint.request_timeout();
        let zone = blueprint.zone();

        let provider = match self {
            Self::Schedule => {
                let config = blueprint.schedule.clone().ok_or_else(|| missing("schedule"))?;
                AnyProvider::Schedule(ScheduleProvider::new(
                    config,
                    zone,
                    blueprint.arena_table(),
                    timeout,
                ))
            }
            Self::Cache => {
                let config = blueprint.cache.as_ref().ok_or_else(|| missing("cache"))?;
                AnyProvider::Cache(CacheProvider::new(&config.path, simulate))
            }
            Self::Calendar => {
                let config = blueprint.calendar.clone().ok_or_else(|| missing("calendar"))?;
                let codec = CalendarCodec::new(
                    blueprint.contact_book(),
                    zone,
                    config.summary_prefix.clone(),
                    config.event_duration_minutes,
                    config.reminder_minutes,
                );
                AnyProvider::Calendar(CalendarProvider::new(
                    config,
                    codec,
                    blueprint.google.clone(),
                    timeout,
                    simulate,
                ))
            }
            Self::Table => {
                let config = blueprint.table.clone().ok_or_else(|| missing("table"))?;
                AnyProvider::Table(TableProvider::new(
                    config,
                    SheetCodec::new(zone),
                    blueprint.google.clone(),
                    timeout,
                    simulate,
                ))
            }
        };
        debug!(simulate, "Provider built");
        Ok(provider)
    }
}

fn missing(section: &str) -> ContractError {
    ContractError::config_validation(section, format!("no [{section}] section configured"))
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(ProviderKind::as_str).collect();
                format!("unknown provider '{s}', expected one of: {}", known.join(", "))
            })
    }
}

/// Any configured provider
pub enum AnyProvider {
    Schedule(ScheduleProvider),
    Cache(CacheProvider),
    Calendar(CalendarProvider),
    Table(TableProvider),
}

macro_rules! delegate {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            AnyProvider::Schedule($inner) => $body,
            AnyProvider::Cache($inner) => $body,
            AnyProvider::Calendar($inner) => $body,
            AnyProvider::Table($inner) => $body,
        }
    };
}

impl Provider for AnyProvider {
    fn name(&self) -> &str {
        delegate!(self, p => Provider::name(p))
    }

    fn capabilities(&self) -> Capabilities {
        delegate!(self, p => p.capabilities())
    }

    async fn connect(&mut self) -> Result<(), ContractError> {
        delegate!(self, p => p.connect().await)
    }

    async fn list_events(&mut self) -> Result<Collection, ContractError> {
        delegate!(self, p => p.list_events().await)
    }

    async fn add_events(&mut self, events: &[Event]) -> Result<(), ContractError> {
        delegate!(self, p => p.add_events(events).await)
    }

    async fn update_events(&mut self, updates: &[(RecordKey, Event)]) -> Result<(), ContractError> {
        delegate!(self, p => p.update_events(updates).await)
    }

    async fn delete_events(&mut self, keys: &[RecordKey]) -> Result<(), ContractError> {
        delegate!(self, p => p.delete_events(keys).await)
    }

    fn fetch_failed(&self, origin: &Origin) -> bool {
        delegate!(self, p => p.fetch_failed(origin))
    }
}

/// Snapshot target chosen from the blueprint
pub enum AnyMirror {
    Disabled,
    Cache(CacheProvider),
}

impl AnyMirror {
    /// The cache mirror, unless it is disabled or already one end of the run
    pub fn from_blueprint(blueprint: &SyncBlueprint, endpoints: &[ProviderKind]) -> Self {
        match &blueprint.cache {
            Some(cache) if cache.mirror && !endpoints.contains(&ProviderKind::Cache) => {
                Self::Cache(CacheProvider::new(&cache.path, blueprint.common.simulate))
            }
            _ => Self::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Cache(_))
    }
}

impl Mirror for AnyMirror {
    fn name(&self) -> &str {
        match self {
            Self::Disabled => "none",
            Self::Cache(cache) => Mirror::name(cache),
        }
    }

    async fn write_snapshot(&mut self, events: &[Event]) -> Result<(), ContractError> {
        match self {
            Self::Disabled => Ok(()),
            Self::Cache(cache) => cache.write_snapshot(events).await,
        }
    }
}
