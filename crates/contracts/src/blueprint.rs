//! SyncBlueprint - Config Loader output
//!
//! Describes the complete run configuration: reference timezone, store
//! locations, schedule leagues, lookup tables and credentials. Built once at
//! startup and passed by reference into every constructor.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::{ArenaTable, ContactBook};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Settings shared by every provider
    pub common: CommonConfig,

    /// Matching strategy selection
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Calendar store (optional)
    #[serde(default)]
    pub calendar: Option<CalendarConfig>,

    /// Table store (optional)
    #[serde(default)]
    pub table: Option<TableConfig>,

    /// Schedule feed (optional)
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,

    /// Cache mirror (optional)
    #[serde(default)]
    pub cache: Option<CacheConfig>,

    /// Person name -> e-mail address
    #[serde(default)]
    pub contacts: BTreeMap<String, String>,

    /// Google API credentials
    #[serde(default)]
    pub google: GoogleCredentials,
}

/// Shared settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonConfig {
    /// Reference timezone (IANA name, e.g. "Europe/Berlin")
    pub timezone: Tz,

    /// Log mutations instead of persisting them
    #[serde(default)]
    pub simulate: bool,

    /// Per-request network timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Append logs to this file in addition to stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_request_timeout() -> u64 {
    10
}

/// Matching settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Allow fuzzy matching when a provider pair has no identity support
    #[serde(default)]
    pub fuzzy_fallback: bool,
}

/// Calendar store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Calendar id
    pub id: String,

    /// Length of a created event (minutes)
    #[serde(default = "default_event_duration")]
    pub event_duration_minutes: i64,

    /// Popup reminder lead time (minutes)
    #[serde(default = "default_reminder")]
    pub reminder_minutes: u32,

    /// Prepended to the league in the event summary
    #[serde(default = "default_summary_prefix")]
    pub summary_prefix: String,

    #[serde(default = "default_calendar_api")]
    pub api_base: String,
}

fn default_event_duration() -> i64 {
    120
}

fn default_reminder() -> u32 {
    360
}

fn default_summary_prefix() -> String {
    "Scouting ".to_string()
}

fn default_calendar_api() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

/// Table store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Spreadsheet id
    pub spreadsheet_id: String,

    /// Sheet (tab) name used in A1 ranges
    pub sheet_name: String,

    /// Numeric sheet id used by structural batch updates
    #[serde(default)]
    pub sheet_id: i64,

    /// 1-based row holding the column captions
    #[serde(default = "default_header_row")]
    pub header_row: u32,

    #[serde(default = "default_sheets_api")]
    pub api_base: String,
}

fn default_header_row() -> u32 {
    1
}

fn default_sheets_api() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

/// Schedule feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_url")]
    pub base_url: String,

    /// Leagues to download, one origin group each
    #[serde(default)]
    pub leagues: Vec<LeagueConfig>,

    /// Venue id -> display name
    #[serde(default)]
    pub arenas: BTreeMap<String, String>,
}

fn default_schedule_url() -> String {
    "https://www.basketball-bund.net/rest".to_string()
}

/// One tracked league / team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueConfig {
    /// Display name, becomes `Event::league`
    pub name: String,

    /// Upstream league id, becomes the origin group
    pub league_id: String,

    /// Team id stable across seasons
    #[serde(default)]
    pub team_permanent_id: Option<u64>,

    /// Team id for the current season
    #[serde(default)]
    pub team_season_id: Option<u64>,
}

/// Cache mirror settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// JSON file path
    pub path: PathBuf,

    /// Mirror the merged result after each run
    #[serde(default = "default_true")]
    pub mirror: bool,
}

fn default_true() -> bool {
    true
}

/// Credentials for the Google APIs
///
/// A configured service account takes precedence over the OAuth user
/// credentials (refresh token, then static access token).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<ServiceAccountKey>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl GoogleCredentials {
    /// A refresh-token grant can be attempted
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Short description of the mode `connect` will use
    pub fn mode(&self) -> &'static str {
        if self.service_account.is_some() {
            "service account"
        } else if self.can_refresh() {
            "refresh token"
        } else if self.access_token.is_some() {
            "access token"
        } else {
            "none"
        }
    }
}

/// Service account key, as in the JSON key file Google issues.
///
/// Unknown fields of the key file (`type`, `project_id`, ...) are ignored.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,

    /// PEM encoded RSA private key
    pub private_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_id: Option<String>,

    /// Token endpoint from the key file; falls back to `google.token_uri`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl SyncBlueprint {
    pub fn zone(&self) -> Tz {
        self.common.timezone
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.common.request_timeout_secs)
    }

    pub fn contact_book(&self) -> ContactBook {
        ContactBook::new(&self.contacts)
    }

    pub fn arena_table(&self) -> ArenaTable {
        self.schedule
            .as_ref()
            .map(|s| ArenaTable::new(&s.arenas))
            .unwrap_or_default()
    }
}
