//! Read-only schedule feed (DBB REST API)
//!
//! One origin group per configured league. A league whose schedule cannot be
//! downloaded, or a game whose details cannot be read, is flagged so the
//! planner keeps the matching destination records.

mod codec;

pub use codec::{league_entries, match_info, InvalidEntry, MatchEntry, MatchInfo, ScheduleCodec};

use std::collections::HashSet;
use std::time::Duration;

use chrono_tz::Tz;
use contracts::{
    ArenaTable, Capabilities, Collection, ContractError, Event, LeagueConfig, Origin, Provider,
    Record, RecordKey, ScheduleConfig,
};
use tracing::{debug, info, instrument, warn};

use crate::error::HttpError;
use crate::http;

pub const SCHEDULE_PROVIDER: &str = "schedule";

pub struct ScheduleProvider {
    config: ScheduleConfig,
    codec: ScheduleCodec,
    timeout: Duration,
    client: Option<reqwest::Client>,
    failed_leagues: HashSet<String>,
    failed_matches: HashSet<String>,
}

impl ScheduleProvider {
    pub fn new(config: ScheduleConfig, zone: Tz, arenas: ArenaTable, timeout: Duration) -> Self {
        Self {
            config,
            codec: ScheduleCodec::new(zone, arenas),
            timeout,
            client: None,
            failed_leagues: HashSet::new(),
            failed_matches: HashSet::new(),
        }
    }

    async fn get_text(&self, segments: &[&str]) -> Result<String, HttpError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| HttpError::Credentials("not connected".into()))?;
        let url = http::endpoint(&self.config.base_url, segments)?;
        let response = http::check(client.get(url).send().await?).await?;
        Ok(response.text().await?)
    }

    /// Download one league and the details of every home game of the tracked team
    #[instrument(name = "schedule_league", skip(self, league, collection), fields(league = %league.name))]
    async fn fetch_league(&mut self, league: &LeagueConfig, collection: &mut Collection) {
        let body = match self
            .get_text(&["competition", "spielplan", "id", &league.league_id])
            .await
        {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    league_id = %league.league_id,
                    timeout = e.is_timeout(),
                    error = %e,
                    "Cannot download league schedule"
                );
                self.failed_leagues.insert(league.league_id.clone());
                return;
            }
        };

        let entries = match league_entries(&body) {
            Ok(entries) => entries,
            Err(reason) => {
                warn!(league_id = %league.league_id, %reason, "Cannot read league schedule");
                self.failed_leagues.insert(league.league_id.clone());
                return;
            }
        };

        let mut home_games = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry)
                    if entry.is_home_game_of(league.team_permanent_id, league.team_season_id) =>
                {
                    home_games.push(entry.match_id)
                }
                Ok(_) => {}
                Err(invalid) => {
                    let reference = format!(
                        "league {} game {}",
                        league.league_id,
                        invalid.match_id.as_deref().unwrap_or("?")
                    );
                    if let Some(match_id) = invalid.match_id {
                        self.failed_matches.insert(match_id);
                    }
                    collection.reject(reference, invalid.reason);
                }
            }
        }
        debug!(games = home_games.len(), "Home games found");

        for match_id in home_games {
            let info = match self.get_text(&["match", "id", &match_id, "matchInfo"]).await {
                Ok(body) => match_info(&body),
                Err(e) if e.is_timeout() => Err(format!("timed out: {e}")),
                Err(e) => Err(e.to_string()),
            };
            let info = match info {
                Ok(info) => info,
                Err(reason) => {
                    warn!(%match_id, %reason, "Cannot read game details");
                    self.failed_matches.insert(match_id);
                    continue;
                }
            };

            let Some(event) = self.codec.to_event(&info, &league.name, &league.league_id) else {
                debug!(%match_id, "Game cancelled, omitted");
                continue;
            };
            collection.push(Record::new(format!("{}/{match_id}", league.league_id), event));
        }
    }

    fn read_only(&self, operation: &str) -> ContractError {
        ContractError::mutation(SCHEDULE_PROVIDER, operation, None, "read-only provider")
    }
}

impl Provider for ScheduleProvider {
    fn name(&self) -> &str {
        SCHEDULE_PROVIDER
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            identity: true,
            requires_datetime: false,
            writable: false,
        }
    }

    #[instrument(name = "schedule_connect", skip(self))]
    async fn connect(&mut self) -> Result<(), ContractError> {
        if self.config.leagues.is_empty() {
            return Err(ContractError::connection(
                SCHEDULE_PROVIDER,
                "no leagues configured",
            ));
        }
        http::endpoint(&self.config.base_url, &[])
            .map_err(|e| ContractError::connection(SCHEDULE_PROVIDER, e.to_string()))?;
        self.client = Some(http::client(SCHEDULE_PROVIDER, self.timeout)?);
        info!(leagues = self.config.leagues.len(), base_url = %self.config.base_url, "Schedule feed ready");
        Ok(())
    }

    #[instrument(name = "schedule_list", skip(self))]
    async fn list_events(&mut self) -> Result<Collection, ContractError> {
        self.failed_leagues.clear();
        self.failed_matches.clear();

        let mut collection = Collection::new(SCHEDULE_PROVIDER);
        let leagues = self.config.leagues.clone();
        for league in &leagues {
            self.fetch_league(league, &mut collection).await;
        }

        info!(
            events = collection.len(),
            leagues = leagues.len(),
            failed_leagues = self.failed_leagues.len(),
            failed_games = self.failed_matches.len(),
            "Schedule downloaded"
        );
        Ok(collection)
    }

    async fn add_events(&mut self, _events: &[Event]) -> Result<(), ContractError> {
        Err(self.read_only("add"))
    }

    async fn update_events(&mut self, _updates: &[(RecordKey, Event)]) -> Result<(), ContractError> {
        Err(self.read_only("update"))
    }

    async fn delete_events(&mut self, _keys: &[RecordKey]) -> Result<(), ContractError> {
        Err(self.read_only("delete"))
    }

    fn fetch_failed(&self, origin: &Origin) -> bool {
        self.failed_leagues.contains(&origin.group_id)
            || origin
                .record_id
                .as_ref()
                .is_some_and(|id| self.failed_matches.contains(id))
    }
}
