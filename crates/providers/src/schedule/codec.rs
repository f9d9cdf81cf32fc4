//! DBB schedule payloads and their conversion into events

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use contracts::{ArenaTable, Assignees, Event, Origin};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// Accept numeric or string ids, drop blanks
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LeagueData {
    #[serde(default)]
    matches: Value,
}

/// One entry of a league schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEntry {
    pub match_id: String,
    pub home_permanent_id: Option<u64>,
    pub home_season_id: Option<u64>,
}

/// A schedule entry that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEntry {
    /// Present when the entry at least carried its id
    pub match_id: Option<String>,
    pub reason: &'static str,
}

/// Extract the match list of a league schedule body.
///
/// `data.matches` may be null (no games yet); anything else but a list
/// means the download is unusable.
pub fn league_entries(body: &str) -> Result<Vec<Result<MatchEntry, InvalidEntry>>, String> {
    let envelope: Envelope<LeagueData> =
        serde_json::from_str(body).map_err(|e| format!("undecodable schedule: {e}"))?;
    let data = envelope.data.ok_or("schedule has no data")?;

    let matches = match data.matches {
        Value::Null => return Ok(Vec::new()),
        Value::Array(matches) => matches,
        _ => return Err("schedule matches is not a list".to_string()),
    };
    Ok(matches.iter().map(match_entry).collect())
}

fn match_entry(raw: &Value) -> Result<MatchEntry, InvalidEntry> {
    let match_id = match raw.get("matchId") {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };
    let Some(id) = match_id.clone() else {
        return Err(InvalidEntry {
            match_id: None,
            reason: "missing matchId",
        });
    };

    let Some(home) = raw.get("homeTeam").and_then(Value::as_object) else {
        return Err(InvalidEntry {
            match_id,
            reason: "homeTeam is not an object",
        });
    };
    let home_permanent_id = home.get("teamPermanentId").and_then(Value::as_u64);
    let home_season_id = home.get("seasonTeamId").and_then(Value::as_u64);
    if home_permanent_id.is_none() && home_season_id.is_none() {
        return Err(InvalidEntry {
            match_id,
            reason: "homeTeam has no team id",
        });
    }

    Ok(MatchEntry {
        match_id: id,
        home_permanent_id,
        home_season_id,
    })
}

impl MatchEntry {
    /// Home game of the tracked team
    pub fn is_home_game_of(&self, permanent_id: Option<u64>, season_id: Option<u64>) -> bool {
        let permanent = permanent_id.is_some() && self.home_permanent_id == permanent_id;
        let season = season_id.is_some() && self.home_season_id == season_id;
        permanent || season
    }
}

/// Detailed match information (`/match/id/{id}/matchInfo`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    #[serde(default, deserialize_with = "id_string")]
    pub match_no: Option<String>,
    #[serde(default, deserialize_with = "id_string")]
    pub match_id: Option<String>,
    #[serde(default)]
    pub liga_data: Option<LigaData>,
    #[serde(default)]
    pub kickoff_date: Option<String>,
    #[serde(default)]
    pub kickoff_time: Option<String>,
    #[serde(default)]
    pub abgesagt: Option<bool>,
    #[serde(default)]
    pub verzicht: Option<bool>,
    #[serde(default)]
    pub match_info: Option<MatchDetails>,
    #[serde(default)]
    pub guest_team: Option<TeamInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LigaData {
    #[serde(default, deserialize_with = "id_string")]
    pub liga_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchDetails {
    #[serde(default)]
    pub spielfeld: Option<Venue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Venue {
    #[serde(default, deserialize_with = "id_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub bezeichnung: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamInfo {
    #[serde(default)]
    pub teamname: Option<String>,
}

/// Decode and validate a match info body
pub fn match_info(body: &str) -> Result<MatchInfo, String> {
    let envelope: Envelope<MatchInfo> =
        serde_json::from_str(body).map_err(|e| format!("undecodable match info: {e}"))?;
    let info = envelope.data.ok_or("match info has no data")?;

    let liga_id = info.liga_data.as_ref().and_then(|l| l.liga_id.as_ref());
    let missing = [
        ("matchNo", info.match_no.is_none()),
        ("matchId", info.match_id.is_none()),
        ("ligaData.ligaId", liga_id.is_none()),
        ("abgesagt", info.abgesagt.is_none()),
        ("verzicht", info.verzicht.is_none()),
    ]
    .into_iter()
    .filter_map(|(field, absent)| absent.then_some(field))
    .collect::<Vec<_>>();

    if !missing.is_empty() {
        return Err(format!("match info lacks {}", missing.join(", ")));
    }
    Ok(info)
}

impl MatchInfo {
    pub fn is_cancelled(&self) -> bool {
        self.abgesagt.unwrap_or(false) || self.verzicht.unwrap_or(false)
    }
}

/// Builds events from match info using the injected venue table
#[derive(Debug, Clone)]
pub struct ScheduleCodec {
    zone: Tz,
    arenas: ArenaTable,
}

impl ScheduleCodec {
    pub fn new(zone: Tz, arenas: ArenaTable) -> Self {
        Self { zone, arenas }
    }

    /// `None` for cancelled games
    pub fn to_event(&self, info: &MatchInfo, league_name: &str, league_id: &str) -> Option<Event> {
        if info.is_cancelled() {
            return None;
        }

        Some(Event {
            id: info.match_no.clone(),
            datetime: self.kickoff(info),
            location: self.location(info),
            league: Some(league_name.to_string()),
            opponent: info
                .guest_team
                .as_ref()
                .and_then(|t| t.teamname.clone())
                .filter(|n| !n.trim().is_empty()),
            assignees: Assignees::Unknown,
            origin: Some(Origin::new(league_id, info.match_id.clone())),
        })
    }

    fn kickoff(&self, info: &MatchInfo) -> Option<chrono::DateTime<chrono::FixedOffset>> {
        let date = NaiveDate::parse_from_str(info.kickoff_date.as_deref()?, "%Y-%m-%d").ok()?;
        let time = info.kickoff_time.as_deref().and_then(parse_time)?;
        self.zone
            .from_local_datetime(&NaiveDateTime::new(date, time))
            .earliest()
            .map(|dt| dt.fixed_offset())
    }

    fn location(&self, info: &MatchInfo) -> Option<String> {
        let venue = info.match_info.as_ref()?.spielfeld.as_ref()?;
        if let Some(name) = venue.id.as_deref().and_then(|id| self.arenas.display_name(id)) {
            return Some(name.to_string());
        }
        warn!(
            match_id = ?info.match_id,
            arena = ?venue.id,
            "Unknown arena id in schedule"
        );
        venue.bezeichnung.clone().filter(|b| !b.trim().is_empty())
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}
