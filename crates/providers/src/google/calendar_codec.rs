//! Google Calendar event resource <-> Event

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use chrono_tz::Tz;
use contracts::{Assignees, ContactBook, Event, Origin};
use serde::{Deserialize, Serialize};
use tracing::warn;

const MATCH_NO: &str = "matchNo";
const MATCH_ID: &str = "matchId";
const LEAGUE_ID: &str = "leagueId";
const DECLINED: &str = "declined";

/// Subset of the Calendar v3 event resource used by the adapter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_properties: Option<ExtendedProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Reminders>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// All-day events carry a date only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedProperties {
    #[serde(default)]
    pub private: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub use_default: bool,
    #[serde(default)]
    pub overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderOverride {
    pub method: String,
    pub minutes: u32,
}

/// One page of `events.list`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventPage {
    #[serde(default)]
    pub items: Vec<CalendarEvent>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl CalendarEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    pub fn start_instant(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.start.as_ref()?.date_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw).ok()
    }

    /// Attendees are notified only about games that have not started yet
    pub fn notify_attendees(&self, now: DateTime<Utc>) -> bool {
        self.start_instant().is_some_and(|start| start > now)
    }
}

/// Codec configured with the injected contact book and calendar layout
#[derive(Debug, Clone)]
pub struct CalendarCodec {
    contacts: ContactBook,
    zone: Tz,
    summary_prefix: String,
    duration: Duration,
    reminder_minutes: u32,
}

impl CalendarCodec {
    pub fn new(
        contacts: ContactBook,
        zone: Tz,
        summary_prefix: impl Into<String>,
        duration_minutes: i64,
        reminder_minutes: u32,
    ) -> Self {
        Self {
            contacts,
            zone,
            summary_prefix: summary_prefix.into(),
            duration: Duration::minutes(duration_minutes),
            reminder_minutes,
        }
    }

    pub fn decode(&self, raw: &CalendarEvent) -> Result<Event, String> {
        let datetime = match raw.start.as_ref().and_then(|s| s.date_time.as_deref()) {
            Some(text) => Some(
                DateTime::parse_from_rfc3339(text)
                    .map_err(|e| format!("invalid start dateTime '{text}': {e}"))?
                    .with_timezone(&self.zone)
                    .fixed_offset(),
            ),
            None => None,
        };

        let private = raw
            .extended_properties
            .as_ref()
            .map(|p| &p.private)
            .cloned()
            .unwrap_or_default();
        let non_empty = |key: &str| private.get(key).filter(|v| !v.is_empty()).cloned();

        let league = raw.summary.as_deref().map(|summary| {
            summary
                .strip_prefix(self.summary_prefix.as_str())
                .unwrap_or(summary)
                .trim()
                .to_string()
        });
        let league = league.filter(|l| !l.is_empty());
        if league.is_none() {
            warn!(event_id = ?raw.id, "Calendar event has no league");
        }

        let names = raw
            .attendees
            .iter()
            .filter(|a| a.response_status.as_deref() != Some(DECLINED))
            .filter_map(|a| match self.contacts.name_for(&a.email) {
                Some(name) => Some(name.to_string()),
                None => {
                    warn!(event_id = ?raw.id, email = %a.email, "Unknown attendee e-mail");
                    None
                }
            });

        Ok(Event {
            id: non_empty(MATCH_NO),
            datetime,
            location: raw.location.clone().filter(|l| !l.is_empty()),
            league,
            opponent: raw.description.clone().filter(|d| !d.is_empty()),
            assignees: Assignees::from_names(names),
            origin: non_empty(LEAGUE_ID).map(|group| Origin::new(group, non_empty(MATCH_ID))),
        })
    }

    /// `None` if the event has no datetime (calendar entries need a start)
    pub fn encode(&self, event: &Event) -> Option<CalendarEvent> {
        let start = event.datetime?.with_timezone(&self.zone);
        let end = start + self.duration;
        let time = |dt: DateTime<Tz>| EventTime {
            date_time: Some(dt.fixed_offset().to_rfc3339()),
            date: None,
            time_zone: Some(self.zone.name().to_string()),
        };

        let mut private = BTreeMap::new();
        if let Some(id) = event.identity() {
            private.insert(MATCH_NO.to_string(), id.to_string());
        }
        if let Some(origin) = &event.origin {
            private.insert(LEAGUE_ID.to_string(), origin.group_id.clone());
            if let Some(match_id) = &origin.record_id {
                private.insert(MATCH_ID.to_string(), match_id.clone());
            }
        }

        let attendees = event
            .assignees
            .names()
            .iter()
            .filter_map(|name| match self.contacts.email_for(name) {
                Some(email) => Some(Attendee {
                    email: email.to_string(),
                    display_name: Some(name.clone()),
                    response_status: None,
                }),
                None => {
                    warn!(event = %event, name = %name, "Unknown assignee name");
                    None
                }
            })
            .collect();

        let summary = match &event.league {
            Some(league) => format!("{}{league}", self.summary_prefix),
            None => self.summary_prefix.trim().to_string(),
        };

        Some(CalendarEvent {
            summary: Some(summary),
            description: event.opponent.clone(),
            location: event.location.clone(),
            start: Some(time(start)),
            end: Some(time(end)),
            attendees,
            extended_properties: Some(ExtendedProperties { private }),
            reminders: Some(Reminders {
                use_default: false,
                overrides: vec![ReminderOverride {
                    method: "popup".into(),
                    minutes: self.reminder_minutes,
                }],
            }),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> CalendarCodec {
        let contacts = BTreeMap::from([
            ("Alice".to_string(), "alice@example.org".to_string()),
            ("Bob".to_string(), "bob@example.org".to_string()),
        ]);
        CalendarCodec::new(
            ContactBook::new(&contacts),
            chrono_tz::Europe::Berlin,
            "Scouting ",
            120,
            360,
        )
    }

    fn raw() -> CalendarEvent {
        serde_json::from_str(
            r#"{
                "id": "evt1",
                "status": "confirmed",
                "summary": "Scouting U16",
                "description": "Team B",
                "location": "Halle Nord",
                "start": {"dateTime": "2024-03-01T17:00:00Z"},
                "attendees": [
                    {"email": "ALICE@example.org", "responseStatus": "accepted"},
                    {"email": "bob@example.org", "responseStatus": "declined"},
                    {"email": "stranger@example.org"}
                ],
                "extendedProperties": {"private": {"matchNo": "4711", "leagueId": "555", "matchId": "101"}}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_decode() {
        let event = codec().decode(&raw()).unwrap();
        assert_eq!(event.id.as_deref(), Some("4711"));
        assert_eq!(
            event.datetime.unwrap().to_rfc3339(),
            "2024-03-01T18:00:00+01:00"
        );
        assert_eq!(event.league.as_deref(), Some("U16"));
        assert_eq!(event.opponent.as_deref(), Some("Team B"));
        assert_eq!(event.assignees, Assignees::Set(vec!["Alice".into()]));
        assert_eq!(event.origin, Some(Origin::new("555", Some("101".into()))));
    }

    #[test]
    fn test_decode_without_attendees_is_empty_not_unknown() {
        let mut raw = raw();
        raw.attendees.clear();
        raw.extended_properties = None;
        let event = codec().decode(&raw).unwrap();
        assert_eq!(event.assignees, Assignees::Empty);
        assert!(event.id.is_none());
        assert!(event.origin.is_none());
    }

    #[test]
    fn test_decode_rejects_bad_start() {
        let mut raw = raw();
        raw.start = Some(EventTime {
            date_time: Some("tomorrow".into()),
            ..Default::default()
        });
        assert!(codec().decode(&raw).is_err());
    }

    #[test]
    fn test_encode_layout() {
        let event = codec().decode(&raw()).unwrap();
        let body = codec().encode(&event).unwrap();

        assert_eq!(body.summary.as_deref(), Some("Scouting U16"));
        let start = body.start.as_ref().unwrap();
        assert_eq!(start.date_time.as_deref(), Some("2024-03-01T18:00:00+01:00"));
        assert_eq!(start.time_zone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(
            body.end.as_ref().unwrap().date_time.as_deref(),
            Some("2024-03-01T20:00:00+01:00")
        );
        assert_eq!(body.attendees.len(), 1);
        assert_eq!(body.attendees[0].email, "alice@example.org");
        let private = &body.extended_properties.as_ref().unwrap().private;
        assert_eq!(private.get("matchNo").map(String::as_str), Some("4711"));
        assert_eq!(private.get("leagueId").map(String::as_str), Some("555"));
        assert_eq!(body.reminders.as_ref().unwrap().overrides[0].minutes, 360);

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("extendedProperties").is_some());
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_encode_decode_is_stable() {
        let event = codec().decode(&raw()).unwrap();
        let again = codec().decode(&codec().encode(&event).unwrap()).unwrap();
        assert!(event.equivalent(&again));
    }

    #[test]
    fn test_encode_requires_datetime() {
        let event = Event {
            id: Some("1".into()),
            ..Default::default()
        };
        assert!(codec().encode(&event).is_none());
    }

    #[test]
    fn test_notify_only_future_games() {
        let raw = raw();
        let before = DateTime::parse_from_rfc3339("2024-02-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let after = DateTime::parse_from_rfc3339("2024-04-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(raw.notify_attendees(before));
        assert!(!raw.notify_attendees(after));
    }
}
