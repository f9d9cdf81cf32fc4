//! Event - canonical scouting assignment
//!
//! One scheduled game plus the people assigned to scout it. Providers build
//! fresh `Event` values on every fetch; an update never mutates in place but
//! produces a new value via [`Event::merge`].

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Upper bound of people assigned to one game
pub const MAX_ASSIGNEES: usize = 3;

/// Assigned personnel, tri-state
///
/// `Unknown` means the source does not track assignees at all, which is
/// different from `Empty` (explicitly nobody assigned).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Assignees {
    /// Not fetched / not tracked by this source
    #[default]
    Unknown,
    /// Explicitly nobody assigned
    Empty,
    /// Ordered list of person identifiers (1..=3)
    Set(Vec<String>),
}

impl Assignees {
    /// Build a tracked assignee list.
    ///
    /// Blank names are dropped, the list is capped at [`MAX_ASSIGNEES`],
    /// and an empty result collapses to `Empty`.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .take(MAX_ASSIGNEES)
            .collect();

        if names.is_empty() {
            Self::Empty
        } else {
            Self::Set(names)
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Assigned names; empty for both `Unknown` and `Empty`
    pub fn names(&self) -> &[String] {
        match self {
            Self::Set(names) => names,
            Self::Unknown | Self::Empty => &[],
        }
    }

    /// Order-independent comparison; `Unknown` on either side always matches
    pub fn equivalent(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => true,
            (a, b) => {
                let mut lhs: Vec<&str> = a.names().iter().map(String::as_str).collect();
                let mut rhs: Vec<&str> = b.names().iter().map(String::as_str).collect();
                lhs.sort_unstable();
                rhs.sort_unstable();
                lhs == rhs
            }
        }
    }
}

// Wire form: null = Unknown, [] = Empty, [..] = Set
impl Serialize for Assignees {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unknown => serializer.serialize_none(),
            Self::Empty => Vec::<String>::new().serialize(serializer),
            Self::Set(names) => names.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Assignees {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<Vec<String>>::deserialize(deserializer)? {
            None => Self::Unknown,
            Some(names) => Self::from_names(names),
        })
    }
}

/// Upstream fetch group that produced an event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    /// Fetch group (one league schedule)
    pub group_id: String,

    /// Upstream record inside the group (schedule match id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl Origin {
    pub fn new(group_id: impl Into<String>, record_id: Option<String>) -> Self {
        Self {
            group_id: group_id.into(),
            record_id,
        }
    }
}

/// Key used by fuzzy matching: league, calendar day, opponent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuzzyKey {
    pub league: Option<String>,
    pub date: Option<NaiveDate>,
    pub opponent: Option<String>,
}

/// One scheduled game / assignment
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Event {
    /// Stable identity assigned by the authoritative provider
    #[serde(default)]
    pub id: Option<String>,

    /// Kickoff; `None` means unscheduled
    #[serde(default)]
    pub datetime: Option<DateTime<FixedOffset>>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub league: Option<String>,

    #[serde(default)]
    pub opponent: Option<String>,

    #[serde(default)]
    pub assignees: Assignees,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

impl Event {
    /// Non-empty identity, if any
    pub fn identity(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Convert the datetime into the reference zone (the instant is unchanged)
    pub fn normalized(mut self, zone: Tz) -> Self {
        self.datetime = self
            .datetime
            .map(|dt| dt.with_timezone(&zone).fixed_offset());
        self
    }

    pub fn fuzzy_key(&self) -> FuzzyKey {
        FuzzyKey {
            league: self.league.clone(),
            date: self.datetime.map(|dt| dt.date_naive()),
            opponent: self.opponent.clone(),
        }
    }

    /// Field-level merge of an incoming value over the destination's current value.
    ///
    /// Concrete incoming values win. Assignees are preserved when the incoming
    /// side is `Unknown`; an incoming `Empty` clears them.
    pub fn merge(incoming: &Event, existing: &Event) -> Event {
        Event {
            id: incoming.id.clone().or_else(|| existing.id.clone()),
            datetime: incoming.datetime.or(existing.datetime),
            location: incoming
                .location
                .clone()
                .or_else(|| existing.location.clone()),
            league: incoming.league.clone().or_else(|| existing.league.clone()),
            opponent: incoming
                .opponent
                .clone()
                .or_else(|| existing.opponent.clone()),
            assignees: match &incoming.assignees {
                Assignees::Unknown => existing.assignees.clone(),
                other => other.clone(),
            },
            origin: incoming.origin.clone().or_else(|| existing.origin.clone()),
        }
    }

    /// Content equality used for planning.
    ///
    /// All scalar fields must be equal; assignees compare as a set and are
    /// skipped when either side is `Unknown`. Origin metadata is not content.
    pub fn equivalent(&self, other: &Event) -> bool {
        self.id == other.id
            && self.datetime == other.datetime
            && self.location == other.location
            && self.league == other.league
            && self.opponent == other.opponent
            && self.assignees.equivalent(&other.assignees)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let datetime = self
            .datetime
            .map(|dt| dt.format("%a %Y-%m-%d %H:%M").to_string());
        let fields = [
            self.id.as_deref(),
            datetime.as_deref(),
            self.location.as_deref(),
            self.league.as_deref(),
            self.opponent.as_deref(),
        ];

        let mut parts: Vec<&str> = fields.iter().map(|f| f.unwrap_or("")).collect();
        match &self.assignees {
            Assignees::Unknown => parts.push("?"),
            Assignees::Empty => parts.push("-"),
            Assignees::Set(names) => parts.extend(names.iter().map(String::as_str)),
        }
        write!(f, "{}", parts.join(", "))
    }
}
