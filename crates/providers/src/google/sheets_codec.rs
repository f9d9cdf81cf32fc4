//! Sheet row <-> Event
//!
//! Cells are read unformatted: dates and times may come back as text
//! (written by this tool) or as spreadsheet serial numbers (typed by hand).

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;
use contracts::{Assignees, Event, Origin, MAX_ASSIGNEES};
use serde_json::Value;

/// Column captions, in sheet order
pub const COLUMNS: [&str; 11] = [
    "Id", "Datum", "Zeit", "Halle", "Liga", "Gegner", "Scouter1", "Scouter2", "Scouter3",
    "Liga-ID", "Spiel-ID",
];

const ID: usize = 0;
const DATE: usize = 1;
const TIME: usize = 2;
const LOCATION: usize = 3;
const LEAGUE: usize = 4;
const OPPONENT: usize = 5;
const FIRST_SCOUTER: usize = 6;
const GROUP_ID: usize = 9;
const RECORD_ID: usize = 10;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy)]
pub struct SheetCodec {
    zone: Tz,
}

impl SheetCodec {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    /// Verify the caption row matches [`COLUMNS`]
    pub fn check_header(cells: &[Value]) -> Result<(), String> {
        for (idx, expected) in COLUMNS.iter().enumerate() {
            let found = cell_text(cells.get(idx));
            if found.as_deref() != Some(*expected) {
                return Err(format!(
                    "column {} should be '{expected}', found '{}'",
                    idx + 1,
                    found.unwrap_or_default()
                ));
            }
        }
        Ok(())
    }

    /// `Ok(None)` for a blank row
    pub fn decode_row(&self, cells: &[Value]) -> Result<Option<Event>, String> {
        if (0..COLUMNS.len()).all(|idx| cell_text(cells.get(idx)).is_none()) {
            return Ok(None);
        }

        let datetime = match parse_date(cells.get(DATE))? {
            Some(date) => {
                let time = parse_time(cells.get(TIME))?;
                let local = NaiveDateTime::new(date, time);
                let zoned = self
                    .zone
                    .from_local_datetime(&local)
                    .earliest()
                    .ok_or_else(|| format!("{local} does not exist in {}", self.zone))?;
                Some(zoned.fixed_offset())
            }
            None => None,
        };

        let scouters = (FIRST_SCOUTER..FIRST_SCOUTER + MAX_ASSIGNEES)
            .filter_map(|idx| cell_text(cells.get(idx)));

        Ok(Some(Event {
            id: cell_text(cells.get(ID)),
            datetime,
            location: cell_text(cells.get(LOCATION)),
            league: cell_text(cells.get(LEAGUE)),
            opponent: cell_text(cells.get(OPPONENT)),
            assignees: Assignees::from_names(scouters),
            origin: cell_text(cells.get(GROUP_ID))
                .map(|group| Origin::new(group, cell_text(cells.get(RECORD_ID)))),
        }))
    }

    /// Cell texts in [`COLUMNS`] order
    pub fn encode_row(&self, event: &Event) -> Vec<String> {
        let local = event.datetime.map(|dt| dt.with_timezone(&self.zone));
        let date = local.map(|dt| dt.format("%Y-%m-%d").to_string());
        let time = local
            .filter(|dt| dt.time() != NaiveTime::MIN)
            .map(|dt| dt.format("%H:%M").to_string());

        let names = event.assignees.names();
        let scouter = |idx: usize| names.get(idx).cloned().unwrap_or_default();
        let origin = event.origin.as_ref();

        vec![
            event.id.clone().unwrap_or_default(),
            date.unwrap_or_default(),
            time.unwrap_or_default(),
            event.location.clone().unwrap_or_default(),
            event.league.clone().unwrap_or_default(),
            event.opponent.clone().unwrap_or_default(),
            scouter(0),
            scouter(1),
            scouter(2),
            origin.map(|o| o.group_id.clone()).unwrap_or_default(),
            origin.and_then(|o| o.record_id.clone()).unwrap_or_default(),
        ]
    }
}

fn cell_text(cell: Option<&Value>) -> Option<String> {
    let text = match cell? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

fn parse_date(cell: Option<&Value>) -> Result<Option<NaiveDate>, String> {
    match cell {
        Some(Value::Number(n)) => {
            let serial = n.as_f64().ok_or_else(|| format!("invalid date '{n}'"))?;
            if serial < 0.0 {
                return Err(format!("invalid date serial {serial}"));
            }
            serial_epoch()
                .checked_add_days(Days::new(serial.floor() as u64))
                .map(Some)
                .ok_or_else(|| format!("invalid date serial {serial}"))
        }
        other => match cell_text(other) {
            None => Ok(None),
            Some(text) => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(&text, "%d.%m.%Y"))
                .map(Some)
                .map_err(|_| format!("invalid date '{text}'")),
        },
    }
}

fn parse_time(cell: Option<&Value>) -> Result<NaiveTime, String> {
    match cell {
        Some(Value::Number(n)) => {
            let fraction = n.as_f64().ok_or_else(|| format!("invalid time '{n}'"))?.fract();
            let seconds = (fraction * SECONDS_PER_DAY).round() as u32 % 86_400;
            let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
                .ok_or_else(|| format!("invalid time '{n}'"))?;
            // minute resolution
            Ok(time.with_second(0).unwrap_or(time))
        }
        other => match cell_text(other) {
            None => Ok(NaiveTime::MIN),
            Some(text) => NaiveTime::parse_from_str(&text, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(&text, "%H:%M:%S"))
                .map_err(|_| format!("invalid time '{text}'")),
        },
    }
}
