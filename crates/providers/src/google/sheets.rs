//! Table provider (Google Sheets v4)
//!
//! One event per row below the caption row, kept in chronological order.
//! `RecordKey` is the 1-based row number seen at listing time; the provider
//! tracks how later inserts and deletes shift each listed row.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use contracts::{
    Capabilities, Collection, ContractError, Event, GoogleCredentials, Provider, Record,
    RecordKey, TableConfig,
};
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::sheets_codec::{SheetCodec, COLUMNS};
use super::GoogleApi;
use crate::error::HttpError;
use crate::http;

pub const TABLE_PROVIDER: &str = "table";

const LAST_COLUMN: char = 'K';

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Listed row and where it currently sits
#[derive(Debug, Clone)]
struct Slot {
    /// 0-based sheet row index
    row: usize,
    event: Event,
}

type Rank = (bool, Option<DateTime<FixedOffset>>);

/// Undated rows sort after every dated one
fn rank(datetime: Option<DateTime<FixedOffset>>) -> Rank {
    (datetime.is_none(), datetime)
}

pub struct TableProvider {
    config: TableConfig,
    codec: SheetCodec,
    api: GoogleApi,
    simulate: bool,
    slots: HashMap<RecordKey, Slot>,
    /// First row index after the data block
    end_row: usize,
}

impl TableProvider {
    pub fn new(
        config: TableConfig,
        codec: SheetCodec,
        credentials: GoogleCredentials,
        timeout: Duration,
        simulate: bool,
    ) -> Self {
        let end_row = config.header_row as usize;
        Self {
            config,
            codec,
            api: GoogleApi::new(TABLE_PROVIDER, credentials, timeout),
            simulate,
            slots: HashMap::new(),
            end_row,
        }
    }

    fn url(&self, tail: &[&str]) -> Result<Url, HttpError> {
        let mut segments = vec!["spreadsheets", self.config.spreadsheet_id.as_str()];
        segments.extend_from_slice(tail);
        http::endpoint(&self.config.api_base, &segments)
    }

    fn batch_url(&self) -> Result<Url, HttpError> {
        let target = format!("{}:batchUpdate", self.config.spreadsheet_id);
        http::endpoint(&self.config.api_base, &["spreadsheets", target.as_str()])
    }

    /// First data row index (0-based)
    fn first_row(&self) -> usize {
        self.config.header_row as usize
    }

    async fn read_range(&self, range: &str) -> Result<ValueRange, HttpError> {
        let request = self
            .api
            .request(Method::GET, self.url(&["values", range])?)?
            .query(&[("valueRenderOption", "UNFORMATTED_VALUE")]);
        http::read_json(request.send().await?).await
    }

    async fn batch_update(&self, requests: Vec<Value>) -> Result<(), HttpError> {
        if requests.is_empty() {
            return Ok(());
        }
        let request = self
            .api
            .request(Method::POST, self.batch_url()?)?
            .json(&json!({ "requests": requests }));
        http::check(request.send().await?).await?;
        Ok(())
    }

    async fn resolve_sheet(&self) -> Result<i64, HttpError> {
        let request = self
            .api
            .request(Method::GET, self.url(&[])?)?
            .query(&[("fields", "sheets.properties")]);
        let spreadsheet: Spreadsheet = http::read_json(request.send().await?).await?;
        spreadsheet
            .sheets
            .into_iter()
            .find(|sheet| sheet.properties.title == self.config.sheet_name)
            .map(|sheet| sheet.properties.sheet_id)
            .ok_or_else(|| HttpError::Decode(format!("no sheet named '{}'", self.config.sheet_name)))
    }

    fn write_cells(&self, row: usize, event: &Event) -> Value {
        let values: Vec<Value> = self
            .codec
            .encode_row(event)
            .into_iter()
            .map(|text| json!({ "userEnteredValue": { "stringValue": text } }))
            .collect();
        json!({
            "updateCells": {
                "start": { "sheetId": self.config.sheet_id, "rowIndex": row, "columnIndex": 0 },
                "rows": [{ "values": values }],
                "fields": "userEnteredValue"
            }
        })
    }

    fn insert_row(&self, row: usize) -> Value {
        json!({
            "insertDimension": {
                "range": {
                    "sheetId": self.config.sheet_id,
                    "dimension": "ROWS",
                    "startIndex": row,
                    "endIndex": row + 1
                },
                "inheritFromBefore": row > self.first_row()
            }
        })
    }

    fn delete_row(&self, row: usize) -> Value {
        json!({
            "deleteDimension": {
                "range": {
                    "sheetId": self.config.sheet_id,
                    "dimension": "ROWS",
                    "startIndex": row,
                    "endIndex": row + 1
                }
            }
        })
    }

    /// Row a new event goes to so the block stays chronological
    fn target_row(&self, datetime: Option<DateTime<FixedOffset>>) -> usize {
        let incoming = rank(datetime);
        self.slots
            .values()
            .filter(|slot| rank(slot.event.datetime) > incoming)
            .map(|slot| slot.row)
            .min()
            .unwrap_or(self.end_row)
    }

    fn slot(&self, key: &RecordKey, operation: &str) -> Result<&Slot, ContractError> {
        self.slots.get(key).ok_or_else(|| {
            ContractError::mutation(
                TABLE_PROVIDER,
                operation,
                Some(key.to_string()),
                "row was not listed in this run",
            )
        })
    }
}

impl Provider for TableProvider {
    fn name(&self) -> &str {
        TABLE_PROVIDER
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            identity: true,
            requires_datetime: false,
            writable: true,
        }
    }

    #[instrument(name = "table_connect", skip(self), fields(spreadsheet = %self.config.spreadsheet_id))]
    async fn connect(&mut self) -> Result<(), ContractError> {
        self.api.authorize().await?;
        let failed = |e: HttpError| ContractError::connection(TABLE_PROVIDER, e.to_string());

        self.config.sheet_id = self.resolve_sheet().await.map_err(failed)?;

        let header = self.config.header_row;
        let range = format!("{}!A{header}:{LAST_COLUMN}{header}", self.config.sheet_name);
        let captions = self.read_range(&range).await.map_err(failed)?;
        let first = captions.values.first().map(Vec::as_slice).unwrap_or_default();
        SheetCodec::check_header(first).map_err(|reason| {
            ContractError::connection(TABLE_PROVIDER, format!("unexpected table layout: {reason}"))
        })?;

        info!(
            sheet = %self.config.sheet_name,
            sheet_id = self.config.sheet_id,
            columns = COLUMNS.len(),
            simulate = self.simulate,
            "Connected to table"
        );
        Ok(())
    }

    #[instrument(name = "table_list", skip(self))]
    async fn list_events(&mut self) -> Result<Collection, ContractError> {
        let range = format!(
            "{}!A{}:{LAST_COLUMN}",
            self.config.sheet_name,
            self.config.header_row + 1
        );
        let data = self.read_range(&range).await.map_err(|e| {
            ContractError::fetch(TABLE_PROVIDER, &self.config.sheet_name, e.to_string())
        })?;

        let first_row = self.first_row();
        let mut collection = Collection::new(TABLE_PROVIDER);
        self.slots.clear();
        self.end_row = first_row + data.values.len();

        for (offset, cells) in data.values.iter().enumerate() {
            let row = first_row + offset;
            let key = RecordKey::new(format!("row-{}", row + 1));
            match self.codec.decode_row(cells) {
                Ok(Some(event)) => {
                    if collection.push(Record::new(key.clone(), event.clone())) {
                        self.slots.insert(key, Slot { row, event });
                    }
                }
                Ok(None) => debug!(row = row + 1, "Skipping blank row"),
                Err(reason) => collection.reject(key.as_str(), reason),
            }
        }

        info!(
            events = collection.len(),
            rejected = collection.rejected().len(),
            "Table listed"
        );
        Ok(collection)
    }

    #[instrument(name = "table_add", skip(self, events), fields(count = events.len()))]
    async fn add_events(&mut self, events: &[Event]) -> Result<(), ContractError> {
        let mut placed: Vec<(usize, &Event)> = events
            .iter()
            .map(|event| (self.target_row(event.datetime), event))
            .collect();
        // bottom-up, later events first within the same slot
        placed.sort_by(|(row_a, a), (row_b, b)| {
            (row_b, rank(b.datetime)).cmp(&(row_a, rank(a.datetime)))
        });

        for (row, event) in &placed {
            info!(
                operation = "add",
                simulated = self.simulate,
                row = row + 1,
                event = %event,
                "Added event to table"
            );
        }
        if self.simulate || placed.is_empty() {
            return Ok(());
        }

        let requests = placed
            .iter()
            .flat_map(|(row, event)| [self.insert_row(*row), self.write_cells(*row, event)])
            .collect();
        self.batch_update(requests).await.map_err(|e| {
            ContractError::mutation(TABLE_PROVIDER, "add", None, e.to_string())
        })?;

        let targets: Vec<usize> = placed.iter().map(|(row, _)| *row).collect();
        for slot in self.slots.values_mut() {
            slot.row += targets.iter().filter(|target| **target <= slot.row).count();
        }
        self.end_row += targets.len();
        Ok(())
    }

    #[instrument(name = "table_update", skip(self, updates), fields(count = updates.len()))]
    async fn update_events(&mut self, updates: &[(RecordKey, Event)]) -> Result<(), ContractError> {
        let mut requests = Vec::with_capacity(updates.len());
        for (key, event) in updates {
            let slot = self.slot(key, "update")?;
            info!(
                operation = "update",
                simulated = self.simulate,
                key = %key,
                row = slot.row + 1,
                old = %slot.event,
                new = %event,
                "Updated event in table"
            );
            requests.push(self.write_cells(slot.row, event));
        }
        if self.simulate {
            return Ok(());
        }

        self.batch_update(requests).await.map_err(|e| {
            ContractError::mutation(TABLE_PROVIDER, "update", None, e.to_string())
        })?;
        for (key, event) in updates {
            if let Some(slot) = self.slots.get_mut(key) {
                slot.event = event.clone();
            }
        }
        Ok(())
    }

    #[instrument(name = "table_delete", skip(self, keys), fields(count = keys.len()))]
    async fn delete_events(&mut self, keys: &[RecordKey]) -> Result<(), ContractError> {
        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            let slot = self.slot(key, "delete")?;
            info!(
                operation = "delete",
                simulated = self.simulate,
                key = %key,
                row = slot.row + 1,
                old = %slot.event,
                "Deleted event in table"
            );
            rows.push(slot.row);
        }
        if self.simulate {
            return Ok(());
        }

        rows.sort_unstable_by(|a, b| b.cmp(a));
        rows.dedup();
        let requests = rows.iter().map(|row| self.delete_row(*row)).collect();
        self.batch_update(requests).await.map_err(|e| {
            ContractError::mutation(TABLE_PROVIDER, "delete", None, e.to_string())
        })?;

        for key in keys {
            self.slots.remove(key);
        }
        for slot in self.slots.values_mut() {
            slot.row -= rows.iter().filter(|row| **row < slot.row).count();
        }
        if self.end_row < rows.len() {
            warn!(end_row = self.end_row, deleted = rows.len(), "Row bookkeeping out of step");
        }
        self.end_row = self.end_row.saturating_sub(rows.len());
        Ok(())
    }
}
