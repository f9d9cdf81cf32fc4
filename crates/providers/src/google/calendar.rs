//! Calendar provider (Google Calendar v3)
//!
//! `RecordKey` is the calendar's own event id; `Event::id` travels in the
//! private extended properties.

use std::time::Duration;

use chrono::Utc;
use contracts::{
    CalendarConfig, Capabilities, Collection, ContractError, Event, GoogleCredentials, Provider,
    Record, RecordKey,
};
use reqwest::{Method, Url};
use tracing::{info, instrument, warn};

use super::calendar_codec::{CalendarCodec, CalendarEvent, EventPage};
use super::GoogleApi;
use crate::error::HttpError;
use crate::http;

pub const CALENDAR_PROVIDER: &str = "calendar";

const PAGE_SIZE: &str = "2500";

pub struct CalendarProvider {
    config: CalendarConfig,
    codec: CalendarCodec,
    api: GoogleApi,
    simulate: bool,
}

fn send_updates(notify: bool) -> (&'static str, &'static str) {
    ("sendUpdates", if notify { "all" } else { "none" })
}

impl CalendarProvider {
    pub fn new(
        config: CalendarConfig,
        codec: CalendarCodec,
        credentials: GoogleCredentials,
        timeout: Duration,
        simulate: bool,
    ) -> Self {
        Self {
            config,
            codec,
            api: GoogleApi::new(CALENDAR_PROVIDER, credentials, timeout),
            simulate,
        }
    }

    fn url(&self, tail: &[&str]) -> Result<Url, HttpError> {
        let mut segments = vec!["calendars", self.config.id.as_str()];
        segments.extend_from_slice(tail);
        http::endpoint(&self.config.api_base, &segments)
    }

    async fn fetch(&self, key: &RecordKey) -> Result<CalendarEvent, HttpError> {
        let url = self.url(&["events", key.as_str()])?;
        http::read_json(self.api.request(Method::GET, url)?.send().await?).await
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> Result<EventPage, HttpError> {
        let mut query = vec![
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
            ("maxResults", PAGE_SIZE),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        let request = self
            .api
            .request(Method::GET, self.url(&["events"])?)?
            .query(&query);
        http::read_json(request.send().await?).await
    }

    async fn insert(&self, body: &CalendarEvent, notify: bool) -> Result<CalendarEvent, HttpError> {
        let request = self
            .api
            .request(Method::POST, self.url(&["events"])?)?
            .query(&[send_updates(notify)])
            .json(body);
        http::read_json(request.send().await?).await
    }

    async fn replace(
        &self,
        key: &RecordKey,
        body: &CalendarEvent,
        notify: bool,
    ) -> Result<(), HttpError> {
        let request = self
            .api
            .request(Method::PUT, self.url(&["events", key.as_str()])?)?
            .query(&[send_updates(notify)])
            .json(body);
        http::check(request.send().await?).await?;
        Ok(())
    }

    async fn remove(&self, key: &RecordKey, notify: bool) -> Result<(), HttpError> {
        let request = self
            .api
            .request(Method::DELETE, self.url(&["events", key.as_str()])?)?
            .query(&[send_updates(notify)]);
        http::check(request.send().await?).await?;
        Ok(())
    }

    /// Readable form of a stored event for the mutation log
    fn describe(&self, raw: &CalendarEvent) -> String {
        self.codec
            .decode(raw)
            .map(|event| event.to_string())
            .unwrap_or_else(|_| format!("{raw:?}"))
    }
}

impl Provider for CalendarProvider {
    fn name(&self) -> &str {
        CALENDAR_PROVIDER
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            identity: true,
            requires_datetime: true,
            writable: true,
        }
    }

    #[instrument(name = "calendar_connect", skip(self), fields(calendar = %self.config.id))]
    async fn connect(&mut self) -> Result<(), ContractError> {
        self.api.authorize().await?;

        let url = self
            .url(&[])
            .map_err(|e| ContractError::connection(CALENDAR_PROVIDER, e.to_string()))?;
        let request = self
            .api
            .request(Method::GET, url)
            .map_err(|e| ContractError::connection(CALENDAR_PROVIDER, e.to_string()))?;
        let response = request
            .send()
            .await
            .map_err(HttpError::from)
            .map_err(|e| ContractError::connection(CALENDAR_PROVIDER, e.to_string()))?;
        http::check(response)
            .await
            .map_err(|e| ContractError::connection(CALENDAR_PROVIDER, e.to_string()))?;

        info!(simulate = self.simulate, "Connected to calendar");
        Ok(())
    }

    #[instrument(name = "calendar_list", skip(self))]
    async fn list_events(&mut self) -> Result<Collection, ContractError> {
        let mut collection = Collection::new(CALENDAR_PROVIDER);
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .fetch_page(page_token.as_deref())
                .await
                .map_err(|e| ContractError::fetch(CALENDAR_PROVIDER, &self.config.id, e.to_string()))?;

            for raw in page.items.iter().filter(|raw| !raw.is_cancelled()) {
                let Some(key) = raw.id.clone() else {
                    collection.reject("<no id>", "calendar event without id");
                    continue;
                };
                match self.codec.decode(raw) {
                    Ok(event) => {
                        collection.push(Record::new(key, event));
                    }
                    Err(reason) => collection.reject(key, reason),
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!(
            events = collection.len(),
            rejected = collection.rejected().len(),
            "Calendar listed"
        );
        Ok(collection)
    }

    #[instrument(name = "calendar_add", skip(self, events), fields(count = events.len()))]
    async fn add_events(&mut self, events: &[Event]) -> Result<(), ContractError> {
        let now = Utc::now();
        for event in events {
            let Some(body) = self.codec.encode(event) else {
                warn!(event = %event, "Cannot add event to calendar: event has no date");
                continue;
            };
            let notify = body.notify_attendees(now);

            if self.simulate {
                info!(operation = "add", simulated = true, notify, event = %event, "Added event to calendar");
                continue;
            }

            let created = self.insert(&body, notify).await.map_err(|e| {
                ContractError::mutation(CALENDAR_PROVIDER, "add", event.id.clone(), e.to_string())
            })?;
            info!(
                operation = "add",
                key = created.id.as_deref().unwrap_or("?"),
                notify,
                event = %event,
                "Added event to calendar"
            );
        }
        Ok(())
    }

    #[instrument(name = "calendar_update", skip(self, updates), fields(count = updates.len()))]
    async fn update_events(&mut self, updates: &[(RecordKey, Event)]) -> Result<(), ContractError> {
        let now = Utc::now();
        for (key, event) in updates {
            let failed = |e: HttpError| {
                ContractError::mutation(
                    CALENDAR_PROVIDER,
                    "update",
                    Some(key.to_string()),
                    e.to_string(),
                )
            };

            let Some(body) = self.codec.encode(event) else {
                return Err(ContractError::mutation(
                    CALENDAR_PROVIDER,
                    "update",
                    Some(key.to_string()),
                    format!("event has no date: {event}"),
                ));
            };
            let current = self.fetch(key).await.map_err(failed)?;
            let notify = current.notify_attendees(now) || body.notify_attendees(now);
            let old = self.describe(&current);

            if !self.simulate {
                self.replace(key, &body, notify).await.map_err(failed)?;
            }
            info!(
                operation = "update",
                simulated = self.simulate,
                key = %key,
                notify,
                old = %old,
                new = %event,
                "Updated event in calendar"
            );
        }
        Ok(())
    }

    #[instrument(name = "calendar_delete", skip(self, keys), fields(count = keys.len()))]
    async fn delete_events(&mut self, keys: &[RecordKey]) -> Result<(), ContractError> {
        let now = Utc::now();
        for key in keys {
            let failed = |e: HttpError| {
                ContractError::mutation(
                    CALENDAR_PROVIDER,
                    "delete",
                    Some(key.to_string()),
                    e.to_string(),
                )
            };

            let current = match self.fetch(key).await {
                Ok(current) => current,
                Err(e) if e.is_not_found() => {
                    warn!(key = %key, "Calendar event already gone");
                    continue;
                }
                Err(e) => return Err(failed(e)),
            };
            let notify = current.notify_attendees(now);
            let old = self.describe(&current);

            if !self.simulate {
                self.remove(key, notify).await.map_err(failed)?;
            }
            info!(
                operation = "delete",
                simulated = self.simulate,
                key = %key,
                notify,
                old = %old,
                "Deleted event in calendar"
            );
        }
        Ok(())
    }
}
