//! Google Calendar and Google Sheets adapters

mod auth;
mod calendar;
mod calendar_codec;
mod sheets;
mod sheets_codec;

pub use auth::refresh_credentials;
pub use calendar::{CalendarProvider, CALENDAR_PROVIDER};
pub use calendar_codec::{CalendarCodec, CalendarEvent};
pub use sheets::{TableProvider, TABLE_PROVIDER};
pub use sheets_codec::{SheetCodec, COLUMNS};

use std::time::Duration;

use contracts::{ContractError, GoogleCredentials};
use reqwest::{Method, RequestBuilder, Url};

use crate::error::HttpError;
use crate::http;

/// Authorized HTTP access shared by both Google adapters
pub(crate) struct GoogleApi {
    provider: &'static str,
    credentials: GoogleCredentials,
    timeout: Duration,
    session: Option<Session>,
}

struct Session {
    client: reqwest::Client,
    token: String,
}

impl GoogleApi {
    pub(crate) fn new(
        provider: &'static str,
        credentials: GoogleCredentials,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            credentials,
            timeout,
            session: None,
        }
    }

    /// Build the client and obtain an access token
    pub(crate) async fn authorize(&mut self) -> Result<(), ContractError> {
        let client = http::client(self.provider, self.timeout)?;
        let token = auth::access_token(&client, &self.credentials)
            .await
            .map_err(|e| ContractError::connection(self.provider, e.to_string()))?;
        self.session = Some(Session { client, token });
        Ok(())
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, HttpError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| HttpError::Credentials("not connected".into()))?;
        Ok(session
            .client
            .request(method, url)
            .bearer_auth(&session.token))
    }
}
