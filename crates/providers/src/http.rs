//! Shared HTTP plumbing

use std::time::Duration;

use contracts::ContractError;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;

use crate::error::HttpError;

/// Client with the per-request timeout applied
pub(crate) fn client(provider: &str, timeout: Duration) -> Result<reqwest::Client, ContractError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("scout-sync/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ContractError::connection(provider, format!("cannot build HTTP client: {e}")))
}

/// `base` followed by percent-encoded path segments
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, HttpError> {
    let mut url = Url::parse(base).map_err(|_| HttpError::Url(base.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| HttpError::Url(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Fail on non-success status, keeping an excerpt of the body
pub(crate) async fn check(response: Response) -> Result<Response, HttpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(HttpError::status(status.as_u16(), &body))
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, HttpError> {
    let text = check(response).await?.text().await?;
    serde_json::from_str(&text).map_err(|e| HttpError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = endpoint(
            "https://www.googleapis.com/calendar/v3",
            &["calendars", "abc#team@group.calendar.google.com", "events"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/abc%23team@group.calendar.google.com/events"
        );
    }

    #[test]
    fn test_endpoint_handles_trailing_slash() {
        let url = endpoint("https://example.org/rest/", &["match", "id", "7"]).unwrap();
        assert_eq!(url.as_str(), "https://example.org/rest/match/id/7");
    }

    #[test]
    fn test_endpoint_rejects_garbage() {
        assert!(matches!(
            endpoint("not a url", &["x"]),
            Err(HttpError::Url(_))
        ));
    }
}
