//! OAuth access tokens for the Google APIs
//!
//! Order of preference on every connect:
//! 1. service account: a signed JWT is exchanged for an access token
//! 2. refresh token: exchanged for a fresh access token
//! 3. static access token, used as-is

use std::time::Duration;

use chrono::Utc;
use contracts::{ContractError, GoogleCredentials, ServiceAccountKey};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::HttpError;
use crate::http;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    /// Only returned when the server rotates the refresh token
    #[serde(default)]
    refresh_token: Option<String>,
}

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Scopes requested for service accounts
const SCOPES: &str =
    "https://www.googleapis.com/auth/calendar https://www.googleapis.com/auth/spreadsheets";

/// Assertion lifetime; Google accepts at most one hour
const ASSERTION_TTL_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Access token for the next requests
pub(crate) async fn access_token(
    client: &reqwest::Client,
    credentials: &GoogleCredentials,
) -> Result<String, HttpError> {
    if let Some(key) = &credentials.service_account {
        return service_account_grant(client, key, &credentials.token_uri)
            .await
            .map(|response| response.access_token);
    }
    if credentials.can_refresh() {
        return refresh_grant(client, credentials)
            .await
            .map(|response| response.access_token);
    }
    credentials.access_token.clone().ok_or_else(|| {
        HttpError::Credentials("neither an access token nor a refresh token is configured".into())
    })
}

#[instrument(name = "oauth_refresh", skip_all, fields(token_uri = %credentials.token_uri))]
async fn refresh_grant(
    client: &reqwest::Client,
    credentials: &GoogleCredentials,
) -> Result<TokenResponse, HttpError> {
    let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
        credentials.refresh_token.as_deref(),
        credentials.client_id.as_deref(),
        credentials.client_secret.as_deref(),
    ) else {
        return Err(HttpError::Credentials(
            "refresh token, client id and client secret are required".into(),
        ));
    };

    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
        ("client_secret", client_secret),
    ];
    let response = client
        .post(&credentials.token_uri)
        .form(&form)
        .send()
        .await?;
    let token: TokenResponse = http::read_json(response).await?;
    debug!(expires_in = ?token.expires_in, "Access token refreshed");
    Ok(token)
}

fn assertion(key: &ServiceAccountKey, audience: &str, now: i64) -> Result<String, HttpError> {
    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| HttpError::Credentials(format!("service account private key: {e}")))?;
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: SCOPES,
        aud: audience,
        iat: now,
        exp: now + ASSERTION_TTL_SECS,
    };
    jsonwebtoken::encode(&header, &claims, &signing_key)
        .map_err(|e| HttpError::Credentials(format!("cannot sign service account assertion: {e}")))
}

#[instrument(name = "oauth_service_account", skip_all, fields(account = %key.client_email))]
async fn service_account_grant(
    client: &reqwest::Client,
    key: &ServiceAccountKey,
    default_token_uri: &str,
) -> Result<TokenResponse, HttpError> {
    let token_uri = key.token_uri.as_deref().unwrap_or(default_token_uri);
    let jwt = assertion(key, token_uri, Utc::now().timestamp())?;

    let form = [("grant_type", JWT_BEARER_GRANT), ("assertion", jwt.as_str())];
    let response = client.post(token_uri).form(&form).send().await?;
    let token: TokenResponse = http::read_json(response).await?;
    debug!(expires_in = ?token.expires_in, "Service account token issued");
    Ok(token)
}

/// Exchange the refresh token and return the updated credential set
pub async fn refresh_credentials(
    credentials: &GoogleCredentials,
    timeout: Duration,
) -> Result<GoogleCredentials, ContractError> {
    const PROVIDER: &str = "google-oauth";

    let client = http::client(PROVIDER, timeout)?;
    let token = refresh_grant(&client, credentials)
        .await
        .map_err(|e| ContractError::connection(PROVIDER, e.to_string()))?;

    info!(expires_in = ?token.expires_in, "Credentials refreshed");
    let mut refreshed = credentials.clone();
    refreshed.access_token = Some(token.access_token);
    if let Some(rotated) = token.refresh_token {
        refreshed.refresh_token = Some(rotated);
    }
    Ok(refreshed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_used_without_refresh() {
        let client = reqwest::Client::new();
        let credentials = GoogleCredentials {
            access_token: Some("static".into()),
            ..Default::default()
        };
        assert_eq!(access_token(&client, &credentials).await.unwrap(), "static");
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let client = reqwest::Client::new();
        let err = access_token(&client, &GoogleCredentials::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Credentials(_)));
    }

    #[tokio::test]
    async fn test_refresh_requires_complete_credentials() {
        let credentials = GoogleCredentials {
            refresh_token: Some("r".into()),
            ..Default::default()
        };
        let err = refresh_credentials(&credentials, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::Connection { .. }));
    }

    fn service_account(private_key: &str) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "sync@scouting.iam.gserviceaccount.com".into(),
            private_key: private_key.into(),
            private_key_id: Some("k1".into()),
            token_uri: None,
        }
    }

    #[test]
    fn test_invalid_private_key_is_a_credentials_error() {
        let err = assertion(&service_account("garbage"), "https://oauth2.googleapis.com/token", 0)
            .unwrap_err();
        assert!(matches!(err, HttpError::Credentials(ref m) if m.contains("private key")));
    }

    #[tokio::test]
    async fn test_service_account_preferred_over_access_token() {
        let client = reqwest::Client::new();
        let credentials = GoogleCredentials {
            service_account: Some(service_account("garbage")),
            access_token: Some("static".into()),
            ..Default::default()
        };
        // the static token would succeed; the broken account key proves it was not used
        let err = access_token(&client, &credentials).await.unwrap_err();
        assert!(matches!(err, HttpError::Credentials(_)));
    }

    #[test]
    fn test_assertion_claims() {
        let claims = AssertionClaims {
            iss: "sync@scouting.iam.gserviceaccount.com",
            scope: SCOPES,
            aud: "https://oauth2.googleapis.com/token",
            iat: 1_700_000_000,
            exp: 1_700_000_000 + ASSERTION_TTL_SECS,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["exp"], 1_700_003_600);
        assert!(json["scope"].as_str().unwrap().contains("auth/calendar"));
        assert!(json["scope"].as_str().unwrap().contains("auth/spreadsheets"));
    }

    #[test]
    fn test_token_response_decoding() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc", "expires_in": 3599, "scope": "x"}"#)
                .unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in, Some(3599));
        assert!(token.refresh_token.is_none());
    }
}
