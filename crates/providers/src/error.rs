//! Transport errors of the HTTP-backed providers
//!
//! Converted into `ContractError` at the provider boundary, where the
//! phase (connect / fetch / mutation) is known.

use thiserror::Error;

/// Maximum number of response body characters kept in an error
const BODY_EXCERPT: usize = 300;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid url '{0}'")]
    Url(String),

    #[error("no usable credentials: {0}")]
    Credentials(String),
}

impl HttpError {
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: body.chars().take(BODY_EXCERPT).collect(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_body_is_truncated() {
        let body = "x".repeat(1000);
        let err = HttpError::status(500, &body);
        match &err {
            HttpError::Status { body, .. } => assert_eq!(body.len(), BODY_EXCERPT),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!err.is_not_found());
        assert!(HttpError::status(404, "").is_not_found());
    }

    #[tokio::test]
    async fn test_silent_server_is_a_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(100))
            .build()
            .unwrap();
        let err: HttpError = client
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap_err()
            .into();
        assert!(err.is_timeout());
        assert!(!HttpError::status(504, "").is_timeout());
    }
}
