//! HTTP transport implementation for sync communication.
//!
//! Talks to a server exposing three JSON endpoints under `/api/v0` using
//! reqwest:
//!
//! - `POST /api/v0/register` returns `{"key": ...}`
//! - `GET /api/v0/poll?key=...` returns the document, `304` when nothing
//!   changed and `404` for an unknown key
//! - `POST /api/v0/push?key=...` accepts a document body

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::trace;
use url::Url;

use super::{PollOutcome, SyncTransport};
use crate::{
    Result,
    constants::{POLL_ENDPOINT, PUSH_ENDPOINT, REGISTER_ENDPOINT},
    document::Document,
    session::SessionKey,
    sync::{
        error::SyncError,
        protocol::{RegisterResponse, SessionQuery},
    },
};

/// HTTP transport implementation using reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for the server at `base` (e.g. `http://127.0.0.1:8080`).
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base).map_err(|e| SyncError::ConnectionFailed {
            address: base.to_string(),
            reason: format!("Invalid server URL: {e}"),
        })?;
        Ok(Self {
            base,
            client: reqwest::Client::new(),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base.join(path).map_err(|e| {
            SyncError::ConnectionFailed {
                address: self.base.to_string(),
                reason: format!("Invalid endpoint {path}: {e}"),
            }
            .into()
        })
    }

    fn connection_failed(&self, e: reqwest::Error) -> SyncError {
        SyncError::ConnectionFailed {
            address: self.base.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    fn transport_type(&self) -> &'static str {
        "http"
    }

    async fn register(&self) -> Result<SessionKey> {
        let response = self
            .client
            .post(self.endpoint(REGISTER_ENDPOINT)?)
            .send()
            .await
            .map_err(|e| self.connection_failed(e))?;

        if !response.status().is_success() {
            return Err(SyncError::RegistrationFailed(format!(
                "Server returned error: {}",
                response.status()
            ))
            .into());
        }

        let body: RegisterResponse = response
            .json()
            .await
            .map_err(|e| SyncError::RegistrationFailed(format!("Failed to parse response: {e}")))?;
        Ok(body.key)
    }

    async fn poll(&self, key: &SessionKey) -> Result<PollOutcome> {
        let response = self
            .client
            .get(self.endpoint(POLL_ENDPOINT)?)
            .query(&SessionQuery { key: key.clone() })
            .send()
            .await
            .map_err(|e| self.connection_failed(e))?;

        trace!(status = %response.status(), "poll response");
        match response.status() {
            StatusCode::NOT_MODIFIED => Ok(PollOutcome::Unchanged),
            StatusCode::NOT_FOUND => Ok(PollOutcome::NotFound),
            status if status.is_success() => {
                let document: Document = response
                    .json()
                    .await
                    .map_err(|e| SyncError::Network(format!("Failed to parse response: {e}")))?;
                Ok(PollOutcome::Updated(document))
            }
            status => Err(SyncError::UnexpectedStatus {
                endpoint: POLL_ENDPOINT,
                status: status.as_u16(),
            }
            .into()),
        }
    }

    async fn push(&self, key: &SessionKey, document: &Document) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint(PUSH_ENDPOINT)?)
            .query(&SessionQuery { key: key.clone() })
            .json(document)
            .send()
            .await
            .map_err(|e| self.connection_failed(e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SyncError::SessionLost {
                key: key.to_string(),
            }
            .into()),
            status if status.is_success() => Ok(()),
            status => Err(SyncError::UnexpectedStatus {
                endpoint: PUSH_ENDPOINT,
                status: status.as_u16(),
            }
            .into()),
        }
    }
}
