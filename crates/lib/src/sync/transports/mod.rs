//! Transport abstractions for sync communication.
//!
//! A [`SyncTransport`] carries the three exchanges the client needs: register a
//! session, poll for the current snapshot and push a local snapshot. The HTTP
//! implementation talks to a real server; the scripted one replays canned
//! outcomes and is used by tests and demos.

use async_trait::async_trait;

use crate::{Result, document::Document, session::SessionKey};

pub mod http;
pub mod scripted;

pub use http::HttpTransport;
pub use scripted::ScriptedTransport;

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing changed since the previous poll.
    Unchanged,
    /// The server does not know the session key.
    NotFound,
    /// A fresh snapshot.
    Updated(Document),
}

impl PollOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, PollOutcome::Updated(_))
    }
}

/// Trait for implementing sync communication over different transports.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Get the transport type identifier (e.g. `"http"`).
    fn transport_type(&self) -> &'static str;

    /// Ask the server for a new session key.
    async fn register(&self) -> Result<SessionKey>;

    /// Fetch the server's view of the document for `key`.
    async fn poll(&self, key: &SessionKey) -> Result<PollOutcome>;

    /// Send a local snapshot for `key`.
    async fn push(&self, key: &SessionKey, document: &Document) -> Result<()>;
}
