//!
//! Treesync: keep a local hierarchical document in step with a server-held copy.
//!
//! ## Core Concepts
//!
//! * **Paths (`path::Path`)**: Dotted, id-qualified addresses such as `Team(1).Score`.
//! * **Tree (`tree::Tree`)**: The local node store. Nodes carry a name, an optional id and a
//!   three-state value (unset, empty, text).
//! * **Resolver (`resolver::resolve`)**: Walks a path through the tree, optionally creating
//!   missing nodes.
//! * **Synchronizer (`reconcile::Synchronizer`)**: Applies server snapshots to the tree and
//!   derives the add, remove and content notifications they imply.
//! * **EventBus (`events::EventBus`)**: Delivers those notifications to subscribers.
//! * **Session (`session::Session`)**: Everything tied to one server registration.
//! * **Client (`sync::Client`)**: Drives a session over a transport with an adaptive poll loop.

pub mod constants;
pub mod document;
pub mod events;
pub mod outbox;
pub mod path;
pub mod reconcile;
pub mod resolver;
pub mod session;
pub mod sync;
pub mod tree;

pub use document::{Document, Element};
pub use path::{Path, Step};
pub use session::{Session, SessionKey};
/// Re-export the `Tree` struct for easier access.
pub use tree::Tree;

/// Result type used throughout the Treesync library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Treesync library.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured path errors from the path module
    #[error(transparent)]
    Path(path::PathError),

    /// Structured tree errors from the tree module
    #[error(transparent)]
    Tree(tree::TreeError),

    /// Unrecognised event topic
    #[error(transparent)]
    Topic(#[from] events::UnknownTopic),

    /// Structured sync errors from the sync module
    #[error(transparent)]
    Sync(sync::SyncError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Serialize(_) => "serialize",
            Error::Path(_) => "path",
            Error::Tree(_) => "tree",
            Error::Topic(_) => "events",
            Error::Sync(_) => "sync",
        }
    }

    /// Check if this error indicates a node was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Tree(tree_err) => tree_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is a rejected path or step.
    pub fn is_path_error(&self) -> bool {
        matches!(self, Error::Path(_))
    }

    /// Check if this error is sync-related.
    pub fn is_sync_error(&self) -> bool {
        matches!(self, Error::Sync(_))
    }

    /// Check if this error is a transient network failure.
    pub fn is_network_error(&self) -> bool {
        match self {
            Error::Sync(sync_err) => sync_err.is_network_error(),
            _ => false,
        }
    }

    /// Check if a failed poll can be retried on the next tick.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Sync(sync_err) => sync_err.is_retryable(),
            _ => false,
        }
    }

    /// Check if the server dropped the session.
    pub fn is_session_lost(&self) -> bool {
        match self {
            Error::Sync(sync_err) => sync_err.is_session_lost(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_and_classification() {
        let err: Error = path::Path::parse("Team(").unwrap_err().into();
        assert_eq!(err.module(), "path");
        assert!(err.is_path_error());
        assert!(!err.is_sync_error());

        let err: Error = tree::TreeError::RootRemoval.into();
        assert_eq!(err.module(), "tree");
        assert!(!err.is_not_found());

        let err: Error = sync::SyncError::SessionLost { key: "k".into() }.into();
        assert!(err.is_session_lost());
        assert!(!err.is_network_error());
    }

    #[test]
    fn test_transparent_display() {
        let err: Error = sync::SyncError::NotRegistered.into();
        assert_eq!(err.to_string(), "Session is not registered");
    }
}
