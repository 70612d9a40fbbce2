//! Error types for the synchronization module.

use thiserror::Error;

/// Errors that can occur while talking to the sync server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// The server refused or failed to hand out a session key.
    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    /// The server no longer knows the session.
    #[error("Session '{key}' is no longer known to the server")]
    SessionLost { key: String },

    /// A poll or push was attempted before registration.
    #[error("Session is not registered")]
    NotRegistered,

    /// A poll was started while another one was still outstanding.
    #[error("A poll is already in flight")]
    PollInFlight,

    /// Network communication error.
    #[error("Network error: {0}")]
    Network(String),

    /// Client connection error.
    #[error("Failed to connect to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    /// The server answered with a status the protocol does not define.
    #[error("Unexpected status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: &'static str, status: u16 },

    /// Poll configuration rejected.
    #[error("Invalid poll configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Check if this is a network/connection error.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::ConnectionFailed { .. }
        )
    }

    /// Check if the server dropped the session.
    pub fn is_session_lost(&self) -> bool {
        matches!(self, SyncError::SessionLost { .. })
    }

    /// Check if this is a protocol error (unexpected response).
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            SyncError::UnexpectedStatus { .. } | SyncError::RegistrationFailed(_)
        )
    }

    /// Whether a poll that failed this way should simply be tried again.
    pub fn is_retryable(&self) -> bool {
        self.is_network_error() || matches!(self, SyncError::UnexpectedStatus { .. })
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, SyncError::InvalidConfig(_) | SyncError::NotRegistered)
    }
}

impl From<SyncError> for crate::Error {
    fn from(err: SyncError) -> Self {
        crate::Error::Sync(err)
    }
}
