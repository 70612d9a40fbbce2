//! Protocol definitions for sync communication.
//!
//! Message types shared by the HTTP transport and the reference server. The
//! documents themselves travel as [`Document`](crate::document::Document) JSON.

use serde::{Deserialize, Serialize};

use crate::session::SessionKey;

/// Body of a successful registration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RegisterResponse {
    pub key: SessionKey,
}

/// Query string carried by poll and push requests.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionQuery {
    pub key: SessionKey,
}
