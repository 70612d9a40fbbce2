//! Constants used throughout the treesync library.
//!
//! Central definitions for the root anchor name, the HTTP endpoints and the
//! default poll timings.

/// Name of the anchor element every document hangs off. Never addressable by a path.
pub const ROOT_NAME: &str = "document";

/// Default lower bound of the poll interval, in milliseconds.
pub const POLL_INTERVAL_MIN_MS: u64 = 100;

/// Default upper bound of the poll interval, in milliseconds.
pub const POLL_INTERVAL_MAX_MS: u64 = 500;

/// Default growth of the poll interval per unchanged poll, in milliseconds.
pub const POLL_INTERVAL_INCREMENT_MS: u64 = 10;

/// Registration endpoint of the reference HTTP protocol.
pub const REGISTER_ENDPOINT: &str = "/api/v0/register";

/// Poll endpoint of the reference HTTP protocol.
pub const POLL_ENDPOINT: &str = "/api/v0/poll";

/// Push endpoint of the reference HTTP protocol.
pub const PUSH_ENDPOINT: &str = "/api/v0/push";
