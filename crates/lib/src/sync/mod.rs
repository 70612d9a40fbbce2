//! Synchronization with the server.
//!
//! The [`Client`] registers a session over a [`SyncTransport`], then polls for
//! snapshots through the [`PollScheduler`] and pushes local writes back.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use treesync::sync::{Client, ClientConfig, transports::HttpTransport};
//!
//! # async fn demo() -> treesync::Result<()> {
//! let transport = Arc::new(HttpTransport::new("http://127.0.0.1:8080")?);
//! let client = Client::connect(transport, ClientConfig::default()).await?;
//! client.set("Team(1).Name", Some("Tigers")).await?;
//! client.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod scheduler;
pub mod transports;

pub use client::{Client, ClientConfig};
pub use error::SyncError;
pub use scheduler::{Backoff, PollConfig, PollScheduler, PollStatus};
pub use transports::{PollOutcome, SyncTransport};
