//! Adaptive poll scheduling.
//!
//! [`Backoff`] tracks the delay before the next poll: it grows by a fixed
//! increment on every unchanged poll, is capped at a maximum, and drops back to
//! the minimum as soon as a poll brings new data.
//!
//! [`PollScheduler`] runs one poll at a time against a [`Session`]. A second
//! poll started while one is outstanding is refused with
//! [`SyncError::PollInFlight`]. The session lock is only held while applying a
//! snapshot, never across the network call.

use std::{
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{
    error::SyncError,
    transports::{PollOutcome, SyncTransport},
};
use crate::{
    Result,
    constants::{POLL_INTERVAL_INCREMENT_MS, POLL_INTERVAL_MAX_MS, POLL_INTERVAL_MIN_MS},
    session::Session,
};

/// Poll interval bounds, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub min_ms: u64,
    pub max_ms: u64,
    pub increment_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            min_ms: POLL_INTERVAL_MIN_MS,
            max_ms: POLL_INTERVAL_MAX_MS,
            increment_ms: POLL_INTERVAL_INCREMENT_MS,
        }
    }
}

impl PollConfig {
    /// Check that the bounds make sense.
    pub fn validate(&self) -> Result<()> {
        if self.min_ms > self.max_ms {
            return Err(SyncError::InvalidConfig(format!(
                "minimum interval {}ms exceeds maximum {}ms",
                self.min_ms, self.max_ms
            ))
            .into());
        }
        if self.increment_ms == 0 {
            return Err(SyncError::InvalidConfig("increment must be positive".into()).into());
        }
        Ok(())
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

/// Delay before the next poll.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: PollConfig,
    current_ms: u64,
}

impl Backoff {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            current_ms: config.min_ms,
        }
    }

    pub fn current(&self) -> Duration {
        Duration::from_millis(self.current_ms)
    }

    /// Nothing changed: wait a little longer next time.
    pub fn on_unchanged(&mut self) -> Duration {
        self.current_ms = self
            .current_ms
            .saturating_add(self.config.increment_ms)
            .min(self.config.max_ms);
        self.current()
    }

    /// New data arrived: poll eagerly again.
    pub fn on_updated(&mut self) -> Duration {
        self.reset()
    }

    pub fn reset(&mut self) -> Duration {
        self.current_ms = self.config.min_ms;
        self.current()
    }
}

/// What a completed poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// The server reported no change.
    Unchanged,
    /// A snapshot was applied, dispatching this many notifications.
    Applied(usize),
}

/// Clears the in-flight flag when the poll finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Serializes polls and keeps the backoff state.
#[derive(Debug)]
pub struct PollScheduler {
    backoff: Mutex<Backoff>,
    in_flight: AtomicBool,
}

impl PollScheduler {
    pub fn new(config: PollConfig) -> Self {
        Self {
            backoff: Mutex::new(Backoff::new(config)),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Delay to wait before the next poll.
    pub fn interval(&self) -> Duration {
        self.backoff
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Return the interval to its minimum.
    pub fn reset(&self) {
        self.backoff
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }

    fn begin(&self) -> Result<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::PollInFlight)?;
        Ok(InFlight(&self.in_flight))
    }

    /// Run one poll and apply its outcome to `session`.
    ///
    /// A not-found answer is reported as [`SyncError::SessionLost`]; the caller
    /// decides whether to reset. Transport errors leave the interval untouched.
    pub async fn poll_once(
        &self,
        session: &Mutex<Session>,
        transport: &dyn SyncTransport,
    ) -> Result<PollStatus> {
        let _guard = self.begin()?;

        let key = session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .key()
            .cloned()
            .ok_or(SyncError::NotRegistered)?;

        let outcome = transport.poll(&key).await?;
        trace!(%key, updated = outcome.is_updated(), "poll completed");

        match outcome {
            PollOutcome::Unchanged => {
                let next = self
                    .backoff
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .on_unchanged();
                trace!(next_ms = next.as_millis() as u64, "no change");
                Ok(PollStatus::Unchanged)
            }
            PollOutcome::NotFound => Err(SyncError::SessionLost {
                key: key.to_string(),
            }
            .into()),
            PollOutcome::Updated(document) => {
                let dispatched = session
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .apply(&document)?;
                self.backoff
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .on_updated();
                debug!(dispatched, "applied snapshot");
                Ok(PollStatus::Applied(dispatched))
            }
        }
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(PollConfig::default())
    }
}
