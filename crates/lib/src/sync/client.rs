//! The sync client: one session, one transport, one poll loop.
//!
//! [`Client`] owns the [`Session`] behind a mutex so the poll loop and the
//! host's writes can share it. The mutex is never held across an `.await`:
//! every session operation runs to completion synchronously, then any queued
//! pushes are sent.

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, info_span, trace, warn};

use super::{
    error::SyncError,
    scheduler::{PollConfig, PollScheduler, PollStatus},
    transports::SyncTransport,
};
use crate::{
    Error, Result,
    events::EventBus,
    session::{Session, SessionKey},
    tree::NodeId,
};

/// Client behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub poll: PollConfig,
    /// Re-register with a fresh session when the server forgets ours. When
    /// disabled, [`Client::run`] returns the session-lost error instead.
    pub reset_on_session_lost: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            reset_on_session_lost: true,
        }
    }
}

/// A registered sync session driven over a transport.
pub struct Client {
    session: Arc<Mutex<Session>>,
    transport: Arc<dyn SyncTransport>,
    /// Held across a whole flush so snapshots reach the server in queue order.
    flushing: tokio::sync::Mutex<()>,
    scheduler: PollScheduler,
    config: ClientConfig,
}

impl Client {
    /// Register with the server and return a ready client.
    ///
    /// Registration failure is fatal; nothing is retried.
    pub async fn connect(transport: Arc<dyn SyncTransport>, config: ClientConfig) -> Result<Self> {
        Self::connect_with_bus(transport, config, Arc::new(EventBus::new())).await
    }

    /// Like [`connect`](Self::connect), dispatching through an existing bus so
    /// subscriptions can be made before the first poll.
    pub async fn connect_with_bus(
        transport: Arc<dyn SyncTransport>,
        config: ClientConfig,
        bus: Arc<EventBus>,
    ) -> Result<Self> {
        config.poll.validate()?;

        let key = transport.register().await?;
        info!(%key, transport = transport.transport_type(), "registered session");

        let mut session = Session::with_bus(bus);
        session.set_key(key);
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            transport,
            flushing: tokio::sync::Mutex::new(()),
            scheduler: PollScheduler::new(config.poll),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run `f` with exclusive access to the session.
    ///
    /// Pushes queued by `f` are sent on the next [`flush`](Self::flush) or poll.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut session)
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.with_session(|s| s.bus().clone())
    }

    pub fn key(&self) -> Option<SessionKey> {
        self.with_session(|s| s.key().cloned())
    }

    /// Delay the poll loop waits before the next poll.
    pub fn poll_interval(&self) -> Duration {
        self.scheduler.interval()
    }

    /// Set a value locally and push the document.
    pub async fn set(&self, path: &str, value: Option<&str>) -> Result<NodeId> {
        let node = self.with_session(|s| s.set(path, value))?;
        self.flush().await;
        Ok(node)
    }

    /// Ask the server to apply `delta` at `path`.
    pub async fn change(&self, path: &str, delta: &str) -> Result<NodeId> {
        let node = self.with_session(|s| s.change(path, delta))?;
        self.flush().await;
        Ok(node)
    }

    /// Remove a node locally and tell the server.
    pub async fn remove(&self, path: &str) -> Result<bool> {
        let removed = self.with_session(|s| s.remove(path))?;
        self.flush().await;
        Ok(removed)
    }

    /// Send every queued push. Returns how many were delivered.
    ///
    /// Pushes are fire-and-forget: failures are logged and dropped, the next
    /// poll brings the tree back in line with the server. Concurrent flushes
    /// are serialized, so an older snapshot never lands after a newer one.
    pub async fn flush(&self) -> usize {
        let _flushing = self.flushing.lock().await;
        let (key, pushes) = self.with_session(|s| (s.key().cloned(), s.take_pushes()));
        if pushes.is_empty() {
            return 0;
        }
        let Some(key) = key else {
            warn!(dropped = pushes.len(), "discarding pushes for unregistered session");
            return 0;
        };

        let mut delivered = 0;
        for document in &pushes {
            match self.transport.push(&key, document).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(%key, "push failed: {e}"),
            }
        }
        debug!(delivered, queued = pushes.len(), "flushed pushes");
        delivered
    }

    /// Flush pending pushes, then run a single poll.
    pub async fn poll_once(&self) -> Result<PollStatus> {
        self.flush().await;
        self.scheduler
            .poll_once(&self.session, self.transport.as_ref())
            .await
    }

    /// Drop all session state and register again.
    ///
    /// Subscriptions on the bus are kept.
    pub async fn reset(&self) -> Result<SessionKey> {
        self.with_session(Session::reset);
        self.scheduler.reset();

        let key = self.transport.register().await?;
        info!(%key, "re-registered session");
        self.with_session(|s| s.set_key(key.clone()));
        Ok(key)
    }

    /// Poll forever, sleeping the adaptive interval between polls.
    ///
    /// Transport failures and unexpected server statuses are logged and polling
    /// continues. Returns on a registration failure, or on session loss when
    /// resetting is disabled.
    pub async fn run(&self) -> Result<()> {
        async move {
            info!(interval_ms = self.poll_interval().as_millis() as u64, "Starting poll loop");
            loop {
                match self.poll_once().await {
                    Ok(status) => trace!(?status, "poll finished"),
                    Err(Error::Sync(SyncError::SessionLost { key }))
                        if self.config.reset_on_session_lost =>
                    {
                        warn!(%key, "session lost, resetting");
                        self.reset().await?;
                    }
                    Err(e) if e.is_retryable() => warn!("poll failed: {e}"),
                    Err(Error::Sync(SyncError::PollInFlight)) => {
                        trace!("poll already in flight, skipping")
                    }
                    Err(e) => {
                        tracing::error!("poll loop stopped: {e}");
                        return Err(e);
                    }
                }
                tokio::time::sleep(self.poll_interval()).await;
            }
        }
        .instrument(info_span!("poll_loop"))
        .await
    }

    /// Run the poll loop until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run() => result,
            _ = shutdown => {
                info!("Poll loop shutting down");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.transport.transport_type())
            .field("key", &self.key())
            .field("config", &self.config)
            .finish()
    }
}
