//! In-memory transport that replays scripted poll outcomes.

use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;

use super::{PollOutcome, SyncTransport};
use crate::{Result, document::Document, session::SessionKey, sync::error::SyncError};

#[derive(Debug, Default)]
struct Script {
    outcomes: VecDeque<Result<PollOutcome>>,
    pushes: Vec<(SessionKey, Document)>,
    polls: usize,
    registrations: usize,
    max_registrations: Option<usize>,
}

/// Transport whose poll answers are queued up front.
///
/// Keys are issued as `session-1`, `session-2`, ... Once the script runs out,
/// polls answer [`PollOutcome::Unchanged`]. Pushes are recorded.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse registrations after `max` have been handed out.
    pub fn with_max_registrations(self, max: usize) -> Self {
        self.lock().max_registrations = Some(max);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the answer to a future poll.
    pub fn push_outcome(&self, outcome: PollOutcome) {
        self.lock().outcomes.push_back(Ok(outcome));
    }

    /// Queue a failed poll.
    pub fn push_error(&self, error: SyncError) {
        self.lock().outcomes.push_back(Err(error.into()));
    }

    /// Documents pushed so far, with the key they were pushed under.
    pub fn pushes(&self) -> Vec<(SessionKey, Document)> {
        self.lock().pushes.clone()
    }

    pub fn polls(&self) -> usize {
        self.lock().polls
    }

    pub fn registrations(&self) -> usize {
        self.lock().registrations
    }

    pub fn remaining(&self) -> usize {
        self.lock().outcomes.len()
    }
}

#[async_trait]
impl SyncTransport for ScriptedTransport {
    fn transport_type(&self) -> &'static str {
        "scripted"
    }

    async fn register(&self) -> Result<SessionKey> {
        let mut script = self.lock();
        if script
            .max_registrations
            .is_some_and(|max| script.registrations >= max)
        {
            return Err(SyncError::RegistrationFailed("registration limit reached".into()).into());
        }
        script.registrations += 1;
        Ok(SessionKey::new(format!("session-{}", script.registrations)))
    }

    async fn poll(&self, _key: &SessionKey) -> Result<PollOutcome> {
        let mut script = self.lock();
        script.polls += 1;
        script
            .outcomes
            .pop_front()
            .unwrap_or(Ok(PollOutcome::Unchanged))
    }

    async fn push(&self, key: &SessionKey, document: &Document) -> Result<()> {
        self.lock().pushes.push((key.clone(), document.clone()));
        Ok(())
    }
}
