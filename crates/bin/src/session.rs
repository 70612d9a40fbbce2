//! Session management for the reference server
//!
//! Holds the authoritative document and one entry per registered client
//! session. A session remembers the document version it last received so polls
//! can answer "unchanged" without sending the document again.
//!
//! Removals leave a tombstone stamped with the version they produced. A poll
//! prepends remove markers for every tombstone the session has not seen yet,
//! and a push from such a session cannot bring a tombstoned element back.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::RwLock;
use tracing::{debug, info};
use treesync::{Document, Element, Path, SessionKey};
use uuid::Uuid;

/// Answer to a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollReply {
    /// The key was never issued or has expired.
    Unknown,
    /// The session already has the current version.
    Unchanged,
    /// The current document.
    Updated(Document),
}

#[derive(Debug)]
struct SessionEntry {
    /// Document version last delivered to this session.
    seen: Option<u64>,
    last_contact: Instant,
}

/// A removal, kept until every session has polled past it.
#[derive(Debug, Clone)]
struct Tombstone {
    version: u64,
    path: Path,
    /// Session whose push removed the element.
    author: String,
}

impl Tombstone {
    /// Remove marker for the tombstoned path, wrapped in its unmarked ancestors.
    fn marker(&self) -> Option<Element> {
        let mut steps = self.path.steps().iter().rev();
        let mut element = Element::from_step(steps.next()?).removed();
        for step in steps {
            element = Element::from_step(step).with_child(element);
        }
        Some(element)
    }
}

#[derive(Debug)]
struct ServerState {
    document: Document,
    version: u64,
    sessions: HashMap<String, SessionEntry>,
    tombstones: Vec<Tombstone>,
}

impl ServerState {
    /// Remove markers for removals newer than `since` whose parent still exists.
    fn removals_since(&self, since: u64) -> Vec<Element> {
        self.tombstones
            .iter()
            .filter(|t| t.version > since)
            .filter(|t| {
                t.path
                    .parent()
                    .is_some_and(|p| p.is_empty() || self.document.find(&p).is_some())
            })
            .filter_map(Tombstone::marker)
            .collect()
    }

    /// Drop tombstones every polling session has already received.
    fn compact(&mut self) {
        let Some(floor) = self.sessions.values().filter_map(|e| e.seen).min() else {
            return;
        };
        self.tombstones.retain(|t| t.version > floor);
    }

    /// Drop sessions idle for longer than `ttl`.
    fn expire(&mut self, ttl: Option<Duration>, now: Instant) {
        let Some(ttl) = ttl else {
            return;
        };
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| now.duration_since(entry.last_contact) <= ttl);
        let expired = before - self.sessions.len();
        if expired > 0 {
            info!(expired, "expired idle sessions");
        }
    }
}

/// In-memory session store
///
/// Sessions are ephemeral and lost on server restart, which clients observe as
/// a lost session.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<ServerState>>,
    ttl: Option<Duration>,
}

impl SessionStore {
    /// Create an empty store. Sessions idle for longer than `ttl` are forgotten.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            state: Arc::new(RwLock::new(ServerState {
                document: Document::new(),
                version: 1,
                sessions: HashMap::new(),
                tombstones: Vec::new(),
            })),
            ttl,
        }
    }

    /// Issue a fresh session key.
    pub async fn create_session(&self) -> SessionKey {
        let key = Uuid::new_v4().to_string();
        let mut state = self.state.write().await;
        state.expire(self.ttl, Instant::now());
        state.sessions.insert(
            key.clone(),
            SessionEntry {
                seen: None,
                last_contact: Instant::now(),
            },
        );
        info!(%key, sessions = state.sessions.len(), "registered session");
        SessionKey::new(key)
    }

    /// Answer a poll for `key`.
    ///
    /// A session that polled before also receives remove markers for the
    /// removals it missed, ahead of the document itself.
    pub async fn poll(&self, key: &str) -> PollReply {
        let mut state = self.state.write().await;
        let now = Instant::now();
        state.expire(self.ttl, now);

        let version = state.version;
        let Some(entry) = state.sessions.get_mut(key) else {
            return PollReply::Unknown;
        };
        entry.last_contact = now;
        if entry.seen == Some(version) {
            return PollReply::Unchanged;
        }
        let since = entry.seen.replace(version);

        let mut reply = Document::new();
        if let Some(since) = since {
            reply.elements = state.removals_since(since);
        }
        reply.elements.extend(state.document.elements.iter().cloned());
        state.compact();
        PollReply::Updated(reply)
    }

    /// Fold a pushed document into the authoritative one.
    ///
    /// Elements removed by a session's peers are not recreated from a push sent
    /// before that session saw the removal. Returns `None` for an unknown
    /// session, otherwise whether the document changed.
    pub async fn push(&self, key: &str, document: &Document) -> Option<bool> {
        let mut state = self.state.write().await;
        let now = Instant::now();
        state.expire(self.ttl, now);

        let entry = state.sessions.get_mut(key)?;
        entry.last_contact = now;
        let seen = entry.seen.unwrap_or(0);

        let ServerState {
            document: current,
            version,
            tombstones,
            ..
        } = &mut *state;
        let report = current.merge_with(document, |path| {
            tombstones
                .iter()
                .any(|t| t.version > seen && t.author != key && t.path == *path)
        });
        if !report.skipped.is_empty() {
            debug!(%key, skipped = report.skipped.len(), "ignored stale elements");
        }
        if report.changed {
            *version += 1;
            tombstones.retain(|t| !report.created.contains(&t.path));
            tombstones.extend(report.removed.iter().map(|path| Tombstone {
                version: *version,
                path: path.clone(),
                author: key.to_string(),
            }));
        }
        debug!(%key, changed = report.changed, version = *version, "applied push");
        Some(report.changed)
    }

    /// Current document version.
    pub async fn version(&self) -> u64 {
        self.state.read().await.version
    }

    /// Get the number of active sessions
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use treesync::{Session, events::Topic};

    use super::*;

    fn score(value: &str) -> Document {
        Document::new().with_element(Element::new("Score").with_value(Some(value)))
    }

    #[tokio::test]
    async fn test_poll_cycle() {
        let store = SessionStore::new(None);
        let key = store.create_session().await;

        assert_eq!(
            store.poll(key.as_str()).await,
            PollReply::Updated(Document::new())
        );
        assert_eq!(store.poll(key.as_str()).await, PollReply::Unchanged);

        assert_eq!(store.push(key.as_str(), &score("5")).await, Some(true));
        assert_eq!(store.version().await, 2);
        assert_eq!(store.poll(key.as_str()).await, PollReply::Updated(score("5")));

        assert_eq!(store.push(key.as_str(), &score("5")).await, Some(false));
        assert_eq!(store.poll(key.as_str()).await, PollReply::Unchanged);
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let store = SessionStore::new(None);
        assert_eq!(store.poll("nope").await, PollReply::Unknown);
        assert_eq!(store.push("nope", &score("1")).await, None);
        assert_eq!(store.version().await, 1);
    }

    async fn push_all(store: &SessionStore, key: &SessionKey, session: &mut Session) {
        for document in session.take_pushes() {
            store.push(key.as_str(), &document).await.unwrap();
        }
    }

    async fn poll_into(store: &SessionStore, key: &SessionKey, session: &mut Session) {
        if let PollReply::Updated(document) = store.poll(key.as_str()).await {
            session.apply(&document).unwrap();
        }
    }

    #[tokio::test]
    async fn test_removal_reaches_other_sessions() {
        let store = SessionStore::new(None);
        let (key_a, key_b) = (store.create_session().await, store.create_session().await);
        let (mut a, mut b) = (Session::new(), Session::new());

        a.set("Team(1).Score", Some("5")).unwrap();
        push_all(&store, &key_a, &mut a).await;
        poll_into(&store, &key_b, &mut b).await;
        assert_eq!(b.get("Team(1).Score").unwrap().as_deref(), Some("5"));

        let removed = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = removed.clone();
        b.subscribe("", Topic::Remove, move |e| {
            sink.lock().unwrap().push(e.to_string());
        });

        a.remove("Team(1)").unwrap();
        push_all(&store, &key_a, &mut a).await;

        // B writes before hearing about the removal; its snapshot still holds Team(1).
        b.set("Other", Some("1")).unwrap();
        push_all(&store, &key_b, &mut b).await;

        poll_into(&store, &key_b, &mut b).await;
        assert_eq!(b.find("Team(1)").unwrap(), None);
        assert_eq!(*removed.lock().unwrap(), vec!["remove Team(1)"]);
        assert_eq!(b.get("Other").unwrap().as_deref(), Some("1"));

        // Once seen, the path can be created again on purpose.
        b.set("Team(1).Score", Some("9")).unwrap();
        push_all(&store, &key_b, &mut b).await;
        let mut c = Session::new();
        let key_c = store.create_session().await;
        poll_into(&store, &key_c, &mut c).await;
        assert_eq!(c.get("Team(1).Score").unwrap().as_deref(), Some("9"));

        poll_into(&store, &key_b, &mut b).await;
        assert_eq!(b.get("Team(1).Score").unwrap().as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn test_tombstones_are_compacted() {
        let store = SessionStore::new(None);
        let key = store.create_session().await;
        store.push(key.as_str(), &score("5")).await;
        store.poll(key.as_str()).await;

        let removal = Document::new().with_element(Element::new("Score").removed());
        assert_eq!(store.push(key.as_str(), &removal).await, Some(true));
        assert_eq!(store.state.read().await.tombstones.len(), 1);

        match store.poll(key.as_str()).await {
            PollReply::Updated(document) => assert_eq!(document.elements, vec![Element::new("Score").removed()]),
            other => panic!("expected an update, got {other:?}"),
        }
        assert!(store.state.read().await.tombstones.is_empty());
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let store = SessionStore::new(Some(Duration::ZERO));
        let key = store.create_session().await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(store.poll(key.as_str()).await, PollReply::Unknown);
        assert_eq!(store.session_count().await, 0);
    }
}
