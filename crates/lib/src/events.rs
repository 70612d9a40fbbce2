//! Synchronous notification dispatch.
//!
//! Observers subscribe to a [`Topic`] on a node path. Add and remove events are
//! fired on the parent of the affected node, first under the generic topic
//! (`add`) and then under the name-scoped one (`add:<name>`). Content events are
//! fired on the node itself. The load event is fired once on the root (the empty
//! path) after the first server snapshot has been applied.
//!
//! Handlers run synchronously on the dispatching thread, in subscription order.
//! The bus does not hold its lock while calling them, so a handler may
//! subscribe or unsubscribe.

use std::{
    fmt,
    str::FromStr,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::trace;

/// What an observer listens for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Any child added to the subscribed node.
    Add,
    /// A child with the given name added to the subscribed node.
    AddNamed(String),
    /// Any child removed from the subscribed node.
    Remove,
    /// A child with the given name removed from the subscribed node.
    RemoveNamed(String),
    /// The subscribed node's value changed.
    Content,
    /// The first snapshot has been applied. Only fired on the root.
    Load,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Add => f.write_str("add"),
            Topic::AddNamed(name) => write!(f, "add:{name}"),
            Topic::Remove => f.write_str("remove"),
            Topic::RemoveNamed(name) => write!(f, "remove:{name}"),
            Topic::Content => f.write_str("content"),
            Topic::Load => f.write_str("load"),
        }
    }
}

/// Error returned when a topic string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown event topic '{0}'")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None => match s {
                "add" => Ok(Topic::Add),
                "remove" => Ok(Topic::Remove),
                "content" => Ok(Topic::Content),
                "load" => Ok(Topic::Load),
                _ => Err(UnknownTopic(s.to_string())),
            },
            Some(("add", name)) if !name.is_empty() => Ok(Topic::AddNamed(name.to_string())),
            Some(("remove", name)) if !name.is_empty() => {
                Ok(Topic::RemoveNamed(name.to_string()))
            }
            Some(_) => Err(UnknownTopic(s.to_string())),
        }
    }
}

/// Descriptor of the node an event is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub path: String,
    pub name: String,
    pub id: Option<String>,
}

impl NodeInfo {
    /// `name(id)`, or just `name` without an id.
    pub fn full_name(&self) -> String {
        match &self.id {
            Some(id) => format!("{}({id})", self.name),
            None => self.name.clone(),
        }
    }
}

/// A notification delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Added {
        parent: String,
        node: NodeInfo,
    },
    Removed {
        parent: String,
        node: NodeInfo,
    },
    Content {
        node: NodeInfo,
        new: Option<String>,
        old: Option<String>,
    },
    Loaded,
}

impl Event {
    /// Path of the node the event is fired on.
    pub fn target(&self) -> &str {
        match self {
            Event::Added { parent, .. } | Event::Removed { parent, .. } => parent,
            Event::Content { node, .. } => &node.path,
            Event::Loaded => "",
        }
    }

    /// Topics this event is delivered under, in delivery order.
    pub fn topics(&self) -> Vec<Topic> {
        match self {
            Event::Added { node, .. } => vec![Topic::Add, Topic::AddNamed(node.name.clone())],
            Event::Removed { node, .. } => {
                vec![Topic::Remove, Topic::RemoveNamed(node.name.clone())]
            }
            Event::Content { .. } => vec![Topic::Content],
            Event::Loaded => vec![Topic::Load],
        }
    }

    /// The node the event is about, if any.
    pub fn node(&self) -> Option<&NodeInfo> {
        match self {
            Event::Added { node, .. } | Event::Removed { node, .. } | Event::Content { node, .. } => {
                Some(node)
            }
            Event::Loaded => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Added { node, .. } => write!(f, "add {}", node.path),
            Event::Removed { node, .. } => write!(f, "remove {}", node.path),
            Event::Content { node, new, old } => write!(
                f,
                "content {} {:?} -> {:?}",
                node.path,
                old.as_deref(),
                new.as_deref()
            ),
            Event::Loaded => f.write_str("load"),
        }
    }
}

/// Observer callback.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    /// `None` observes every event regardless of target and topic.
    filter: Option<(String, Topic)>,
    handler: Handler,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

/// Per-node notification registry and dispatcher.
#[derive(Default)]
pub struct EventBus {
    state: RwLock<BusState>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, filter: Option<(String, Topic)>, handler: Handler) -> SubscriptionId {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.subscriptions.push(Subscription {
            id,
            filter,
            handler,
        });
        id
    }

    /// Subscribe `handler` to `topic` on the node at `path` (`""` is the root).
    pub fn subscribe<F>(&self, path: impl Into<String>, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.add(Some((path.into(), topic)), Arc::new(handler))
    }

    /// Subscribe `handler` to every event on every node.
    pub fn observe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.add(None, Arc::new(handler))
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.id != id);
        state.subscriptions.len() != before
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscriptions
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every matching handler.
    ///
    /// Targeted handlers run first, topic by topic in [`Event::topics`] order;
    /// observers registered with [`observe`](Self::observe) run last.
    pub fn dispatch(&self, event: &Event) {
        let handlers: Vec<Handler> = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let target = event.target();
            let mut matched = Vec::new();
            for topic in event.topics() {
                matched.extend(
                    state
                        .subscriptions
                        .iter()
                        .filter(|s| {
                            s.filter
                                .as_ref()
                                .is_some_and(|(path, t)| path == target && *t == topic)
                        })
                        .map(|s| s.handler.clone()),
                );
            }
            matched.extend(
                state
                    .subscriptions
                    .iter()
                    .filter(|s| s.filter.is_none())
                    .map(|s| s.handler.clone()),
            );
            matched
        };

        trace!(%event, handlers = handlers.len(), "dispatching event");
        for handler in handlers {
            handler(event);
        }
    }
}
