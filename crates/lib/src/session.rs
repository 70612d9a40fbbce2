//! The registered relationship between a local tree and the server's copy.
//!
//! A [`Session`] owns everything that lives for one server registration: the
//! tree, the set of paths whose `add` already fired, the outbound push queue
//! and the load flag. The [`EventBus`] is shared and survives a
//! [`reset`](Session::reset), so observers stay attached across sessions.
//!
//! All operations here are synchronous. Notifications are dispatched after the
//! tree mutation that caused them has completed.
//!
//! ```rust
//! use treesync::{Session, document::{Document, Element}, events::Topic};
//!
//! let mut session = Session::new();
//! session.subscribe("", Topic::AddNamed("Team".into()), |event| {
//!     println!("{event}");
//! });
//!
//! session.apply(&Document::new().with_element(
//!     Element::new("Team").with_id("1").with_child(Element::new("Score").with_value(Some("5"))),
//! ))?;
//! assert_eq!(session.get("Team(1).Score")?.as_deref(), Some("5"));
//! # Ok::<(), treesync::Error>(())
//! ```

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    Result,
    document::{Document, Element},
    events::{Event, EventBus, NodeInfo, SubscriptionId, Topic},
    outbox::Outbox,
    path::Path,
    reconcile::{AddedPaths, Synchronizer, node_info, parent_path},
    resolver::{ResolveMode, resolve},
    tree::{NodeId, Tree, TreeError},
};

/// Key issued by the server on registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Case-insensitive `"true"` check used for boolean node values.
pub fn is_true(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

/// Local state of one registered session.
#[derive(Debug)]
pub struct Session {
    key: Option<SessionKey>,
    tree: Tree,
    added: AddedPaths,
    outbox: Outbox,
    bus: Arc<EventBus>,
    loaded: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates an unregistered session with its own event bus.
    pub fn new() -> Self {
        Self::with_bus(Arc::new(EventBus::new()))
    }

    /// Creates an unregistered session dispatching through `bus`.
    pub fn with_bus(bus: Arc<EventBus>) -> Self {
        Self {
            key: None,
            tree: Tree::new(),
            added: AddedPaths::new(),
            outbox: Outbox::new(),
            bus,
            loaded: false,
        }
    }

    pub fn key(&self) -> Option<&SessionKey> {
        self.key.as_ref()
    }

    /// Attach the key issued by the server.
    pub fn set_key(&mut self, key: SessionKey) {
        self.key = Some(key);
    }

    pub fn is_registered(&self) -> bool {
        self.key.is_some()
    }

    /// Whether a server snapshot has been applied since the last reset.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Subscribe to `topic` on the node at `path` (`""` is the root).
    pub fn subscribe<F>(&self, path: impl Into<String>, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.bus.subscribe(path, topic, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    fn dispatch(&self, events: &[Event]) {
        for event in events {
            self.bus.dispatch(event);
        }
    }

    /// Describe the node behind `node`.
    pub fn info(&self, node: NodeId) -> Result<NodeInfo> {
        node_info(&self.tree, node)
    }

    /// Look up `path` without creating anything.
    pub fn find(&self, path: &str) -> Result<Option<NodeId>> {
        Ok(self.find_at(&Path::parse(path)?))
    }

    fn find_at(&self, path: &Path) -> Option<NodeId> {
        let mut current = self.tree.root();
        for step in path {
            match self.tree.find_child(current, step.name(), step.id()) {
                Some(child) => current = child,
                None => return None,
            }
        }
        Some(current)
    }

    /// Resolve `path`, creating missing nodes on behalf of the client.
    ///
    /// Newly created nodes fire `add` right away and queue one push of the whole
    /// document.
    pub fn node(&mut self, path: &str) -> Result<NodeId> {
        let path = Path::parse(path)?;
        self.node_at(&path)
    }

    fn node_at(&mut self, path: &Path) -> Result<NodeId> {
        let root = self.tree.root();
        let resolution = resolve(
            &mut self.tree,
            &mut self.outbox,
            root,
            path,
            ResolveMode::Create,
        )?;
        let node = resolution.node.ok_or(TreeError::NodeNotFound(root))?;

        let mut events = Vec::new();
        for created in &resolution.created {
            let key = self
                .tree
                .path(*created)
                .ok_or(TreeError::NodeNotFound(*created))?;
            if self.added.mark(&key) {
                let info = node_info(&self.tree, *created)?;
                events.push(Event::Added {
                    parent: parent_path(&self.tree, *created)?,
                    node: info,
                });
            }
        }
        self.dispatch(&events);
        Ok(node)
    }

    /// Current value at `path`, without creating anything.
    ///
    /// Returns `None` both for a missing node and for an unset value.
    pub fn get(&self, path: &str) -> Result<Option<String>> {
        Ok(self
            .find(path)?
            .and_then(|node| self.tree.text(node))
            .map(str::to_string))
    }

    /// Whether the value at `path` equals `value`.
    pub fn is(&self, path: &str, value: &str) -> Result<bool> {
        Ok(self.get(path)?.as_deref() == Some(value))
    }

    /// Whether the value at `path` reads as boolean true.
    pub fn is_true(&self, path: &str) -> Result<bool> {
        Ok(is_true(self.get(path)?.as_deref()))
    }

    /// Set the value at `path`, creating the node if needed.
    ///
    /// The change is applied locally (firing `content` if the value differs)
    /// and a full-document push is queued.
    pub fn set(&mut self, path: &str, value: Option<&str>) -> Result<NodeId> {
        let path = Path::parse(path)?;
        let node = self.node_at(&path)?;

        let old = self.tree.set_text(node, value)?;
        if old.as_text() != value {
            let event = Event::Content {
                node: node_info(&self.tree, node)?,
                new: value.map(str::to_string),
                old: old.as_text().map(str::to_string),
            };
            self.dispatch(&[event]);
        }

        self.outbox.enqueue(self.tree.to_document());
        debug!(path = %path, "queued set");
        Ok(node)
    }

    /// Ask the server to apply `delta` to the value at `path`.
    ///
    /// The local value is left alone; the server's answer arrives with the next
    /// poll.
    pub fn change(&mut self, path: &str, delta: &str) -> Result<NodeId> {
        let path = Path::parse(path)?;
        let node = self.node_at(&path)?;

        let mut document = self.tree.to_document();
        if let Some(element) = document.element_at_mut(&path) {
            element.set_value(Some(delta));
            element.change = true;
        }
        self.outbox.enqueue(document);
        debug!(path = %path, delta, "queued change");
        Ok(node)
    }

    /// Remove the node at `path` and everything below it.
    ///
    /// Removal notifications fire descendants first. A remove request is pushed
    /// even if the node is not known locally. Returns whether a local node was
    /// removed.
    pub fn remove(&mut self, path: &str) -> Result<bool> {
        let path = Path::parse(path)?;
        if path.is_empty() {
            return Err(TreeError::RootRemoval.into());
        }

        let mut events = Vec::new();
        if let Some(node) = self.find_at(&path) {
            for removed in self.tree.remove_subtree(node)? {
                self.added.forget(&removed.path);
                let node = NodeInfo {
                    path: removed.path.to_string(),
                    name: removed.name,
                    id: removed.id,
                };
                events.push(Event::Removed {
                    parent: removed.parent_path.to_string(),
                    node,
                });
            }
        }
        let removed = !events.is_empty();
        self.dispatch(&events);

        let mut document = self.tree.to_document();
        if let Some(element) = document.element_at_mut(&path) {
            let step = element.step();
            *element = Element::from_step(&step).removed();
        }
        self.outbox.enqueue(document);
        debug!(path = %path, removed, "queued remove");
        Ok(removed)
    }

    /// Apply a server snapshot: one reconciliation pass per top-level element,
    /// each dispatched as soon as its pass completes. The first applied snapshot
    /// also fires `load` on the root.
    ///
    /// Returns the number of notifications dispatched.
    pub fn apply(&mut self, document: &Document) -> Result<usize> {
        let root = self.tree.root();
        let mut dispatched = 0;
        for element in &document.elements {
            let events = Synchronizer::new(&mut self.tree, &mut self.outbox, &mut self.added)
                .reconcile(root, element)?;
            dispatched += events.len();
            self.dispatch(&events);
        }

        if !self.loaded {
            self.loaded = true;
            info!(nodes = self.tree.len(), "document loaded");
            self.dispatch(&[Event::Loaded]);
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// Snapshot of the whole local tree.
    pub fn snapshot(&self) -> Document {
        self.tree.to_document()
    }

    /// Take every queued push, oldest first.
    pub fn take_pushes(&mut self) -> Vec<Document> {
        self.outbox.drain()
    }

    pub fn pending_pushes(&self) -> usize {
        self.outbox.len()
    }

    /// Discard all session state except the event bus.
    pub fn reset(&mut self) {
        info!(key = ?self.key, "resetting session");
        self.key = None;
        self.tree.clear();
        self.added.clear();
        self.outbox.clear();
        self.loaded = false;
    }

    /// Subscribe `handler` to content changes at `path` and run it once now with
    /// the current value.
    pub fn bind_and_run<F>(&mut self, path: &str, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let node = self.node(path)?;
        let info = node_info(&self.tree, node)?;
        let current = self.tree.text(node).map(str::to_string);
        let handler = Arc::new(handler);

        let subscribed = handler.clone();
        let id = self
            .bus
            .subscribe(info.path.clone(), Topic::Content, move |e| subscribed(e));
        handler(&Event::Content {
            node: info,
            new: current.clone(),
            old: current,
        });
        Ok(id)
    }

    /// Subscribe `add` and `remove` handlers for children named `child` of the
    /// node at `path`, and run `add` once for each such child that already
    /// exists.
    pub fn bind_add_remove_each<A, R>(
        &mut self,
        path: &str,
        child: &str,
        add: A,
        remove: R,
    ) -> Result<(SubscriptionId, SubscriptionId)>
    where
        A: Fn(&Event) + Send + Sync + 'static,
        R: Fn(&Event) + Send + Sync + 'static,
    {
        let parent = self.node(path)?;
        let parent_path = self
            .tree
            .path(parent)
            .ok_or(TreeError::NodeNotFound(parent))?
            .to_string();
        let add = Arc::new(add);

        let existing: Vec<NodeId> = self
            .tree
            .children(parent)
            .iter()
            .copied()
            .filter(|c| self.tree.get(*c).is_some_and(|n| n.name() == child))
            .collect();

        let subscribed = add.clone();
        let add_id = self.bus.subscribe(
            parent_path.clone(),
            Topic::AddNamed(child.to_string()),
            move |e| subscribed(e),
        );
        let remove_id = self.bus.subscribe(
            parent_path.clone(),
            Topic::RemoveNamed(child.to_string()),
            remove,
        );

        for node in existing {
            add(&Event::Added {
                parent: parent_path.clone(),
                node: node_info(&self.tree, node)?,
            });
        }
        Ok((add_id, remove_id))
    }
}
