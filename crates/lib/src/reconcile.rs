//! Reconciliation of incoming snapshots against the local tree.
//!
//! A reconciliation pass applies one top-level element of a server document to
//! the tree and returns the notifications it produced, in dispatch order. The
//! tree is fully updated before the caller sees any of them.
//!
//! While recursing, the pass records one trigger per visited element:
//!
//! - an upsert trigger (parent first, then children in document order) that
//!   may carry a content change, and
//! - a removal trigger for every node detached by a remove marker, descendants
//!   first.
//!
//! When the recursion completes the triggers are flushed in recorded order. An
//! upsert fires `add` on the parent only the first time its path is seen in the
//! session; a removal forgets the path again so a recreated node re-fires `add`.

use std::{collections::HashSet, slice};

use tracing::{debug, trace};

use crate::{
    Result,
    document::Element,
    events::{Event, NodeInfo},
    outbox::Outbox,
    path::Path,
    resolver::{ResolveMode, resolve},
    tree::{NodeId, Tree, TreeError},
};

/// Paths whose `add` notification has already fired this session.
///
/// Keyed by the structured path rather than its rendering, since server names
/// and ids are not restricted to what the path syntax can express.
#[derive(Debug, Default, Clone)]
pub struct AddedPaths {
    paths: HashSet<Path>,
}

impl AddedPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Record `path`; returns `true` if it was not recorded before.
    pub fn mark(&mut self, path: &Path) -> bool {
        self.paths.insert(path.clone())
    }

    pub fn forget(&mut self, path: &Path) -> bool {
        self.paths.remove(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }
}

/// Buffered notification awaiting the end of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Trigger {
    Upsert {
        key: Path,
        node: NodeInfo,
        parent: String,
        change: Option<(Option<String>, String)>,
    },
    Removed {
        key: Path,
        node: NodeInfo,
        parent: String,
    },
}

pub(crate) fn node_info(tree: &Tree, node: NodeId) -> Result<NodeInfo> {
    let current = tree.get(node).ok_or(TreeError::NodeNotFound(node))?;
    let path = tree.path(node).ok_or(TreeError::NodeNotFound(node))?;
    Ok(NodeInfo {
        path: path.to_string(),
        name: current.name().to_string(),
        id: current.id().map(str::to_string),
    })
}

pub(crate) fn parent_path(tree: &Tree, node: NodeId) -> Result<String> {
    let parent = tree.parent(node).ok_or(TreeError::RootRemoval)?;
    let path = tree.path(parent).ok_or(TreeError::NodeNotFound(parent))?;
    Ok(path.to_string())
}

/// Applies snapshot elements to a tree.
pub struct Synchronizer<'a> {
    tree: &'a mut Tree,
    outbox: &'a mut Outbox,
    added: &'a mut AddedPaths,
    triggers: Vec<Trigger>,
}

impl<'a> Synchronizer<'a> {
    pub fn new(tree: &'a mut Tree, outbox: &'a mut Outbox, added: &'a mut AddedPaths) -> Self {
        Self {
            tree,
            outbox,
            added,
            triggers: Vec::new(),
        }
    }

    /// Run one reconciliation pass of `incoming` below `context`.
    ///
    /// Returns the notifications of the pass in dispatch order.
    pub fn reconcile(&mut self, context: NodeId, incoming: &Element) -> Result<Vec<Event>> {
        self.triggers.clear();
        self.process(context, incoming)?;
        let events = self.flush();
        debug!(
            element = %incoming.step(),
            events = events.len(),
            "reconciled element"
        );
        Ok(events)
    }

    fn process(&mut self, parent: NodeId, element: &Element) -> Result<()> {
        let step = element.step();

        if element.remove {
            let found = resolve(
                self.tree,
                self.outbox,
                parent,
                slice::from_ref(&step),
                ResolveMode::Lookup,
            )?;
            let Some(node) = found.node else {
                trace!(%step, "remove marker for missing node ignored");
                return Ok(());
            };
            for removed in self.tree.remove_subtree(node)? {
                self.triggers.push(Trigger::Removed {
                    key: removed.path.clone(),
                    node: NodeInfo {
                        path: removed.path.to_string(),
                        name: removed.name,
                        id: removed.id,
                    },
                    parent: removed.parent_path.to_string(),
                });
            }
            return Ok(());
        }

        let node = resolve(
            self.tree,
            self.outbox,
            parent,
            slice::from_ref(&step),
            ResolveMode::CreateFromServer,
        )?
        .node
        .ok_or(TreeError::NodeNotFound(parent))?;

        let mut change = None;
        if let Some(new) = element.value() {
            let old = self.tree.text(node).map(str::to_string);
            if old.as_deref() != Some(new) {
                self.tree.set_text(node, Some(new))?;
                change = Some((old, new.to_string()));
            }
        }

        self.triggers.push(Trigger::Upsert {
            key: self.tree.path(node).ok_or(TreeError::NodeNotFound(node))?,
            node: node_info(self.tree, node)?,
            parent: parent_path(self.tree, node)?,
            change,
        });

        for child in &element.children {
            self.process(node, child)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        for trigger in self.triggers.drain(..) {
            match trigger {
                Trigger::Upsert {
                    key,
                    node,
                    parent,
                    change,
                } => {
                    if self.added.mark(&key) {
                        events.push(Event::Added {
                            parent,
                            node: node.clone(),
                        });
                    }
                    if let Some((old, new)) = change {
                        events.push(Event::Content {
                            node,
                            new: Some(new),
                            old,
                        });
                    }
                }
                Trigger::Removed { key, node, parent } => {
                    self.added.forget(&key);
                    events.push(Event::Removed { parent, node });
                }
            }
        }
        events
    }
}
