//! Path resolution against the local tree.
//!
//! [`resolve`] walks a [`Tree`] from a starting node along a list of steps.
//! Depending on the [`ResolveMode`] missing nodes are either reported or
//! created. A lookup that fails never touches the tree.

use tracing::debug;

use crate::{
    outbox::Outbox,
    path::Step,
    tree::{NodeId, Tree, TreeError},
};

/// How [`resolve`] treats missing nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Stop at the first missing node and report not-found.
    Lookup,
    /// Create missing nodes on behalf of the client and queue a push.
    Create,
    /// Create missing nodes while applying a server snapshot; nothing is pushed.
    CreateFromServer,
}

impl ResolveMode {
    pub fn creates(self) -> bool {
        !matches!(self, ResolveMode::Lookup)
    }

    /// Whether creations in this mode must be echoed to the server.
    pub fn pushes(self) -> bool {
        matches!(self, ResolveMode::Create)
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// The terminal node, or `None` when a lookup failed.
    pub node: Option<NodeId>,
    /// Nodes created along the way, outermost first.
    pub created: Vec<NodeId>,
}

impl Resolution {
    pub fn found(&self) -> bool {
        self.node.is_some()
    }
}

/// Resolve `steps` starting from `start`.
///
/// An empty step list resolves to `start` itself. Created nodes start out
/// unset. In [`ResolveMode::Create`] a snapshot of the whole tree is queued on
/// `outbox` once, after the walk, if anything was created.
pub fn resolve(
    tree: &mut Tree,
    outbox: &mut Outbox,
    start: NodeId,
    steps: &[Step],
    mode: ResolveMode,
) -> Result<Resolution, TreeError> {
    if !tree.contains(start) {
        return Err(TreeError::NodeNotFound(start));
    }

    let mut current = start;
    let mut created = Vec::new();
    for step in steps {
        current = match tree.find_child(current, step.name(), step.id()) {
            Some(child) => child,
            None if mode.creates() => {
                let child = tree.create_child(current, step.name(), step.id(), None)?;
                created.push(child);
                child
            }
            None => {
                return Ok(Resolution {
                    node: None,
                    created,
                });
            }
        };
    }

    if mode.pushes() && !created.is_empty() {
        debug!(created = created.len(), "queueing push for client-created nodes");
        outbox.enqueue(tree.to_document());
    }

    Ok(Resolution {
        node: Some(current),
        created,
    })
}
