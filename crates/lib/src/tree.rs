//! In-memory hierarchical node store.
//!
//! The [`Tree`] owns every node of the local document. Nodes are addressed by
//! [`NodeId`] handles which stay valid until the node is removed; ids are never
//! reused within a tree, so a stale handle simply stops resolving.
//!
//! Each node carries a name, an optional id, a three-state [`NodeValue`] and an
//! ordered list of children. Value and children are independent of each other.

use std::collections::HashMap;

use thiserror::Error;
use tracing::trace;

use crate::{
    constants::ROOT_NAME,
    document::{Document, Element},
    path::{Path, Step},
};

/// Structured errors for tree operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TreeError {
    /// The handle does not refer to a live node of this tree.
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// The root anchor cannot be removed.
    #[error("The root node cannot be removed")]
    RootRemoval,
}

impl TreeError {
    /// Check if this error indicates a missing node.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TreeError::NodeNotFound(_))
    }
}

impl From<TreeError> for crate::Error {
    fn from(err: TreeError) -> Self {
        crate::Error::Tree(err)
    }
}

/// Handle to a node of a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Three-state text content of a node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeValue {
    /// Never assigned.
    #[default]
    Unset,
    /// Explicitly set to the empty string.
    Empty,
    /// Non-empty text.
    Text(String),
}

impl NodeValue {
    /// Maps `None` to unset, `Some("")` to empty and anything else to text.
    pub fn from_text(text: Option<&str>) -> Self {
        match text {
            None => NodeValue::Unset,
            Some("") => NodeValue::Empty,
            Some(text) => NodeValue::Text(text.to_string()),
        }
    }

    /// The value as text: `None` when unset, `Some("")` when explicitly empty.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            NodeValue::Unset => None,
            NodeValue::Empty => Some(""),
            NodeValue::Text(text) => Some(text),
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, NodeValue::Unset)
    }
}

/// One node of the tree.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    id: Option<String>,
    value: NodeValue,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(name: &str, id: Option<&str>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            id: id.map(str::to_string),
            value: NodeValue::Unset,
            parent,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn value(&self) -> &NodeValue {
        &self.value
    }

    /// The parent handle; `None` only for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The `(name, id)` step that addresses this node from its parent.
    pub fn step(&self) -> Step {
        Step::from_parts(&self.name, self.id.as_deref())
    }

    /// `name(id)`, or just `name` without an id.
    pub fn full_name(&self) -> String {
        self.step().to_string()
    }

    fn matches(&self, name: &str, id: Option<&str>) -> bool {
        self.name == name && self.id.as_deref() == id
    }
}

/// A node detached by [`Tree::remove_subtree`], captured before detaching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedNode {
    pub node: NodeId,
    pub name: String,
    pub id: Option<String>,
    pub path: Path,
    pub parent: NodeId,
    pub parent_path: Path,
}

/// The local document: a fixed root anchor and everything below it.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_id: u64,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Creates a tree holding only the root anchor.
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::new(ROOT_NAME, None, None));
        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes below the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Returns `true` if only the root is present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn get(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(&node)
    }

    fn node(&self, node: NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(&node).ok_or(TreeError::NodeNotFound(node))
    }

    fn node_mut(&mut self, node: NodeId) -> Result<&mut Node, TreeError> {
        self.nodes
            .get_mut(&node)
            .ok_or(TreeError::NodeNotFound(node))
    }

    /// Children of `node` in document order; empty for a missing node.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(&node).map_or(&[][..], Node::children)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(Node::parent)
    }

    /// Finds the child of `parent` identified by `(name, id)`.
    ///
    /// `id == None` matches only children without an id; `Some(v)` matches only
    /// the child whose id equals `v` exactly.
    pub fn find_child(&self, parent: NodeId, name: &str, id: Option<&str>) -> Option<NodeId> {
        self.nodes.get(&parent)?.children.iter().copied().find(|c| {
            self.nodes
                .get(c)
                .is_some_and(|child| child.matches(name, id))
        })
    }

    /// Appends a new child to `parent` with the given initial value.
    ///
    /// The caller is responsible for `(name, id)` uniqueness; the resolver only
    /// creates after a failed [`find_child`](Self::find_child).
    pub fn create_child(
        &mut self,
        parent: NodeId,
        name: &str,
        id: Option<&str>,
        text: Option<&str>,
    ) -> Result<NodeId, TreeError> {
        self.node(parent)?;
        let child = NodeId(self.next_id);
        self.next_id += 1;

        let mut node = Node::new(name, id, Some(parent));
        node.value = NodeValue::from_text(text);
        self.nodes.insert(child, node);
        self.node_mut(parent)?.children.push(child);
        trace!(?child, name, id, "created node");
        Ok(child)
    }

    /// Current value of `node`; `None` for a missing node.
    pub fn value(&self, node: NodeId) -> Option<&NodeValue> {
        self.nodes.get(&node).map(Node::value)
    }

    /// Current text of `node`: `None` when unset (or missing), `Some("")` when
    /// explicitly empty.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.value(node).and_then(NodeValue::as_text)
    }

    /// Sets the text of `node`, returning the previous value.
    pub fn set_text(&mut self, node: NodeId, text: Option<&str>) -> Result<NodeValue, TreeError> {
        let node = self.node_mut(node)?;
        Ok(std::mem::replace(
            &mut node.value,
            NodeValue::from_text(text),
        ))
    }

    /// Route from the root to `node`. The root's path is empty.
    pub fn path(&self, node: NodeId) -> Option<Path> {
        let mut steps = Vec::new();
        let mut current = self.nodes.get(&node)?;
        while let Some(parent) = current.parent {
            steps.push(current.step());
            current = self.nodes.get(&parent)?;
        }
        steps.reverse();
        Some(Path::from_steps(steps))
    }

    /// Removes `node` and all of its descendants.
    ///
    /// Descendants are removed first (post-order); the returned list is in
    /// removal order, so `node` itself is last.
    pub fn remove_subtree(&mut self, node: NodeId) -> Result<Vec<RemovedNode>, TreeError> {
        if node == self.root {
            return Err(TreeError::RootRemoval);
        }
        self.node(node)?;

        let mut removed = Vec::new();
        self.collect_removal(node, &mut removed)?;

        for entry in &removed {
            self.nodes.remove(&entry.node);
        }
        let parent = removed
            .last()
            .map(|r| r.parent)
            .ok_or(TreeError::NodeNotFound(node))?;
        self.node_mut(parent)?.children.retain(|c| *c != node);

        trace!(?node, count = removed.len(), "removed subtree");
        Ok(removed)
    }

    fn collect_removal(&self, node: NodeId, out: &mut Vec<RemovedNode>) -> Result<(), TreeError> {
        let current = self.node(node)?;
        for child in &current.children {
            self.collect_removal(*child, out)?;
        }
        let parent = current.parent.ok_or(TreeError::RootRemoval)?;
        out.push(RemovedNode {
            node,
            name: current.name.clone(),
            id: current.id.clone(),
            path: self.path(node).ok_or(TreeError::NodeNotFound(node))?,
            parent,
            parent_path: self.path(parent).ok_or(TreeError::NodeNotFound(parent))?,
        });
        Ok(())
    }

    /// Drops every node except the root.
    pub fn clear(&mut self) {
        let root = self.root;
        self.nodes.retain(|id, _| *id == root);
        if let Some(root) = self.nodes.get_mut(&root) {
            root.children.clear();
            root.value = NodeValue::Unset;
        }
    }

    /// Renders `node` and its subtree as a wire element.
    pub fn to_element(&self, node: NodeId) -> Option<Element> {
        let current = self.nodes.get(&node)?;
        let mut element = Element::new(&current.name);
        element.id = current.id.clone();
        element.set_value(current.value.as_text());
        element.children = current
            .children
            .iter()
            .filter_map(|c| self.to_element(*c))
            .collect();
        Some(element)
    }

    /// Renders the whole tree as a wire document.
    pub fn to_document(&self) -> Document {
        Document {
            elements: self
                .children(self.root)
                .iter()
                .filter_map(|c| self.to_element(*c))
                .collect(),
        }
    }
}
