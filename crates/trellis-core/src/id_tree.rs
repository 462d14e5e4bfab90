//! Node Arena
//!
//! Flat, index-addressed tree. Nodes never hold pointers to each other: every
//! link is an `Option<NodeId>` into the same `Vec`, so traversal can't dangle.

use std::fmt;
use std::ops::{Index, IndexMut};

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Root node ID
    pub const ROOT: NodeId = NodeId(0);

    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }

    fn offset(self, by: usize) -> Self {
        Self(self.0 + by)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hierarchy links of one node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub previous_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub first_child: Option<NodeId>,
    /// Last child (for O(1) append)
    pub last_child: Option<NodeId>,
}

impl Node {
    fn rebased(self, by: usize) -> Self {
        Self {
            parent: self.parent.map(|n| n.offset(by)),
            previous_sibling: self.previous_sibling.map(|n| n.offset(by)),
            next_sibling: self.next_sibling.map(|n| n.offset(by)),
            first_child: self.first_child.map(|n| n.offset(by)),
            last_child: self.last_child.map(|n| n.offset(by)),
        }
    }
}

/// Per-node storage indexed by `NodeId`, parallel to a `NodeHierarchy`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDataContainer<T> {
    internal: Vec<T>,
}

impl<T> NodeDataContainer<T> {
    pub fn new(internal: Vec<T>) -> Self {
        Self { internal }
    }

    pub fn len(&self) -> usize {
        self.internal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.internal.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.internal.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.internal.get_mut(id.0)
    }

    pub fn push(&mut self, value: T) -> NodeId {
        self.internal.push(value);
        NodeId(self.internal.len() - 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.internal.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.internal.iter_mut()
    }

    pub fn enumerate(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.internal.iter().enumerate().map(|(i, v)| (NodeId(i), v))
    }

    pub fn append(&mut self, other: NodeDataContainer<T>) {
        self.internal.extend(other.internal);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.internal
    }

    pub fn transform<U>(&self, mut f: impl FnMut(&T, NodeId) -> U) -> NodeDataContainer<U> {
        NodeDataContainer { internal: self.internal.iter().enumerate().map(|(i, v)| f(v, NodeId(i))).collect() }
    }
}

impl<T> Index<NodeId> for NodeDataContainer<T> {
    type Output = T;

    fn index(&self, id: NodeId) -> &T {
        &self.internal[id.0]
    }
}

impl<T> IndexMut<NodeId> for NodeDataContainer<T> {
    fn index_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.internal[id.0]
    }
}

/// The link records of an arena
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeHierarchy {
    nodes: Vec<Node>,
}

impl NodeHierarchy {
    /// A hierarchy holding a single root
    pub fn new() -> Self {
        Self { nodes: vec![Node::default()] }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn as_slice(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn push_detached(&mut self) -> NodeId {
        self.nodes.push(Node::default());
        NodeId(self.nodes.len() - 1)
    }

    /// Link `child` (which must be parentless) as the last child of `parent`
    pub(crate) fn link_last_child(&mut self, parent: NodeId, child: NodeId) {
        let previous_last = self.nodes[parent.0].last_child;

        {
            let c = &mut self.nodes[child.0];
            c.parent = Some(parent);
            c.previous_sibling = previous_last;
            c.next_sibling = None;
        }

        match previous_last {
            Some(last) => self.nodes[last.0].next_sibling = Some(child),
            None => self.nodes[parent.0].first_child = Some(child),
        }
        self.nodes[parent.0].last_child = Some(child);
    }

    /// Move `other`'s nodes to the end of this arena, returning the index shift
    pub(crate) fn append_rebased(&mut self, other: NodeHierarchy) -> usize {
        let offset = self.nodes.len();
        self.nodes.extend(other.nodes.into_iter().map(|n| n.rebased(offset)));
        offset
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.first_child)
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.last_child)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.next_sibling)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.previous_sibling)
    }

    /// Direct children in order
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children { hierarchy: self, next: self.first_child(id) }
    }

    /// Parent, grandparent, ... (excluding `id`)
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors { hierarchy: self, next: self.parent(id) }
    }

    /// `id` followed by its ancestors, the order events bubble in
    pub fn bubble_path(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(id).filter(|id| self.contains(*id)).chain(self.ancestors(id))
    }

    /// Pre-order traversal of the subtree rooted at `id`
    pub fn depth_first(&self, id: NodeId) -> DepthFirst<'_> {
        DepthFirst { hierarchy: self, root: id, next: self.contains(id).then_some(id) }
    }

    /// Number of ancestors
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// 0-based position among siblings
    pub fn index_in_parent(&self, id: NodeId) -> usize {
        let mut index = 0;
        let mut current = self.previous_sibling(id);
        while let Some(prev) = current {
            index += 1;
            current = self.previous_sibling(prev);
        }
        index
    }

    /// Every node: the tree under `ROOT` first, then detached subtrees by index
    pub fn document_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            if node.parent.is_none() {
                order.extend(self.depth_first(NodeId(i)));
            }
        }
        order
    }
}

pub struct Children<'a> {
    hierarchy: &'a NodeHierarchy,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.hierarchy.next_sibling(current);
        Some(current)
    }
}

pub struct Ancestors<'a> {
    hierarchy: &'a NodeHierarchy,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.hierarchy.parent(current);
        Some(current)
    }
}

pub struct DepthFirst<'a> {
    hierarchy: &'a NodeHierarchy,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for DepthFirst<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        let h = self.hierarchy;
        let root = self.root;

        self.next = h.first_child(current).or_else(|| {
            let mut node = current;
            loop {
                if node == root {
                    return None;
                }
                if let Some(sibling) = h.next_sibling(node) {
                    return Some(sibling);
                }
                node = h.parent(node)?;
            }
        });

        Some(current)
    }
}
