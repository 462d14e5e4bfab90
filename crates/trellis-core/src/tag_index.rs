//! Tag Index
//!
//! Interactive nodes get a `TagId`; hit-testing and focus only ever look at
//! tagged nodes. The index is built once per `StyledDom` and never patched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::dom::{NodeData, TabIndex};
use crate::events::EventFilter;
use crate::id_tree::{NodeDataContainer, NodeHierarchy, NodeId};
use crate::prop_cache::CssPropertyCache;

static NEXT_TAG_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique tag; a tag from a discarded `StyledDom` never resolves in
/// another one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(u64);

impl TagId {
    fn unique() -> Self {
        Self(NEXT_TAG_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag:{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub node_id: NodeId,
    /// Effective tab index; focus callbacks imply `Auto`
    pub tab_index: Option<TabIndex>,
    /// Ancestors of `node_id`, nearest first
    pub parent_chain: Vec<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
    tags: BTreeMap<TagId, TagEntry>,
    node_to_tag: BTreeMap<NodeId, TagId>,
    tab_order: Vec<NodeId>,
}

impl TagIndex {
    pub(crate) fn build(
        hierarchy: &NodeHierarchy,
        node_data: &NodeDataContainer<NodeData>,
        cache: &CssPropertyCache,
    ) -> Self {
        let mut index = TagIndex::default();
        let mut tab_indices = BTreeMap::new();

        for id in hierarchy.document_order() {
            let data = &node_data[id];
            let has_focus_callbacks = data.has_callbacks_where(|f| matches!(f, EventFilter::Focus(_)));
            let interactive = has_focus_callbacks
                || data.has_callbacks_where(|f| matches!(f, EventFilter::Hover(_) | EventFilter::Not(_) | EventFilter::Window(_)))
                || data.tab_index.is_some()
                || cache.node_styles(id).is_some_and(|s| s.has_state_styles());
            if !interactive {
                continue;
            }

            let tab_index = data.tab_index.or(has_focus_callbacks.then_some(TabIndex::Auto));
            if let Some(t) = tab_index {
                tab_indices.insert(id, t);
            }

            let tag = TagId::unique();
            index.tags.insert(tag, TagEntry { node_id: id, tab_index, parent_chain: hierarchy.ancestors(id).collect() });
            index.node_to_tag.insert(id, tag);
        }

        if !hierarchy.is_empty() {
            collect_tab_order(hierarchy, NodeId::ROOT, &tab_indices, &mut index.tab_order);
        }
        index
    }

    pub fn lookup(&self, tag: TagId) -> Option<&TagEntry> {
        self.tags.get(&tag)
    }

    pub fn tag_for_node(&self, node: NodeId) -> Option<TagId> {
        self.node_to_tag.get(&node).copied()
    }

    pub fn entry_for_node(&self, node: NodeId) -> Option<&TagEntry> {
        self.tag_for_node(node).and_then(|t| self.lookup(t))
    }

    pub fn is_tagged(&self, node: NodeId) -> bool {
        self.node_to_tag.contains_key(&node)
    }

    /// Tagged nodes in ascending id order
    pub fn tagged_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_to_tag.keys().copied()
    }

    /// Keyboard focus order
    pub fn tab_order(&self) -> &[NodeId] {
        &self.tab_order
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Pre-order walk; siblings with `OverrideInParent(n)` come first by
/// ascending `n`, the rest keep document order
fn collect_tab_order(
    hierarchy: &NodeHierarchy,
    root: NodeId,
    tab_indices: &BTreeMap<NodeId, TabIndex>,
    out: &mut Vec<NodeId>,
) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match tab_indices.get(&node) {
            Some(TabIndex::Auto) | Some(TabIndex::OverrideInParent(_)) => out.push(node),
            Some(TabIndex::NoKeyboardFocus) | None => {}
        }

        let mut children: Vec<NodeId> = hierarchy.children(node).collect();
        children.sort_by_key(|c| match tab_indices.get(c) {
            Some(TabIndex::OverrideInParent(n)) => (0, *n),
            _ => (1, 0),
        });
        // reversed so the first child is popped next
        stack.extend(children.into_iter().rev());
    }
}
