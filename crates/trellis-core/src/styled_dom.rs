//! Styled DOM
//!
//! Immutable snapshot produced by `Dom::style`: the arena, cascade output,
//! per-node pseudo-state and the tag index, plus precomputed lists of nodes
//! with window / not / component / application callbacks so the dispatcher
//! never scans the tree.
//!
//! The only in-place mutations are pseudo-state switches, runtime css
//! overrides and text / image replacement; everything else means building a
//! new `StyledDom`.

use std::collections::BTreeMap;

use tracing::debug;
use trellis_css::{Css, CssPath, CssProperty, PropertyId, PseudoState};

use crate::dom::{Dom, NodeData, NodeType};
use crate::events::EventFilter;
use crate::id_tree::{NodeDataContainer, NodeHierarchy, NodeId};
use crate::prop_cache::CssPropertyCache;
use crate::resources::ImageRef;
use crate::style::{self, CascadeInfo, CascadeNode};
use crate::tag_index::{TagId, TagIndex};

/// Which pseudo-states a node is currently rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyledNodeState {
    pub normal: bool,
    pub hover: bool,
    pub active: bool,
    pub focused: bool,
}

impl Default for StyledNodeState {
    fn default() -> Self {
        Self { normal: true, hover: false, active: false, focused: false }
    }
}

impl StyledNodeState {
    /// The bucket with the highest precedence that is switched on
    pub fn current(&self) -> PseudoState {
        if self.focused {
            PseudoState::Focus
        } else if self.active {
            PseudoState::Active
        } else if self.hover {
            PseudoState::Hover
        } else {
            PseudoState::Normal
        }
    }

    fn with(mut self, state: PseudoState, on: bool) -> Self {
        match state {
            PseudoState::Normal => {}
            PseudoState::Hover => self.hover = on,
            PseudoState::Active => self.active = on,
            PseudoState::Focus => self.focused = on,
        }
        self.normal = !(self.hover || self.active || self.focused);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyledNode {
    pub state: StyledNodeState,
    pub tag_id: Option<TagId>,
}

/// One property whose rendered value changed with a state switch
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedCssProperty {
    pub previous_state: StyledNodeState,
    pub previous_prop: Option<CssProperty>,
    pub current_state: StyledNodeState,
    pub current_prop: Option<CssProperty>,
}

pub type RestyleChanges = BTreeMap<NodeId, Vec<ChangedCssProperty>>;

#[derive(Debug, Clone)]
pub struct StyledDom {
    pub(crate) hierarchy: NodeHierarchy,
    pub(crate) node_data: NodeDataContainer<NodeData>,
    pub(crate) styled_nodes: NodeDataContainer<StyledNode>,
    pub(crate) cascade_info: NodeDataContainer<CascadeInfo>,
    pub(crate) css_property_cache: CssPropertyCache,
    pub(crate) tag_index: TagIndex,
    nodes_with_window_callbacks: Vec<NodeId>,
    nodes_with_not_callbacks: Vec<NodeId>,
    nodes_with_component_callbacks: Vec<NodeId>,
    nodes_with_application_callbacks: Vec<NodeId>,
    nodes_with_datasets: Vec<NodeId>,
}

impl Dom {
    /// Run the cascade and build the tag index
    pub fn style(self, css: &Css) -> StyledDom {
        StyledDom::new(self, css)
    }
}

impl StyledDom {
    pub fn new(dom: Dom, css: &Css) -> Self {
        let Dom { hierarchy, node_data } = dom;
        let cascade_info = CascadeInfo::compute(&hierarchy);
        let css_property_cache = style::cascade(&hierarchy, &node_data, &cascade_info, css);
        let tag_index = TagIndex::build(&hierarchy, &node_data, &css_property_cache);
        let styled_nodes = node_data.transform(|_, id| StyledNode {
            state: StyledNodeState::default(),
            tag_id: tag_index.tag_for_node(id),
        });

        let mut window = Vec::new();
        let mut not = Vec::new();
        let mut component = Vec::new();
        let mut application = Vec::new();
        let mut datasets = Vec::new();
        for id in hierarchy.document_order() {
            let data = &node_data[id];
            if data.has_callbacks_where(|f| matches!(f, EventFilter::Window(_))) {
                window.push(id);
            }
            if data.has_callbacks_where(|f| matches!(f, EventFilter::Not(_))) {
                not.push(id);
            }
            if data.has_callbacks_where(|f| matches!(f, EventFilter::Component(_))) {
                component.push(id);
            }
            if data.has_callbacks_where(|f| matches!(f, EventFilter::Application(_))) {
                application.push(id);
            }
            if data.dataset.is_some() {
                datasets.push(id);
            }
        }

        debug!(
            nodes = hierarchy.len(),
            rules = css.rule_count(),
            tags = tag_index.len(),
            "styled dom built"
        );

        Self {
            hierarchy,
            node_data,
            styled_nodes,
            cascade_info,
            css_property_cache,
            tag_index,
            nodes_with_window_callbacks: window,
            nodes_with_not_callbacks: not,
            nodes_with_component_callbacks: component,
            nodes_with_application_callbacks: application,
            nodes_with_datasets: datasets,
        }
    }

    pub fn node_count(&self) -> usize {
        self.hierarchy.len()
    }

    pub fn hierarchy(&self) -> &NodeHierarchy {
        &self.hierarchy
    }

    pub fn node_data(&self, node: NodeId) -> Option<&NodeData> {
        self.node_data.get(node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.hierarchy.contains(node)
    }

    pub fn styled_node(&self, node: NodeId) -> Option<&StyledNode> {
        self.styled_nodes.get(node)
    }

    pub fn node_state(&self, node: NodeId) -> StyledNodeState {
        self.styled_nodes.get(node).map(|n| n.state).unwrap_or_default()
    }

    pub fn cascade_info(&self, node: NodeId) -> Option<&CascadeInfo> {
        self.cascade_info.get(node)
    }

    pub fn css_property_cache(&self) -> &CssPropertyCache {
        &self.css_property_cache
    }

    pub fn css_property_cache_mut(&mut self) -> &mut CssPropertyCache {
        &mut self.css_property_cache
    }

    pub fn tag_index(&self) -> &TagIndex {
        &self.tag_index
    }

    pub fn nodes_with_window_callbacks(&self) -> &[NodeId] {
        &self.nodes_with_window_callbacks
    }

    pub fn nodes_with_not_callbacks(&self) -> &[NodeId] {
        &self.nodes_with_not_callbacks
    }

    pub fn nodes_with_component_callbacks(&self) -> &[NodeId] {
        &self.nodes_with_component_callbacks
    }

    pub fn nodes_with_application_callbacks(&self) -> &[NodeId] {
        &self.nodes_with_application_callbacks
    }

    pub fn nodes_with_datasets(&self) -> &[NodeId] {
        &self.nodes_with_datasets
    }

    /// Value the node currently renders with
    pub fn get_css_property(&self, node: NodeId, property: PropertyId) -> Option<&CssProperty> {
        self.css_property_cache.computed(node, &self.node_state(node), property)
    }

    /// Value of one bucket, ignoring the node's current state
    pub fn get_css_property_in(&self, node: NodeId, state: PseudoState, property: PropertyId) -> Option<&CssProperty> {
        self.css_property_cache.get(node, state, property)
    }

    /// Runtime override on top of the cascade
    pub fn set_css_property(&mut self, node: NodeId, property: CssProperty) -> Option<CssProperty> {
        self.css_property_cache.set_override(node, property)
    }

    pub fn restyle_nodes_hover(&mut self, nodes: &[NodeId], hovered: bool) -> RestyleChanges {
        self.restyle(nodes, PseudoState::Hover, hovered)
    }

    pub fn restyle_nodes_active(&mut self, nodes: &[NodeId], active: bool) -> RestyleChanges {
        self.restyle(nodes, PseudoState::Active, active)
    }

    pub fn restyle_nodes_focus(&mut self, nodes: &[NodeId], focused: bool) -> RestyleChanges {
        self.restyle(nodes, PseudoState::Focus, focused)
    }

    /// Switch one pseudo-state on or off and report the properties whose
    /// rendered value changed; nodes without changes are left out
    fn restyle(&mut self, nodes: &[NodeId], state: PseudoState, on: bool) -> RestyleChanges {
        let mut changes = RestyleChanges::new();
        for &node in nodes {
            let Some(styled) = self.styled_nodes.get_mut(node) else { continue };
            let previous_state = styled.state;
            let current_state = previous_state.with(state, on);
            if previous_state == current_state {
                continue;
            }
            styled.state = current_state;

            let Some(styles) = self.css_property_cache.node_styles(node) else { continue };
            let changed: Vec<ChangedCssProperty> = styles
                .property_ids()
                .filter_map(|id| {
                    let previous_prop = self.css_property_cache.computed(node, &previous_state, id).cloned();
                    let current_prop = self.css_property_cache.computed(node, &current_state, id).cloned();
                    (previous_prop != current_prop).then_some(ChangedCssProperty {
                        previous_state,
                        previous_prop,
                        current_state,
                        current_prop,
                    })
                })
                .collect();
            if !changed.is_empty() {
                changes.insert(node, changed);
            }
        }
        changes
    }

    /// Nodes matching `path` in document order; dynamic pseudo-classes are ignored
    pub fn query(&self, path: &CssPath) -> Vec<NodeId> {
        self.hierarchy
            .document_order()
            .into_iter()
            .filter(|&id| {
                path.matches(&CascadeNode {
                    id,
                    hierarchy: &self.hierarchy,
                    node_data: &self.node_data,
                    cascade_info: &self.cascade_info,
                })
            })
            .collect()
    }

    /// Text of a `Text` node
    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.node_data.get(node).and_then(NodeData::text)
    }

    /// Replace the text of a `Text` node; returns `false` for other nodes
    pub fn set_text(&mut self, node: NodeId, text: String) -> bool {
        match self.node_data.get_mut(node).map(|d| &mut d.node_type) {
            Some(NodeType::Text(current)) => {
                *current = text;
                true
            }
            _ => false,
        }
    }

    /// Replace the image of an `Image` node; returns `false` for other nodes
    pub fn set_image(&mut self, node: NodeId, image: ImageRef) -> bool {
        match self.node_data.get_mut(node).map(|d| &mut d.node_type) {
            Some(NodeType::Image(current)) => {
                *current = image;
                true
            }
            _ => false,
        }
    }
}
