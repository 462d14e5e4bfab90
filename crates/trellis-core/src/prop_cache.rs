//! CSS Property Cache
//!
//! Output of the cascade: for every node, the resolved properties of each
//! pseudo-state bucket. State changes at dispatch time only switch which
//! bucket is read, they never re-run the cascade.
//!
//! On top of the cascaded buckets sit two runtime layers: per-node overrides
//! written by callbacks and animations, and the values of dynamic
//! (`var(--name, default)`) properties.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use trellis_css::{CssProperty, PropertyId, PseudoState};

use crate::id_tree::{NodeDataContainer, NodeId};
use crate::styled_dom::StyledNodeState;

/// Resolved declarations of one node, per pseudo-state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeStyles {
    pub normal: BTreeMap<PropertyId, CssProperty>,
    pub hover: BTreeMap<PropertyId, CssProperty>,
    pub active: BTreeMap<PropertyId, CssProperty>,
    pub focus: BTreeMap<PropertyId, CssProperty>,
}

impl NodeStyles {
    pub fn bucket(&self, state: PseudoState) -> &BTreeMap<PropertyId, CssProperty> {
        match state {
            PseudoState::Normal => &self.normal,
            PseudoState::Hover => &self.hover,
            PseudoState::Active => &self.active,
            PseudoState::Focus => &self.focus,
        }
    }

    pub fn bucket_mut(&mut self, state: PseudoState) -> &mut BTreeMap<PropertyId, CssProperty> {
        match state {
            PseudoState::Normal => &mut self.normal,
            PseudoState::Hover => &mut self.hover,
            PseudoState::Active => &mut self.active,
            PseudoState::Focus => &mut self.focus,
        }
    }

    /// Whether any dynamic pseudo-state declares something
    pub fn has_state_styles(&self) -> bool {
        !self.hover.is_empty() || !self.active.is_empty() || !self.focus.is_empty()
    }

    /// Every property id declared in any bucket
    pub fn property_ids(&self) -> impl Iterator<Item = PropertyId> + '_ {
        let mut ids: Vec<PropertyId> = self
            .normal
            .keys()
            .chain(self.hover.keys())
            .chain(self.active.keys())
            .chain(self.focus.keys())
            .copied()
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
    }
}

/// A cache slot bound to a dynamic property id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DynamicSlot {
    pub node_id: NodeId,
    pub state: PseudoState,
    pub property: PropertyId,
}

/// Resolved styles for every node of one `StyledDom`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CssPropertyCache {
    styles: NodeDataContainer<NodeStyles>,
    overrides: BTreeMap<NodeId, BTreeMap<PropertyId, CssProperty>>,
    dynamic_bindings: BTreeMap<String, Vec<DynamicSlot>>,
    dynamic_values: BTreeMap<String, CssProperty>,
}

impl CssPropertyCache {
    pub(crate) fn new(styles: NodeDataContainer<NodeStyles>) -> Self {
        Self { styles, ..Default::default() }
    }

    pub(crate) fn bind_dynamic(&mut self, dynamic_id: String, slot: DynamicSlot) {
        self.dynamic_bindings.entry(dynamic_id).or_default().push(slot);
    }

    /// Number of nodes with an entry
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn node_styles(&self, node: NodeId) -> Option<&NodeStyles> {
        self.styles.get(node)
    }

    /// The cascaded value of one bucket, ignoring overrides
    pub fn get(&self, node: NodeId, state: PseudoState, property: PropertyId) -> Option<&CssProperty> {
        self.styles.get(node)?.bucket(state).get(&property)
    }

    /// The value a node in `state` renders with.
    ///
    /// Precedence: runtime override, then focus, active and hover buckets
    /// (when the node is in that state), then normal.
    pub fn computed(&self, node: NodeId, state: &StyledNodeState, property: PropertyId) -> Option<&CssProperty> {
        if let Some(p) = self.overrides.get(&node).and_then(|o| o.get(&property)) {
            return Some(p);
        }
        let styles = self.styles.get(node)?;
        let layered = [
            (state.focused, &styles.focus),
            (state.active, &styles.active),
            (state.hover, &styles.hover),
        ];
        layered
            .into_iter()
            .filter(|(on, _)| *on)
            .find_map(|(_, bucket)| bucket.get(&property))
            .or_else(|| styles.normal.get(&property))
    }

    /// Set a runtime override, returning the one it replaced
    pub fn set_override(&mut self, node: NodeId, property: CssProperty) -> Option<CssProperty> {
        if self.styles.get(node).is_none() {
            warn!(node = %node, "css override for a node outside this cache");
            return None;
        }
        self.overrides.entry(node).or_default().insert(property.id, property)
    }

    pub fn clear_override(&mut self, node: NodeId, property: PropertyId) -> Option<CssProperty> {
        let overrides = self.overrides.get_mut(&node)?;
        let removed = overrides.remove(&property);
        if overrides.is_empty() {
            self.overrides.remove(&node);
        }
        removed
    }

    pub fn override_of(&self, node: NodeId, property: PropertyId) -> Option<&CssProperty> {
        self.overrides.get(&node)?.get(&property)
    }

    /// Write `value` into every slot bound to `dynamic_id`, including the
    /// descendants that inherited it; returns how many slots were updated.
    ///
    /// A value whose property matches none of the bound slots is rejected and
    /// not recorded.
    pub fn set_dynamic_property(&mut self, dynamic_id: &str, value: CssProperty) -> usize {
        let Some(slots) = self.dynamic_bindings.get(dynamic_id) else {
            debug!(dynamic_id, "no slots bound to dynamic property");
            return 0;
        };
        if !slots.iter().any(|slot| slot.property == value.id) {
            warn!(dynamic_id, got = %value.id, "dynamic property type mismatch");
            return 0;
        }

        let mut written = 0;
        for slot in slots.iter().filter(|slot| slot.property == value.id) {
            if let Some(styles) = self.styles.get_mut(slot.node_id) {
                styles.bucket_mut(slot.state).insert(slot.property, value.clone());
                written += 1;
            }
        }
        self.dynamic_values.insert(dynamic_id.to_string(), value);
        written
    }

    /// Last value written for `dynamic_id`
    pub fn dynamic_value(&self, dynamic_id: &str) -> Option<&CssProperty> {
        self.dynamic_values.get(dynamic_id)
    }

    pub fn dynamic_slots(&self, dynamic_id: &str) -> &[DynamicSlot] {
        self.dynamic_bindings.get(dynamic_id).map(Vec::as_slice).unwrap_or(&[])
    }
}
