//! Cascade
//!
//! Resolves a `Css` against a node arena into a `CssPropertyCache`.
//!
//! Rules are ordered once by (specificity, stylesheet index, rule index); every
//! node then applies its matching rules in that order so later entries win.
//! Per node the layers are: stylesheet declarations, inline declarations,
//! then `!important` stylesheet declarations. Inherited properties are copied
//! from the parent's normal bucket afterwards.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;
use trellis_css::{
    Css, CssDeclaration, CssPath, CssProperty, Keyword, MatchTarget, NodeTypeTag, PropertyId, PropertyValue,
    PseudoState, RuleDeclaration, Specificity,
};

use crate::dom::NodeData;
use crate::id_tree::{NodeDataContainer, NodeHierarchy, NodeId};
use crate::prop_cache::{CssPropertyCache, DynamicSlot, NodeStyles};

/// Precomputed sibling position for structural selectors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeInfo {
    /// 0-based
    pub index_in_parent: u32,
    pub is_last_child: bool,
}

impl CascadeInfo {
    pub fn compute(hierarchy: &NodeHierarchy) -> NodeDataContainer<CascadeInfo> {
        let mut info = vec![CascadeInfo::default(); hierarchy.len()];
        for node in hierarchy.as_slice() {
            let Some(first) = node.first_child else { continue };
            let mut index = 0;
            let mut current = Some(first);
            while let Some(child) = current {
                let next = hierarchy.next_sibling(child);
                info[child.index()] = CascadeInfo { index_in_parent: index, is_last_child: next.is_none() };
                index += 1;
                current = next;
            }
        }
        NodeDataContainer::new(info)
    }
}

/// A node viewed through the selector-matching interface
#[derive(Clone, Copy)]
pub(crate) struct CascadeNode<'a> {
    pub id: NodeId,
    pub hierarchy: &'a NodeHierarchy,
    pub node_data: &'a NodeDataContainer<NodeData>,
    pub cascade_info: &'a NodeDataContainer<CascadeInfo>,
}

impl MatchTarget for CascadeNode<'_> {
    fn tag(&self) -> NodeTypeTag {
        self.node_data[self.id].node_type.tag()
    }

    fn has_class(&self, class: &str) -> bool {
        self.node_data[self.id].has_class(class)
    }

    fn has_id(&self, id: &str) -> bool {
        self.node_data[self.id].has_id(id)
    }

    fn index_in_parent(&self) -> usize {
        self.cascade_info[self.id].index_in_parent as usize
    }

    fn is_last_child(&self) -> bool {
        self.cascade_info[self.id].is_last_child
    }

    fn parent(&self) -> Option<Self> {
        self.hierarchy.parent(self.id).map(|id| Self { id, ..*self })
    }
}

struct OrderedRule<'a> {
    path: &'a CssPath,
    state: PseudoState,
    declarations: &'a [RuleDeclaration],
    order: (Specificity, usize, usize),
}

/// Values applied to one node before they are committed to the cache
#[derive(Default)]
struct PendingStyles {
    styles: NodeStyles,
    dynamic: BTreeMap<(PseudoState, PropertyId), String>,
}

impl PendingStyles {
    fn apply(&mut self, state: PseudoState, declaration: &CssDeclaration) {
        match declaration {
            CssDeclaration::Static(p) => {
                self.dynamic.remove(&(state, p.id));
                self.styles.bucket_mut(state).insert(p.id, p.clone());
            }
            CssDeclaration::Dynamic(d) => {
                let id = d.default_value.id;
                self.dynamic.insert((state, id), d.dynamic_id.clone());
                self.styles.bucket_mut(state).insert(id, d.default_value.clone());
            }
        }
    }

    fn apply_inline(&mut self, state: PseudoState, property: &CssProperty) {
        self.dynamic.remove(&(state, property.id));
        self.styles.bucket_mut(state).insert(property.id, property.clone());
    }
}

/// Run the cascade over every node of the arena
pub(crate) fn cascade(
    hierarchy: &NodeHierarchy,
    node_data: &NodeDataContainer<NodeData>,
    cascade_info: &NodeDataContainer<CascadeInfo>,
    css: &Css,
) -> CssPropertyCache {
    let mut rules: Vec<OrderedRule<'_>> = css
        .stylesheets
        .iter()
        .enumerate()
        .flat_map(|(sheet_idx, sheet)| {
            sheet.rules.iter().enumerate().map(move |(rule_idx, rule)| OrderedRule {
                path: &rule.path,
                state: rule.path.pseudo_state(),
                declarations: &rule.declarations,
                order: (rule.path.specificity(), sheet_idx, rule_idx),
            })
        })
        .collect();
    rules.sort_by_key(|r| r.order);

    let mut styles: Vec<NodeStyles> = vec![NodeStyles::default(); hierarchy.len()];
    // dynamic ids behind each node's normal values, own or inherited
    let mut normal_dynamic: Vec<BTreeMap<PropertyId, String>> = vec![BTreeMap::new(); hierarchy.len()];
    let mut bindings: Vec<(String, DynamicSlot)> = Vec::new();

    for id in hierarchy.document_order() {
        let target = CascadeNode { id, hierarchy, node_data, cascade_info };
        let mut pending = PendingStyles::default();
        let mut important: Vec<(PseudoState, &CssDeclaration)> = Vec::new();

        for rule in rules.iter().filter(|r| r.path.matches(&target)) {
            for decl in rule.declarations {
                if decl.important {
                    important.push((rule.state, &decl.declaration));
                } else {
                    pending.apply(rule.state, &decl.declaration);
                }
            }
        }

        for inline in &node_data[id].inline_css_props {
            pending.apply_inline(inline.state, &inline.property);
        }

        for (state, decl) in important {
            pending.apply(state, decl);
        }

        let parent = hierarchy.parent(id);
        let parent_normal = parent.map(|p| styles[p.index()].normal.clone()).unwrap_or_default();
        let resolved = resolve_global_keywords(&mut pending, &parent_normal);
        let mut from_parent = resolved.inherited;
        for (property, value) in &parent_normal {
            if property.is_inherited() && !resolved.reset.contains(property) {
                if let Entry::Vacant(slot) = pending.styles.normal.entry(*property) {
                    slot.insert(value.clone());
                    from_parent.insert(*property);
                }
            }
        }

        let mut own_dynamic: BTreeMap<PropertyId, String> = pending
            .dynamic
            .iter()
            .filter(|((state, _), _)| *state == PseudoState::Normal)
            .map(|((_, property), dynamic_id)| (*property, dynamic_id.clone()))
            .collect();
        if let Some(parent) = parent {
            for property in from_parent {
                if let Some(dynamic_id) = normal_dynamic[parent.index()].get(&property) {
                    let slot = DynamicSlot { node_id: id, state: PseudoState::Normal, property };
                    bindings.push((dynamic_id.clone(), slot));
                    own_dynamic.insert(property, dynamic_id.clone());
                }
            }
        }
        normal_dynamic[id.index()] = own_dynamic;

        trace!(
            node = %id,
            normal = pending.styles.normal.len(),
            hover = pending.styles.hover.len(),
            active = pending.styles.active.len(),
            focus = pending.styles.focus.len(),
            "cascaded node"
        );

        for ((state, property), dynamic_id) in pending.dynamic {
            bindings.push((dynamic_id, DynamicSlot { node_id: id, state, property }));
        }
        styles[id.index()] = pending.styles;
    }

    let mut cache = CssPropertyCache::new(NodeDataContainer::new(styles));
    for (dynamic_id, slot) in bindings {
        cache.bind_dynamic(dynamic_id, slot);
    }
    cache
}

/// Normal-state properties touched by a global keyword
#[derive(Default)]
struct ResolvedKeywords {
    /// Set to `initial`; never inherited afterwards
    reset: BTreeSet<PropertyId>,
    /// Set to `inherit` and copied from the parent
    inherited: BTreeSet<PropertyId>,
}

/// Replace `inherit` with the parent's value and drop `initial`
fn resolve_global_keywords(
    pending: &mut PendingStyles,
    parent_normal: &BTreeMap<PropertyId, CssProperty>,
) -> ResolvedKeywords {
    let mut resolved = ResolvedKeywords::default();
    for (property, value) in &pending.styles.normal {
        match value.value {
            PropertyValue::Keyword(Keyword::Initial) => {
                resolved.reset.insert(*property);
            }
            PropertyValue::Keyword(Keyword::Inherit) if parent_normal.contains_key(property) => {
                resolved.inherited.insert(*property);
            }
            _ => {}
        }
    }

    for state in [PseudoState::Normal, PseudoState::Hover, PseudoState::Active, PseudoState::Focus] {
        let bucket = pending.styles.bucket_mut(state);
        bucket.retain(|property, value| match value.value {
            PropertyValue::Keyword(Keyword::Inherit) => match parent_normal.get(property) {
                Some(inherited) => {
                    *value = inherited.clone();
                    true
                }
                None => false,
            },
            PropertyValue::Keyword(Keyword::Initial) => false,
            _ => true,
        });
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Dom;
    use trellis_css::{Color, CssParser};

    fn run(dom: &Dom, css: &str) -> CssPropertyCache {
        let css = CssParser::new().parse(css).css;
        let info = CascadeInfo::compute(dom.hierarchy());
        cascade(dom.hierarchy(), &dom.node_data, &info, &css)
    }

    fn color_of(cache: &CssPropertyCache, node: usize, state: PseudoState) -> Option<Color> {
        cache.get(NodeId::new(node), state, PropertyId::Color).and_then(|p| p.value.as_color())
    }

    #[test]
    fn test_cascade_info() {
        let dom = Dom::body().with_child(Dom::div()).with_child(Dom::div()).with_child(Dom::div());
        let info = CascadeInfo::compute(dom.hierarchy());
        assert_eq!(info[NodeId::new(1)], CascadeInfo { index_in_parent: 0, is_last_child: false });
        assert_eq!(info[NodeId::new(3)], CascadeInfo { index_in_parent: 2, is_last_child: true });
    }

    #[test]
    fn test_later_rule_wins_on_equal_specificity() {
        let dom = Dom::body().with_child(Dom::div().with_class("a"));
        let cache = run(&dom, ".a { color: red } .a { color: blue }");
        assert_eq!(color_of(&cache, 1, PseudoState::Normal), Some(Color::rgb(0, 0, 255)));
    }

    #[test]
    fn test_specificity_beats_order() {
        let dom = Dom::body().with_child(Dom::div().with_class("a").with_class("b"));
        let cache = run(&dom, ".a.b { color: red } .a { color: blue }");
        assert_eq!(color_of(&cache, 1, PseudoState::Normal), Some(Color::RED));
    }

    #[test]
    fn test_inline_beats_stylesheet_and_important_beats_inline() {
        let dom = Dom::body()
            .with_child(Dom::div().with_id("x").with_inline_style("color: red; width: 5px"));
        let cache = run(&dom, "#x { color: blue; width: 10px !important }");
        assert_eq!(color_of(&cache, 1, PseudoState::Normal), Some(Color::RED));
        let width = cache.get(NodeId::new(1), PseudoState::Normal, PropertyId::Width).unwrap();
        assert_eq!(width, &CssProperty::px(PropertyId::Width, 10.0));
    }

    #[test]
    fn test_pseudo_states_go_to_their_bucket() {
        let dom = Dom::body().with_child(Dom::div().with_class("btn"));
        let cache = run(&dom, ".btn { color: black } .btn:hover { color: red } .btn:focus { color: white }");
        assert_eq!(color_of(&cache, 1, PseudoState::Normal), Some(Color::BLACK));
        assert_eq!(color_of(&cache, 1, PseudoState::Hover), Some(Color::RED));
        assert_eq!(color_of(&cache, 1, PseudoState::Focus), Some(Color::WHITE));
        assert_eq!(color_of(&cache, 1, PseudoState::Active), None);
    }

    #[test]
    fn test_inheritance() {
        let dom = Dom::body().with_child(Dom::div().with_child(Dom::text("hi")));
        let cache = run(&dom, "body { color: red; width: 100px }");
        assert_eq!(color_of(&cache, 2, PseudoState::Normal), Some(Color::RED));
        assert!(cache.get(NodeId::new(2), PseudoState::Normal, PropertyId::Width).is_none());
    }

    #[test]
    fn test_inherit_and_initial_keywords() {
        let dom = Dom::body().with_child(Dom::div().with_class("c"));
        let cache = run(&dom, "body { width: 50px; color: red } .c { width: inherit; color: initial }");
        assert_eq!(
            cache.get(NodeId::new(1), PseudoState::Normal, PropertyId::Width),
            Some(&CssProperty::px(PropertyId::Width, 50.0))
        );
        assert_eq!(color_of(&cache, 1, PseudoState::Normal), None);
    }

    #[test]
    fn test_initial_blocks_inheritance_for_the_subtree() {
        let dom = Dom::body()
            .with_child(Dom::div().with_class("reset").with_child(Dom::text("t")))
            .with_child(Dom::div());
        let cache = run(&dom, "body { color: red; font-size: 20px } .reset { color: initial }");
        assert_eq!(color_of(&cache, 1, PseudoState::Normal), None);
        assert_eq!(color_of(&cache, 2, PseudoState::Normal), None);
        assert_eq!(color_of(&cache, 3, PseudoState::Normal), Some(Color::RED));
        // other inherited properties still flow through the reset node
        assert_eq!(
            cache.get(NodeId::new(2), PseudoState::Normal, PropertyId::FontSize),
            Some(&CssProperty::px(PropertyId::FontSize, 20.0))
        );
    }

    #[test]
    fn test_inherited_dynamic_values_are_bound_to_descendants() {
        let dom = Dom::body()
            .with_child(
                Dom::div()
                    .with_class("themed")
                    .with_child(Dom::div().with_child(Dom::text("deep")))
                    .with_child(Dom::div().with_class("own")),
            );
        let mut cache = run(&dom, ".themed { color: var(--c, red) } .own { color: blue }");
        assert_eq!(color_of(&cache, 2, PseudoState::Normal), Some(Color::RED));

        // themed div, its plain child and the text node; not the child with its own color
        let bound: Vec<usize> = cache.dynamic_slots("c").iter().map(|s| s.node_id.index()).collect();
        assert_eq!(bound, vec![1, 2, 3]);

        assert_eq!(cache.set_dynamic_property("c", CssProperty::color(PropertyId::Color, Color::WHITE)), 3);
        assert_eq!(color_of(&cache, 1, PseudoState::Normal), Some(Color::WHITE));
        assert_eq!(color_of(&cache, 3, PseudoState::Normal), Some(Color::WHITE));
        assert_eq!(color_of(&cache, 4, PseudoState::Normal), Some(Color::rgb(0, 0, 255)));
    }

    #[test]
    fn test_structural_selectors() {
        let dom = Dom::body().with_children((0..4).map(|_| Dom::div()));
        let cache = run(&dom, "div:first { color: red } div:nth-child(even) { color: blue } div:last { color: white }");
        assert_eq!(color_of(&cache, 1, PseudoState::Normal), Some(Color::RED));
        assert_eq!(color_of(&cache, 2, PseudoState::Normal), Some(Color::rgb(0, 0, 255)));
        assert_eq!(color_of(&cache, 3, PseudoState::Normal), None);
        assert_eq!(color_of(&cache, 4, PseudoState::Normal), Some(Color::WHITE));
    }

    #[test]
    fn test_dynamic_declarations_are_bound() {
        let dom = Dom::body().with_child(Dom::div().with_class("fade"));
        let mut cache = run(&dom, ".fade { opacity: var(--fade, 1) }");
        assert_eq!(cache.dynamic_slots("fade").len(), 1);
        cache.set_dynamic_property("fade", CssProperty::number(PropertyId::Opacity, 0.25));
        assert_eq!(
            cache.get(NodeId::new(1), PseudoState::Normal, PropertyId::Opacity),
            Some(&CssProperty::number(PropertyId::Opacity, 0.25))
        );
    }

    #[test]
    fn test_static_declaration_unbinds_dynamic() {
        let dom = Dom::body().with_child(Dom::div().with_class("fade").with_id("solid"));
        let cache = run(&dom, ".fade { opacity: var(--fade, 1) } #solid { opacity: 1 }");
        assert!(cache.dynamic_slots("fade").is_empty());
    }
}
