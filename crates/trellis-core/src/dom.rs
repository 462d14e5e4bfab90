//! DOM
//!
//! The unstyled node tree users build. A `Dom` owns its arena; appending a
//! child `Dom` moves the child's nodes into the parent's arena, so there is
//! only ever one owner and links are plain indices.

use std::fmt;

use tracing::warn;
use trellis_css::{CssParser, CssProperty, NodeTypeTag, PseudoState};

use crate::callbacks::{Callback, CallbackData, CallbackType, IFrameCallbackType};
use crate::events::EventFilter;
use crate::id_tree::{NodeDataContainer, NodeHierarchy, NodeId};
use crate::refany::RefAny;
use crate::resources::ImageRef;
use crate::window_state::LogicalSize;

/// DOM construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Node {0} does not exist in this DOM")]
    InvalidNode(NodeId),

    #[error("Node {0} already has a parent")]
    AlreadyAttached(NodeId),

    #[error("Attaching {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
}

/// Sub-DOM rendered on demand, e.g. for virtualized lists
#[derive(Debug, Clone)]
pub struct IFrameNode {
    pub callback: IFrameCallbackType,
    pub data: RefAny,
}

impl IFrameNode {
    /// Produce the sub-DOM for the given bounds
    pub fn render(&self, bounds: LogicalSize) -> Dom {
        let mut data = self.data.clone();
        (self.callback)(&mut data, bounds)
    }
}

#[derive(Debug, Clone)]
pub enum NodeType {
    Body,
    Div,
    Br,
    Text(String),
    Image(ImageRef),
    IFrame(IFrameNode),
}

impl NodeType {
    pub fn tag(&self) -> NodeTypeTag {
        match self {
            Self::Body => NodeTypeTag::Body,
            Self::Div => NodeTypeTag::Div,
            Self::Br => NodeTypeTag::Br,
            Self::Text(_) => NodeTypeTag::P,
            Self::Image(_) => NodeTypeTag::Img,
            Self::IFrame(_) => NodeTypeTag::IFrame,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdOrClass {
    Id(String),
    Class(String),
}

/// Keyboard focus behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabIndex {
    /// Focusable, in document order
    Auto,
    /// Focusable, ordered before `Auto` siblings by ascending value
    OverrideInParent(u32),
    /// Focusable by click only
    NoKeyboardFocus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessibilityRole {
    #[default]
    Generic,
    Button,
    Checkbox,
    Link,
    Text,
    TextBox,
    Img,
    List,
    ListItem,
    Group,
    Dialog,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessibilityInfo {
    pub name: Option<String>,
    pub role: AccessibilityRole,
    pub description: Option<String>,
}

/// An inline declaration scoped to one pseudo-state
#[derive(Debug, Clone, PartialEq)]
pub struct InlineCssProperty {
    pub state: PseudoState,
    pub property: CssProperty,
}

/// Everything a node carries besides its links
#[derive(Debug, Clone)]
pub struct NodeData {
    pub node_type: NodeType,
    pub dataset: Option<RefAny>,
    pub ids_and_classes: Vec<IdOrClass>,
    pub callbacks: Vec<CallbackData>,
    pub inline_css_props: Vec<InlineCssProperty>,
    pub tab_index: Option<TabIndex>,
    pub accessibility: Option<AccessibilityInfo>,
}

impl NodeData {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            dataset: None,
            ids_and_classes: Vec::new(),
            callbacks: Vec::new(),
            inline_css_props: Vec::new(),
            tab_index: None,
            accessibility: None,
        }
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.ids_and_classes.iter().any(|x| matches!(x, IdOrClass::Id(i) if i == id))
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.ids_and_classes.iter().any(|x| matches!(x, IdOrClass::Class(c) if c == class))
    }

    pub fn add_id(&mut self, id: impl Into<String>) {
        self.ids_and_classes.push(IdOrClass::Id(id.into()));
    }

    pub fn add_class(&mut self, class: impl Into<String>) {
        self.ids_and_classes.push(IdOrClass::Class(class.into()));
    }

    pub fn add_callback(&mut self, event: EventFilter, data: RefAny, callback: CallbackType) {
        self.callbacks.push(CallbackData { event, callback: Callback::new(callback), data });
    }

    pub fn callbacks_for(&self, event: EventFilter) -> impl Iterator<Item = &CallbackData> {
        self.callbacks.iter().filter(move |c| c.event == event)
    }

    pub fn has_callbacks_where(&self, f: impl Fn(&EventFilter) -> bool) -> bool {
        self.callbacks.iter().any(|c| f(&c.event))
    }

    /// Text content of `Text` nodes
    pub fn text(&self) -> Option<&str> {
        match &self.node_type {
            NodeType::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Unstyled node tree; `NodeId::ROOT` is the node passed to `Dom::new`
#[derive(Clone)]
pub struct Dom {
    pub(crate) hierarchy: NodeHierarchy,
    pub(crate) node_data: NodeDataContainer<NodeData>,
}

impl Dom {
    pub fn new(node_type: NodeType) -> Self {
        Self { hierarchy: NodeHierarchy::new(), node_data: NodeDataContainer::new(vec![NodeData::new(node_type)]) }
    }

    pub fn body() -> Self {
        Self::new(NodeType::Body)
    }

    pub fn div() -> Self {
        Self::new(NodeType::Div)
    }

    pub fn br() -> Self {
        Self::new(NodeType::Br)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(NodeType::Text(text.into()))
    }

    pub fn image(image: ImageRef) -> Self {
        Self::new(NodeType::Image(image))
    }

    pub fn iframe(data: RefAny, callback: IFrameCallbackType) -> Self {
        Self::new(NodeType::IFrame(IFrameNode { callback, data }))
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node_count(&self) -> usize {
        self.hierarchy.len()
    }

    pub fn hierarchy(&self) -> &NodeHierarchy {
        &self.hierarchy
    }

    pub fn node_data(&self, id: NodeId) -> Option<&NodeData> {
        self.node_data.get(id)
    }

    pub fn node_data_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.node_data.get_mut(id)
    }

    /// Add a detached node to the arena
    pub fn create(&mut self, node_type: NodeType) -> NodeId {
        let id = self.hierarchy.push_detached();
        self.node_data.push(NodeData::new(node_type));
        id
    }

    /// Link a detached node under `parent`
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        for id in [parent, child] {
            if !self.hierarchy.contains(id) {
                return Err(DomError::InvalidNode(id));
            }
        }
        if child == NodeId::ROOT || self.hierarchy.parent(child).is_some() {
            return Err(DomError::AlreadyAttached(child));
        }
        if parent == child || self.hierarchy.ancestors(parent).any(|a| a == child) {
            return Err(DomError::Cycle { parent, child });
        }
        self.hierarchy.link_last_child(parent, child);
        Ok(())
    }

    /// Move `child`'s whole arena into this one under `parent`; returns the
    /// new id of `child`'s root
    pub fn append_child(&mut self, parent: NodeId, child: Dom) -> Result<NodeId, DomError> {
        if !self.hierarchy.contains(parent) {
            return Err(DomError::InvalidNode(parent));
        }
        let offset = self.hierarchy.append_rebased(child.hierarchy);
        self.node_data.append(child.node_data);
        let child_root = NodeId::new(offset);
        self.hierarchy.link_last_child(parent, child_root);
        Ok(child_root)
    }

    fn root_data(&mut self) -> &mut NodeData {
        &mut self.node_data[NodeId::ROOT]
    }

    pub fn add_child(&mut self, child: Dom) -> NodeId {
        let offset = self.hierarchy.append_rebased(child.hierarchy);
        self.node_data.append(child.node_data);
        let child_root = NodeId::new(offset);
        self.hierarchy.link_last_child(NodeId::ROOT, child_root);
        child_root
    }

    pub fn with_child(mut self, child: Dom) -> Self {
        self.add_child(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Dom>) -> Self {
        for child in children {
            self.add_child(child);
        }
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.root_data().add_id(id);
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.root_data().add_class(class);
        self
    }

    pub fn with_dataset(mut self, data: RefAny) -> Self {
        self.root_data().dataset = Some(data);
        self
    }

    pub fn with_callback(mut self, event: EventFilter, data: RefAny, callback: CallbackType) -> Self {
        self.root_data().add_callback(event, data, callback);
        self
    }

    pub fn with_tab_index(mut self, tab_index: TabIndex) -> Self {
        self.root_data().tab_index = Some(tab_index);
        self
    }

    pub fn with_accessibility(mut self, info: AccessibilityInfo) -> Self {
        self.root_data().accessibility = Some(info);
        self
    }

    pub fn with_inline_css(mut self, state: PseudoState, property: CssProperty) -> Self {
        self.root_data().inline_css_props.push(InlineCssProperty { state, property });
        self
    }

    /// Parse `style` (`"color: red; width: 10px"`) into normal-state inline
    /// properties; bad declarations are dropped with a warning
    pub fn with_inline_style(self, style: &str) -> Self {
        self.with_inline_style_for(PseudoState::Normal, style)
    }

    pub fn with_inline_style_for(mut self, state: PseudoState, style: &str) -> Self {
        let parsed = CssParser::new().parse_inline_declarations(style);
        for warning in &parsed.warnings {
            warn!(%warning, "inline style declaration dropped");
        }
        let data = self.root_data();
        data.inline_css_props.extend(parsed.properties.into_iter().map(|property| InlineCssProperty { state, property }));
        self
    }
}

impl fmt::Debug for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_node(dom: &Dom, f: &mut fmt::Formatter<'_>, id: NodeId, depth: usize) -> fmt::Result {
            let data = &dom.node_data[id];
            write!(f, "{:indent$}<{}", "", data.node_type.tag().as_str(), indent = depth * 2)?;
            for x in &data.ids_and_classes {
                match x {
                    IdOrClass::Id(i) => write!(f, " #{}", i)?,
                    IdOrClass::Class(c) => write!(f, " .{}", c)?,
                }
            }
            writeln!(f, ">")?;
            for child in dom.hierarchy.children(id) {
                write_node(dom, f, child, depth + 1)?;
            }
            Ok(())
        }
        write_node(self, f, NodeId::ROOT, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_links_children() {
        let dom = Dom::body().with_child(Dom::div().with_class("a")).with_child(Dom::text("hi"));
        assert_eq!(dom.node_count(), 3);
        let children: Vec<_> = dom.hierarchy().children(NodeId::ROOT).collect();
        assert_eq!(children, vec![NodeId::new(1), NodeId::new(2)]);
        assert!(dom.node_data(NodeId::new(1)).unwrap().has_class("a"));
        assert_eq!(dom.node_data(NodeId::new(2)).unwrap().text(), Some("hi"));
    }

    #[test]
    fn test_append_child_rebases() {
        let mut dom = Dom::body().with_child(Dom::div());
        let sub = Dom::div().with_id("sub").with_child(Dom::div().with_class("leaf"));
        let sub_root = dom.append_child(NodeId::new(1), sub).unwrap();
        assert_eq!(sub_root, NodeId::new(2));
        assert_eq!(dom.hierarchy().parent(sub_root), Some(NodeId::new(1)));
        let leaf = dom.hierarchy().first_child(sub_root).unwrap();
        assert!(dom.node_data(leaf).unwrap().has_class("leaf"));
        assert_eq!(dom.hierarchy().parent(leaf), Some(sub_root));
    }

    #[test]
    fn test_append_child_invalid_parent() {
        let mut dom = Dom::body();
        assert_eq!(dom.append_child(NodeId::new(7), Dom::div()), Err(DomError::InvalidNode(NodeId::new(7))));
    }

    #[test]
    fn test_create_and_attach() {
        let mut dom = Dom::body();
        let a = dom.create(NodeType::Div);
        let b = dom.create(NodeType::Div);
        assert_eq!(dom.hierarchy().parent(a), None);
        dom.attach(b, a).unwrap();
        dom.attach(NodeId::ROOT, b).unwrap();
        assert_eq!(dom.attach(NodeId::ROOT, a), Err(DomError::AlreadyAttached(a)));
        let c = dom.create(NodeType::Div);
        dom.attach(c, NodeId::ROOT).unwrap_err();
        let order: Vec<_> = dom.hierarchy().depth_first(NodeId::ROOT).collect();
        assert_eq!(order, vec![NodeId::ROOT, b, a]);
    }

    #[test]
    fn test_attach_rejects_cycle() {
        let mut dom = Dom::body();
        let a = dom.create(NodeType::Div);
        let b = dom.create(NodeType::Div);
        dom.attach(a, b).unwrap();
        assert_eq!(dom.attach(b, a), Err(DomError::Cycle { parent: b, child: a }));
    }

    #[test]
    fn test_inline_style() {
        let dom = Dom::div().with_inline_style("color: red; nonsense: 1; width: 10px");
        let props = &dom.node_data(NodeId::ROOT).unwrap().inline_css_props;
        assert_eq!(props.len(), 2);
        assert!(props.iter().all(|p| p.state == PseudoState::Normal));
    }
}
