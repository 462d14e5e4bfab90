//! Callbacks
//!
//! User callbacks are plain function pointers over a `RefAny`. They see the
//! world through `CallbackInfo`: read access to the styled DOM, layout and
//! window state, and mutation methods that only append to the pass's
//! `CallbackChanges`.

use std::fmt;
use std::time::Instant;

use tracing::{debug, warn};
use trellis_css::{CssProperty, PropertyId};

use crate::animation::{Animation, AnimationData, drive_animation};
use crate::app::WindowCreateOptions;
use crate::changes::CallbackChanges;
use crate::config::Config;
use crate::dom::Dom;
use crate::events::EventFilter;
use crate::focus::FocusTarget;
use crate::id_tree::NodeId;
use crate::layout::{InlineText, LayoutProvider};
use crate::refany::RefAny;
use crate::resources::{ImageCache, ImageRef};
use crate::styled_dom::StyledDom;
use crate::task::{SystemCallbacks, Thread, ThreadCallbackType, ThreadError, ThreadId, Timer, TimerId};
use crate::window_state::{FullWindowState, LogicalPosition, LogicalSize, WindowState, WindowTheme};

/// What the host should do after a callback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Update {
    #[default]
    DoNothing,
    /// Rebuild this window's DOM
    RefreshDom,
    /// Rebuild every window's DOM
    RefreshDomAllWindows,
}

impl Update {
    pub fn max_self(&mut self, other: Update) {
        *self = (*self).max(other);
    }
}

pub type CallbackType = fn(&mut RefAny, &mut CallbackInfo<'_>) -> Update;

#[derive(Clone, Copy)]
pub struct Callback {
    pub cb: CallbackType,
}

impl Callback {
    pub fn new(cb: CallbackType) -> Self {
        Self { cb }
    }

    pub fn invoke(&self, data: &mut RefAny, info: &mut CallbackInfo<'_>) -> Update {
        (self.cb)(data, info)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", self.cb as *const ())
    }
}

/// A callback registered on a node
#[derive(Debug, Clone)]
pub struct CallbackData {
    pub event: EventFilter,
    pub callback: Callback,
    pub data: RefAny,
}

pub type IFrameCallbackType = fn(&mut RefAny, LogicalSize) -> Dom;

/// Input of the layout callback that builds a window's DOM
pub struct LayoutCallbackInfo<'a> {
    pub window_size: LogicalSize,
    pub theme: WindowTheme,
    pub images: &'a ImageCache,
}

pub type LayoutCallbackType = fn(&mut RefAny, &mut LayoutCallbackInfo<'_>) -> StyledDom;

/// Read-only context shared by every callback of one pass
#[derive(Clone, Copy)]
pub struct CallbackEnv<'a> {
    pub styled_dom: &'a StyledDom,
    pub layout: &'a dyn LayoutProvider,
    pub previous_window_state: &'a FullWindowState,
    pub current_window_state: &'a FullWindowState,
    pub images: &'a ImageCache,
    pub system: &'a SystemCallbacks,
    pub config: &'a Config,
}

pub struct CallbackInfo<'a> {
    env: CallbackEnv<'a>,
    changes: &'a mut CallbackChanges,
    hit_node: Option<NodeId>,
    event_target: Option<NodeId>,
    frame_start: Instant,
}

impl<'a> CallbackInfo<'a> {
    pub fn new(
        env: CallbackEnv<'a>,
        changes: &'a mut CallbackChanges,
        hit_node: Option<NodeId>,
        event_target: Option<NodeId>,
    ) -> Self {
        let frame_start = env.system.now();
        Self { env, changes, hit_node, event_target, frame_start }
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    /// Node the running callback is registered on
    pub fn get_hit_node(&self) -> Option<NodeId> {
        self.hit_node
    }

    /// Deepest node the event hit (or the focused node for keyboard events)
    pub fn get_event_target(&self) -> Option<NodeId> {
        self.event_target
    }

    pub fn get_cursor_position(&self) -> Option<LogicalPosition> {
        self.env.current_window_state.cursor_position()
    }

    /// Cursor relative to the hit node's border box
    pub fn get_cursor_relative_to_node(&self) -> Option<LogicalPosition> {
        let cursor = self.get_cursor_position()?;
        let rect = self.env.layout.node_rect(self.hit_node?)?;
        Some(rect.relative(cursor))
    }

    pub fn get_previous_window_state(&self) -> &FullWindowState {
        self.env.previous_window_state
    }

    pub fn get_current_window_state(&self) -> &FullWindowState {
        self.env.current_window_state
    }

    pub fn get_styled_dom(&self) -> &StyledDom {
        self.env.styled_dom
    }

    pub fn get_config(&self) -> &Config {
        self.env.config
    }

    pub fn get_dataset(&self, node: NodeId) -> Option<RefAny> {
        self.env.styled_dom.node_data(node)?.dataset.clone()
    }

    /// First node with a dataset of type `T`, in document order
    pub fn find_dataset<T: 'static>(&self) -> Option<(NodeId, RefAny)> {
        self.env.styled_dom.nodes_with_datasets().iter().find_map(|&n| {
            let data = self.get_dataset(n)?;
            data.is_type::<T>().then_some((n, data))
        })
    }

    pub fn get_parent(&self, node: NodeId) -> Option<NodeId> {
        self.env.styled_dom.hierarchy().parent(node)
    }

    pub fn get_first_child(&self, node: NodeId) -> Option<NodeId> {
        self.env.styled_dom.hierarchy().first_child(node)
    }

    pub fn get_last_child(&self, node: NodeId) -> Option<NodeId> {
        self.env.styled_dom.hierarchy().last_child(node)
    }

    pub fn get_next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.env.styled_dom.hierarchy().next_sibling(node)
    }

    pub fn get_previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.env.styled_dom.hierarchy().previous_sibling(node)
    }

    /// Rendered value, including overrides queued earlier in this pass
    pub fn get_computed_css_property(&self, node: NodeId, property: PropertyId) -> Option<CssProperty> {
        if let Some(p) = self.changes.css_properties.get(&node).and_then(|m| m.get(&property)) {
            return Some(p.clone());
        }
        self.env.styled_dom.get_css_property(node, property).cloned()
    }

    pub fn get_node_position(&self, node: NodeId) -> Option<LogicalPosition> {
        self.env.layout.node_rect(node).map(|r| r.origin)
    }

    pub fn get_node_size(&self, node: NodeId) -> Option<LogicalSize> {
        self.env.layout.node_rect(node).map(|r| r.size)
    }

    pub fn get_inline_text(&self, node: NodeId) -> Option<InlineText> {
        self.env.layout.inline_text(node)
    }

    /// Text of a text node, including changes queued in this pass
    pub fn get_text_contents(&self, node: NodeId) -> Option<String> {
        if let Some(text) = self.changes.words_changed.get(&node) {
            return Some(text.clone());
        }
        self.env.styled_dom.text(node).map(str::to_string)
    }

    pub fn get_scroll_position(&self, node: NodeId) -> Option<LogicalPosition> {
        self.changes
            .scroll_positions
            .get(&node)
            .or_else(|| self.env.current_window_state.scroll_states.get(&node))
            .copied()
    }

    pub fn get_focused_node(&self) -> Option<NodeId> {
        self.env.current_window_state.focused_node
    }

    pub fn is_node_hovered(&self, node: NodeId) -> bool {
        self.env.current_window_state.hovered_nodes.contains(&node)
    }

    pub fn get_image(&self, id: &str) -> Option<ImageRef> {
        self.env.images.get(id).ok().cloned()
    }

    pub fn get_system_time(&self) -> Instant {
        self.frame_start
    }

    // ------------------------------------------------------------------
    // Mutations, applied by the host after the pass
    // ------------------------------------------------------------------

    pub fn set_css_property(&mut self, node: NodeId, property: CssProperty) {
        self.changes.css_properties.entry(node).or_default().insert(property.id, property);
    }

    pub fn set_scroll_position(&mut self, node: NodeId, position: LogicalPosition) {
        self.changes.scroll_positions.insert(node, position);
    }

    pub fn set_focus(&mut self, target: FocusTarget) {
        self.changes.focus_target = Some(target);
    }

    /// Replace the window state; hover, focus and scroll state are kept
    pub fn set_window_state(&mut self, state: WindowState) {
        self.changes.window_state = Some(state);
    }

    pub fn change_node_text(&mut self, node: NodeId, text: impl Into<String>) {
        self.changes.words_changed.insert(node, text.into());
    }

    pub fn change_node_image(&mut self, node: NodeId, image: ImageRef) {
        self.changes.images_changed.insert(node, image);
    }

    pub fn add_image(&mut self, id: impl Into<String>, image: ImageRef) {
        self.changes.images_added.push((id.into(), image));
    }

    pub fn start_timer(&mut self, timer: Timer) -> TimerId {
        let id = TimerId::unique();
        debug!(timer = %id, "timer queued");
        self.changes.timers_added.push((id, timer));
        id
    }

    pub fn stop_timer(&mut self, id: TimerId) {
        self.changes.timers_removed.insert(id);
    }

    /// Animate `node` from `animation.from` to `animation.to`; `None` if the
    /// two ends are different properties or the node doesn't exist
    pub fn start_animation(&mut self, node: NodeId, animation: Animation) -> Option<TimerId> {
        if animation.from.id != animation.to.id {
            warn!(from = %animation.from.id, to = %animation.to.id, "animation endpoints differ");
            return None;
        }
        if !self.env.styled_dom.contains(node) {
            warn!(node = %node, "animation on a node outside this dom");
            return None;
        }
        let start = self.frame_start;
        let data = RefAny::new(AnimationData { node, animation, start });
        let timer = Timer::new(data, drive_animation, start)
            .with_interval(self.env.config.default_timer_interval())
            .attach_to(node);
        Some(self.start_timer(timer))
    }

    /// Spawn a worker now; it is registered with the window after the pass
    pub fn start_thread(
        &mut self,
        init_data: RefAny,
        writeback_data: RefAny,
        callback: ThreadCallbackType,
    ) -> Result<ThreadId, ThreadError> {
        let thread = Thread::spawn(self.env.system.spawner.as_ref(), init_data, writeback_data, callback)?;
        let id = thread.id;
        self.changes.threads_added.push(thread);
        Ok(id)
    }

    /// Ask a worker to terminate
    pub fn stop_thread(&mut self, id: ThreadId) {
        self.changes.threads_removed.insert(id);
    }

    pub fn create_window(&mut self, options: WindowCreateOptions) {
        self.changes.windows_created.push(options);
    }

    /// Stop this event from reaching further nodes of the current bubble chain
    pub fn stop_propagation(&mut self) {
        self.changes.stop_propagation = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FixedLayout;
    use crate::window_state::LogicalRect;
    use trellis_css::{Color, Css};

    struct Fixture {
        dom: StyledDom,
        layout: FixedLayout,
        state: FullWindowState,
        images: ImageCache,
        system: SystemCallbacks,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let dom = Dom::body()
                .with_child(Dom::div().with_class("a").with_dataset(RefAny::new(5u32)).with_child(Dom::text("hello")))
                .style(&Css::from_string(".a { color: red }"));
            let layout = FixedLayout::new().with_rect(NodeId::new(1), LogicalRect::new(10.0, 10.0, 100.0, 20.0));
            let mut state = FullWindowState::default();
            state.apply_event(&crate::events::PlatformEvent::MouseMove(LogicalPosition::new(15.0, 12.0)));
            Self {
                dom,
                layout,
                state,
                images: ImageCache::new(),
                system: SystemCallbacks::default(),
                config: Config::default(),
            }
        }

        fn env(&self) -> CallbackEnv<'_> {
            CallbackEnv {
                styled_dom: &self.dom,
                layout: &self.layout,
                previous_window_state: &self.state,
                current_window_state: &self.state,
                images: &self.images,
                system: &self.system,
                config: &self.config,
            }
        }
    }

    #[test]
    fn test_read_api() {
        let fixture = Fixture::new();
        let mut changes = CallbackChanges::new();
        let info = CallbackInfo::new(fixture.env(), &mut changes, Some(NodeId::new(1)), Some(NodeId::new(1)));

        assert_eq!(info.get_cursor_relative_to_node(), Some(LogicalPosition::new(5.0, 2.0)));
        assert_eq!(info.get_dataset(NodeId::new(1)).and_then(|d| d.get_cloned::<u32>()), Some(5));
        assert_eq!(info.find_dataset::<u32>().map(|(n, _)| n), Some(NodeId::new(1)));
        assert_eq!(info.get_parent(NodeId::new(2)), Some(NodeId::new(1)));
        assert_eq!(info.get_text_contents(NodeId::new(2)).as_deref(), Some("hello"));
        assert_eq!(info.get_node_size(NodeId::new(1)), Some(LogicalSize::new(100.0, 20.0)));
        let color = info.get_computed_css_property(NodeId::new(1), PropertyId::Color).unwrap();
        assert_eq!(color.value.as_color(), Some(Color::RED));
    }

    #[test]
    fn test_mutations_are_only_logged() {
        let fixture = Fixture::new();
        let mut changes = CallbackChanges::new();
        {
            let mut info = CallbackInfo::new(fixture.env(), &mut changes, Some(NodeId::new(1)), None);
            info.set_css_property(NodeId::new(1), CssProperty::color(PropertyId::Color, Color::WHITE));
            info.change_node_text(NodeId::new(2), "bye");
            assert_eq!(
                info.get_computed_css_property(NodeId::new(1), PropertyId::Color).and_then(|p| p.value.as_color()),
                Some(Color::WHITE)
            );
            assert_eq!(info.get_text_contents(NodeId::new(2)).as_deref(), Some("bye"));
            info.set_focus(FocusTarget::NoFocus);
            info.stop_propagation();
        }
        // the styled dom itself is untouched
        assert_eq!(
            fixture.dom.get_css_property(NodeId::new(1), PropertyId::Color).and_then(|p| p.value.as_color()),
            Some(Color::RED)
        );
        assert!(changes.stop_propagation);
        assert_eq!(changes.focus_target, Some(FocusTarget::NoFocus));
        assert_eq!(changes.words_changed.len(), 1);
    }

    #[test]
    fn test_start_animation_validates() {
        let fixture = Fixture::new();
        let mut changes = CallbackChanges::new();
        let mut info = CallbackInfo::new(fixture.env(), &mut changes, None, None);
        let ok = Animation::new(
            CssProperty::number(PropertyId::Opacity, 0.0),
            CssProperty::number(PropertyId::Opacity, 1.0),
            std::time::Duration::from_millis(100),
        );
        assert!(info.start_animation(NodeId::new(1), ok.clone()).is_some());
        assert!(info.start_animation(NodeId::new(42), ok).is_none());
        let mismatched = Animation::new(
            CssProperty::number(PropertyId::Opacity, 0.0),
            CssProperty::px(PropertyId::Width, 1.0),
            std::time::Duration::from_millis(100),
        );
        assert!(info.start_animation(NodeId::new(1), mismatched).is_none());
        drop(info);
        assert_eq!(changes.timers_added.len(), 1);
        assert_eq!(changes.timers_added[0].1.node_id, Some(NodeId::new(1)));
    }

    #[test]
    fn test_update_ordering() {
        let mut u = Update::DoNothing;
        u.max_self(Update::RefreshDom);
        u.max_self(Update::DoNothing);
        assert_eq!(u, Update::RefreshDom);
        assert!(Update::RefreshDomAllWindows > Update::RefreshDom);
    }
}
