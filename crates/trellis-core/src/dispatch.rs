//! Event Dispatcher
//!
//! One platform event in, one `DispatchResult` out. The pass runs to
//! completion synchronously:
//!
//! 1. fold the event into the window state
//! 2. hit-test tagged nodes, diff the hovered set and switch `:hover` styles
//! 3. update `:active` on mouse down / up and focus on click / Tab
//! 4. collect callback groups (window, hover enter / leave, hover bubbling,
//!    focus, not, application) and invoke them in order
//! 5. report the highest `Update` plus the transaction log
//!
//! Callbacks only read the styled DOM; everything they change goes into the
//! returned `CallbackChanges` for the host to apply.

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, debug_span, error};

use crate::callbacks::{CallbackEnv, CallbackInfo, Update};
use crate::changes::{CallbackChanges, RefreshLevel};
use crate::config::Config;
use crate::events::{
    application_event, window_events, EventFilter, FocusEventFilter, HoverEventFilter, MouseButton, NotEventFilter,
    PlatformEvent,
};
use crate::focus::{FocusTarget, ResolvedFocus};
use crate::id_tree::NodeId;
use crate::layout::LayoutProvider;
use crate::resources::ImageCache;
use crate::styled_dom::{RestyleChanges, StyledDom};
use crate::task::SystemCallbacks;
use crate::window_state::{FullWindowState, LogicalPosition, VirtualKeyCode};

/// Collaborators a dispatch pass reads from
#[derive(Clone, Copy)]
pub struct DispatchContext<'a> {
    pub layout: &'a dyn LayoutProvider,
    pub images: &'a ImageCache,
    pub system: &'a SystemCallbacks,
    pub config: &'a Config,
}

#[derive(Debug, Default)]
pub struct DispatchResult {
    /// Highest callback result, raised to `RefreshDom` when a pseudo-state
    /// switch changed a rendered property
    pub update: Update,
    /// Highest callback result alone
    pub callbacks_update: Update,
    pub changes: CallbackChanges,
    /// Properties changed by hover / active / focus switches
    pub style_changes: RestyleChanges,
    pub refresh: RefreshLevel,
    /// Deepest tagged node under the cursor
    pub hit_node: Option<NodeId>,
    /// Number of callbacks that ran
    pub invoked: usize,
}

/// Tagged nodes whose box contains `cursor`
pub fn hit_test(styled_dom: &StyledDom, layout: &dyn LayoutProvider, cursor: Option<LogicalPosition>) -> BTreeSet<NodeId> {
    let Some(p) = cursor else {
        return BTreeSet::new();
    };
    styled_dom
        .tag_index()
        .tagged_nodes()
        .filter(|&n| layout.node_rect(n).is_some_and(|r| r.contains(p)))
        .collect()
}

/// Deepest node of `nodes`; ties go to the later node in the arena
fn deepest(styled_dom: &StyledDom, nodes: &BTreeSet<NodeId>) -> Option<NodeId> {
    nodes.iter().copied().max_by_key(|&n| (styled_dom.hierarchy().depth(n), n))
}

fn merge_restyle(into: &mut RestyleChanges, from: RestyleChanges) {
    for (node, changes) in from {
        into.entry(node).or_default().extend(changes);
    }
}

/// Whether a pseudo-state switch touched a property that moves boxes
pub(crate) fn restyle_affects_layout(changes: &RestyleChanges) -> bool {
    changes
        .values()
        .flatten()
        .filter_map(|c| c.current_prop.as_ref().or(c.previous_prop.as_ref()))
        .any(|p| p.id.affects_layout())
}

/// Move focus to `new`, switching `:focus` styles on the old and new node
pub(crate) fn apply_focus(
    styled_dom: &mut StyledDom,
    window_state: &mut FullWindowState,
    new: Option<NodeId>,
) -> RestyleChanges {
    let old = window_state.focused_node;
    if old == new {
        return RestyleChanges::new();
    }
    let mut changes = RestyleChanges::new();
    if let Some(old) = old {
        merge_restyle(&mut changes, styled_dom.restyle_nodes_focus(&[old], false));
    }
    if let Some(new) = new {
        merge_restyle(&mut changes, styled_dom.restyle_nodes_focus(&[new], true));
    }
    debug!(from = ?old, to = ?new, "focus moved");
    window_state.focused_node = new;
    changes
}

/// Resolve a focus request and apply it
pub(crate) fn apply_focus_target(
    styled_dom: &mut StyledDom,
    window_state: &mut FullWindowState,
    target: &FocusTarget,
) -> RestyleChanges {
    match target.resolve(styled_dom, window_state.focused_node) {
        ResolvedFocus::Node(node) => apply_focus(styled_dom, window_state, Some(node)),
        ResolvedFocus::Cleared => apply_focus(styled_dom, window_state, None),
        ResolvedFocus::Unchanged => RestyleChanges::new(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run user code, catching panics when the config asks for it.
///
/// `None` means the callback panicked; the panic is logged.
pub(crate) fn run_guarded<R>(config: &Config, what: &str, f: impl FnOnce() -> R) -> Option<R> {
    if !config.isolate_callback_panics {
        return Some(f());
    }
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => Some(r),
        Err(payload) => {
            error!(callback = what, panic = %panic_message(payload.as_ref()), "callback panicked");
            None
        }
    }
}

fn has_callback(styled_dom: &StyledDom, node: NodeId, filter: EventFilter) -> bool {
    styled_dom.node_data(node).is_some_and(|d| d.callbacks_for(filter).next().is_some())
}

/// Process one platform event against a window
pub fn dispatch_event(
    event: &PlatformEvent,
    styled_dom: &mut StyledDom,
    window_state: &mut FullWindowState,
    ctx: DispatchContext<'_>,
) -> DispatchResult {
    let span = debug_span!("dispatch", event = ?event);
    let _enter = span.enter();

    let previous = window_state.clone();
    window_state.apply_event(event);

    let mut style_changes = RestyleChanges::new();

    // hover
    let mut entered = Vec::new();
    let mut left = Vec::new();
    if event.is_positional() {
        let hovered = hit_test(styled_dom, ctx.layout, window_state.cursor_position());
        entered = hovered.difference(&previous.hovered_nodes).copied().collect();
        left = previous.hovered_nodes.difference(&hovered).copied().collect();
        merge_restyle(&mut style_changes, styled_dom.restyle_nodes_hover(&left, false));
        merge_restyle(&mut style_changes, styled_dom.restyle_nodes_hover(&entered, true));
        window_state.hovered_nodes = hovered;
    }
    let hit_node = deepest(styled_dom, &window_state.hovered_nodes);
    let hit_path: BTreeSet<NodeId> = hit_node.map(|n| styled_dom.hierarchy().bubble_path(n).collect()).unwrap_or_default();

    // active
    match event {
        PlatformEvent::MouseDown(_) => {
            let pressed: Vec<NodeId> =
                window_state.hovered_nodes.difference(&window_state.active_nodes).copied().collect();
            merge_restyle(&mut style_changes, styled_dom.restyle_nodes_active(&pressed, true));
            window_state.active_nodes.extend(pressed);
        }
        PlatformEvent::MouseUp(_) if !window_state.state.mouse_state.mouse_down() => {
            let released: Vec<NodeId> = std::mem::take(&mut window_state.active_nodes).into_iter().collect();
            merge_restyle(&mut style_changes, styled_dom.restyle_nodes_active(&released, false));
        }
        _ => {}
    }

    // focus
    let old_focus = window_state.focused_node;
    match event {
        PlatformEvent::MouseDown(MouseButton::Left) => {
            let clicked = hit_node.and_then(|n| {
                styled_dom
                    .hierarchy()
                    .bubble_path(n)
                    .find(|&a| styled_dom.tag_index().entry_for_node(a).is_some_and(|e| e.tab_index.is_some()))
            });
            merge_restyle(&mut style_changes, apply_focus(styled_dom, window_state, clicked));
        }
        PlatformEvent::KeyDown(VirtualKeyCode::Tab) => {
            let target = if window_state.state.keyboard_state.shift_down() {
                FocusTarget::Previous
            } else {
                FocusTarget::Next
            };
            merge_restyle(&mut style_changes, apply_focus_target(styled_dom, window_state, &target));
        }
        _ => {}
    }
    let new_focus = window_state.focused_node;

    let event_target = if event.is_positional() { hit_node } else { new_focus };

    // callback groups, in invocation order
    let dom: &StyledDom = styled_dom;
    let window_filters = window_events(event, &previous, window_state);
    let mut groups: Vec<(EventFilter, Vec<NodeId>)> = Vec::new();

    for wf in &window_filters {
        let filter = EventFilter::Window(*wf);
        let nodes = dom.nodes_with_window_callbacks().iter().copied().filter(|&n| has_callback(dom, n, filter)).collect();
        groups.push((filter, nodes));
    }

    for (nodes, hf) in [(&left, HoverEventFilter::MouseLeave), (&entered, HoverEventFilter::MouseEnter)] {
        let filter = EventFilter::Hover(hf);
        for &n in nodes {
            if has_callback(dom, n, filter) {
                groups.push((filter, vec![n]));
            }
        }
    }

    if let Some(target) = hit_node {
        for hf in window_filters.iter().filter_map(|wf| wf.to_hover_event_filter()) {
            let filter = EventFilter::Hover(hf);
            let chain = dom.hierarchy().bubble_path(target).filter(|&n| has_callback(dom, n, filter)).collect();
            groups.push((filter, chain));
        }
    }

    if old_focus != new_focus {
        if let Some(old) = old_focus {
            groups.push((EventFilter::Focus(FocusEventFilter::FocusLost), vec![old]));
        }
        if let Some(new) = new_focus {
            groups.push((EventFilter::Focus(FocusEventFilter::FocusReceived), vec![new]));
        }
    }

    if let Some(focused) = new_focus {
        for ff in window_filters.iter().filter_map(|wf| wf.to_focus_event_filter()) {
            if !ff.is_keyboard_event() && !hit_path.contains(&focused) {
                continue;
            }
            let filter = EventFilter::Focus(ff);
            let chain = dom.hierarchy().bubble_path(focused).filter(|&n| has_callback(dom, n, filter)).collect();
            groups.push((filter, chain));
        }
    }

    let hovered_or_hit: BTreeSet<NodeId> = window_state.hovered_nodes.union(&hit_path).copied().collect();
    let focus_path: BTreeSet<NodeId> = new_focus.map(|n| dom.hierarchy().bubble_path(n).collect()).unwrap_or_default();
    for wf in &window_filters {
        let not_filters = [
            wf.to_hover_event_filter().map(|h| (NotEventFilter::Hover(h), &hovered_or_hit)),
            wf.to_focus_event_filter().map(|f| (NotEventFilter::Focus(f), &focus_path)),
        ];
        for (nf, excluded) in not_filters.into_iter().flatten() {
            let filter = EventFilter::Not(nf);
            let nodes = dom
                .nodes_with_not_callbacks()
                .iter()
                .copied()
                .filter(|n| !excluded.contains(n) && has_callback(dom, *n, filter))
                .collect();
            groups.push((filter, nodes));
        }
    }

    if let Some(af) = application_event(event) {
        let filter = EventFilter::Application(af);
        let nodes = dom.nodes_with_application_callbacks().iter().copied().filter(|&n| has_callback(dom, n, filter)).collect();
        groups.push((filter, nodes));
    }

    // invoke
    let env = CallbackEnv {
        styled_dom: dom,
        layout: ctx.layout,
        previous_window_state: &previous,
        current_window_state: &*window_state,
        images: ctx.images,
        system: ctx.system,
        config: ctx.config,
    };
    let mut changes = CallbackChanges::new();
    let mut callbacks_update = Update::DoNothing;
    let mut invoked = 0;

    for (filter, chain) in &groups {
        'chain: for &node in chain {
            let Some(data) = dom.node_data(node) else { continue };
            for cb in data.callbacks_for(*filter) {
                let mut user_data = cb.data.clone();
                let result = {
                    let mut info = CallbackInfo::new(env, &mut changes, Some(node), event_target);
                    run_guarded(ctx.config, "event", || cb.callback.invoke(&mut user_data, &mut info))
                };
                invoked += 1;
                callbacks_update.max_self(result.unwrap_or_default());
                if std::mem::take(&mut changes.stop_propagation) {
                    debug!(node = %node, filter = ?filter, "propagation stopped");
                    break 'chain;
                }
            }
        }
    }

    let mut update = callbacks_update;
    let mut refresh = changes.refresh_level().max(RefreshLevel::from(callbacks_update));
    if !style_changes.is_empty() {
        update.max_self(Update::RefreshDom);
        let level = if restyle_affects_layout(&style_changes) { RefreshLevel::Relayout } else { RefreshLevel::Redraw };
        refresh = refresh.max(level);
    }

    debug!(invoked, update = ?update, refresh = ?refresh, hit = ?hit_node, "dispatch done");

    DispatchResult { update, callbacks_update, changes, style_changes, refresh, hit_node, invoked }
}
