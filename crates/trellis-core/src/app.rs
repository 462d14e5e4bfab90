//! Host Loop
//!
//! `App` owns the user's data, the shared image cache and every open window.
//! A platform layer feeds it events through [`App::handle_event`] and ticks it
//! once per frame through [`App::run_frame`]. Both end the same way: the
//! callbacks' transaction log is applied to the window, and the DOM is
//! regenerated when a callback asked for it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tracing::{debug, debug_span, info, warn};
use trellis_css::Css;

use crate::callbacks::{CallbackEnv, CallbackInfo, LayoutCallbackInfo, LayoutCallbackType, Update};
use crate::changes::{CallbackChanges, RefreshLevel};
use crate::config::Config;
use crate::dispatch::{
    apply_focus_target, dispatch_event, restyle_affects_layout, run_guarded, DispatchContext, DispatchResult,
};
use crate::dom::Dom;
use crate::events::{ComponentEventFilter, EventFilter, PlatformEvent};
use crate::id_tree::NodeId;
use crate::layout::{BlockLayout, LayoutProvider};
use crate::refany::RefAny;
use crate::resources::ImageCache;
use crate::styled_dom::StyledDom;
use crate::task::{
    SystemCallbacks, TerminateTimer, Thread, ThreadId, ThreadReceiveMsg, ThreadSendMsg, Timer, TimerCallbackInfo,
    TimerId,
};
use crate::window_state::{FullWindowState, LogicalSize, WindowState};

static NEXT_WINDOW_ID: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(usize);

impl WindowId {
    pub fn unique() -> Self {
        Self(NEXT_WINDOW_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window:{}", self.0)
    }
}

/// Everything needed to open a window
#[derive(Debug, Clone)]
pub struct WindowCreateOptions {
    pub state: WindowState,
    /// Builds the window's DOM from the app data
    pub layout_callback: LayoutCallbackType,
}

impl WindowCreateOptions {
    pub fn new(layout_callback: LayoutCallbackType) -> Self {
        Self { state: WindowState::default(), layout_callback }
    }

    pub fn with_state(mut self, state: WindowState) -> Self {
        self.state = state;
        self
    }
}

/// Creates the layout provider of each new window
pub type LayoutFactory = Box<dyn Fn() -> Box<dyn LayoutProvider>>;

/// What one call to [`App::run_frame`] did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub timers_run: usize,
    pub thread_messages: usize,
    pub update: Update,
    pub regenerated: Vec<WindowId>,
}

#[derive(Clone, Copy)]
struct HostCtx<'a> {
    system: &'a SystemCallbacks,
    config: &'a Config,
}

// ============================================================================
// Window
// ============================================================================

/// One open window: its DOM, geometry, interaction state and scheduled work
pub struct WindowInstance {
    id: WindowId,
    state: FullWindowState,
    layout_callback: LayoutCallbackType,
    styled_dom: StyledDom,
    layout: Box<dyn LayoutProvider>,
    timers: BTreeMap<TimerId, Timer>,
    threads: BTreeMap<ThreadId, Thread>,
    /// Last known size of nodes listening for `NodeResized`
    node_sizes: BTreeMap<NodeId, LogicalSize>,
}

impl fmt::Debug for WindowInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowInstance")
            .field("id", &self.id)
            .field("title", &self.state.state.title)
            .field("nodes", &self.styled_dom.node_count())
            .field("timers", &self.timers.len())
            .field("threads", &self.threads.len())
            .finish()
    }
}

fn build_dom(
    layout_callback: LayoutCallbackType,
    data: &RefAny,
    state: &WindowState,
    images: &ImageCache,
    config: &Config,
) -> Option<StyledDom> {
    let mut data = data.clone();
    let mut info = LayoutCallbackInfo { window_size: state.size, theme: state.theme, images };
    run_guarded(config, "layout", || layout_callback(&mut data, &mut info))
}

/// Keep only the parts of a log that don't refer to nodes
fn without_node_changes(changes: CallbackChanges) -> CallbackChanges {
    CallbackChanges {
        images_added: changes.images_added,
        timers_added: changes.timers_added,
        timers_removed: changes.timers_removed,
        threads_added: changes.threads_added,
        threads_removed: changes.threads_removed,
        windows_created: changes.windows_created,
        window_state: changes.window_state,
        ..Default::default()
    }
}

impl WindowInstance {
    fn open(
        options: WindowCreateOptions,
        layout: Box<dyn LayoutProvider>,
        data: &RefAny,
        images: &mut ImageCache,
        ctx: HostCtx<'_>,
    ) -> (Self, Vec<WindowCreateOptions>) {
        let id = WindowId::unique();
        let styled_dom = build_dom(options.layout_callback, data, &options.state, images, ctx.config).unwrap_or_else(|| {
            warn!(window = %id, "layout callback failed, opening with an empty body");
            Dom::body().style(&Css::empty())
        });

        let mut window = Self {
            id,
            state: FullWindowState::new(options.state),
            layout_callback: options.layout_callback,
            styled_dom,
            layout,
            timers: BTreeMap::new(),
            threads: BTreeMap::new(),
            node_sizes: BTreeMap::new(),
        };
        window.relayout();
        let mounted = window.invoke_component(ComponentEventFilter::AfterMount, None, images, ctx);
        let created = window.apply_changes(mounted, images, ctx, true);
        info!(window = %id, nodes = window.styled_dom.node_count(), "window opened");
        (window, created)
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn state(&self) -> &FullWindowState {
        &self.state
    }

    pub fn styled_dom(&self) -> &StyledDom {
        &self.styled_dom
    }

    pub fn layout(&self) -> &dyn LayoutProvider {
        self.layout.as_ref()
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn has_timer(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn timer(&self, id: TimerId) -> Option<&Timer> {
        self.timers.get(&id)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn has_thread(&self, id: ThreadId) -> bool {
        self.threads.contains_key(&id)
    }

    fn env<'a>(&'a self, images: &'a ImageCache, ctx: HostCtx<'a>) -> CallbackEnv<'a> {
        CallbackEnv {
            styled_dom: &self.styled_dom,
            layout: self.layout.as_ref(),
            previous_window_state: &self.state,
            current_window_state: &self.state,
            images,
            system: ctx.system,
            config: ctx.config,
        }
    }

    /// Run component callbacks on `nodes`, or on every node listening for them
    fn invoke_component(
        &self,
        filter: ComponentEventFilter,
        nodes: Option<&[NodeId]>,
        images: &ImageCache,
        ctx: HostCtx<'_>,
    ) -> CallbackChanges {
        let event = EventFilter::Component(filter);
        let env = self.env(images, ctx);
        let mut changes = CallbackChanges::new();
        let nodes = nodes.unwrap_or(self.styled_dom.nodes_with_component_callbacks());

        for &node in nodes {
            let Some(data) = self.styled_dom.node_data(node) else { continue };
            for cb in data.callbacks_for(event) {
                let mut user_data = cb.data.clone();
                let mut info = CallbackInfo::new(env, &mut changes, Some(node), Some(node));
                // component callbacks cannot trigger a regeneration
                let update = run_guarded(ctx.config, "component", || cb.callback.invoke(&mut user_data, &mut info));
                if update.is_some_and(|u| u != Update::DoNothing) {
                    debug!(node = %node, filter = ?filter, "ignoring update from component callback");
                }
            }
        }
        changes.stop_propagation = false;
        changes
    }

    /// Recompute geometry; returns the listening nodes whose size changed
    fn relayout(&mut self) -> Vec<NodeId> {
        self.layout.relayout(&self.styled_dom, self.state.state.size);

        let event = EventFilter::Component(ComponentEventFilter::NodeResized);
        let mut resized = Vec::new();
        for &node in self.styled_dom.nodes_with_component_callbacks() {
            let listens = self.styled_dom.node_data(node).is_some_and(|d| d.callbacks_for(event).next().is_some());
            let Some(rect) = self.layout.node_rect(node).filter(|_| listens) else { continue };
            if self.node_sizes.insert(node, rect.size).is_some_and(|old| old != rect.size) {
                resized.push(node);
            }
        }
        resized
    }

    fn relayout_and_notify(
        &mut self,
        images: &mut ImageCache,
        ctx: HostCtx<'_>,
        notify_resize: bool,
    ) -> Vec<WindowCreateOptions> {
        let resized = self.relayout();
        if !notify_resize || resized.is_empty() {
            return Vec::new();
        }
        let changes = self.invoke_component(ComponentEventFilter::NodeResized, Some(&resized), images, ctx);
        self.apply_changes(changes, images, ctx, false)
    }

    /// Apply a transaction log; returns the windows it asked to open
    fn apply_changes(
        &mut self,
        changes: CallbackChanges,
        images: &mut ImageCache,
        ctx: HostCtx<'_>,
        notify_resize: bool,
    ) -> Vec<WindowCreateOptions> {
        let mut refresh = changes.refresh_level();
        let CallbackChanges {
            focus_target,
            css_properties,
            scroll_positions,
            words_changed,
            images_changed,
            images_added,
            timers_added,
            timers_removed,
            threads_added,
            threads_removed,
            windows_created,
            window_state,
            stop_propagation: _,
        } = changes;

        for (id, image) in images_added {
            images.add(id, image);
        }

        if let Some(target) = focus_target {
            let restyled = apply_focus_target(&mut self.styled_dom, &mut self.state, &target);
            if restyle_affects_layout(&restyled) {
                refresh = refresh.max(RefreshLevel::Relayout);
            }
        }

        for (node, props) in css_properties {
            for prop in props.into_values() {
                self.styled_dom.set_css_property(node, prop);
            }
        }

        self.state.scroll_states.extend(scroll_positions);

        for (node, text) in words_changed {
            if !self.styled_dom.set_text(node, text) {
                warn!(node = %node, "change_node_text on a node that is not a text node");
            }
        }
        for (node, image) in images_changed {
            if !self.styled_dom.set_image(node, image) {
                warn!(node = %node, "change_node_image on a node that is not an image");
            }
        }

        for (id, timer) in timers_added {
            debug!(window = %self.id, timer = %id, "timer started");
            self.timers.insert(id, timer);
        }
        for id in timers_removed {
            if self.timers.remove(&id).is_some() {
                debug!(window = %self.id, timer = %id, "timer stopped");
            }
        }

        for thread in threads_added {
            self.threads.insert(thread.id, thread);
        }
        for id in threads_removed {
            if let Some(thread) = self.threads.remove(&id) {
                thread.send(ThreadSendMsg::TerminateThread);
                debug!(window = %self.id, thread = %id, "thread stopped");
            }
        }

        if let Some(mut new_state) = window_state {
            // input state belongs to the platform
            new_state.mouse_state = self.state.state.mouse_state;
            new_state.keyboard_state = std::mem::take(&mut self.state.state.keyboard_state);
            self.state.state = new_state;
        }

        let mut created = windows_created;
        if refresh >= RefreshLevel::Relayout {
            created.extend(self.relayout_and_notify(images, ctx, notify_resize));
        }
        created
    }

    /// Replace the DOM with a fresh one from the layout callback
    fn regenerate_dom(&mut self, data: &RefAny, images: &mut ImageCache, ctx: HostCtx<'_>) -> Vec<WindowCreateOptions> {
        let _span = debug_span!("regenerate", window = %self.id).entered();

        let unmounted = self.invoke_component(ComponentEventFilter::BeforeUnmount, None, images, ctx);
        let Some(styled_dom) = build_dom(self.layout_callback, data, &self.state.state, images, ctx.config) else {
            warn!(window = %self.id, "layout callback failed, keeping the previous dom");
            return self.apply_changes(without_node_changes(unmounted), images, ctx, false);
        };

        if ctx.config.stop_node_timers_on_refresh {
            let before = self.timers.len();
            self.timers.retain(|_, t| t.node_id.is_none());
            if self.timers.len() != before {
                debug!(stopped = before - self.timers.len(), "node timers stopped");
            }
        }

        // node ids of the old dom mean nothing now
        self.state.hovered_nodes.clear();
        self.state.active_nodes.clear();
        self.state.focused_node = None;
        self.state.scroll_states.clear();
        self.node_sizes.clear();
        self.styled_dom = styled_dom;

        let mut created = self.apply_changes(without_node_changes(unmounted), images, ctx, false);
        self.relayout();
        let mounted = self.invoke_component(ComponentEventFilter::AfterMount, None, images, ctx);
        created.extend(self.apply_changes(mounted, images, ctx, true));
        debug!(nodes = self.styled_dom.node_count(), "dom regenerated");
        created
    }

    fn dispatch(&mut self, event: &PlatformEvent, images: &ImageCache, ctx: HostCtx<'_>) -> DispatchResult {
        let dispatch_ctx =
            DispatchContext { layout: self.layout.as_ref(), images, system: ctx.system, config: ctx.config };
        dispatch_event(event, &mut self.styled_dom, &mut self.state, dispatch_ctx)
    }

    /// Run every due timer; expired and terminated timers are removed afterwards
    fn run_timers(&mut self, now: Instant, images: &ImageCache, ctx: HostCtx<'_>) -> (Update, usize, CallbackChanges) {
        let Self { styled_dom, layout, state, timers, .. } = self;
        let env = CallbackEnv {
            styled_dom: &*styled_dom,
            layout: &**layout,
            previous_window_state: &*state,
            current_window_state: &*state,
            images,
            system: ctx.system,
            config: ctx.config,
        };

        let mut changes = CallbackChanges::new();
        let mut update = Update::DoNothing;
        let mut finished = Vec::new();
        let mut ran = 0;

        for (&id, timer) in timers.iter_mut() {
            if timer.is_expired(now) {
                finished.push(id);
                continue;
            }
            if !timer.should_run(now) {
                continue;
            }

            let callback = timer.callback;
            let mut data = timer.data.clone();
            let mut info = TimerCallbackInfo {
                callback_info: CallbackInfo::new(env, &mut changes, timer.node_id, timer.node_id),
                node_id: timer.node_id,
                frame_start: now,
                call_count: timer.run_count,
                is_about_to_finish: timer.is_about_to_finish(now),
            };
            let result = run_guarded(ctx.config, "timer", || callback(&mut data, &mut info));

            timer.last_run = Some(now);
            timer.run_count += 1;
            ran += 1;

            match result {
                Some(r) => {
                    update.max_self(r.should_update);
                    if r.should_terminate == TerminateTimer::Terminate {
                        finished.push(id);
                    }
                }
                None => finished.push(id),
            }
        }
        changes.stop_propagation = false;

        for id in finished {
            timers.remove(&id);
            debug!(timer = %id, "timer finished");
        }
        (update, ran, changes)
    }

    /// Drain worker messages in FIFO order and reap finished workers
    fn drain_threads(&mut self, images: &ImageCache, ctx: HostCtx<'_>) -> (Update, usize, CallbackChanges) {
        let Self { styled_dom, layout, state, threads, .. } = self;
        let env = CallbackEnv {
            styled_dom: &*styled_dom,
            layout: &**layout,
            previous_window_state: &*state,
            current_window_state: &*state,
            images,
            system: ctx.system,
            config: ctx.config,
        };
        let max = ctx.config.max_thread_messages_per_frame;

        let mut changes = CallbackChanges::new();
        let mut update = Update::DoNothing;
        let mut finished = Vec::new();
        let mut received = 0;

        for (&id, thread) in threads.iter_mut() {
            // checked before draining so nothing sent before exit is lost
            let was_finished = thread.is_finished();
            let messages = thread.drain(max);
            let drained = messages.len();
            received += drained;

            for msg in messages {
                match msg {
                    ThreadReceiveMsg::Update(u) => update.max_self(u),
                    ThreadReceiveMsg::WriteBack(mut write_back) => {
                        let callback = write_back.callback;
                        let writeback_data = &mut thread.writeback_data;
                        let mut info = CallbackInfo::new(env, &mut changes, None, None);
                        let result =
                            run_guarded(ctx.config, "writeback", || callback(writeback_data, &mut write_back.data, &mut info));
                        update.max_self(result.unwrap_or_default());
                    }
                }
            }

            if was_finished && drained < max {
                finished.push(id);
            } else if ctx.config.send_thread_ticks && !was_finished {
                thread.send(ThreadSendMsg::Tick);
            }
        }
        changes.stop_propagation = false;

        for id in finished {
            if let Some(mut thread) = threads.remove(&id) {
                match thread.join() {
                    Ok(()) => debug!(thread = %id, "thread reaped"),
                    Err(e) => warn!(thread = %id, error = %e, "thread ended abnormally"),
                }
            }
        }
        (update, received, changes)
    }
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    data: RefAny,
    config: Config,
    system: SystemCallbacks,
    images: ImageCache,
    windows: BTreeMap<WindowId, WindowInstance>,
    layout_factory: LayoutFactory,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("data", &self.data)
            .field("config", &self.config)
            .field("windows", &self.windows)
            .finish_non_exhaustive()
    }
}

impl App {
    pub fn new(data: RefAny, config: Config) -> Self {
        Self {
            data,
            config,
            system: SystemCallbacks::default(),
            images: ImageCache::new(),
            windows: BTreeMap::new(),
            layout_factory: Box::new(|| Box::new(BlockLayout::default())),
        }
    }

    pub fn with_system_callbacks(mut self, system: SystemCallbacks) -> Self {
        self.system = system;
        self
    }

    pub fn with_layout_factory(mut self, factory: impl Fn() -> Box<dyn LayoutProvider> + 'static) -> Self {
        self.layout_factory = Box::new(factory);
        self
    }

    pub fn data(&self) -> &RefAny {
        &self.data
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn system(&self) -> &SystemCallbacks {
        &self.system
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut ImageCache {
        &mut self.images
    }

    pub fn window(&self, id: WindowId) -> Option<&WindowInstance> {
        self.windows.get(&id)
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Open a window, plus any windows its mount callbacks ask for
    pub fn create_window(&mut self, options: WindowCreateOptions) -> WindowId {
        let (id, mut pending) = self.open_window(options);
        while let Some(options) = pending.pop() {
            let (_, created) = self.open_window(options);
            pending.extend(created);
        }
        id
    }

    fn open_window(&mut self, options: WindowCreateOptions) -> (WindowId, Vec<WindowCreateOptions>) {
        let layout = (self.layout_factory)();
        let ctx = HostCtx { system: &self.system, config: &self.config };
        let (window, created) = WindowInstance::open(options, layout, &self.data, &mut self.images, ctx);
        let id = window.id;
        self.windows.insert(id, window);
        (id, created)
    }

    pub fn close_window(&mut self, id: WindowId) -> bool {
        let closed = self.windows.remove(&id).is_some();
        if closed {
            info!(window = %id, "window closed");
        }
        closed
    }

    /// Start a timer on a window from outside any callback
    pub fn start_timer(&mut self, window: WindowId, timer: Timer) -> Option<TimerId> {
        let instance = self.windows.get_mut(&window)?;
        let id = TimerId::unique();
        instance.timers.insert(id, timer);
        Some(id)
    }

    /// Register an already spawned worker with a window
    pub fn add_thread(&mut self, window: WindowId, thread: Thread) -> Option<ThreadId> {
        let instance = self.windows.get_mut(&window)?;
        let id = thread.id;
        instance.threads.insert(id, thread);
        Some(id)
    }

    /// Dispatch one event to a window and apply what its callbacks did.
    ///
    /// The returned result's `changes` has already been applied and is empty.
    pub fn handle_event(&mut self, window: WindowId, event: &PlatformEvent) -> Option<DispatchResult> {
        let ctx = HostCtx { system: &self.system, config: &self.config };
        let Some(instance) = self.windows.get_mut(&window) else {
            warn!(window = %window, "event for unknown window");
            return None;
        };

        let mut result = instance.dispatch(event, &self.images, ctx);
        let changes = std::mem::take(&mut result.changes);
        let mut created = instance.apply_changes(changes, &mut self.images, ctx, true);

        if restyle_affects_layout(&result.style_changes) {
            created.extend(instance.relayout_and_notify(&mut self.images, ctx, true));
        }

        // hover / focus restyles alone never rebuild the dom
        match result.callbacks_update {
            Update::DoNothing => {}
            Update::RefreshDom => created.extend(instance.regenerate_dom(&self.data, &mut self.images, ctx)),
            Update::RefreshDomAllWindows => {
                for w in self.windows.values_mut() {
                    created.extend(w.regenerate_dom(&self.data, &mut self.images, ctx));
                }
            }
        }

        let close = matches!(event, PlatformEvent::CloseRequested)
            && self.windows.get(&window).is_some_and(|w| w.state.state.flags.close_requested);
        if close {
            self.close_window(window);
        }

        for options in created {
            self.create_window(options);
        }
        Some(result)
    }

    /// Dispatch an application-level event to every window
    pub fn handle_application_event(&mut self, event: &PlatformEvent) -> Vec<(WindowId, DispatchResult)> {
        self.window_ids()
            .into_iter()
            .filter_map(|id| self.handle_event(id, event).map(|r| (id, r)))
            .collect()
    }

    /// Run due timers and drain worker threads of every window
    pub fn run_frame(&mut self, now: Instant) -> FrameReport {
        let _span = debug_span!("frame").entered();
        let ctx = HostCtx { system: &self.system, config: &self.config };
        let mut report = FrameReport::default();
        let mut created = Vec::new();
        let mut regenerate_all = false;

        for (&id, window) in self.windows.iter_mut() {
            let (timer_update, ran, mut changes) = window.run_timers(now, &self.images, ctx);
            let (thread_update, received, thread_changes) = window.drain_threads(&self.images, ctx);
            changes.merge(thread_changes);
            report.timers_run += ran;
            report.thread_messages += received;

            created.extend(window.apply_changes(changes, &mut self.images, ctx, true));

            let mut update = timer_update;
            update.max_self(thread_update);
            report.update.max_self(update);
            match update {
                Update::DoNothing => {}
                Update::RefreshDom => {
                    created.extend(window.regenerate_dom(&self.data, &mut self.images, ctx));
                    report.regenerated.push(id);
                }
                Update::RefreshDomAllWindows => regenerate_all = true,
            }
        }

        if regenerate_all {
            report.regenerated.clear();
            for (&id, window) in self.windows.iter_mut() {
                created.extend(window.regenerate_dom(&self.data, &mut self.images, ctx));
                report.regenerated.push(id);
            }
        }

        for options in created {
            self.create_window(options);
        }
        if report.timers_run > 0 || report.thread_messages > 0 {
            debug!(timers = report.timers_run, messages = report.thread_messages, update = ?report.update, "frame done");
        }
        report
    }

    /// Regenerate one window's DOM as if a callback returned `RefreshDom`
    pub fn refresh_window(&mut self, window: WindowId) -> bool {
        let ctx = HostCtx { system: &self.system, config: &self.config };
        let Some(instance) = self.windows.get_mut(&window) else { return false };
        let created = instance.regenerate_dom(&self.data, &mut self.images, ctx);
        for options in created {
            self.create_window(options);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{HoverEventFilter, MouseButton};
    use crate::layout::FixedLayout;
    use crate::task::{Clock, ManualClock, TimerCallbackReturn};
    use crate::window_state::{LogicalPosition, LogicalRect};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, Default)]
    struct Counter {
        value: usize,
        mounted: usize,
    }

    fn on_click(data: &mut RefAny, _: &mut CallbackInfo<'_>) -> Update {
        data.with_mut(|c: &mut Counter| c.value += 1);
        Update::RefreshDom
    }

    fn on_mount(data: &mut RefAny, _: &mut CallbackInfo<'_>) -> Update {
        data.with_mut(|c: &mut Counter| c.mounted += 1);
        Update::DoNothing
    }

    fn counter_layout(data: &mut RefAny, _: &mut LayoutCallbackInfo<'_>) -> StyledDom {
        let value = data.with_ref(|c: &Counter| c.value).unwrap_or_default();
        Dom::body()
            .with_child(Dom::text(value.to_string()))
            .with_child(
                Dom::div()
                    .with_callback(EventFilter::Hover(HoverEventFilter::MouseUp), data.clone(), on_click)
                    .with_callback(EventFilter::Component(ComponentEventFilter::AfterMount), data.clone(), on_mount),
            )
            .style(&Css::empty())
    }

    fn fixed_layout() -> Box<dyn LayoutProvider> {
        Box::new(FixedLayout::new().with_rect(NodeId::new(2), LogicalRect::new(0.0, 0.0, 20.0, 20.0)))
    }

    #[test]
    fn test_click_regenerates_dom() {
        let data = RefAny::new(Counter::default());
        let mut app = App::new(data.clone(), Config::default()).with_layout_factory(fixed_layout);
        let window = app.create_window(WindowCreateOptions::new(counter_layout));
        assert_eq!(data.with_ref(|c: &Counter| c.mounted), Some(1));

        app.handle_event(window, &PlatformEvent::MouseMove(LogicalPosition::new(5.0, 5.0)));
        app.handle_event(window, &PlatformEvent::MouseDown(MouseButton::Left));
        let result = app.handle_event(window, &PlatformEvent::MouseUp(MouseButton::Left)).unwrap();
        assert_eq!(result.callbacks_update, Update::RefreshDom);

        let instance = app.window(window).unwrap();
        assert_eq!(instance.styled_dom().text(NodeId::new(1)), Some("1"));
        assert_eq!(data.with_ref(|c: &Counter| c.mounted), Some(2));
        // regeneration drops stale interaction state
        assert!(instance.state().hovered_nodes.is_empty());
    }

    #[test]
    fn test_close_requested() {
        let mut app = App::new(RefAny::new(Counter::default()), Config::default());
        let window = app.create_window(WindowCreateOptions::new(counter_layout));
        assert_eq!(app.window_count(), 1);
        app.handle_event(window, &PlatformEvent::CloseRequested);
        assert_eq!(app.window_count(), 0);
        assert!(app.handle_event(window, &PlatformEvent::MouseLeftWindow).is_none());
    }

    fn tick(data: &mut RefAny, _: &mut TimerCallbackInfo<'_>) -> TimerCallbackReturn {
        data.with_mut(|n: &mut u32| *n += 1);
        TimerCallbackReturn::continue_unchanged()
    }

    #[test]
    fn test_timer_timeout_removes_timer() {
        let clock = Arc::new(ManualClock::new());
        let mut app = App::new(RefAny::new(Counter::default()), Config::default())
            .with_system_callbacks(SystemCallbacks::with_clock(clock.clone()));
        let window = app.create_window(WindowCreateOptions::new(counter_layout));

        let count = RefAny::new(0u32);
        let timer = Timer::new(count.clone(), tick, clock.now())
            .with_interval(Duration::from_millis(10))
            .with_timeout(Duration::from_millis(25));
        let id = app.start_timer(window, timer).unwrap();

        for _ in 0..4 {
            clock.advance(Duration::from_millis(10));
            app.run_frame(clock.now());
        }
        assert_eq!(count.get_cloned::<u32>(), Some(2));
        assert!(!app.window(window).unwrap().has_timer(id));
    }

    fn panicking_timer(_: &mut RefAny, _: &mut TimerCallbackInfo<'_>) -> TimerCallbackReturn {
        panic!("timer blew up");
    }

    #[test]
    fn test_panicking_timer_is_dropped() {
        let clock = Arc::new(ManualClock::new());
        let mut app = App::new(RefAny::new(Counter::default()), Config::default())
            .with_system_callbacks(SystemCallbacks::with_clock(clock.clone()));
        let window = app.create_window(WindowCreateOptions::new(counter_layout));
        let id = app.start_timer(window, Timer::new(RefAny::new(()), panicking_timer, clock.now())).unwrap();

        let report = app.run_frame(clock.now());
        assert_eq!(report.timers_run, 1);
        assert!(!app.window(window).unwrap().has_timer(id));
    }
}
