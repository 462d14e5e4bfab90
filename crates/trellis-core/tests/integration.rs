//! Integration tests - Full pipeline from DOM to dispatch
//!
//! Tests the complete workflow: Dom → cascade → hit test → callbacks → host loop

use std::sync::Arc;
use std::time::Duration;

use trellis_core::callbacks::CallbackEnv;
use trellis_core::css::{Color, Css, CssProperty, PropertyId, PseudoState};
use trellis_core::dom::NodeType;
use trellis_core::events::{HoverEventFilter, MouseButton};
use trellis_core::task::{Clock, StdThreadSpawner, ThreadReceiver, ThreadSender, ThreadWriteBackMsg};
use trellis_core::*;

type Log = Vec<&'static str>;

fn log_of(data: &RefAny) -> Log {
    data.get_cloned::<Log>().unwrap_or_default()
}

fn ctx<'a>(layout: &'a FixedLayout, images: &'a ImageCache, system: &'a SystemCallbacks, config: &'a Config) -> DispatchContext<'a> {
    DispatchContext { layout, images, system, config }
}

// ============================================================================
// ARENA
// ============================================================================

#[test]
fn test_arena_links_are_consistent() {
    let dom = Dom::body()
        .with_child(Dom::div().with_child(Dom::text("a")).with_child(Dom::br()))
        .with_child(Dom::div())
        .with_child(Dom::text("b"));
    let h = dom.hierarchy();
    assert_eq!(dom.node_count(), 6);

    for id in h.document_order() {
        if let Some(parent) = h.parent(id) {
            assert!(h.children(parent).any(|c| c == id));
        }
        if let Some(next) = h.next_sibling(id) {
            assert_eq!(h.previous_sibling(next), Some(id));
            assert_eq!(h.parent(next), h.parent(id));
        }
        if let Some(first) = h.first_child(id) {
            assert_eq!(h.previous_sibling(first), None);
        }
        if let Some(last) = h.last_child(id) {
            assert_eq!(h.next_sibling(last), None);
        }
    }
    // every node is reachable from the root exactly once
    let mut order = h.document_order();
    order.sort();
    order.dedup();
    assert_eq!(order.len(), dom.node_count());
}

#[test]
fn test_attach_rejects_cycles_and_reparenting() {
    let mut dom = Dom::body();
    let a = dom.create(NodeType::Div);
    let b = dom.create(NodeType::Div);
    dom.attach(NodeId::ROOT, a).unwrap();
    dom.attach(a, b).unwrap();

    assert!(matches!(dom.attach(NodeId::ROOT, a), Err(DomError::AlreadyAttached(_))));
    assert!(matches!(dom.attach(b, NodeId::ROOT), Err(DomError::AlreadyAttached(_))));
    assert!(matches!(dom.attach(a, NodeId::new(99)), Err(DomError::InvalidNode(_))));

    let c = dom.create(NodeType::Div);
    assert!(matches!(dom.attach(c, c), Err(DomError::Cycle { .. })));
    assert_eq!(dom.hierarchy().bubble_path(b).collect::<Vec<_>>(), vec![b, a, NodeId::ROOT]);
}

// ============================================================================
// CASCADE
// ============================================================================

#[test]
fn test_cascade_is_deterministic() {
    let css = Css::from_string(
        "div { color: blue; width: 10px } .x:hover { color: red } #y { height: 5px } div:nth-child(2) { opacity: 0.5 }",
    );
    let dom = Dom::body()
        .with_child(Dom::div().with_class("x"))
        .with_child(Dom::div().with_id("y").with_child(Dom::text("t")));

    let a = dom.clone().style(&css);
    let b = dom.style(&css);
    assert_eq!(a.css_property_cache(), b.css_property_cache());
}

#[test]
fn test_specificity_beats_source_order() {
    let dom = Dom::body().with_child(Dom::div().with_id("a").with_class("b"));
    let node = NodeId::new(1);

    for css in [
        "#a { color: red } .b { color: blue } div { color: green }",
        "div { color: green } .b { color: blue } #a { color: red }",
    ] {
        let styled = dom.clone().style(&Css::from_string(css));
        assert_eq!(styled.get_css_property(node, PropertyId::Color).and_then(|p| p.value.as_color()), Some(Color::RED));
    }

    // compound class selector beats a single class in either order
    let compound = Dom::body().with_child(Dom::div().with_class("a").with_class("b"));
    for css in [".a.b { color: red } .a { color: blue }", ".a { color: blue } .a.b { color: red }"] {
        let styled = compound.clone().style(&Css::from_string(css));
        assert_eq!(styled.get_css_property(node, PropertyId::Color).and_then(|p| p.value.as_color()), Some(Color::RED));
    }

    // equal specificity: the later rule wins
    let styled = dom.style(&Css::from_string(".b { color: blue } .b { color: red }"));
    assert_eq!(styled.get_css_property(node, PropertyId::Color).and_then(|p| p.value.as_color()), Some(Color::RED));
}

#[test]
fn test_pseudo_states_do_not_leak() {
    let styled = Dom::body()
        .with_child(Dom::div().with_class("btn"))
        .style(&Css::from_string(".btn { color: black } .btn:hover { color: red } .btn:focus { width: 20px }"));
    let node = NodeId::new(1);

    let normal = styled.get_css_property_in(node, PseudoState::Normal, PropertyId::Color);
    assert_eq!(normal.and_then(|p| p.value.as_color()), Some(Color::BLACK));
    assert!(styled.get_css_property_in(node, PseudoState::Normal, PropertyId::Width).is_none());
    assert!(styled.get_css_property_in(node, PseudoState::Hover, PropertyId::Width).is_none());

    // node is in the normal state, so the hover bucket is not rendered
    assert_eq!(styled.get_css_property(node, PropertyId::Color).and_then(|p| p.value.as_color()), Some(Color::BLACK));
}

// ============================================================================
// DISPATCH
// ============================================================================

fn log_a(data: &mut RefAny, _: &mut CallbackInfo<'_>) -> Update {
    data.with_mut(|l: &mut Log| l.push("A"));
    Update::DoNothing
}

fn log_b(data: &mut RefAny, _: &mut CallbackInfo<'_>) -> Update {
    data.with_mut(|l: &mut Log| l.push("B"));
    Update::DoNothing
}

fn log_b_and_stop(data: &mut RefAny, info: &mut CallbackInfo<'_>) -> Update {
    data.with_mut(|l: &mut Log| l.push("B"));
    info.stop_propagation();
    Update::DoNothing
}

fn log_c(data: &mut RefAny, _: &mut CallbackInfo<'_>) -> Update {
    data.with_mut(|l: &mut Log| l.push("C"));
    Update::RefreshDom
}

fn panics(_: &mut RefAny, _: &mut CallbackInfo<'_>) -> Update {
    panic!("callback failure");
}

/// A > B > C, all covering the same square
fn nested(log: &RefAny, b: CallbackType, c: CallbackType) -> StyledDom {
    let down = EventFilter::Hover(HoverEventFilter::MouseDown);
    Dom::body()
        .with_callback(down, log.clone(), log_a)
        .with_child(
            Dom::div()
                .with_callback(down, log.clone(), b)
                .with_child(Dom::div().with_callback(down, log.clone(), c)),
        )
        .style(&Css::empty())
}

fn square_layout() -> FixedLayout {
    let rect = LogicalRect::new(0.0, 0.0, 100.0, 100.0);
    FixedLayout::new().with_rect(NodeId::new(0), rect).with_rect(NodeId::new(1), rect).with_rect(NodeId::new(2), rect)
}

fn click(dom: &mut StyledDom, layout: &FixedLayout) -> DispatchResult {
    let (images, system, config) = (ImageCache::new(), SystemCallbacks::default(), Config::default());
    let mut state = FullWindowState::default();
    dispatch_event(&PlatformEvent::MouseMove(LogicalPosition::new(50.0, 50.0)), dom, &mut state, ctx(layout, &images, &system, &config));
    dispatch_event(&PlatformEvent::MouseDown(MouseButton::Left), dom, &mut state, ctx(layout, &images, &system, &config))
}

#[test]
fn test_bubbles_from_target_to_root() {
    let log = RefAny::new(Log::new());
    let mut dom = nested(&log, log_b, log_c);
    let result = click(&mut dom, &square_layout());

    assert_eq!(log_of(&log), vec!["C", "B", "A"]);
    assert_eq!(result.hit_node, Some(NodeId::new(2)));
    assert_eq!(result.update, Update::RefreshDom);
}

#[test]
fn test_stop_propagation_cuts_the_chain() {
    let log = RefAny::new(Log::new());
    let mut dom = nested(&log, log_b_and_stop, log_c);
    let result = click(&mut dom, &square_layout());

    assert_eq!(log_of(&log), vec!["C", "B"]);
    assert_eq!(result.invoked, 2);
    assert!(!result.changes.stop_propagation);
}

#[test]
fn test_panicking_callback_is_isolated() {
    let log = RefAny::new(Log::new());
    let mut dom = nested(&log, log_b, panics);
    let result = click(&mut dom, &square_layout());

    assert_eq!(log_of(&log), vec!["B", "A"]);
    assert_eq!(result.invoked, 3);
    assert_eq!(result.update, Update::DoNothing);
}

fn write_everything(_: &mut RefAny, info: &mut CallbackInfo<'_>) -> Update {
    let node = info.get_hit_node().unwrap_or(NodeId::ROOT);
    info.set_css_property(node, CssProperty::color(PropertyId::Color, Color::RED));
    info.set_focus(FocusTarget::First);
    info.change_node_text(NodeId::new(1), "changed");
    // reads see the pending value, the dom does not
    assert_eq!(info.get_text_contents(NodeId::new(1)).as_deref(), Some("changed"));
    assert_eq!(info.get_styled_dom().text(NodeId::new(1)), Some("before"));
    Update::DoNothing
}

#[test]
fn test_callbacks_only_write_the_log() {
    let mut dom = Dom::body()
        .with_callback(EventFilter::Hover(HoverEventFilter::MouseDown), RefAny::new(()), write_everything)
        .with_child(Dom::text("before"))
        .style(&Css::empty());
    let layout = FixedLayout::new().with_rect(NodeId::ROOT, LogicalRect::new(0.0, 0.0, 100.0, 100.0));
    let result = click(&mut dom, &layout);

    assert_eq!(dom.text(NodeId::new(1)), Some("before"));
    assert!(dom.css_property_cache().override_of(NodeId::ROOT, PropertyId::Color).is_none());
    assert_eq!(result.changes.words_changed[&NodeId::new(1)], "changed");
    assert_eq!(result.changes.focus_target, Some(FocusTarget::First));
    assert_eq!(result.refresh, RefreshLevel::Relayout);
}

// ============================================================================
// HOST LOOP
// ============================================================================

/// body > div > div.btn > "ok"
fn button_layout(_: &mut RefAny, _: &mut LayoutCallbackInfo<'_>) -> StyledDom {
    Dom::body()
        .with_child(Dom::div().with_child(Dom::div().with_class("btn").with_child(Dom::text("ok"))))
        .style(&Css::from_string(".btn { color: black } .btn:hover { color: red }"))
}

fn button_rects() -> Box<dyn LayoutProvider> {
    Box::new(
        FixedLayout::new()
            .with_rect(NodeId::new(1), LogicalRect::new(0.0, 0.0, 100.0, 50.0))
            .with_rect(NodeId::new(2), LogicalRect::new(10.0, 10.0, 80.0, 30.0)),
    )
}

#[test]
fn test_hover_button_end_to_end() {
    let mut app = App::new(RefAny::new(()), Config::default()).with_layout_factory(button_rects);
    let window = app.create_window(WindowCreateOptions::new(button_layout));
    let btn = NodeId::new(2);
    let color = |app: &App| {
        app.window(window)
            .and_then(|w| w.styled_dom().get_css_property(btn, PropertyId::Color).and_then(|p| p.value.as_color()))
    };
    assert_eq!(color(&app), Some(Color::BLACK));

    let entered = app.handle_event(window, &PlatformEvent::MouseMove(LogicalPosition::new(20.0, 20.0))).unwrap();
    assert_eq!(entered.update, Update::RefreshDom);
    assert_eq!(entered.callbacks_update, Update::DoNothing);
    assert_eq!(entered.refresh, RefreshLevel::Redraw);
    assert!(app.window(window).unwrap().styled_dom().node_state(btn).hover);
    assert_eq!(color(&app), Some(Color::RED));

    let left = app.handle_event(window, &PlatformEvent::MouseMove(LogicalPosition::new(200.0, 200.0))).unwrap();
    assert_eq!(left.update, Update::RefreshDom);
    let state = app.window(window).unwrap().styled_dom().node_state(btn);
    assert!(state.normal && !state.hover);
    assert_eq!(color(&app), Some(Color::BLACK));

    // moving around outside changes nothing
    let idle = app.handle_event(window, &PlatformEvent::MouseMove(LogicalPosition::new(210.0, 200.0))).unwrap();
    assert_eq!(idle.update, Update::DoNothing);
}

fn count_tick(data: &mut RefAny, info: &mut TimerCallbackInfo<'_>) -> TimerCallbackReturn {
    let runs = data.with_mut(|n: &mut u32| {
        *n += 1;
        *n
    });
    assert_eq!(info.call_count + 1, runs.unwrap_or_default() as usize);
    if runs == Some(3) {
        TimerCallbackReturn::terminate_unchanged()
    } else {
        TimerCallbackReturn::continue_unchanged()
    }
}

#[test]
fn test_timer_fires_every_16ms() {
    let clock = Arc::new(ManualClock::new());
    let mut app = App::new(RefAny::new(()), Config::default())
        .with_system_callbacks(SystemCallbacks::with_clock(clock.clone()));
    let window = app.create_window(WindowCreateOptions::new(button_layout));

    let count = RefAny::new(0u32);
    let timer = Timer::new(count.clone(), count_tick, clock.now()).with_interval(Duration::from_millis(16));
    let id = app.start_timer(window, timer).unwrap();

    let mut fired_at = Vec::new();
    for ms in [8u64, 16, 24, 32, 40, 48, 56, 64] {
        clock.set_elapsed(Duration::from_millis(ms));
        if app.run_frame(clock.now()).timers_run > 0 {
            fired_at.push(ms);
        }
        if ms == 32 {
            let timer = app.window(window).and_then(|w| w.timer(id)).unwrap();
            assert_eq!(timer.run_count, 2);
            assert_eq!(timer.last_run, Some(clock.start() + Duration::from_millis(32)));
        }
    }

    assert_eq!(fired_at, vec![16, 32, 48]);
    assert_eq!(count.get_cloned::<u32>(), Some(3));
    assert!(!app.window(window).unwrap().has_timer(id));
}

fn keep_ticking(data: &mut RefAny, _: &mut TimerCallbackInfo<'_>) -> TimerCallbackReturn {
    data.with_mut(|n: &mut u32| *n += 1);
    TimerCallbackReturn::continue_unchanged()
}

#[test]
fn test_timer_without_timeout_keeps_running() {
    let clock = Arc::new(ManualClock::new());
    let mut app = App::new(RefAny::new(()), Config::default())
        .with_system_callbacks(SystemCallbacks::with_clock(clock.clone()));
    let window = app.create_window(WindowCreateOptions::new(button_layout));

    let count = RefAny::new(0u32);
    let timer = Timer::new(count.clone(), keep_ticking, clock.now()).with_interval(Duration::from_millis(16));
    let id = app.start_timer(window, timer).unwrap();

    for frame in 1..=100u64 {
        clock.set_elapsed(Duration::from_millis(frame * 16));
        app.run_frame(clock.now());
    }
    assert_eq!(count.get_cloned::<u32>(), Some(100));
    assert!(app.window(window).unwrap().has_timer(id));
}

fn add_to_total(total: &mut RefAny, value: &mut RefAny, _: &mut CallbackInfo<'_>) -> Update {
    let v = value.get_cloned::<u32>().unwrap_or_default();
    total.with_mut(|t: &mut u32| *t += v);
    Update::DoNothing
}

fn produce(init: RefAny, sender: ThreadSender, _: ThreadReceiver) {
    let n = init.get_cloned::<u32>().unwrap_or_default();
    for i in 1..=n {
        sender.send(ThreadReceiveMsg::WriteBack(ThreadWriteBackMsg::new(RefAny::new(i), add_to_total)));
    }
}

#[test]
fn test_thread_writebacks_apply_only_on_drain() {
    let clock = Arc::new(ManualClock::new());
    let mut app = App::new(RefAny::new(()), Config { max_thread_messages_per_frame: 2, ..Config::default() })
        .with_system_callbacks(SystemCallbacks::with_clock(clock.clone()));
    let window = app.create_window(WindowCreateOptions::new(button_layout));

    let total = RefAny::new(0u32);
    let mut thread = Thread::spawn(&StdThreadSpawner, RefAny::new(3u32), total.clone(), produce).unwrap();
    thread.join().unwrap();
    let id = app.add_thread(window, thread).unwrap();

    // worker is done but nothing has touched the ui side yet
    assert_eq!(total.get_cloned::<u32>(), Some(0));

    let report = app.run_frame(clock.now());
    assert_eq!(report.thread_messages, 2);
    assert_eq!(total.get_cloned::<u32>(), Some(3));
    assert!(app.window(window).unwrap().has_thread(id));

    let report = app.run_frame(clock.now());
    assert_eq!(report.thread_messages, 1);
    assert_eq!(total.get_cloned::<u32>(), Some(6));
    assert!(!app.window(window).unwrap().has_thread(id));
}

fn start_fade(_: &mut RefAny, info: &mut CallbackInfo<'_>) -> Update {
    let node = info.get_hit_node().unwrap_or(NodeId::ROOT);
    let animation = Animation::new(
        CssProperty::number(PropertyId::Opacity, 0.0),
        CssProperty::number(PropertyId::Opacity, 1.0),
        Duration::from_millis(100),
    );
    info.start_animation(node, animation);
    Update::DoNothing
}

fn fade_rects() -> Box<dyn LayoutProvider> {
    Box::new(FixedLayout::new().with_rect(NodeId::new(1), LogicalRect::new(10.0, 10.0, 80.0, 30.0)))
}

fn fade_layout(_: &mut RefAny, _: &mut LayoutCallbackInfo<'_>) -> StyledDom {
    Dom::body()
        .with_child(Dom::div().with_callback(EventFilter::Hover(HoverEventFilter::MouseDown), RefAny::new(()), start_fade))
        .style(&Css::empty())
}

#[test]
fn test_animation_writes_overrides_until_done() {
    let clock = Arc::new(ManualClock::new());
    let mut app = App::new(RefAny::new(()), Config::default())
        .with_system_callbacks(SystemCallbacks::with_clock(clock.clone()))
        .with_layout_factory(fade_rects);
    let window = app.create_window(WindowCreateOptions::new(fade_layout));
    let node = NodeId::new(1);
    let opacity = |app: &App| {
        app.window(window)
            .and_then(|w| w.styled_dom().get_css_property(node, PropertyId::Opacity).and_then(|p| p.value.as_number()))
    };

    app.handle_event(window, &PlatformEvent::MouseMove(LogicalPosition::new(20.0, 20.0)));
    app.handle_event(window, &PlatformEvent::MouseDown(MouseButton::Left));
    assert_eq!(app.window(window).unwrap().timer_count(), 1);

    clock.set_elapsed(Duration::from_millis(50));
    app.run_frame(clock.now());
    let mid = opacity(&app).unwrap();
    assert!((mid - 0.5).abs() < 1e-3);

    clock.set_elapsed(Duration::from_millis(150));
    app.run_frame(clock.now());
    assert_eq!(opacity(&app), Some(1.0));
    assert_eq!(app.window(window).unwrap().timer_count(), 0);
}

#[test]
fn test_callback_env_is_copy() {
    fn assert_copy<T: Copy>() {}
    assert_copy::<CallbackEnv<'static>>();
}
