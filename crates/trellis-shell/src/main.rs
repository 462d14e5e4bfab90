//! Trellis Shell - Headless host loop
//!
//! Runs a small counter application without a platform window: a scripted
//! cursor hovers and clicks the button, timers and a worker thread tick in
//! the background, and every frame is logged.
//!
//! ```text
//! trellis-shell [--frames N] [--frame-ms MS] [--no-thread]
//! RUST_LOG=trellis_core=debug trellis-shell
//! ```

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trellis_core::callbacks::CallbackInfo;
use trellis_core::events::{ComponentEventFilter, HoverEventFilter, MouseButton};
use trellis_core::task::{StdThreadSpawner, ThreadReceiver, ThreadSender, ThreadWriteBackMsg};
use trellis_core::{
    Animation, AnimationEasing, App, Config, Dom, EventFilter, LayoutCallbackInfo, LogicalPosition, LogicalSize,
    PlatformEvent, RefAny, StyledDom, TerminateTimer, Thread, ThreadReceiveMsg, ThreadSendMsg, Timer,
    TimerCallbackInfo, TimerCallbackReturn, Update, WindowCreateOptions, WindowState,
};
use trellis_css::{Css, CssPath, CssProperty, PropertyId};

#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const STYLE: &str = r#"
    body { padding: 16px; font-size: 14px; color: #202020 }
    .label { margin-bottom: 8px }
    .button { height: 40px; width: 160px; padding: 8px; background: #e0e0e0 }
    .button:hover { background: #c8c8ff }
    .button:active { background: #9090ff }
    .ticks { margin-top: 8px; color: #808080 }
"#;

// ============================================================================
// Arguments
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Args {
    frames: u32,
    frame_ms: u64,
    worker: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self { frames: 120, frame_ms: 16, worker: true }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--frames" => {
                let value = args.next().context("--frames needs a value")?;
                parsed.frames = value.parse().with_context(|| format!("invalid frame count '{}'", value))?;
            }
            "--frame-ms" => {
                let value = args.next().context("--frame-ms needs a value")?;
                parsed.frame_ms = value.parse().with_context(|| format!("invalid frame time '{}'", value))?;
            }
            "--no-thread" => parsed.worker = false,
            other => bail!("unknown argument '{}'", other),
        }
    }
    Ok(parsed)
}

// ============================================================================
// Application
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Counter {
    clicks: u32,
    ticks: u32,
}

fn on_click(data: &mut RefAny, info: &mut CallbackInfo<'_>) -> Update {
    let clicks = data.with_mut(|c: &mut Counter| {
        c.clicks += 1;
        c.clicks
    });
    info!(clicks = ?clicks, "button clicked");

    if let Some(node) = info.get_hit_node() {
        let pulse = Animation::new(
            CssProperty::number(PropertyId::Opacity, 0.4),
            CssProperty::number(PropertyId::Opacity, 1.0),
            Duration::from_millis(250),
        )
        .with_easing(AnimationEasing::EaseOut);
        info.start_animation(node, pulse);
    }
    Update::RefreshDom
}

fn on_mount(_: &mut RefAny, info: &mut CallbackInfo<'_>) -> Update {
    if let Some(node) = info.get_hit_node() {
        let size = info.get_node_size(node).unwrap_or_default();
        info!(node = %node, width = size.width, height = size.height, "button mounted");
    }
    Update::DoNothing
}

fn layout(data: &mut RefAny, info: &mut LayoutCallbackInfo<'_>) -> StyledDom {
    let counter = data.get_cloned::<Counter>().unwrap_or_default();
    let css = Css::from_string(STYLE);

    Dom::body()
        .with_child(Dom::text(format!("Clicked {} times", counter.clicks)).with_class("label"))
        .with_child(
            Dom::div()
                .with_id("increment")
                .with_class("button")
                .with_child(Dom::text("Increment"))
                .with_callback(EventFilter::Hover(HoverEventFilter::MouseUp), data.clone(), on_click)
                .with_callback(EventFilter::Component(ComponentEventFilter::AfterMount), data.clone(), on_mount),
        )
        .with_child(
            Dom::text(format!("{} worker ticks, window {}x{}", counter.ticks, info.window_size.width, info.window_size.height))
                .with_class("ticks"),
        )
        .style(&css)
}

fn heartbeat(_: &mut RefAny, info: &mut TimerCallbackInfo<'_>) -> TimerCallbackReturn {
    info!(run = info.call_count + 1, "heartbeat");
    TimerCallbackReturn {
        should_update: Update::DoNothing,
        should_terminate: if info.is_about_to_finish { TerminateTimer::Terminate } else { TerminateTimer::Continue },
    }
}

fn add_tick(counter: &mut RefAny, _: &mut RefAny, _: &mut CallbackInfo<'_>) -> Update {
    counter.with_mut(|c: &mut Counter| c.ticks += 1);
    Update::RefreshDom
}

/// Sends a write-back every time the host ticks it, until told to stop
fn worker(_: RefAny, sender: ThreadSender, receiver: ThreadReceiver) {
    while let Some(msg) = receiver.recv_timeout(Duration::from_secs(5)) {
        match msg {
            ThreadSendMsg::TerminateThread => break,
            ThreadSendMsg::Tick => {
                let msg = ThreadWriteBackMsg::new(RefAny::new(()), add_tick);
                if !sender.send(ThreadReceiveMsg::WriteBack(msg)) {
                    break;
                }
                std::thread::sleep(Duration::from_millis(200));
            }
            ThreadSendMsg::Custom(_) => {}
        }
    }
}

// ============================================================================
// Scripted input
// ============================================================================

/// Events fed to the window at a given frame
fn scripted_events(frame: u32, button: LogicalPosition) -> Vec<PlatformEvent> {
    match frame {
        10 => vec![PlatformEvent::MouseMove(LogicalPosition::new(button.x - 5.0, button.y))],
        20 => vec![PlatformEvent::MouseMove(button)],
        30 | 60 => vec![PlatformEvent::MouseDown(MouseButton::Left), PlatformEvent::MouseUp(MouseButton::Left)],
        80 => vec![PlatformEvent::MouseLeftWindow],
        _ => Vec::new(),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    info!(?args, "starting trellis shell");

    let data = RefAny::new(Counter::default());
    let mut app = App::new(data.clone(), Config::default());
    let window = app.create_window(
        WindowCreateOptions::new(layout).with_state(WindowState::new("Counter", LogicalSize::new(400.0, 300.0))),
    );

    let start = Instant::now();
    app.start_timer(
        window,
        Timer::new(RefAny::new(()), heartbeat, start)
            .with_interval(Duration::from_millis(500))
            .with_timeout(Duration::from_secs(2)),
    );

    if args.worker {
        let thread = Thread::spawn(&StdThreadSpawner, RefAny::new(()), data.clone(), worker)
            .context("failed to start worker thread")?;
        app.add_thread(window, thread);
    }

    let increment = CssPath::parse("#increment")?;
    let frame_time = Duration::from_millis(args.frame_ms);

    for frame in 0..args.frames {
        let frame_start = Instant::now();

        let Some(instance) = app.window(window) else {
            warn!("window closed, stopping");
            break;
        };
        let button = instance
            .styled_dom()
            .query(&increment)
            .first()
            .and_then(|&node| instance.layout().node_rect(node))
            .map(|r| LogicalPosition::new(r.origin.x + r.size.width / 2.0, r.origin.y + r.size.height / 2.0))
            .unwrap_or_default();

        for event in scripted_events(frame, button) {
            if let Some(result) = app.handle_event(window, &event) {
                info!(frame, event = ?event, update = ?result.update, hit = ?result.hit_node, "event handled");
            }
        }

        let report = app.run_frame(Instant::now());
        if report.update != Update::DoNothing {
            info!(frame, update = ?report.update, regenerated = report.regenerated.len(), "frame refreshed");
        }

        if let Some(remaining) = frame_time.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    app.handle_event(window, &PlatformEvent::CloseRequested);
    let counter = data.get_cloned::<Counter>().unwrap_or_default();
    info!(clicks = counter.clicks, ticks = counter.ticks, elapsed = ?start.elapsed(), "done");
    Ok(())
}
