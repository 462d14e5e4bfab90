//! Property Animations
//!
//! An animation is a timer that samples `from -> to` each frame and writes
//! the result as a css override on its node.

use std::time::{Duration, Instant};

use trellis_css::CssProperty;

use crate::callbacks::Update;
use crate::id_tree::NodeId;
use crate::refany::RefAny;
use crate::task::{TerminateTimer, TimerCallbackInfo, TimerCallbackReturn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationRepeat {
    NoRepeat,
    Loop,
    /// Every other cycle runs backwards
    PingPong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationRepeatCount {
    Times(u32),
    Infinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationEasing {
    Linear,
    Ease,
    EaseIn,
    EaseOut,
    EaseInOut,
    CubicBezier { p1: (f32, f32), p2: (f32, f32) },
}

impl AnimationEasing {
    /// Map linear progress `t` (0..=1) to eased progress
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match *self {
            Self::Linear => t,
            Self::Ease => cubic_bezier((0.25, 0.1), (0.25, 1.0), t),
            Self::EaseIn => cubic_bezier((0.42, 0.0), (1.0, 1.0), t),
            Self::EaseOut => cubic_bezier((0.0, 0.0), (0.58, 1.0), t),
            Self::EaseInOut => cubic_bezier((0.42, 0.0), (0.58, 1.0), t),
            Self::CubicBezier { p1, p2 } => cubic_bezier(p1, p2, t),
        }
    }
}

/// Solve x(s) = t for the curve parameter by bisection, then return y(s)
fn cubic_bezier(p1: (f32, f32), p2: (f32, f32), t: f32) -> f32 {
    let bezier = |a: f32, b: f32, s: f32| {
        let inv = 1.0 - s;
        3.0 * inv * inv * s * a + 3.0 * inv * s * s * b + s * s * s
    };

    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    let mut s = t;
    for _ in 0..32 {
        let x = bezier(p1.0, p2.0, s);
        if (x - t).abs() < 1e-5 {
            break;
        }
        if x < t {
            lo = s;
        } else {
            hi = s;
        }
        s = (lo + hi) / 2.0;
    }
    bezier(p1.1, p2.1, s)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub from: CssProperty,
    pub to: CssProperty,
    pub duration: Duration,
    pub repeat: AnimationRepeat,
    pub repeat_count: AnimationRepeatCount,
    pub easing: AnimationEasing,
    /// Return `Update::RefreshDom` from the final frame
    pub relayout_on_finish: bool,
}

impl Animation {
    pub fn new(from: CssProperty, to: CssProperty, duration: Duration) -> Self {
        Self {
            from,
            to,
            duration,
            repeat: AnimationRepeat::NoRepeat,
            repeat_count: AnimationRepeatCount::Times(1),
            easing: AnimationEasing::Linear,
            relayout_on_finish: false,
        }
    }

    pub fn with_repeat(mut self, repeat: AnimationRepeat, count: AnimationRepeatCount) -> Self {
        self.repeat = repeat;
        self.repeat_count = count;
        self
    }

    pub fn with_easing(mut self, easing: AnimationEasing) -> Self {
        self.easing = easing;
        self
    }

    /// Value at `elapsed` and whether the animation has finished
    pub fn sample(&self, elapsed: Duration) -> (CssProperty, bool) {
        let cycles = match (self.repeat, self.repeat_count) {
            (AnimationRepeat::NoRepeat, _) => Some(1),
            (_, AnimationRepeatCount::Times(n)) => Some(n.max(1)),
            (_, AnimationRepeatCount::Infinite) => None,
        };

        let duration = self.duration.as_secs_f32();
        if duration <= 0.0 {
            return (self.to.clone(), true);
        }

        let progress = elapsed.as_secs_f32() / duration;
        let cycle = progress.floor() as u32;
        if let Some(total) = cycles {
            if cycle >= total {
                let reversed = self.repeat == AnimationRepeat::PingPong && total % 2 == 0;
                let end = if reversed { &self.from } else { &self.to };
                return (end.clone(), true);
            }
        }

        let mut t = progress.fract();
        if self.repeat == AnimationRepeat::PingPong && cycle % 2 == 1 {
            t = 1.0 - t;
        }
        let eased = self.easing.apply(t);
        let value = self.from.interpolate(&self.to, eased).unwrap_or_else(|| self.to.clone());
        (value, false)
    }
}

/// Timer payload of a running animation
#[derive(Debug, Clone)]
pub(crate) struct AnimationData {
    pub node: NodeId,
    pub animation: Animation,
    pub start: Instant,
}

pub(crate) fn drive_animation(data: &mut RefAny, info: &mut TimerCallbackInfo<'_>) -> TimerCallbackReturn {
    let frame_start = info.frame_start;
    let Some((node, property, finished, relayout)) = data.with_ref(|d: &AnimationData| {
        let (property, finished) = d.animation.sample(frame_start.saturating_duration_since(d.start));
        (d.node, property, finished, d.animation.relayout_on_finish)
    }) else {
        return TimerCallbackReturn::terminate_unchanged();
    };

    info.set_css_property(node, property);

    if finished {
        TimerCallbackReturn {
            should_update: if relayout { Update::RefreshDom } else { Update::DoNothing },
            should_terminate: TerminateTimer::Terminate,
        }
    } else {
        TimerCallbackReturn::continue_unchanged()
    }
}
