//! Trellis Core
//!
//! Retained-mode UI core. A user layout callback builds a [`Dom`], which is
//! styled against a stylesheet into a [`StyledDom`]: a flat node arena with a
//! precomputed property cache and an index of the nodes that react to input.
//! Platform events go through [`dispatch_event`], which switches pseudo-states,
//! runs callbacks and hands back a transaction log ([`CallbackChanges`]) that
//! the [`App`] host loop applies between frames. Timers, animations and worker
//! threads are polled by the same loop.
//!
//! Rendering and platform windowing live outside this crate; geometry comes in
//! through the [`LayoutProvider`] trait.

pub mod animation;
pub mod app;
pub mod callbacks;
pub mod changes;
pub mod config;
pub mod dispatch;
pub mod dom;
pub mod events;
pub mod focus;
pub mod id_tree;
pub mod layout;
pub mod prop_cache;
pub mod refany;
pub mod resources;
mod style;
pub mod styled_dom;
pub mod tag_index;
pub mod task;
pub mod window_state;

pub use animation::{Animation, AnimationEasing, AnimationRepeat, AnimationRepeatCount};
pub use app::{App, FrameReport, WindowCreateOptions, WindowId, WindowInstance};
pub use callbacks::{
    Callback, CallbackData, CallbackInfo, CallbackType, LayoutCallbackInfo, LayoutCallbackType, Update,
};
pub use changes::{CallbackChanges, RefreshLevel};
pub use config::Config;
pub use dispatch::{dispatch_event, hit_test, DispatchContext, DispatchResult};
pub use dom::{AccessibilityInfo, AccessibilityRole, Dom, DomError, NodeData, NodeType, TabIndex};
pub use events::{EventFilter, FocusEventFilter, HoverEventFilter, MouseButton, NotEventFilter, PlatformEvent, WindowEventFilter};
pub use focus::FocusTarget;
pub use id_tree::{NodeDataContainer, NodeHierarchy, NodeId};
pub use layout::{BlockLayout, FixedLayout, LayoutProvider};
pub use prop_cache::CssPropertyCache;
pub use refany::RefAny;
pub use resources::{ImageCache, ImageRef, RawImage};
pub use style::CascadeInfo;
pub use styled_dom::{StyledDom, StyledNodeState};
pub use tag_index::{TagId, TagIndex};
pub use task::{
    ManualClock, SystemCallbacks, TerminateTimer, Thread, ThreadId, ThreadReceiveMsg, ThreadSendMsg, Timer,
    TimerCallbackInfo, TimerCallbackReturn, TimerId,
};
pub use window_state::{FullWindowState, LogicalPosition, LogicalRect, LogicalSize, WindowState};

pub use trellis_css as css;
