//! Events and Event Filters
//!
//! `PlatformEvent` is what the host feeds in. Callbacks subscribe with an
//! `EventFilter`; the dispatcher turns each platform event into the set of
//! filter values that fired.

use std::path::PathBuf;

use crate::window_state::{FullWindowState, LogicalPosition, LogicalSize, VirtualKeyCode, WindowTheme};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollPhase {
    Start,
    Move,
    End,
}

/// Raw event from the windowing layer
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    MouseMove(LogicalPosition),
    MouseLeftWindow,
    MouseDown(MouseButton),
    MouseUp(MouseButton),
    Scroll { delta: LogicalPosition, phase: ScrollPhase },
    KeyDown(VirtualKeyCode),
    KeyUp(VirtualKeyCode),
    TextInput(char),
    WindowFocusReceived,
    WindowFocusLost,
    Resized(LogicalSize),
    Moved(LogicalPosition),
    CloseRequested,
    ThemeChanged(WindowTheme),
    FileHovered(PathBuf),
    FileDropped(PathBuf),
    FileHoverCancelled,
    TouchStart(LogicalPosition),
    TouchMove(LogicalPosition),
    TouchEnd(LogicalPosition),
    TouchCancel,
    DeviceConnected(String),
    DeviceDisconnected(String),
}

impl PlatformEvent {
    /// Events whose target comes from hit-testing rather than focus
    pub fn is_positional(&self) -> bool {
        matches!(
            self,
            Self::MouseMove(_)
                | Self::MouseLeftWindow
                | Self::MouseDown(_)
                | Self::MouseUp(_)
                | Self::Scroll { .. }
                | Self::FileHovered(_)
                | Self::FileDropped(_)
                | Self::FileHoverCancelled
                | Self::TouchStart(_)
                | Self::TouchMove(_)
                | Self::TouchEnd(_)
                | Self::TouchCancel
        )
    }
}

/// Which occurrence a callback listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventFilter {
    /// Fires on the hit node and bubbles to its ancestors
    Hover(HoverEventFilter),
    /// Fires on nodes the event did *not* hit
    Not(NotEventFilter),
    /// Fires on the focused node and bubbles
    Focus(FocusEventFilter),
    /// Fires regardless of hit-testing
    Window(WindowEventFilter),
    /// Node lifecycle
    Component(ComponentEventFilter),
    /// Application-wide (all windows)
    Application(ApplicationEventFilter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HoverEventFilter {
    MouseOver,
    MouseDown,
    LeftMouseDown,
    RightMouseDown,
    MiddleMouseDown,
    MouseUp,
    LeftMouseUp,
    RightMouseUp,
    MiddleMouseUp,
    MouseEnter,
    MouseLeave,
    Scroll,
    ScrollStart,
    ScrollEnd,
    TextInput,
    VirtualKeyDown,
    VirtualKeyUp,
    HoveredFile,
    DroppedFile,
    HoveredFileCancelled,
    TouchStart,
    TouchMove,
    TouchEnd,
    TouchCancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FocusEventFilter {
    MouseOver,
    MouseDown,
    LeftMouseDown,
    RightMouseDown,
    MiddleMouseDown,
    MouseUp,
    LeftMouseUp,
    RightMouseUp,
    MiddleMouseUp,
    MouseEnter,
    MouseLeave,
    Scroll,
    ScrollStart,
    ScrollEnd,
    TextInput,
    VirtualKeyDown,
    VirtualKeyUp,
    FocusReceived,
    FocusLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NotEventFilter {
    Hover(HoverEventFilter),
    Focus(FocusEventFilter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WindowEventFilter {
    MouseOver,
    MouseDown,
    LeftMouseDown,
    RightMouseDown,
    MiddleMouseDown,
    MouseUp,
    LeftMouseUp,
    RightMouseUp,
    MiddleMouseUp,
    MouseEnter,
    MouseLeave,
    Scroll,
    ScrollStart,
    ScrollEnd,
    TextInput,
    VirtualKeyDown,
    VirtualKeyUp,
    HoveredFile,
    DroppedFile,
    HoveredFileCancelled,
    Resized,
    Moved,
    TouchStart,
    TouchMove,
    TouchEnd,
    TouchCancel,
    FocusReceived,
    FocusLost,
    CloseRequested,
    ThemeChanged,
}

impl WindowEventFilter {
    /// The node-level hover event this window event implies.
    ///
    /// Window enter/leave have no node equivalent: node enter/leave come from
    /// diffing the hovered set.
    pub fn to_hover_event_filter(&self) -> Option<HoverEventFilter> {
        use HoverEventFilter as H;
        Some(match self {
            Self::MouseOver => H::MouseOver,
            Self::MouseDown => H::MouseDown,
            Self::LeftMouseDown => H::LeftMouseDown,
            Self::RightMouseDown => H::RightMouseDown,
            Self::MiddleMouseDown => H::MiddleMouseDown,
            Self::MouseUp => H::MouseUp,
            Self::LeftMouseUp => H::LeftMouseUp,
            Self::RightMouseUp => H::RightMouseUp,
            Self::MiddleMouseUp => H::MiddleMouseUp,
            Self::Scroll => H::Scroll,
            Self::ScrollStart => H::ScrollStart,
            Self::ScrollEnd => H::ScrollEnd,
            Self::TextInput => H::TextInput,
            Self::VirtualKeyDown => H::VirtualKeyDown,
            Self::VirtualKeyUp => H::VirtualKeyUp,
            Self::HoveredFile => H::HoveredFile,
            Self::DroppedFile => H::DroppedFile,
            Self::HoveredFileCancelled => H::HoveredFileCancelled,
            Self::TouchStart => H::TouchStart,
            Self::TouchMove => H::TouchMove,
            Self::TouchEnd => H::TouchEnd,
            Self::TouchCancel => H::TouchCancel,
            _ => return None,
        })
    }

    /// The focused-node event this window event implies
    pub fn to_focus_event_filter(&self) -> Option<FocusEventFilter> {
        use FocusEventFilter as F;
        Some(match self {
            Self::MouseOver => F::MouseOver,
            Self::MouseDown => F::MouseDown,
            Self::LeftMouseDown => F::LeftMouseDown,
            Self::RightMouseDown => F::RightMouseDown,
            Self::MiddleMouseDown => F::MiddleMouseDown,
            Self::MouseUp => F::MouseUp,
            Self::LeftMouseUp => F::LeftMouseUp,
            Self::RightMouseUp => F::RightMouseUp,
            Self::MiddleMouseUp => F::MiddleMouseUp,
            Self::Scroll => F::Scroll,
            Self::ScrollStart => F::ScrollStart,
            Self::ScrollEnd => F::ScrollEnd,
            Self::TextInput => F::TextInput,
            Self::VirtualKeyDown => F::VirtualKeyDown,
            Self::VirtualKeyUp => F::VirtualKeyUp,
            _ => return None,
        })
    }
}

impl FocusEventFilter {
    /// Keyboard-originated events reach the focused node wherever the cursor is
    pub fn is_keyboard_event(&self) -> bool {
        matches!(self, Self::TextInput | Self::VirtualKeyDown | Self::VirtualKeyUp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentEventFilter {
    /// After the DOM containing the node was created
    AfterMount,
    /// Before the DOM containing the node is discarded
    BeforeUnmount,
    /// The node's layout size changed
    NodeResized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApplicationEventFilter {
    DeviceConnected,
    DeviceDisconnected,
}

/// Window-level filters fired by `event`, in firing order
pub fn window_events(
    event: &PlatformEvent,
    previous: &FullWindowState,
    current: &FullWindowState,
) -> Vec<WindowEventFilter> {
    use WindowEventFilter as W;

    let mut events = Vec::new();
    match event {
        PlatformEvent::MouseMove(_) => {
            if previous.cursor_position().is_none() {
                events.push(W::MouseEnter);
            }
            events.push(W::MouseOver);
        }
        PlatformEvent::MouseLeftWindow => {
            if previous.cursor_position().is_some() {
                events.push(W::MouseLeave);
            }
        }
        PlatformEvent::MouseDown(button) => {
            events.push(W::MouseDown);
            events.push(match button {
                MouseButton::Left => W::LeftMouseDown,
                MouseButton::Right => W::RightMouseDown,
                MouseButton::Middle => W::MiddleMouseDown,
            });
        }
        PlatformEvent::MouseUp(button) => {
            events.push(W::MouseUp);
            events.push(match button {
                MouseButton::Left => W::LeftMouseUp,
                MouseButton::Right => W::RightMouseUp,
                MouseButton::Middle => W::MiddleMouseUp,
            });
        }
        PlatformEvent::Scroll { phase, .. } => {
            let started = *phase == ScrollPhase::Start || !previous.state.mouse_state.is_scrolling;
            if started {
                events.push(W::ScrollStart);
            }
            events.push(W::Scroll);
            if !current.state.mouse_state.is_scrolling {
                events.push(W::ScrollEnd);
            }
        }
        PlatformEvent::KeyDown(_) => events.push(W::VirtualKeyDown),
        PlatformEvent::KeyUp(_) => events.push(W::VirtualKeyUp),
        PlatformEvent::TextInput(_) => events.push(W::TextInput),
        PlatformEvent::WindowFocusReceived => events.push(W::FocusReceived),
        PlatformEvent::WindowFocusLost => events.push(W::FocusLost),
        PlatformEvent::Resized(_) => {
            if previous.state.size != current.state.size {
                events.push(W::Resized);
            }
        }
        PlatformEvent::Moved(_) => events.push(W::Moved),
        PlatformEvent::CloseRequested => events.push(W::CloseRequested),
        PlatformEvent::ThemeChanged(_) => {
            if previous.state.theme != current.state.theme {
                events.push(W::ThemeChanged);
            }
        }
        PlatformEvent::FileHovered(_) => events.push(W::HoveredFile),
        PlatformEvent::FileDropped(_) => events.push(W::DroppedFile),
        PlatformEvent::FileHoverCancelled => events.push(W::HoveredFileCancelled),
        PlatformEvent::TouchStart(_) => events.push(W::TouchStart),
        PlatformEvent::TouchMove(_) => events.push(W::TouchMove),
        PlatformEvent::TouchEnd(_) => events.push(W::TouchEnd),
        PlatformEvent::TouchCancel => events.push(W::TouchCancel),
        PlatformEvent::DeviceConnected(_) | PlatformEvent::DeviceDisconnected(_) => {}
    }
    events
}

/// Application-level filter for device events
pub fn application_event(event: &PlatformEvent) -> Option<ApplicationEventFilter> {
    match event {
        PlatformEvent::DeviceConnected(_) => Some(ApplicationEventFilter::DeviceConnected),
        PlatformEvent::DeviceDisconnected(_) => Some(ApplicationEventFilter::DeviceDisconnected),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(event: &PlatformEvent, before: &FullWindowState) -> (FullWindowState, FullWindowState) {
        let mut after = before.clone();
        after.apply_event(event);
        (before.clone(), after)
    }

    #[test]
    fn test_mouse_move_enters_window_once() {
        let event = PlatformEvent::MouseMove(LogicalPosition::new(5.0, 5.0));
        let (prev, cur) = states(&event, &FullWindowState::default());
        assert_eq!(window_events(&event, &prev, &cur), vec![WindowEventFilter::MouseEnter, WindowEventFilter::MouseOver]);

        let (prev, cur) = states(&event, &cur);
        assert_eq!(window_events(&event, &prev, &cur), vec![WindowEventFilter::MouseOver]);
    }

    #[test]
    fn test_mouse_buttons() {
        let event = PlatformEvent::MouseDown(MouseButton::Right);
        let (prev, cur) = states(&event, &FullWindowState::default());
        assert_eq!(
            window_events(&event, &prev, &cur),
            vec![WindowEventFilter::MouseDown, WindowEventFilter::RightMouseDown]
        );
    }

    #[test]
    fn test_unchanged_resize_is_silent() {
        let base = FullWindowState::default();
        let event = PlatformEvent::Resized(base.state.size);
        let (prev, cur) = states(&event, &base);
        assert!(window_events(&event, &prev, &cur).is_empty());
    }

    #[test]
    fn test_filter_conversions() {
        assert_eq!(WindowEventFilter::LeftMouseUp.to_hover_event_filter(), Some(HoverEventFilter::LeftMouseUp));
        assert_eq!(WindowEventFilter::Resized.to_hover_event_filter(), None);
        assert_eq!(WindowEventFilter::HoveredFile.to_focus_event_filter(), None);
        assert!(FocusEventFilter::TextInput.is_keyboard_event());
        assert!(!FocusEventFilter::MouseDown.is_keyboard_event());
    }

    #[test]
    fn test_device_events() {
        let event = PlatformEvent::DeviceConnected("pad".into());
        assert_eq!(application_event(&event), Some(ApplicationEventFilter::DeviceConnected));
        assert!(!event.is_positional());
    }
}
