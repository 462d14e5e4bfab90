//! Window State
//!
//! What the host knows about a window: geometry, flags, theme, mouse and
//! keyboard state. `FullWindowState` adds the per-frame interaction state the
//! dispatcher maintains (hover, focus, active, scroll offsets).

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use trellis_css::Color;

use crate::events::{MouseButton, PlatformEvent, ScrollPhase};
use crate::id_tree::NodeId;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LogicalPosition {
    pub x: f32,
    pub y: f32,
}

impl LogicalPosition {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LogicalSize {
    pub width: f32,
    pub height: f32,
}

impl LogicalSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LogicalRect {
    pub origin: LogicalPosition,
    pub size: LogicalSize,
}

impl LogicalRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { origin: LogicalPosition::new(x, y), size: LogicalSize::new(width, height) }
    }

    /// Half-open containment: the right and bottom edges are outside
    pub fn contains(&self, p: LogicalPosition) -> bool {
        p.x >= self.origin.x
            && p.y >= self.origin.y
            && p.x < self.origin.x + self.size.width
            && p.y < self.origin.y + self.size.height
    }

    /// `p` relative to this rect's origin
    pub fn relative(&self, p: LogicalPosition) -> LogicalPosition {
        LogicalPosition::new(p.x - self.origin.x, p.y - self.origin.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum CursorPosition {
    #[default]
    Uninitialized,
    OutOfWindow,
    InWindow(LogicalPosition),
}

impl CursorPosition {
    pub fn position(&self) -> Option<LogicalPosition> {
        match self {
            Self::InWindow(p) => Some(*p),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MouseState {
    pub cursor_position: CursorPosition,
    pub left_down: bool,
    pub right_down: bool,
    pub middle_down: bool,
    /// Accumulated scroll delta of the current gesture
    pub scroll_x: f32,
    pub scroll_y: f32,
    pub is_scrolling: bool,
}

impl MouseState {
    pub fn mouse_down(&self) -> bool {
        self.left_down || self.right_down || self.middle_down
    }
}

/// Keys the core reacts to; everything else arrives as `TextInput`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VirtualKeyCode {
    Tab,
    Enter,
    Escape,
    Backspace,
    Delete,
    Space,
    Left,
    Up,
    Right,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    LShift,
    RShift,
    LControl,
    RControl,
    LAlt,
    RAlt,
    LSuper,
    RSuper,
    A, B, C, D, E, F, G, H, I, J, K, L, M, N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    Key0, Key1, Key2, Key3, Key4, Key5, Key6, Key7, Key8, Key9,
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyboardState {
    pub current_char: Option<char>,
    pub current_virtual_keycode: Option<VirtualKeyCode>,
    pub pressed_virtual_keycodes: BTreeSet<VirtualKeyCode>,
}

impl KeyboardState {
    pub fn shift_down(&self) -> bool {
        self.is_pressed(VirtualKeyCode::LShift) || self.is_pressed(VirtualKeyCode::RShift)
    }

    pub fn ctrl_down(&self) -> bool {
        self.is_pressed(VirtualKeyCode::LControl) || self.is_pressed(VirtualKeyCode::RControl)
    }

    pub fn alt_down(&self) -> bool {
        self.is_pressed(VirtualKeyCode::LAlt) || self.is_pressed(VirtualKeyCode::RAlt)
    }

    pub fn super_down(&self) -> bool {
        self.is_pressed(VirtualKeyCode::LSuper) || self.is_pressed(VirtualKeyCode::RSuper)
    }

    pub fn is_pressed(&self, key: VirtualKeyCode) -> bool {
        self.pressed_virtual_keycodes.contains(&key)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WindowTheme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFlags {
    pub is_maximized: bool,
    pub is_minimized: bool,
    pub is_fullscreen: bool,
    pub has_decorations: bool,
    pub is_visible: bool,
    pub is_always_on_top: bool,
    pub is_resizable: bool,
    /// The OS window has keyboard focus
    pub has_focus: bool,
    /// Set by a close request; clear it in a callback to keep the window open
    pub close_requested: bool,
}

impl Default for WindowFlags {
    fn default() -> Self {
        Self {
            is_maximized: false,
            is_minimized: false,
            is_fullscreen: false,
            has_decorations: true,
            is_visible: true,
            is_always_on_top: false,
            is_resizable: true,
            has_focus: true,
            close_requested: false,
        }
    }
}

/// The part of a window's state user callbacks may replace
#[derive(Debug, Clone, PartialEq)]
pub struct WindowState {
    pub title: String,
    pub size: LogicalSize,
    pub position: Option<LogicalPosition>,
    pub flags: WindowFlags,
    pub theme: WindowTheme,
    pub background_color: Color,
    pub mouse_state: MouseState,
    pub keyboard_state: KeyboardState,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            title: "Trellis Window".to_string(),
            size: LogicalSize::new(800.0, 600.0),
            position: None,
            flags: WindowFlags::default(),
            theme: WindowTheme::default(),
            background_color: Color::WHITE,
            mouse_state: MouseState::default(),
            keyboard_state: KeyboardState::default(),
        }
    }
}

impl WindowState {
    pub fn new(title: impl Into<String>, size: LogicalSize) -> Self {
        Self { title: title.into(), size, ..Default::default() }
    }
}

/// Window state plus dispatcher-owned interaction state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FullWindowState {
    pub state: WindowState,
    /// Tagged nodes under the cursor
    pub hovered_nodes: BTreeSet<NodeId>,
    pub focused_node: Option<NodeId>,
    /// Nodes pressed by the current mouse-down
    pub active_nodes: BTreeSet<NodeId>,
    pub scroll_states: BTreeMap<NodeId, LogicalPosition>,
    pub hovered_file: Option<PathBuf>,
    pub dropped_file: Option<PathBuf>,
}

impl FullWindowState {
    pub fn new(state: WindowState) -> Self {
        Self { state, ..Default::default() }
    }

    pub fn cursor_position(&self) -> Option<LogicalPosition> {
        self.state.mouse_state.cursor_position.position()
    }

    /// Fold a raw platform event into the mouse / keyboard / window fields
    pub fn apply_event(&mut self, event: &PlatformEvent) {
        let mouse = &mut self.state.mouse_state;
        let keyboard = &mut self.state.keyboard_state;

        keyboard.current_char = None;
        self.dropped_file = None;

        match event {
            PlatformEvent::MouseMove(p)
            | PlatformEvent::TouchStart(p)
            | PlatformEvent::TouchMove(p)
            | PlatformEvent::TouchEnd(p) => {
                mouse.cursor_position = CursorPosition::InWindow(*p);
            }
            PlatformEvent::MouseLeftWindow | PlatformEvent::TouchCancel => {
                mouse.cursor_position = CursorPosition::OutOfWindow;
            }
            PlatformEvent::MouseDown(button) => match button {
                MouseButton::Left => mouse.left_down = true,
                MouseButton::Right => mouse.right_down = true,
                MouseButton::Middle => mouse.middle_down = true,
            },
            PlatformEvent::MouseUp(button) => match button {
                MouseButton::Left => mouse.left_down = false,
                MouseButton::Right => mouse.right_down = false,
                MouseButton::Middle => mouse.middle_down = false,
            },
            PlatformEvent::Scroll { delta, phase } => {
                if *phase == ScrollPhase::Start || !mouse.is_scrolling {
                    mouse.scroll_x = 0.0;
                    mouse.scroll_y = 0.0;
                }
                mouse.scroll_x += delta.x;
                mouse.scroll_y += delta.y;
                mouse.is_scrolling = *phase != ScrollPhase::End;
            }
            PlatformEvent::KeyDown(key) => {
                keyboard.current_virtual_keycode = Some(*key);
                keyboard.pressed_virtual_keycodes.insert(*key);
            }
            PlatformEvent::KeyUp(key) => {
                keyboard.pressed_virtual_keycodes.remove(key);
                if keyboard.current_virtual_keycode == Some(*key) {
                    keyboard.current_virtual_keycode = None;
                }
            }
            PlatformEvent::TextInput(c) => keyboard.current_char = Some(*c),
            PlatformEvent::WindowFocusReceived => self.state.flags.has_focus = true,
            PlatformEvent::WindowFocusLost => {
                self.state.flags.has_focus = false;
                keyboard.pressed_virtual_keycodes.clear();
                keyboard.current_virtual_keycode = None;
            }
            PlatformEvent::Resized(size) => self.state.size = *size,
            PlatformEvent::Moved(position) => self.state.position = Some(*position),
            PlatformEvent::CloseRequested => self.state.flags.close_requested = true,
            PlatformEvent::ThemeChanged(theme) => self.state.theme = *theme,
            PlatformEvent::FileHovered(path) => self.hovered_file = Some(path.clone()),
            PlatformEvent::FileDropped(path) => {
                self.hovered_file = None;
                self.dropped_file = Some(path.clone());
            }
            PlatformEvent::FileHoverCancelled => self.hovered_file = None,
            PlatformEvent::DeviceConnected(_) | PlatformEvent::DeviceDisconnected(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains_half_open() {
        let r = LogicalRect::new(10.0, 10.0, 20.0, 20.0);
        assert!(r.contains(LogicalPosition::new(10.0, 10.0)));
        assert!(r.contains(LogicalPosition::new(29.9, 29.9)));
        assert!(!r.contains(LogicalPosition::new(30.0, 15.0)));
        assert_eq!(r.relative(LogicalPosition::new(15.0, 12.0)), LogicalPosition::new(5.0, 2.0));
    }

    #[test]
    fn test_apply_mouse_events() {
        let mut s = FullWindowState::default();
        assert_eq!(s.cursor_position(), None);
        s.apply_event(&PlatformEvent::MouseMove(LogicalPosition::new(1.0, 2.0)));
        assert_eq!(s.cursor_position(), Some(LogicalPosition::new(1.0, 2.0)));
        s.apply_event(&PlatformEvent::MouseDown(MouseButton::Left));
        assert!(s.state.mouse_state.left_down);
        s.apply_event(&PlatformEvent::MouseUp(MouseButton::Left));
        assert!(!s.state.mouse_state.mouse_down());
        s.apply_event(&PlatformEvent::MouseLeftWindow);
        assert_eq!(s.state.mouse_state.cursor_position, CursorPosition::OutOfWindow);
    }

    #[test]
    fn test_apply_keyboard_events() {
        let mut s = FullWindowState::default();
        s.apply_event(&PlatformEvent::KeyDown(VirtualKeyCode::LShift));
        s.apply_event(&PlatformEvent::KeyDown(VirtualKeyCode::Tab));
        assert!(s.state.keyboard_state.shift_down());
        assert_eq!(s.state.keyboard_state.current_virtual_keycode, Some(VirtualKeyCode::Tab));
        s.apply_event(&PlatformEvent::WindowFocusLost);
        assert!(!s.state.keyboard_state.shift_down());
    }

    #[test]
    fn test_scroll_accumulates_per_gesture() {
        let mut s = FullWindowState::default();
        let delta = LogicalPosition::new(0.0, 5.0);
        s.apply_event(&PlatformEvent::Scroll { delta, phase: ScrollPhase::Start });
        s.apply_event(&PlatformEvent::Scroll { delta, phase: ScrollPhase::Move });
        assert_eq!(s.state.mouse_state.scroll_y, 10.0);
        s.apply_event(&PlatformEvent::Scroll { delta, phase: ScrollPhase::End });
        assert!(!s.state.mouse_state.is_scrolling);
        s.apply_event(&PlatformEvent::Scroll { delta, phase: ScrollPhase::Move });
        assert_eq!(s.state.mouse_state.scroll_y, 5.0);
    }
}
