//! Transaction Log
//!
//! Everything callbacks ask for during one dispatch pass. Nothing here is
//! applied while callbacks run; the host loop consumes the log afterwards
//! and decides how much of the pipeline to re-run.

use std::collections::{BTreeMap, BTreeSet};

use trellis_css::{CssProperty, PropertyId};

use crate::app::WindowCreateOptions;
use crate::callbacks::Update;
use crate::focus::FocusTarget;
use crate::id_tree::NodeId;
use crate::resources::ImageRef;
use crate::task::{Thread, ThreadId, Timer, TimerId};
use crate::window_state::{LogicalPosition, WindowState};

/// How much of the pipeline has to run again
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefreshLevel {
    #[default]
    None,
    Redraw,
    Relayout,
    /// Rebuild the DOM and re-run the cascade
    Restyle,
}

impl From<Update> for RefreshLevel {
    fn from(update: Update) -> Self {
        match update {
            Update::DoNothing => Self::None,
            Update::RefreshDom | Update::RefreshDomAllWindows => Self::Restyle,
        }
    }
}

#[derive(Debug, Default)]
pub struct CallbackChanges {
    pub focus_target: Option<FocusTarget>,
    /// Runtime overrides; the last write per property wins
    pub css_properties: BTreeMap<NodeId, BTreeMap<PropertyId, CssProperty>>,
    pub scroll_positions: BTreeMap<NodeId, LogicalPosition>,
    pub words_changed: BTreeMap<NodeId, String>,
    pub images_changed: BTreeMap<NodeId, ImageRef>,
    pub images_added: Vec<(String, ImageRef)>,
    pub timers_added: Vec<(TimerId, Timer)>,
    pub timers_removed: BTreeSet<TimerId>,
    pub threads_added: Vec<Thread>,
    pub threads_removed: BTreeSet<ThreadId>,
    pub windows_created: Vec<WindowCreateOptions>,
    pub window_state: Option<WindowState>,
    /// Scratch flag read by the dispatcher after each callback
    pub stop_propagation: bool,
}

impl CallbackChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.focus_target.is_none()
            && self.css_properties.is_empty()
            && self.scroll_positions.is_empty()
            && self.words_changed.is_empty()
            && self.images_changed.is_empty()
            && self.images_added.is_empty()
            && self.timers_added.is_empty()
            && self.timers_removed.is_empty()
            && self.threads_added.is_empty()
            && self.threads_removed.is_empty()
            && self.windows_created.is_empty()
            && self.window_state.is_none()
    }

    /// Fold `other` in; its entries win where both touch the same thing
    pub fn merge(&mut self, other: CallbackChanges) {
        if other.focus_target.is_some() {
            self.focus_target = other.focus_target;
        }
        for (node, props) in other.css_properties {
            self.css_properties.entry(node).or_default().extend(props);
        }
        self.scroll_positions.extend(other.scroll_positions);
        self.words_changed.extend(other.words_changed);
        self.images_changed.extend(other.images_changed);
        self.images_added.extend(other.images_added);
        self.timers_added.extend(other.timers_added);
        self.timers_removed.extend(other.timers_removed);
        self.threads_added.extend(other.threads_added);
        self.threads_removed.extend(other.threads_removed);
        self.windows_created.extend(other.windows_created);
        if other.window_state.is_some() {
            self.window_state = other.window_state;
        }
    }

    /// Minimum refresh needed to show these changes
    pub fn refresh_level(&self) -> RefreshLevel {
        let mut level = RefreshLevel::None;
        let mut raise = |l: RefreshLevel| level = level.max(l);

        for props in self.css_properties.values() {
            if props.keys().any(PropertyId::affects_layout) {
                raise(RefreshLevel::Relayout);
            } else if !props.is_empty() {
                raise(RefreshLevel::Redraw);
            }
        }
        if !self.words_changed.is_empty() || !self.images_changed.is_empty() || self.window_state.is_some() {
            raise(RefreshLevel::Relayout);
        }
        if !self.scroll_positions.is_empty() || self.focus_target.is_some() {
            raise(RefreshLevel::Redraw);
        }
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_css::Color;

    #[test]
    fn test_refresh_level() {
        let mut changes = CallbackChanges::new();
        assert!(changes.is_empty());
        assert_eq!(changes.refresh_level(), RefreshLevel::None);

        changes
            .css_properties
            .entry(NodeId::ROOT)
            .or_default()
            .insert(PropertyId::Color, CssProperty::color(PropertyId::Color, Color::RED));
        assert_eq!(changes.refresh_level(), RefreshLevel::Redraw);

        changes
            .css_properties
            .entry(NodeId::ROOT)
            .or_default()
            .insert(PropertyId::Width, CssProperty::px(PropertyId::Width, 3.0));
        assert_eq!(changes.refresh_level(), RefreshLevel::Relayout);
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_merge_later_wins() {
        let mut a = CallbackChanges::new();
        a.focus_target = Some(FocusTarget::First);
        a.words_changed.insert(NodeId::new(1), "a".into());

        let mut b = CallbackChanges::new();
        b.focus_target = Some(FocusTarget::Last);
        b.words_changed.insert(NodeId::new(1), "b".into());
        b.scroll_positions.insert(NodeId::new(2), LogicalPosition::new(0.0, 4.0));

        a.merge(b);
        assert_eq!(a.focus_target, Some(FocusTarget::Last));
        assert_eq!(a.words_changed[&NodeId::new(1)], "b");
        assert_eq!(a.scroll_positions.len(), 1);
    }

    #[test]
    fn test_update_to_refresh_level() {
        assert_eq!(RefreshLevel::from(Update::DoNothing), RefreshLevel::None);
        assert_eq!(RefreshLevel::from(Update::RefreshDomAllWindows), RefreshLevel::Restyle);
    }
}
