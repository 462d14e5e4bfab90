//! Focus targets requested by callbacks

use tracing::warn;
use trellis_css::CssPath;

use crate::id_tree::NodeId;
use crate::styled_dom::StyledDom;

#[derive(Debug, Clone, PartialEq)]
pub enum FocusTarget {
    Id(NodeId),
    /// First node matching the path, in document order
    Path(CssPath),
    Previous,
    Next,
    First,
    Last,
    NoFocus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedFocus {
    Node(NodeId),
    Cleared,
    /// Target not found; focus stays where it is
    Unchanged,
}

impl FocusTarget {
    /// Resolve against `dom` given the currently focused node.
    ///
    /// `Next` / `Previous` walk the tab order and wrap around.
    pub fn resolve(&self, dom: &StyledDom, current: Option<NodeId>) -> ResolvedFocus {
        let order = dom.tag_index().tab_order();
        let position = current.and_then(|c| order.iter().position(|n| *n == c));

        let found = match self {
            Self::NoFocus => return ResolvedFocus::Cleared,
            Self::Id(node) => dom.contains(*node).then_some(*node),
            Self::Path(path) => dom.query(path).into_iter().next(),
            Self::First => order.first().copied(),
            Self::Last => order.last().copied(),
            Self::Next => match position {
                Some(i) => order.get((i + 1) % order.len()).copied(),
                None => order.first().copied(),
            },
            Self::Previous => match position {
                Some(i) => order.get((i + order.len() - 1) % order.len()).copied(),
                None => order.last().copied(),
            },
        };

        match found {
            Some(node) => ResolvedFocus::Node(node),
            None => {
                warn!(target = ?self, "focus target not found");
                ResolvedFocus::Unchanged
            }
        }
    }
}
