//! Layout Collaborators
//!
//! The core never computes real layout. It asks a `LayoutProvider` for node
//! rectangles (hit-testing, `CallbackInfo::get_node_position`) and shaped
//! text, and a `TextShaper` for line / word / glyph metrics.
//!
//! `FixedLayout` serves rectangles set up front (tests, embedding hosts that
//! lay out elsewhere); `BlockLayout` is a minimal block-flow stacker used by
//! the headless shell.

use std::collections::BTreeMap;

use trellis_css::{Length, LengthUnit, PropertyId, PropertyValue};

use crate::dom::NodeType;
use crate::id_tree::NodeId;
use crate::styled_dom::StyledDom;
use crate::window_state::{LogicalPosition, LogicalRect, LogicalSize};

/// Source of node geometry
pub trait LayoutProvider {
    /// Border box of `node` in window coordinates
    fn node_rect(&self, node: NodeId) -> Option<LogicalRect>;

    /// Shaped text of a text node
    fn inline_text(&self, node: NodeId) -> Option<InlineText>;

    /// Recompute geometry after a restyle, text change or resize
    fn relayout(&mut self, dom: &StyledDom, window_size: LogicalSize);
}

/// Turns a string into positioned lines, words and glyphs
pub trait TextShaper {
    fn shape_text(&self, text: &str, options: &ShapingOptions) -> InlineText;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapingOptions {
    pub font_size: f32,
    pub line_height: f32,
    /// Wrap width; `None` never wraps
    pub max_width: Option<f32>,
    pub origin: LogicalPosition,
}

impl Default for ShapingOptions {
    fn default() -> Self {
        Self { font_size: 16.0, line_height: 1.2, max_width: None, origin: LogicalPosition::default() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineGlyph {
    pub character: char,
    pub bounds: LogicalRect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineWord {
    pub text: String,
    pub bounds: LogicalRect,
    pub glyphs: Vec<InlineGlyph>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineLine {
    pub bounds: LogicalRect,
    pub words: Vec<InlineWord>,
}

/// Shaped text: lines, then words, then glyphs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineText {
    pub lines: Vec<InlineLine>,
    pub bounds: LogicalRect,
}

/// Position of a hit inside an `InlineText`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineTextHit {
    pub line: usize,
    pub word: usize,
    pub glyph: usize,
}

impl InlineText {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn word_count(&self) -> usize {
        self.lines.iter().map(|l| l.words.len()).sum()
    }

    /// Glyph under `p`, if any
    pub fn hit_test(&self, p: LogicalPosition) -> Option<InlineTextHit> {
        self.lines.iter().enumerate().find_map(|(line, l)| {
            if !l.bounds.contains(p) {
                return None;
            }
            l.words.iter().enumerate().find_map(|(word, w)| {
                let glyph = w.glyphs.iter().position(|g| g.bounds.contains(p))?;
                Some(InlineTextHit { line, word, glyph })
            })
        })
    }
}

/// Fixed-advance shaper: every glyph is `font_size * advance` wide
#[derive(Debug, Clone, Copy)]
pub struct MonospaceShaper {
    pub advance: f32,
}

impl Default for MonospaceShaper {
    fn default() -> Self {
        Self { advance: 0.6 }
    }
}

impl TextShaper for MonospaceShaper {
    fn shape_text(&self, text: &str, options: &ShapingOptions) -> InlineText {
        let glyph_width = options.font_size * self.advance;
        let line_height = options.font_size * options.line_height;
        let origin = options.origin;

        // greedy word wrap
        let mut lines: Vec<Vec<&str>> = Vec::new();
        for paragraph in text.split('\n') {
            let mut current: Vec<&str> = Vec::new();
            let mut width = 0.0;
            for word in paragraph.split_whitespace() {
                let word_width = word.chars().count() as f32 * glyph_width;
                let space = if current.is_empty() { 0.0 } else { glyph_width };
                let fits = options.max_width.is_none_or(|max| width + space + word_width <= max);
                if !fits && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    width = 0.0;
                }
                width += if current.is_empty() { word_width } else { glyph_width + word_width };
                current.push(word);
            }
            lines.push(current);
        }

        let mut max_line_width: f32 = 0.0;
        let shaped: Vec<InlineLine> = lines
            .into_iter()
            .enumerate()
            .map(|(i, words)| {
                let y = origin.y + i as f32 * line_height;
                let mut x = origin.x;
                let words: Vec<InlineWord> = words
                    .into_iter()
                    .map(|word| {
                        let start = x;
                        let glyphs: Vec<InlineGlyph> = word
                            .chars()
                            .map(|character| {
                                let bounds = LogicalRect::new(x, y, glyph_width, line_height);
                                x += glyph_width;
                                InlineGlyph { character, bounds }
                            })
                            .collect();
                        let bounds = LogicalRect::new(start, y, x - start, line_height);
                        x += glyph_width;
                        InlineWord { text: word.to_string(), bounds, glyphs }
                    })
                    .collect();
                let width = words.last().map(|w| w.bounds.origin.x + w.bounds.size.width - origin.x).unwrap_or(0.0);
                max_line_width = max_line_width.max(width);
                InlineLine { bounds: LogicalRect::new(origin.x, y, width, line_height), words }
            })
            .collect();

        let height = shaped.len() as f32 * line_height;
        InlineText { lines: shaped, bounds: LogicalRect::new(origin.x, origin.y, max_line_width, height) }
    }
}

/// Rectangles and text given up front
#[derive(Debug, Clone, Default)]
pub struct FixedLayout {
    rects: BTreeMap<NodeId, LogicalRect>,
    texts: BTreeMap<NodeId, InlineText>,
}

impl FixedLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rect(mut self, node: NodeId, rect: LogicalRect) -> Self {
        self.rects.insert(node, rect);
        self
    }

    pub fn set_rect(&mut self, node: NodeId, rect: LogicalRect) {
        self.rects.insert(node, rect);
    }

    pub fn set_text(&mut self, node: NodeId, text: InlineText) {
        self.texts.insert(node, text);
    }
}

impl LayoutProvider for FixedLayout {
    fn node_rect(&self, node: NodeId) -> Option<LogicalRect> {
        self.rects.get(&node).copied()
    }

    fn inline_text(&self, node: NodeId) -> Option<InlineText> {
        self.texts.get(&node).cloned()
    }

    fn relayout(&mut self, _dom: &StyledDom, _window_size: LogicalSize) {}
}

/// Vertical block flow: every node is as wide as its parent's content box
/// unless `width` says otherwise, and children stack top to bottom.
///
/// Understands `width`, `height`, `margin-*`, `padding-*` and `font-size`;
/// text nodes are shaped to the available width.
pub struct BlockLayout<S: TextShaper = MonospaceShaper> {
    shaper: S,
    rects: BTreeMap<NodeId, LogicalRect>,
    texts: BTreeMap<NodeId, InlineText>,
}

impl Default for BlockLayout<MonospaceShaper> {
    fn default() -> Self {
        Self::new(MonospaceShaper::default())
    }
}

impl<S: TextShaper> BlockLayout<S> {
    pub fn new(shaper: S) -> Self {
        Self { shaper, rects: BTreeMap::new(), texts: BTreeMap::new() }
    }

    /// Lay out `node` at `origin` inside `available` width; returns the
    /// margin-box height
    fn layout_node(&mut self, dom: &StyledDom, node: NodeId, origin: LogicalPosition, available: f32, viewport: LogicalSize) -> f32 {
        let px = |id: PropertyId, basis: f32| -> Option<f32> {
            match &dom.get_css_property(node, id)?.value {
                PropertyValue::Length(l) => Some(resolve_length(l, basis, viewport)),
                PropertyValue::Number(n) => Some(*n),
                _ => None,
            }
        };

        let edges = |ids: [PropertyId; 4]| {
            let [top, right, bottom, left] = ids.map(|id| px(id, available).unwrap_or(0.0));
            Edges { top, right, bottom, left }
        };
        let margin = edges(MARGIN);
        let padding = edges(PADDING);

        let x = origin.x + margin.left;
        let y = origin.y + margin.top;
        let width = px(PropertyId::Width, available).unwrap_or(available - margin.left - margin.right).max(0.0);
        let content_x = x + padding.left;
        let content_y = y + padding.top;
        let content_width = (width - padding.left - padding.right).max(0.0);

        let mut content_height = 0.0;
        if let Some(NodeType::Text(text)) = dom.node_data(node).map(|d| &d.node_type) {
            let font_size = px(PropertyId::FontSize, 16.0).unwrap_or(16.0);
            let line_height = match dom.get_css_property(node, PropertyId::LineHeight).map(|p| &p.value) {
                Some(PropertyValue::Number(n)) => *n,
                _ => 1.2,
            };
            let options = ShapingOptions {
                font_size,
                line_height,
                max_width: Some(content_width),
                origin: LogicalPosition::new(content_x, content_y),
            };
            let shaped = self.shaper.shape_text(text, &options);
            content_height = shaped.bounds.size.height;
            self.texts.insert(node, shaped);
        }

        let children: Vec<NodeId> = dom.hierarchy().children(node).collect();
        for child in children {
            let child_origin = LogicalPosition::new(content_x, content_y + content_height);
            content_height += self.layout_node(dom, child, child_origin, content_width, viewport);
        }

        let height = px(PropertyId::Height, viewport.height).unwrap_or(content_height + padding.top + padding.bottom);
        self.rects.insert(node, LogicalRect::new(x, y, width, height));
        height + margin.top + margin.bottom
    }
}

impl<S: TextShaper> LayoutProvider for BlockLayout<S> {
    fn node_rect(&self, node: NodeId) -> Option<LogicalRect> {
        self.rects.get(&node).copied()
    }

    fn inline_text(&self, node: NodeId) -> Option<InlineText> {
        self.texts.get(&node).cloned()
    }

    fn relayout(&mut self, dom: &StyledDom, window_size: LogicalSize) {
        self.rects.clear();
        self.texts.clear();
        if dom.node_count() > 0 {
            self.layout_node(dom, NodeId::ROOT, LogicalPosition::default(), window_size.width, window_size);
        }
    }
}

fn resolve_length(length: &Length, basis: f32, viewport: LogicalSize) -> f32 {
    match length.unit {
        LengthUnit::Px => length.value,
        LengthUnit::Pt => length.value * 4.0 / 3.0,
        LengthUnit::Em | LengthUnit::Rem => length.value * 16.0,
        LengthUnit::Percent => length.value / 100.0 * basis,
        LengthUnit::Vw => length.value / 100.0 * viewport.width,
        LengthUnit::Vh => length.value / 100.0 * viewport.height,
    }
}

const MARGIN: [PropertyId; 4] =
    [PropertyId::MarginTop, PropertyId::MarginRight, PropertyId::MarginBottom, PropertyId::MarginLeft];
const PADDING: [PropertyId; 4] =
    [PropertyId::PaddingTop, PropertyId::PaddingRight, PropertyId::PaddingBottom, PropertyId::PaddingLeft];

#[derive(Debug, Clone, Copy, Default)]
struct Edges {
    top: f32,
    right: f32,
    bottom: f32,
    left: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Dom;
    use trellis_css::Css;

    #[test]
    fn test_monospace_wraps_words() {
        let shaper = MonospaceShaper { advance: 1.0 };
        let options = ShapingOptions { font_size: 10.0, line_height: 1.0, max_width: Some(100.0), ..Default::default() };
        // each glyph 10px wide: "hello world" is 110px
        let text = shaper.shape_text("hello world again", &options);
        assert_eq!(text.line_count(), 3);
        assert_eq!(text.word_count(), 3);
        assert_eq!(text.lines[1].bounds.origin.y, 10.0);

        let unbounded = shaper.shape_text("hello world", &ShapingOptions { max_width: None, ..options });
        assert_eq!(unbounded.line_count(), 1);
        assert_eq!(unbounded.bounds.size.width, 110.0);
    }

    #[test]
    fn test_inline_text_hit_test() {
        let shaper = MonospaceShaper { advance: 1.0 };
        let options = ShapingOptions { font_size: 10.0, line_height: 1.0, max_width: None, ..Default::default() };
        let text = shaper.shape_text("ab cd", &options);
        assert_eq!(text.hit_test(LogicalPosition::new(35.0, 5.0)), Some(InlineTextHit { line: 0, word: 1, glyph: 0 }));
        // the space between words
        assert_eq!(text.hit_test(LogicalPosition::new(25.0, 5.0)), None);
        assert_eq!(text.hit_test(LogicalPosition::new(5.0, 50.0)), None);
    }

    #[test]
    fn test_block_layout_stacks_children() {
        let dom = Dom::body()
            .with_child(Dom::div().with_inline_style("height: 20px"))
            .with_child(Dom::div().with_inline_style("height: 30px; width: 50px; margin-top: 5px"))
            .style(&Css::empty());
        let mut layout = BlockLayout::default();
        layout.relayout(&dom, LogicalSize::new(200.0, 100.0));

        assert_eq!(layout.node_rect(NodeId::new(1)), Some(LogicalRect::new(0.0, 0.0, 200.0, 20.0)));
        assert_eq!(layout.node_rect(NodeId::new(2)), Some(LogicalRect::new(0.0, 25.0, 50.0, 30.0)));
        assert_eq!(layout.node_rect(NodeId::ROOT).map(|r| r.size.height), Some(55.0));
    }

    #[test]
    fn test_fixed_layout() {
        let layout = FixedLayout::new().with_rect(NodeId::ROOT, LogicalRect::new(0.0, 0.0, 10.0, 10.0));
        assert!(layout.node_rect(NodeId::ROOT).is_some());
        assert!(layout.node_rect(NodeId::new(1)).is_none());
    }
}
