//! CSS Property Definitions
//!
//! All supported CSS properties and their value types.
//! Uses enums for fixed values to save memory vs strings.

use std::fmt;

/// Property identifier - uses enum for type safety and memory efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum PropertyId {
    // Display & Layout
    Display,
    Position,
    BoxSizing,

    // Flexbox
    FlexDirection,
    FlexWrap,
    JustifyContent,
    AlignItems,
    AlignContent,
    FlexGrow,
    FlexShrink,

    // Box Model
    Width,
    Height,
    MinWidth,
    MinHeight,
    MaxWidth,
    MaxHeight,
    MarginTop,
    MarginRight,
    MarginBottom,
    MarginLeft,
    PaddingTop,
    PaddingRight,
    PaddingBottom,
    PaddingLeft,

    // Border
    BorderTopWidth,
    BorderRightWidth,
    BorderBottomWidth,
    BorderLeftWidth,
    BorderTopColor,
    BorderRightColor,
    BorderBottomColor,
    BorderLeftColor,
    BorderRadius,

    // Colors & Background
    Color,
    BackgroundColor,
    Opacity,

    // Text
    FontFamily,
    FontSize,
    FontWeight,
    LineHeight,
    LetterSpacing,
    TextAlign,

    // Visual
    Cursor,
    OverflowX,
    OverflowY,
    ZIndex,

    // Positioning
    Top,
    Right,
    Bottom,
    Left,

    // Transform
    Transform,
}

impl PropertyId {
    /// Parse a property name into a PropertyId
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "display" => Self::Display,
            "position" => Self::Position,
            "box-sizing" => Self::BoxSizing,

            "flex-direction" => Self::FlexDirection,
            "flex-wrap" => Self::FlexWrap,
            "justify-content" => Self::JustifyContent,
            "align-items" => Self::AlignItems,
            "align-content" => Self::AlignContent,
            "flex-grow" => Self::FlexGrow,
            "flex-shrink" => Self::FlexShrink,

            "width" => Self::Width,
            "height" => Self::Height,
            "min-width" => Self::MinWidth,
            "min-height" => Self::MinHeight,
            "max-width" => Self::MaxWidth,
            "max-height" => Self::MaxHeight,

            "margin-top" => Self::MarginTop,
            "margin-right" => Self::MarginRight,
            "margin-bottom" => Self::MarginBottom,
            "margin-left" => Self::MarginLeft,

            "padding-top" => Self::PaddingTop,
            "padding-right" => Self::PaddingRight,
            "padding-bottom" => Self::PaddingBottom,
            "padding-left" => Self::PaddingLeft,

            "border-top-width" => Self::BorderTopWidth,
            "border-right-width" => Self::BorderRightWidth,
            "border-bottom-width" => Self::BorderBottomWidth,
            "border-left-width" => Self::BorderLeftWidth,
            "border-top-color" => Self::BorderTopColor,
            "border-right-color" => Self::BorderRightColor,
            "border-bottom-color" => Self::BorderBottomColor,
            "border-left-color" => Self::BorderLeftColor,
            "border-radius" => Self::BorderRadius,

            "color" => Self::Color,
            "background-color" => Self::BackgroundColor,
            "opacity" => Self::Opacity,

            "font-family" => Self::FontFamily,
            "font-size" => Self::FontSize,
            "font-weight" => Self::FontWeight,
            "line-height" => Self::LineHeight,
            "letter-spacing" => Self::LetterSpacing,
            "text-align" => Self::TextAlign,

            "cursor" => Self::Cursor,
            "overflow-x" => Self::OverflowX,
            "overflow-y" => Self::OverflowY,
            "z-index" => Self::ZIndex,

            "top" => Self::Top,
            "right" => Self::Right,
            "bottom" => Self::Bottom,
            "left" => Self::Left,

            "transform" => Self::Transform,

            _ => return None,
        })
    }

    /// The CSS name of this property
    pub fn name(&self) -> &'static str {
        match self {
            Self::Display => "display",
            Self::Position => "position",
            Self::BoxSizing => "box-sizing",
            Self::FlexDirection => "flex-direction",
            Self::FlexWrap => "flex-wrap",
            Self::JustifyContent => "justify-content",
            Self::AlignItems => "align-items",
            Self::AlignContent => "align-content",
            Self::FlexGrow => "flex-grow",
            Self::FlexShrink => "flex-shrink",
            Self::Width => "width",
            Self::Height => "height",
            Self::MinWidth => "min-width",
            Self::MinHeight => "min-height",
            Self::MaxWidth => "max-width",
            Self::MaxHeight => "max-height",
            Self::MarginTop => "margin-top",
            Self::MarginRight => "margin-right",
            Self::MarginBottom => "margin-bottom",
            Self::MarginLeft => "margin-left",
            Self::PaddingTop => "padding-top",
            Self::PaddingRight => "padding-right",
            Self::PaddingBottom => "padding-bottom",
            Self::PaddingLeft => "padding-left",
            Self::BorderTopWidth => "border-top-width",
            Self::BorderRightWidth => "border-right-width",
            Self::BorderBottomWidth => "border-bottom-width",
            Self::BorderLeftWidth => "border-left-width",
            Self::BorderTopColor => "border-top-color",
            Self::BorderRightColor => "border-right-color",
            Self::BorderBottomColor => "border-bottom-color",
            Self::BorderLeftColor => "border-left-color",
            Self::BorderRadius => "border-radius",
            Self::Color => "color",
            Self::BackgroundColor => "background-color",
            Self::Opacity => "opacity",
            Self::FontFamily => "font-family",
            Self::FontSize => "font-size",
            Self::FontWeight => "font-weight",
            Self::LineHeight => "line-height",
            Self::LetterSpacing => "letter-spacing",
            Self::TextAlign => "text-align",
            Self::Cursor => "cursor",
            Self::OverflowX => "overflow-x",
            Self::OverflowY => "overflow-y",
            Self::ZIndex => "z-index",
            Self::Top => "top",
            Self::Right => "right",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Transform => "transform",
        }
    }

    /// Properties a child takes from its parent when it has no value of its own
    pub fn is_inherited(&self) -> bool {
        matches!(
            self,
            Self::Color
                | Self::FontFamily
                | Self::FontSize
                | Self::FontWeight
                | Self::LineHeight
                | Self::LetterSpacing
                | Self::TextAlign
                | Self::Cursor
        )
    }

    /// Whether a change to this property invalidates layout (as opposed to paint only)
    pub fn affects_layout(&self) -> bool {
        !matches!(
            self,
            Self::Color
                | Self::BackgroundColor
                | Self::Opacity
                | Self::BorderTopColor
                | Self::BorderRightColor
                | Self::BorderBottomColor
                | Self::BorderLeftColor
                | Self::BorderRadius
                | Self::Cursor
                | Self::Transform
                | Self::ZIndex
        )
    }

    /// Expand a shorthand (`margin`, `padding`, `border-color`, ...) into its longhands.
    ///
    /// Returns `None` if `name` is not a known shorthand.
    pub fn expand_shorthand(name: &str) -> Option<[PropertyId; 4]> {
        Some(match name {
            "margin" => [Self::MarginTop, Self::MarginRight, Self::MarginBottom, Self::MarginLeft],
            "padding" => [Self::PaddingTop, Self::PaddingRight, Self::PaddingBottom, Self::PaddingLeft],
            "border-width" => [
                Self::BorderTopWidth,
                Self::BorderRightWidth,
                Self::BorderBottomWidth,
                Self::BorderLeftWidth,
            ],
            "border-color" => [
                Self::BorderTopColor,
                Self::BorderRightColor,
                Self::BorderBottomColor,
                Self::BorderLeftColor,
            ],
            _ => return None,
        })
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Property value - parsed and typed
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Keyword value (inherit, initial, none, auto, etc.)
    Keyword(Keyword),
    /// Length value (px, em, rem, %, etc.)
    Length(Length),
    /// Color value
    Color(Color),
    /// Number (for opacity, flex-grow, line-height, etc.)
    Number(f32),
    /// Integer (z-index, font-weight)
    Integer(i32),
    /// String (for font-family)
    String(String),
    /// Raw CSS (for complex values we don't fully parse)
    Raw(String),
}

impl PropertyValue {
    /// Interpolate between `self` and `to` at `t` (0.0 ..= 1.0).
    ///
    /// Numbers, same-unit lengths and colors interpolate linearly, everything
    /// else flips discretely at the halfway point.
    pub fn interpolate(&self, to: &PropertyValue, t: f32) -> PropertyValue {
        let t = t.clamp(0.0, 1.0);
        match (self, to) {
            (Self::Number(a), Self::Number(b)) => Self::Number(lerp(*a, *b, t)),
            (Self::Integer(a), Self::Integer(b)) => {
                Self::Integer(lerp(*a as f32, *b as f32, t).round() as i32)
            }
            (Self::Length(a), Self::Length(b)) if a.unit == b.unit => Self::Length(Length {
                value: lerp(a.value, b.value, t),
                unit: a.unit,
            }),
            (Self::Color(a), Self::Color(b)) => Self::Color(a.interpolate(b, t)),
            _ => {
                if t < 0.5 {
                    self.clone()
                } else {
                    to.clone()
                }
            }
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Self::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_length(&self) -> Option<Length> {
        match self {
            Self::Length(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Integer(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<Keyword> {
        match self {
            Self::Keyword(k) => Some(*k),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword(k) => f.write_str(k.as_str()),
            Self::Length(l) => write!(f, "{}", l),
            Self::Color(c) => write!(f, "{}", c),
            Self::Number(n) => write!(f, "{}", n),
            Self::Integer(i) => write!(f, "{}", i),
            Self::String(s) => write!(f, "\"{}\"", s),
            Self::Raw(s) => f.write_str(s),
        }
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// CSS keyword values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    // Global keywords
    Inherit,
    Initial,

    // Common values
    None,
    Auto,
    Normal,
    Hidden,
    Visible,

    // Display
    Block,
    Inline,
    InlineBlock,
    Flex,

    // Position
    Static,
    Relative,
    Absolute,
    Fixed,

    // Box sizing
    ContentBox,
    BorderBox,

    // Flexbox
    Row,
    RowReverse,
    Column,
    ColumnReverse,
    Wrap,
    Nowrap,
    FlexStart,
    FlexEnd,
    Center,
    SpaceBetween,
    SpaceAround,
    Stretch,

    // Text
    Left,
    Right,
    Justify,

    // Overflow
    Scroll,

    // Font
    Bold,

    // Cursor
    Default,
    Pointer,
    Text,
    Move,
    NotAllowed,
    Grab,
}

impl Keyword {
    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "inherit" => Self::Inherit,
            "initial" => Self::Initial,
            "none" => Self::None,
            "auto" => Self::Auto,
            "normal" => Self::Normal,
            "hidden" => Self::Hidden,
            "visible" => Self::Visible,
            "block" => Self::Block,
            "inline" => Self::Inline,
            "inline-block" => Self::InlineBlock,
            "flex" => Self::Flex,
            "static" => Self::Static,
            "relative" => Self::Relative,
            "absolute" => Self::Absolute,
            "fixed" => Self::Fixed,
            "content-box" => Self::ContentBox,
            "border-box" => Self::BorderBox,
            "row" => Self::Row,
            "row-reverse" => Self::RowReverse,
            "column" => Self::Column,
            "column-reverse" => Self::ColumnReverse,
            "wrap" => Self::Wrap,
            "nowrap" => Self::Nowrap,
            "flex-start" => Self::FlexStart,
            "flex-end" => Self::FlexEnd,
            "center" => Self::Center,
            "space-between" => Self::SpaceBetween,
            "space-around" => Self::SpaceAround,
            "stretch" => Self::Stretch,
            "left" => Self::Left,
            "right" => Self::Right,
            "justify" => Self::Justify,
            "scroll" => Self::Scroll,
            "bold" => Self::Bold,
            "default" => Self::Default,
            "pointer" => Self::Pointer,
            "text" => Self::Text,
            "move" => Self::Move,
            "not-allowed" => Self::NotAllowed,
            "grab" => Self::Grab,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inherit => "inherit",
            Self::Initial => "initial",
            Self::None => "none",
            Self::Auto => "auto",
            Self::Normal => "normal",
            Self::Hidden => "hidden",
            Self::Visible => "visible",
            Self::Block => "block",
            Self::Inline => "inline",
            Self::InlineBlock => "inline-block",
            Self::Flex => "flex",
            Self::Static => "static",
            Self::Relative => "relative",
            Self::Absolute => "absolute",
            Self::Fixed => "fixed",
            Self::ContentBox => "content-box",
            Self::BorderBox => "border-box",
            Self::Row => "row",
            Self::RowReverse => "row-reverse",
            Self::Column => "column",
            Self::ColumnReverse => "column-reverse",
            Self::Wrap => "wrap",
            Self::Nowrap => "nowrap",
            Self::FlexStart => "flex-start",
            Self::FlexEnd => "flex-end",
            Self::Center => "center",
            Self::SpaceBetween => "space-between",
            Self::SpaceAround => "space-around",
            Self::Stretch => "stretch",
            Self::Left => "left",
            Self::Right => "right",
            Self::Justify => "justify",
            Self::Scroll => "scroll",
            Self::Bold => "bold",
            Self::Default => "default",
            Self::Pointer => "pointer",
            Self::Text => "text",
            Self::Move => "move",
            Self::NotAllowed => "not-allowed",
            Self::Grab => "grab",
        }
    }
}

/// CSS length value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    pub value: f32,
    pub unit: LengthUnit,
}

impl Length {
    pub fn px(value: f32) -> Self {
        Self { value, unit: LengthUnit::Px }
    }

    pub fn em(value: f32) -> Self {
        Self { value, unit: LengthUnit::Em }
    }

    pub fn percent(value: f32) -> Self {
        Self { value, unit: LengthUnit::Percent }
    }

    pub fn zero() -> Self {
        Self { value: 0.0, unit: LengthUnit::Px }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            LengthUnit::Px => "px",
            LengthUnit::Pt => "pt",
            LengthUnit::Em => "em",
            LengthUnit::Rem => "rem",
            LengthUnit::Percent => "%",
            LengthUnit::Vw => "vw",
            LengthUnit::Vh => "vh",
        };
        write!(f, "{}{}", self.value, unit)
    }
}

/// Length units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LengthUnit {
    Px,
    Pt,
    Em,
    Rem,
    Percent,
    Vw,
    Vh,
}

/// CSS color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Color {
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Channel-wise linear interpolation
    pub fn interpolate(&self, other: &Color, t: f32) -> Color {
        let mix = |a: u8, b: u8| lerp(a as f32, b as f32, t).round().clamp(0.0, 255.0) as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    /// Parse a hex color (#RGB, #RRGGBB, #RRGGBBAA)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        match hex.len() {
            3 => {
                let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
                let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
                let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
                Some(Self::rgb(r, g, b))
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Self::rgb(r, g, b))
            }
            8 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                let a = u8::from_str_radix(&hex[6..8], 16).ok()?;
                Some(Self::rgba(r, g, b, a))
            }
            _ => None,
        }
    }

    /// Parse a named color
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "transparent" => Self::TRANSPARENT,
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::RED,
            "green" => Self::rgb(0, 128, 0),
            "blue" => Self::rgb(0, 0, 255),
            "yellow" => Self::rgb(255, 255, 0),
            "cyan" | "aqua" => Self::rgb(0, 255, 255),
            "magenta" | "fuchsia" => Self::rgb(255, 0, 255),
            "gray" | "grey" => Self::rgb(128, 128, 128),
            "silver" => Self::rgb(192, 192, 192),
            "maroon" => Self::rgb(128, 0, 0),
            "olive" => Self::rgb(128, 128, 0),
            "lime" => Self::rgb(0, 255, 0),
            "navy" => Self::rgb(0, 0, 128),
            "purple" => Self::rgb(128, 0, 128),
            "teal" => Self::rgb(0, 128, 128),
            "orange" => Self::rgb(255, 165, 0),
            _ => return None,
        })
    }
}

/// A single resolved `property: value` pair
#[derive(Debug, Clone, PartialEq)]
pub struct CssProperty {
    pub id: PropertyId,
    pub value: PropertyValue,
}

impl CssProperty {
    pub fn new(id: PropertyId, value: PropertyValue) -> Self {
        Self { id, value }
    }

    pub fn color(id: PropertyId, color: Color) -> Self {
        Self::new(id, PropertyValue::Color(color))
    }

    pub fn px(id: PropertyId, value: f32) -> Self {
        Self::new(id, PropertyValue::Length(Length::px(value)))
    }

    pub fn number(id: PropertyId, value: f32) -> Self {
        Self::new(id, PropertyValue::Number(value))
    }

    pub fn keyword(id: PropertyId, keyword: Keyword) -> Self {
        Self::new(id, PropertyValue::Keyword(keyword))
    }

    /// Interpolate towards `to`; both sides must target the same property
    pub fn interpolate(&self, to: &CssProperty, t: f32) -> Option<CssProperty> {
        if self.id != to.id {
            return None;
        }
        Some(CssProperty::new(self.id, self.value.interpolate(&to.value, t)))
    }
}

impl fmt::Display for CssProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.value)
    }
}
