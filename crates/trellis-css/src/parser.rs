//! Stylesheet Parser
//!
//! Hand-rolled rule/declaration tokenizer. Values are handed to lightningcss'
//! value parsers where they exist. Nothing here aborts: every rejected rule or
//! declaration becomes a [`CssWarning`] and parsing resumes at the next one.

use lightningcss::traits::Parse;
use lightningcss::values::color::CssColor;
use lightningcss::values::length::LengthValue;
use tracing::{debug, warn};

use crate::properties::{Color, CssProperty, Keyword, Length, LengthUnit, PropertyId, PropertyValue};
use crate::selectors::CssPath;
use crate::{
    Css, CssDeclaration, CssError, CssRuleBlock, CssWarning, DynamicCssProperty, RuleDeclaration, Stylesheet,
};

/// Result of parsing a stylesheet
#[derive(Debug, Clone, Default)]
pub struct ParsedCss {
    pub css: Css,
    pub warnings: Vec<CssWarning>,
}

/// Result of parsing an inline `style` string
#[derive(Debug, Clone, Default)]
pub struct ParsedInline {
    pub properties: Vec<CssProperty>,
    pub warnings: Vec<CssWarning>,
}

/// CSS Parser
#[derive(Debug, Default)]
pub struct CssParser;

impl CssParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a stylesheet into a single-sheet [`Css`]
    pub fn parse(&self, source: &str) -> ParsedCss {
        let mut tokenizer = Tokenizer::new(source);
        let mut stylesheet = Stylesheet::default();

        loop {
            tokenizer.skip_whitespace_and_comments();
            if tokenizer.is_eof() {
                break;
            }
            if let Err(err) = tokenizer.parse_rule(&mut stylesheet) {
                tokenizer.warn(err);
                tokenizer.skip_to_next_rule();
            }
        }

        debug!(rules = stylesheet.rules.len(), warnings = tokenizer.warnings.len(), "parsed stylesheet");
        ParsedCss { css: Css::new(vec![stylesheet]), warnings: tokenizer.warnings }
    }

    /// Parse `color: red; width: 10px` style declaration lists.
    ///
    /// `var()` has no meaning inline and is rejected.
    pub fn parse_inline_declarations(&self, source: &str) -> ParsedInline {
        let mut tokenizer = Tokenizer::new(source);
        let declarations = tokenizer.parse_declarations();
        let mut properties = Vec::with_capacity(declarations.len());

        for decl in declarations {
            match decl.declaration {
                CssDeclaration::Static(prop) => properties.push(prop),
                CssDeclaration::Dynamic(dynamic) => tokenizer.warn(CssError::InvalidValue {
                    property: dynamic.default_value.id.name().to_string(),
                    value: format!("var(--{})", dynamic.dynamic_id),
                }),
            }
        }

        ParsedInline { properties, warnings: tokenizer.warnings }
    }
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    warnings: Vec<CssWarning>,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0, line: 1, column: 1, warnings: Vec::new() }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            self.pos += c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            self.skip_whitespace();
            if self.starts_with("/*") {
                self.skip_comment();
            } else {
                break;
            }
        }
    }

    fn skip_comment(&mut self) {
        self.advance(); // /
        self.advance(); // *
        while !self.is_eof() {
            if self.starts_with("*/") {
                self.advance();
                self.advance();
                break;
            }
            self.advance();
        }
    }

    /// Consume up to (not including) `end`, dropping comments
    fn consume_until(&mut self, end: char) -> String {
        let mut result = String::new();
        while let Some(c) = self.current() {
            if c == end {
                break;
            }
            if self.starts_with("/*") {
                self.skip_comment();
                result.push(' ');
                continue;
            }
            result.push(c);
            self.advance();
        }
        result
    }

    fn consume_ident(&mut self) -> String {
        let mut result = String::new();
        while let Some(c) = self.current() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                result.push(c);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Skip past the current rule: a `;`-terminated statement or a balanced `{}` block
    fn skip_to_next_rule(&mut self) {
        let mut brace_depth = 0usize;
        while let Some(c) = self.current() {
            self.advance();
            match c {
                '{' => brace_depth += 1,
                '}' => {
                    if brace_depth <= 1 {
                        return;
                    }
                    brace_depth -= 1;
                }
                ';' if brace_depth == 0 => return,
                _ => {}
            }
        }
    }

    /// Skip past the current declaration without leaving the block
    fn skip_declaration(&mut self) {
        let mut paren_depth = 0usize;
        while let Some(c) = self.current() {
            match c {
                '(' => paren_depth += 1,
                ')' => paren_depth = paren_depth.saturating_sub(1),
                ';' if paren_depth == 0 => {
                    self.advance();
                    return;
                }
                '}' if paren_depth == 0 => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn error(&self, message: &str) -> CssError {
        CssError::Syntax { line: self.line, column: self.column, message: message.to_string() }
    }

    fn warn(&mut self, error: CssError) {
        warn!(line = self.line, column = self.column, "dropping css: {}", error);
        self.warnings.push(CssWarning { line: self.line, column: self.column, error });
    }

    fn parse_rule(&mut self, stylesheet: &mut Stylesheet) -> Result<(), CssError> {
        if self.current() == Some('@') {
            self.advance();
            let name = self.consume_ident();
            return Err(CssError::UnsupportedAtRule(name));
        }
        self.parse_style_rule(stylesheet)
    }

    fn parse_style_rule(&mut self, stylesheet: &mut Stylesheet) -> Result<(), CssError> {
        let selectors_text = self.consume_until('{');
        if self.current() != Some('{') {
            return Err(self.error("Expected { in style rule"));
        }
        self.advance();

        let mut paths = Vec::new();
        for text in selectors_text.split(',').map(str::trim) {
            match CssPath::parse(text) {
                Ok(path) => paths.push(path),
                Err(err) => self.warn(err),
            }
        }

        let declarations = self.parse_declarations();

        // one rule block per selector, all sharing the declaration list
        for path in paths {
            stylesheet.rules.push(CssRuleBlock { path, declarations: declarations.clone() });
        }
        Ok(())
    }

    /// Parse declarations until `}` (consumed) or end of input
    fn parse_declarations(&mut self) -> Vec<RuleDeclaration> {
        let mut declarations = Vec::new();

        loop {
            self.skip_whitespace_and_comments();

            match self.current() {
                None => break,
                Some('}') => {
                    self.advance();
                    break;
                }
                Some(';') => {
                    self.advance();
                    continue;
                }
                _ => {}
            }

            let property = self.consume_ident().to_ascii_lowercase();
            if property.is_empty() {
                let err = self.error("Expected property name");
                self.warn(err);
                self.advance();
                self.skip_declaration();
                continue;
            }

            self.skip_whitespace_and_comments();
            if self.current() != Some(':') {
                let err = self.error(&format!("Expected : after {}", property));
                self.warn(err);
                self.skip_declaration();
                continue;
            }
            self.advance();
            self.skip_whitespace();

            // Parse value (handle nested parens for functions)
            let mut value = String::new();
            let mut paren_depth = 0usize;
            while let Some(c) = self.current() {
                if self.starts_with("/*") {
                    self.skip_comment();
                    continue;
                }
                match c {
                    '(' => paren_depth += 1,
                    ')' => paren_depth = paren_depth.saturating_sub(1),
                    ';' | '}' if paren_depth == 0 => break,
                    _ => {}
                }
                value.push(c);
                self.advance();
            }
            if self.current() == Some(';') {
                self.advance();
            }

            let mut value = value.trim();
            let important = match value.strip_suffix("!important") {
                Some(rest) => {
                    value = rest.trim_end();
                    true
                }
                None => false,
            };

            match parse_declaration(&property, value) {
                Ok(parsed) => declarations.extend(
                    parsed.into_iter().map(|declaration| RuleDeclaration { declaration, important }),
                ),
                Err(err) => self.warn(err),
            }
        }

        declarations
    }
}

/// How a property's value is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Keyword,
    Length,
    Color,
    Number,
    Integer,
    FontFamily,
    Raw,
}

fn value_kind(id: PropertyId) -> ValueKind {
    use PropertyId as P;
    match id {
        P::Display | P::Position | P::BoxSizing | P::FlexDirection | P::FlexWrap | P::JustifyContent
        | P::AlignItems | P::AlignContent | P::TextAlign | P::Cursor | P::OverflowX | P::OverflowY => {
            ValueKind::Keyword
        }
        P::Width | P::Height | P::MinWidth | P::MinHeight | P::MaxWidth | P::MaxHeight | P::MarginTop
        | P::MarginRight | P::MarginBottom | P::MarginLeft | P::PaddingTop | P::PaddingRight
        | P::PaddingBottom | P::PaddingLeft | P::BorderTopWidth | P::BorderRightWidth
        | P::BorderBottomWidth | P::BorderLeftWidth | P::BorderRadius | P::FontSize | P::LetterSpacing
        | P::Top | P::Right | P::Bottom | P::Left | P::LineHeight => ValueKind::Length,
        P::Color | P::BackgroundColor | P::BorderTopColor | P::BorderRightColor | P::BorderBottomColor
        | P::BorderLeftColor => ValueKind::Color,
        P::Opacity | P::FlexGrow | P::FlexShrink => ValueKind::Number,
        P::ZIndex | P::FontWeight => ValueKind::Integer,
        P::FontFamily => ValueKind::FontFamily,
        P::Transform => ValueKind::Raw,
    }
}

/// Parse one `property: value` pair, expanding shorthands
fn parse_declaration(property: &str, value: &str) -> Result<Vec<CssDeclaration>, CssError> {
    if value.is_empty() {
        return Err(invalid(property, value));
    }

    if let Some(longhands) = PropertyId::expand_shorthand(property) {
        let parts: Vec<&str> = value.split_whitespace().collect();
        let [top, right, bottom, left] = match parts.as_slice() {
            [a] => [*a, *a, *a, *a],
            [a, b] => [*a, *b, *a, *b],
            [a, b, c] => [*a, *b, *c, *b],
            [a, b, c, d] => [*a, *b, *c, *d],
            _ => return Err(invalid(property, value)),
        };
        return longhands
            .iter()
            .zip([top, right, bottom, left])
            .map(|(id, v)| parse_value(*id, v).map(|v| CssDeclaration::Static(CssProperty::new(*id, v))))
            .collect();
    }

    match property {
        "overflow" => {
            let v = parse_value(PropertyId::OverflowX, value)?;
            return Ok(vec![
                CssDeclaration::Static(CssProperty::new(PropertyId::OverflowX, v.clone())),
                CssDeclaration::Static(CssProperty::new(PropertyId::OverflowY, v)),
            ]);
        }
        "background" => {
            return parse_single(PropertyId::BackgroundColor, value).map(|d| vec![d]);
        }
        _ => {}
    }

    let id = PropertyId::from_name(property).ok_or_else(|| CssError::UnknownProperty(property.to_string()))?;
    parse_single(id, value).map(|d| vec![d])
}

fn parse_single(id: PropertyId, value: &str) -> Result<CssDeclaration, CssError> {
    if let Some(inner) = value.strip_prefix("var(").and_then(|v| v.strip_suffix(')')) {
        let (name, default) = match inner.split_once(',') {
            Some((name, default)) => (name.trim(), default.trim()),
            None => return Err(invalid(id.name(), value)),
        };
        let dynamic_id = name.strip_prefix("--").filter(|n| !n.is_empty()).ok_or_else(|| invalid(id.name(), value))?;
        let default_value = CssProperty::new(id, parse_value(id, default)?);
        return Ok(CssDeclaration::Dynamic(DynamicCssProperty { dynamic_id: dynamic_id.to_string(), default_value }));
    }
    Ok(CssDeclaration::Static(CssProperty::new(id, parse_value(id, value)?)))
}

fn invalid(property: &str, value: &str) -> CssError {
    CssError::InvalidValue { property: property.to_string(), value: value.to_string() }
}

/// Parse a value for a known property
pub(crate) fn parse_value(id: PropertyId, value: &str) -> Result<PropertyValue, CssError> {
    let value = value.trim();
    let lower = value.to_ascii_lowercase();

    // Global keywords are valid everywhere
    match lower.as_str() {
        "inherit" => return Ok(PropertyValue::Keyword(Keyword::Inherit)),
        "initial" => return Ok(PropertyValue::Keyword(Keyword::Initial)),
        _ => {}
    }

    let parsed = match value_kind(id) {
        ValueKind::Keyword => Keyword::from_str(&lower).map(PropertyValue::Keyword),
        ValueKind::Length => match lower.as_str() {
            "auto" => Some(PropertyValue::Keyword(Keyword::Auto)),
            "none" => Some(PropertyValue::Keyword(Keyword::None)),
            "normal" => Some(PropertyValue::Keyword(Keyword::Normal)),
            _ if id == PropertyId::LineHeight && lower.parse::<f32>().is_ok() => {
                lower.parse().ok().map(PropertyValue::Number)
            }
            _ => parse_length(&lower).map(PropertyValue::Length),
        },
        ValueKind::Color => parse_color(&lower).map(PropertyValue::Color),
        ValueKind::Number => lower.parse().ok().map(PropertyValue::Number),
        ValueKind::Integer => match lower.as_str() {
            "auto" => Some(PropertyValue::Keyword(Keyword::Auto)),
            "normal" => Some(PropertyValue::Integer(400)),
            "bold" => Some(PropertyValue::Integer(700)),
            _ => lower.parse().ok().map(PropertyValue::Integer),
        },
        ValueKind::FontFamily => {
            let family = value.trim_matches(|c| c == '"' || c == '\'').trim();
            (!family.is_empty()).then(|| PropertyValue::String(family.to_string()))
        }
        ValueKind::Raw => Some(PropertyValue::Raw(value.to_string())),
    };

    parsed.ok_or_else(|| invalid(id.name(), value))
}

/// Parse a color with lightningcss, falling back to hex / named colors
pub(crate) fn parse_color(value: &str) -> Option<Color> {
    if let Ok(CssColor::RGBA(rgba)) = CssColor::parse_string(value) {
        return Some(Color::rgba(rgba.red, rgba.green, rgba.blue, rgba.alpha));
    }
    if value.starts_with('#') {
        return Color::from_hex(value);
    }
    Color::from_name(value)
}

/// Parse a length with lightningcss, keeping relative units unresolved
pub(crate) fn parse_length(value: &str) -> Option<Length> {
    if let Some(pct) = value.strip_suffix('%') {
        return pct.trim().parse().ok().map(Length::percent);
    }
    if value == "0" {
        return Some(Length::zero());
    }

    match LengthValue::parse_string(value) {
        Ok(LengthValue::Px(v)) => Some(Length::px(v)),
        Ok(LengthValue::Pt(v)) => Some(Length { value: v, unit: LengthUnit::Pt }),
        Ok(LengthValue::Em(v)) => Some(Length::em(v)),
        Ok(LengthValue::Rem(v)) => Some(Length { value: v, unit: LengthUnit::Rem }),
        Ok(LengthValue::Vw(v)) => Some(Length { value: v, unit: LengthUnit::Vw }),
        Ok(LengthValue::Vh(v)) => Some(Length { value: v, unit: LengthUnit::Vh }),
        Ok(other) => other.to_px().map(Length::px),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::PseudoState;

    #[test]
    fn test_parse_simple_rule() {
        let parsed = CssParser::new().parse("div { color: red; }");
        assert!(parsed.warnings.is_empty());
        let sheet = &parsed.css.stylesheets[0];
        assert_eq!(sheet.rules.len(), 1);
        assert_eq!(
            sheet.rules[0].declarations[0].declaration,
            CssDeclaration::Static(CssProperty::color(PropertyId::Color, Color::RED))
        );
    }

    #[test]
    fn test_selector_list_shares_declarations() {
        let parsed = CssParser::new().parse(".a, .b:hover { width: 10px }");
        let sheet = &parsed.css.stylesheets[0];
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[1].path.pseudo_state(), PseudoState::Hover);
        assert_eq!(sheet.rules[0].declarations, sheet.rules[1].declarations);
    }

    #[test]
    fn test_bad_declaration_is_dropped() {
        let parsed = CssParser::new().parse(".a { color: notacolor; width: 5px; bogus: 1; }");
        let decls = &parsed.css.stylesheets[0].rules[0].declarations;
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].declaration.property_id(), PropertyId::Width);
        assert_eq!(parsed.warnings.len(), 2);
    }

    #[test]
    fn test_bad_selector_keeps_siblings() {
        let parsed = CssParser::new().parse("span, .ok { opacity: 0.5 } .next { opacity: 1 }");
        let sheet = &parsed.css.stylesheets[0];
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn test_at_rule_skipped() {
        let parsed = CssParser::new().parse("@media screen { .a { color: red } } .b { color: blue }");
        let sheet = &parsed.css.stylesheets[0];
        assert_eq!(sheet.rules.len(), 1);
        assert!(matches!(parsed.warnings[0].error, CssError::UnsupportedAtRule(ref n) if n == "media"));
    }

    #[test]
    fn test_shorthand_and_important() {
        let parsed = CssParser::new().parse(".a { margin: 1px 2px !important; }");
        let decls = &parsed.css.stylesheets[0].rules[0].declarations;
        assert_eq!(decls.len(), 4);
        assert!(decls.iter().all(|d| d.important));
        assert_eq!(
            decls[3].declaration,
            CssDeclaration::Static(CssProperty::px(PropertyId::MarginLeft, 2.0))
        );
    }

    #[test]
    fn test_dynamic_property() {
        let parsed = CssParser::new().parse(".a { width: var(--w, 100px); }");
        let decls = &parsed.css.stylesheets[0].rules[0].declarations;
        match &decls[0].declaration {
            CssDeclaration::Dynamic(d) => {
                assert_eq!(d.dynamic_id, "w");
                assert_eq!(d.default_value, CssProperty::px(PropertyId::Width, 100.0));
            }
            other => panic!("expected dynamic, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_declarations() {
        let parsed = CssParser::new().parse_inline_declarations("color: #00f; width: 50%; height: var(--h, 1px)");
        assert_eq!(parsed.properties.len(), 2);
        assert_eq!(parsed.properties[0], CssProperty::color(PropertyId::Color, Color::rgb(0, 0, 255)));
        assert_eq!(parsed.properties[1].value, PropertyValue::Length(Length::percent(50.0)));
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn test_value_parsers() {
        assert_eq!(parse_length("12px"), Some(Length::px(12.0)));
        assert_eq!(parse_length("1.5em"), Some(Length::em(1.5)));
        assert_eq!(parse_length("abc"), None);
        assert_eq!(parse_color("red"), Some(Color::RED));
        assert_eq!(parse_color("#ff000080"), Some(Color::rgba(255, 0, 0, 128)));
    }
}
