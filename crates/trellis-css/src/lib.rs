//! Trellis CSS
//!
//! CSS data model for the Trellis UI core: typed properties, selector paths,
//! specificity and a forgiving stylesheet parser. Knows nothing about the DOM;
//! selector matching goes through the [`MatchTarget`] trait.

mod parser;
pub mod properties;
pub mod selectors;

pub use parser::{CssParser, ParsedCss, ParsedInline};
pub use properties::{Color, CssProperty, Keyword, Length, LengthUnit, PropertyId, PropertyValue};
pub use selectors::{
    CssNthChildSelector, CssPath, CssPathPseudoSelector, CssPathSelector, MatchTarget, NodeTypeTag,
    PseudoState, Specificity,
};

/// A property whose value is supplied at runtime (`var(--id, default)`)
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicCssProperty {
    /// Identifier without the leading `--`
    pub dynamic_id: String,
    /// Used until something writes a value for `dynamic_id`
    pub default_value: CssProperty,
}

/// Right-hand side of a rule
#[derive(Debug, Clone, PartialEq)]
pub enum CssDeclaration {
    Static(CssProperty),
    Dynamic(DynamicCssProperty),
}

impl CssDeclaration {
    pub fn property_id(&self) -> PropertyId {
        match self {
            Self::Static(p) => p.id,
            Self::Dynamic(d) => d.default_value.id,
        }
    }
}

/// A declaration as written inside a rule block
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDeclaration {
    pub declaration: CssDeclaration,
    pub important: bool,
}

/// One selector plus the declarations it applies
#[derive(Debug, Clone, PartialEq)]
pub struct CssRuleBlock {
    pub path: CssPath,
    pub declarations: Vec<RuleDeclaration>,
}

/// Ordered list of rule blocks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    pub rules: Vec<CssRuleBlock>,
}

impl Stylesheet {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Ordered list of stylesheets; later sheets win ties
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Css {
    pub stylesheets: Vec<Stylesheet>,
}

impl Css {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(stylesheets: Vec<Stylesheet>) -> Self {
        Self { stylesheets }
    }

    /// Parse `source` into a single-sheet `Css`, logging and discarding warnings
    pub fn from_string(source: &str) -> Self {
        CssParser::new().parse(source).css
    }

    pub fn append(&mut self, stylesheet: Stylesheet) {
        self.stylesheets.push(stylesheet);
    }

    /// Total number of rule blocks across all sheets
    pub fn rule_count(&self) -> usize {
        self.stylesheets.iter().map(Stylesheet::len).sum()
    }
}

/// CSS parsing error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CssError {
    #[error("Parse error at line {line}, column {column}: {message}")]
    Syntax { line: usize, column: usize, message: String },

    #[error("Invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Unknown property `{0}`")]
    UnknownProperty(String),

    #[error("Invalid value `{value}` for `{property}`")]
    InvalidValue { property: String, value: String },

    #[error("Unsupported at-rule `@{0}`")]
    UnsupportedAtRule(String),
}

/// A recovered parse error: the offending rule or declaration was dropped
#[derive(Debug, Clone, PartialEq)]
pub struct CssWarning {
    pub line: usize,
    pub column: usize,
    pub error: CssError,
}

impl std::fmt::Display for CssWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.error)
    }
}
