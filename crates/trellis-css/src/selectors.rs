//! CSS Selector Paths
//!
//! Parsed selectors (`CssPath`), specificity and right-to-left matching.

use std::fmt;

use crate::CssError;

/// Node type as seen by type selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeTypeTag {
    Body,
    Div,
    Br,
    /// Text nodes, selected as `p`
    P,
    Img,
    IFrame,
}

impl NodeTypeTag {
    /// Tag for a type selector name, `None` for unknown elements
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "body" => Self::Body,
            "div" => Self::Div,
            "br" => Self::Br,
            "p" => Self::P,
            "img" => Self::Img,
            "iframe" => Self::IFrame,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Div => "div",
            Self::Br => "br",
            Self::P => "p",
            Self::Img => "img",
            Self::IFrame => "iframe",
        }
    }
}

/// The style bucket a rule writes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum PseudoState {
    #[default]
    Normal,
    Hover,
    Active,
    Focus,
}

/// `:nth-child()` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CssNthChildSelector {
    Number(u32),
    Even,
    Odd,
    /// `{repeat}n + {offset}`
    Pattern { repeat: u32, offset: u32 },
}

impl CssNthChildSelector {
    /// Parse from string like "2n+1", "odd", "even", "3"
    pub fn parse(s: &str) -> Option<Self> {
        let s: String = s.trim().to_ascii_lowercase().chars().filter(|c| !c.is_whitespace()).collect();

        match s.as_str() {
            "odd" => return Some(Self::Odd),
            "even" => return Some(Self::Even),
            _ => {}
        }

        if let Ok(n) = s.parse::<u32>() {
            return Some(Self::Number(n));
        }

        let n_pos = s.find('n')?;
        let a_str = &s[..n_pos];
        let repeat = if a_str.is_empty() || a_str == "+" { 1 } else { a_str.parse().ok()? };

        let rest = &s[n_pos + 1..];
        let offset = if rest.is_empty() {
            0
        } else {
            rest.strip_prefix('+')?.parse().ok()?
        };

        Some(Self::Pattern { repeat, offset })
    }

    /// Check if the 1-based sibling position `n` matches
    pub fn matches(&self, n: u32) -> bool {
        match *self {
            Self::Number(k) => n == k,
            Self::Even => n % 2 == 0,
            Self::Odd => n % 2 == 1,
            Self::Pattern { repeat: 0, offset } => n == offset,
            Self::Pattern { repeat, offset } => n >= offset && (n - offset) % repeat == 0,
        }
    }
}

impl fmt::Display for CssNthChildSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Even => f.write_str("even"),
            Self::Odd => f.write_str("odd"),
            Self::Pattern { repeat, offset } => write!(f, "{}n+{}", repeat, offset),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CssPathPseudoSelector {
    First,
    Last,
    NthChild(CssNthChildSelector),
    Hover,
    Active,
    Focus,
}

impl CssPathPseudoSelector {
    fn pseudo_state(&self) -> Option<PseudoState> {
        match self {
            Self::Hover => Some(PseudoState::Hover),
            Self::Active => Some(PseudoState::Active),
            Self::Focus => Some(PseudoState::Focus),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CssPathSelector {
    /// `*`
    Global,
    Type(NodeTypeTag),
    Class(String),
    Id(String),
    PseudoSelector(CssPathPseudoSelector),
    /// `>`
    DirectChildren,
    /// whitespace
    Children,
}

impl CssPathSelector {
    fn is_combinator(&self) -> bool {
        matches!(self, Self::DirectChildren | Self::Children)
    }
}

/// Selector specificity (ids, classes + pseudo-classes, types)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity(pub u32, pub u32, pub u32);

/// What a selector needs to know about a node
pub trait MatchTarget: Sized {
    fn tag(&self) -> NodeTypeTag;
    fn has_class(&self, class: &str) -> bool;
    fn has_id(&self, id: &str) -> bool;
    /// 0-based position among siblings
    fn index_in_parent(&self) -> usize;
    fn is_last_child(&self) -> bool;
    fn parent(&self) -> Option<Self>;
}

/// A complex selector: compound groups separated by combinators
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CssPath {
    pub selectors: Vec<CssPathSelector>,
}

impl CssPath {
    pub fn new(selectors: Vec<CssPathSelector>) -> Self {
        Self { selectors }
    }

    /// Parse a single selector (no commas)
    pub fn parse(source: &str) -> Result<Self, CssError> {
        SelectorParser { source, chars: source.char_indices().peekable() }.parse()
    }

    pub fn specificity(&self) -> Specificity {
        let mut spec = Specificity::default();
        for sel in &self.selectors {
            match sel {
                CssPathSelector::Id(_) => spec.0 += 1,
                CssPathSelector::Class(_) | CssPathSelector::PseudoSelector(_) => spec.1 += 1,
                CssPathSelector::Type(_) => spec.2 += 1,
                _ => {}
            }
        }
        spec
    }

    /// Bucket written by this selector, from the dynamic pseudo-class in the last compound.
    ///
    /// With several dynamic pseudo-classes the last one written wins.
    pub fn pseudo_state(&self) -> PseudoState {
        self.last_group()
            .iter()
            .filter_map(|s| match s {
                CssPathSelector::PseudoSelector(p) => p.pseudo_state(),
                _ => None,
            })
            .last()
            .unwrap_or(PseudoState::Normal)
    }

    fn last_group(&self) -> &[CssPathSelector] {
        let start = self
            .selectors
            .iter()
            .rposition(CssPathSelector::is_combinator)
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.selectors[start..]
    }

    /// Right-to-left match against `node`.
    ///
    /// `:hover`, `:active` and `:focus` are accepted in the last compound (they
    /// pick the bucket, not the node) and never match anywhere else.
    pub fn matches<N: MatchTarget>(&self, node: &N) -> bool {
        let mut groups: Vec<&[CssPathSelector]> = Vec::new();
        let mut combinators: Vec<&CssPathSelector> = Vec::new();
        let mut start = 0;
        for (i, sel) in self.selectors.iter().enumerate() {
            if sel.is_combinator() {
                groups.push(&self.selectors[start..i]);
                combinators.push(sel);
                start = i + 1;
            }
        }
        groups.push(&self.selectors[start..]);

        if groups.iter().any(|g| g.is_empty()) {
            return false;
        }

        match_chain(&groups, &combinators, groups.len() - 1, node)
    }
}

fn match_chain<N: MatchTarget>(
    groups: &[&[CssPathSelector]],
    combinators: &[&CssPathSelector],
    index: usize,
    node: &N,
) -> bool {
    let is_last = index == groups.len() - 1;
    if !groups[index].iter().all(|sel| match_compound(sel, node, is_last)) {
        return false;
    }
    if index == 0 {
        return true;
    }

    match combinators[index - 1] {
        CssPathSelector::DirectChildren => match node.parent() {
            Some(parent) => match_chain(groups, combinators, index - 1, &parent),
            None => false,
        },
        _ => {
            let mut current = node.parent();
            while let Some(ancestor) = current {
                if match_chain(groups, combinators, index - 1, &ancestor) {
                    return true;
                }
                current = ancestor.parent();
            }
            false
        }
    }
}

fn match_compound<N: MatchTarget>(sel: &CssPathSelector, node: &N, is_last: bool) -> bool {
    match sel {
        CssPathSelector::Global => true,
        CssPathSelector::Type(tag) => node.tag() == *tag,
        CssPathSelector::Class(class) => node.has_class(class),
        CssPathSelector::Id(id) => node.has_id(id),
        CssPathSelector::PseudoSelector(pseudo) => match pseudo {
            CssPathPseudoSelector::First => node.index_in_parent() == 0,
            CssPathPseudoSelector::Last => node.is_last_child(),
            CssPathPseudoSelector::NthChild(nth) => nth.matches(node.index_in_parent() as u32 + 1),
            CssPathPseudoSelector::Hover | CssPathPseudoSelector::Active | CssPathPseudoSelector::Focus => {
                is_last
            }
        },
        CssPathSelector::DirectChildren | CssPathSelector::Children => false,
    }
}

impl fmt::Display for CssPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sel in &self.selectors {
            match sel {
                CssPathSelector::Global => f.write_str("*")?,
                CssPathSelector::Type(t) => f.write_str(t.as_str())?,
                CssPathSelector::Class(c) => write!(f, ".{}", c)?,
                CssPathSelector::Id(i) => write!(f, "#{}", i)?,
                CssPathSelector::PseudoSelector(p) => match p {
                    CssPathPseudoSelector::First => f.write_str(":first")?,
                    CssPathPseudoSelector::Last => f.write_str(":last")?,
                    CssPathPseudoSelector::NthChild(n) => write!(f, ":nth-child({})", n)?,
                    CssPathPseudoSelector::Hover => f.write_str(":hover")?,
                    CssPathPseudoSelector::Active => f.write_str(":active")?,
                    CssPathPseudoSelector::Focus => f.write_str(":focus")?,
                },
                CssPathSelector::DirectChildren => f.write_str(" > ")?,
                CssPathSelector::Children => f.write_str(" ")?,
            }
        }
        Ok(())
    }
}

struct SelectorParser<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> SelectorParser<'a> {
    fn error(&self, reason: impl Into<String>) -> CssError {
        CssError::InvalidSelector { selector: self.source.trim().to_string(), reason: reason.into() }
    }

    fn consume_ident(&mut self) -> String {
        let mut result = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                result.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        result
    }

    fn push_combinator(&self, out: &mut Vec<CssPathSelector>, comb: CssPathSelector) -> Result<(), CssError> {
        match out.last() {
            None => Err(self.error("selector starts with a combinator")),
            Some(CssPathSelector::Children) => {
                // `a > b` arrives as whitespace first
                out.pop();
                out.push(comb);
                Ok(())
            }
            Some(CssPathSelector::DirectChildren) => match comb {
                CssPathSelector::Children => Ok(()),
                _ => Err(self.error("two combinators in a row")),
            },
            Some(_) => {
                out.push(comb);
                Ok(())
            }
        }
    }

    fn parse(mut self) -> Result<CssPath, CssError> {
        let mut out: Vec<CssPathSelector> = Vec::new();

        while let Some(&(_, c)) = self.chars.peek() {
            match c {
                c if c.is_whitespace() => {
                    self.chars.next();
                    if !out.is_empty() {
                        self.push_combinator(&mut out, CssPathSelector::Children)?;
                    }
                }
                '>' => {
                    self.chars.next();
                    self.push_combinator(&mut out, CssPathSelector::DirectChildren)?;
                }
                '*' => {
                    self.chars.next();
                    out.push(CssPathSelector::Global);
                }
                '.' => {
                    self.chars.next();
                    let ident = self.consume_ident();
                    if ident.is_empty() {
                        return Err(self.error("empty class name"));
                    }
                    out.push(CssPathSelector::Class(ident));
                }
                '#' => {
                    self.chars.next();
                    let ident = self.consume_ident();
                    if ident.is_empty() {
                        return Err(self.error("empty id"));
                    }
                    out.push(CssPathSelector::Id(ident));
                }
                ':' => {
                    self.chars.next();
                    let pseudo = self.parse_pseudo()?;
                    out.push(CssPathSelector::PseudoSelector(pseudo));
                }
                c if c.is_alphabetic() => {
                    let ident = self.consume_ident().to_ascii_lowercase();
                    let tag = NodeTypeTag::from_name(&ident)
                        .ok_or_else(|| self.error(format!("unknown node type `{}`", ident)))?;
                    out.push(CssPathSelector::Type(tag));
                }
                other => return Err(self.error(format!("unexpected character `{}`", other))),
            }
        }

        if matches!(out.last(), Some(CssPathSelector::Children)) {
            out.pop();
        }
        match out.last() {
            None => Err(self.error("empty selector")),
            Some(last) if last.is_combinator() => Err(self.error("selector ends with a combinator")),
            Some(_) => Ok(CssPath { selectors: out }),
        }
    }

    fn parse_pseudo(&mut self) -> Result<CssPathPseudoSelector, CssError> {
        let name = self.consume_ident().to_ascii_lowercase();
        Ok(match name.as_str() {
            "first" | "first-child" => CssPathPseudoSelector::First,
            "last" | "last-child" => CssPathPseudoSelector::Last,
            "hover" => CssPathPseudoSelector::Hover,
            "active" => CssPathPseudoSelector::Active,
            "focus" => CssPathPseudoSelector::Focus,
            "nth-child" => {
                if !matches!(self.chars.next(), Some((_, '('))) {
                    return Err(self.error("expected `(` after :nth-child"));
                }
                let mut arg = String::new();
                loop {
                    match self.chars.next() {
                        Some((_, ')')) => break,
                        Some((_, c)) => arg.push(c),
                        None => return Err(self.error("unterminated :nth-child(")),
                    }
                }
                let nth = CssNthChildSelector::parse(&arg)
                    .ok_or_else(|| self.error(format!("invalid :nth-child argument `{}`", arg)))?;
                CssPathPseudoSelector::NthChild(nth)
            }
            _ => return Err(self.error(format!("unsupported pseudo-class `:{}`", name))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat fixture: `nodes[i] = (tag, classes, parent, index_in_parent, is_last)`
    struct Tree {
        nodes: Vec<(NodeTypeTag, Vec<&'static str>, Option<usize>, usize, bool)>,
    }

    #[derive(Clone, Copy)]
    struct At<'a>(&'a Tree, usize);

    impl MatchTarget for At<'_> {
        fn tag(&self) -> NodeTypeTag {
            self.0.nodes[self.1].0
        }
        fn has_class(&self, class: &str) -> bool {
            self.0.nodes[self.1].1.contains(&class)
        }
        fn has_id(&self, _id: &str) -> bool {
            false
        }
        fn index_in_parent(&self) -> usize {
            self.0.nodes[self.1].3
        }
        fn is_last_child(&self) -> bool {
            self.0.nodes[self.1].4
        }
        fn parent(&self) -> Option<Self> {
            self.0.nodes[self.1].2.map(|p| At(self.0, p))
        }
    }

    fn tree() -> Tree {
        Tree {
            nodes: vec![
                (NodeTypeTag::Body, vec![], None, 0, true),
                (NodeTypeTag::Div, vec!["list"], Some(0), 0, true),
                (NodeTypeTag::Div, vec!["item"], Some(1), 0, false),
                (NodeTypeTag::Div, vec!["item", "btn"], Some(1), 1, true),
            ],
        }
    }

    #[test]
    fn test_parse_compound() {
        let path = CssPath::parse("div.item:hover").unwrap();
        assert_eq!(
            path.selectors,
            vec![
                CssPathSelector::Type(NodeTypeTag::Div),
                CssPathSelector::Class("item".into()),
                CssPathSelector::PseudoSelector(CssPathPseudoSelector::Hover),
            ]
        );
        assert_eq!(path.pseudo_state(), PseudoState::Hover);
    }

    #[test]
    fn test_parse_combinators() {
        let path = CssPath::parse("body  > .list .item").unwrap();
        assert_eq!(
            path.selectors,
            vec![
                CssPathSelector::Type(NodeTypeTag::Body),
                CssPathSelector::DirectChildren,
                CssPathSelector::Class("list".into()),
                CssPathSelector::Children,
                CssPathSelector::Class("item".into()),
            ]
        );
    }

    #[test]
    fn test_parse_rejects() {
        assert!(CssPath::parse("> .a").is_err());
        assert!(CssPath::parse(".a >").is_err());
        assert!(CssPath::parse("span").is_err());
        assert!(CssPath::parse("a:visited").is_err());
        assert!(CssPath::parse("").is_err());
    }

    #[test]
    fn test_node_type_names() {
        assert_eq!(NodeTypeTag::from_name("iframe"), Some(NodeTypeTag::IFrame));
        assert_eq!(NodeTypeTag::from_name("span"), None);
        for tag in [NodeTypeTag::Body, NodeTypeTag::Div, NodeTypeTag::Br, NodeTypeTag::P, NodeTypeTag::Img] {
            assert_eq!(NodeTypeTag::from_name(tag.as_str()), Some(tag));
        }
    }

    #[test]
    fn test_specificity() {
        assert_eq!(CssPath::parse("div").unwrap().specificity(), Specificity(0, 0, 1));
        assert_eq!(CssPath::parse(".a.b").unwrap().specificity(), Specificity(0, 2, 0));
        assert_eq!(CssPath::parse("#x .a:hover").unwrap().specificity(), Specificity(1, 2, 0));
        assert!(CssPath::parse(".a.b").unwrap().specificity() > CssPath::parse(".a").unwrap().specificity());
    }

    #[test]
    fn test_nth_child() {
        assert!(CssNthChildSelector::Odd.matches(1));
        assert!(!CssNthChildSelector::Odd.matches(2));
        assert!(CssNthChildSelector::Even.matches(4));
        let p = CssNthChildSelector::parse("3n+1").unwrap();
        assert_eq!(p, CssNthChildSelector::Pattern { repeat: 3, offset: 1 });
        assert!(p.matches(1) && p.matches(4) && !p.matches(5));
        assert_eq!(CssNthChildSelector::parse("2"), Some(CssNthChildSelector::Number(2)));
    }

    #[test]
    fn test_matching() {
        let t = tree();
        let btn = At(&t, 3);
        assert!(CssPath::parse(".btn").unwrap().matches(&btn));
        assert!(CssPath::parse(".list > .btn").unwrap().matches(&btn));
        assert!(CssPath::parse("body .btn").unwrap().matches(&btn));
        assert!(!CssPath::parse("body > .btn").unwrap().matches(&btn));
        assert!(CssPath::parse(".item:last").unwrap().matches(&btn));
        assert!(!CssPath::parse(".item:first").unwrap().matches(&btn));
        assert!(CssPath::parse(".item:nth-child(2)").unwrap().matches(&btn));
        assert!(CssPath::parse(".btn:hover").unwrap().matches(&btn));
        assert!(!CssPath::parse(".list:hover .btn").unwrap().matches(&btn));
    }
}
