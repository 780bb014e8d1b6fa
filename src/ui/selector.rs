//! 类型化选择器
//!
//! 路由按「能力」而不是自由字符串挑选目标元素。已知属性（`to`、`path`、`name`）
//! 解析为 [`Capability`]，其余属性仍按名称比较。

use super::element::{Document, NodeId};
use crate::error::SelectorError;

/// 路由目标能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// 带导航目标（`to`）
    NavigatesTo,
    /// 可导航的区块（`path`）
    Section,
    /// 具名表单（`name`）
    Named,
}

impl Capability {
    pub fn attribute(&self) -> &'static str {
        match self {
            Capability::NavigatesTo => "to",
            Capability::Section => "path",
            Capability::Named => "name",
        }
    }

    fn from_attribute(name: &str) -> Option<Self> {
        match name {
            "to" => Some(Capability::NavigatesTo),
            "path" => Some(Capability::Section),
            "name" => Some(Capability::Named),
            _ => None,
        }
    }
}

/// 属性测试
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrTest {
    Has(Capability),
    Is(Capability, String),
    Present(String),
    Equals(String, String),
}

impl AttrTest {
    fn new(name: &str, value: Option<String>) -> Self {
        match (Capability::from_attribute(name), value) {
            (Some(cap), None) => AttrTest::Has(cap),
            (Some(cap), Some(v)) => AttrTest::Is(cap, v),
            (None, None) => AttrTest::Present(name.to_string()),
            (None, Some(v)) => AttrTest::Equals(name.to_string(), v),
        }
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        match self {
            AttrTest::Has(cap) => doc.has_attr(node, cap.attribute()),
            AttrTest::Is(cap, v) => doc.attr(node, cap.attribute()) == Some(v.as_str()),
            AttrTest::Present(name) => doc.has_attr(node, name),
            AttrTest::Equals(name, v) => doc.attr(node, name) == Some(v.as_str()),
        }
    }
}

/// 单个复合步骤：`tag#id.class[attr]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrTest>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        if let Some(want) = &self.tag {
            if want != "*" && !want.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if doc.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| doc.has_class(node, c))
            && self.attrs.iter().all(|a| a.matches(doc, node))
    }
}

/// 元素匹配谓词
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Compound(Compound),
    /// `ancestor subject`：subject 匹配且某个严格祖先匹配 ancestor
    Descendant {
        ancestor: Box<Matcher>,
        subject: Box<Matcher>,
    },
    AnyOf(Vec<Matcher>),
}

impl Matcher {
    pub fn tag(tag: &str) -> Self {
        Matcher::Compound(Compound {
            tag: Some(tag.to_ascii_lowercase()),
            ..Compound::default()
        })
    }

    pub fn id(id: &str) -> Self {
        Matcher::Compound(Compound {
            id: Some(id.to_string()),
            ..Compound::default()
        })
    }

    pub fn class(class_name: &str) -> Self {
        Matcher::Compound(Compound {
            classes: vec![class_name.to_string()],
            ..Compound::default()
        })
    }

    pub fn classes(class_names: &[&str]) -> Self {
        Matcher::Compound(Compound {
            classes: class_names.iter().map(|c| c.to_string()).collect(),
            ..Compound::default()
        })
    }

    pub fn has(cap: Capability) -> Self {
        Matcher::Compound(Compound {
            attrs: vec![AttrTest::Has(cap)],
            ..Compound::default()
        })
    }

    pub fn is(cap: Capability, value: &str) -> Self {
        Matcher::Compound(Compound {
            attrs: vec![AttrTest::Is(cap, value.to_string())],
            ..Compound::default()
        })
    }

    pub fn section(name: &str) -> Self {
        Self::is(Capability::Section, name)
    }

    pub fn within(ancestor: Matcher, subject: Matcher) -> Self {
        Matcher::Descendant {
            ancestor: Box::new(ancestor),
            subject: Box::new(subject),
        }
    }

    pub fn or(self, other: Matcher) -> Self {
        match self {
            Matcher::AnyOf(mut alts) => {
                alts.push(other);
                Matcher::AnyOf(alts)
            }
            first => Matcher::AnyOf(vec![first, other]),
        }
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        match self {
            Matcher::Compound(c) => c.matches(doc, node),
            Matcher::Descendant { ancestor, subject } => {
                subject.matches(doc, node)
                    && doc
                        .ancestors(node)
                        .into_iter()
                        .skip(1)
                        .any(|a| ancestor.matches(doc, a))
            }
            Matcher::AnyOf(alts) => alts.iter().any(|m| m.matches(doc, node)),
        }
    }

    /// 解析 `menu h2`、`h1,[path="/trip"]`、`#refresh_button` 这类选择器
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        SelectorParser::new(input).parse()
    }
}

struct SelectorParser {
    input: Vec<char>,
    pos: usize,
}

impl SelectorParser {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    fn parse(&mut self) -> Result<Matcher, SelectorError> {
        let mut alternatives = Vec::new();
        loop {
            alternatives.push(self.parse_chain()?);
            self.skip_whitespace();
            match self.current_char() {
                Some(',') => self.advance(),
                None => break,
                Some(c) => return Err(SelectorError::Unexpected { found: c, pos: self.pos }),
            }
        }
        Ok(if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            Matcher::AnyOf(alternatives)
        })
    }

    fn parse_chain(&mut self) -> Result<Matcher, SelectorError> {
        self.skip_whitespace();
        let mut chain: Option<Matcher> = None;
        loop {
            let compound = self.parse_compound()?;
            if compound.is_empty() {
                break;
            }
            let step = Matcher::Compound(compound);
            chain = Some(match chain {
                Some(ancestor) => Matcher::within(ancestor, step),
                None => step,
            });
            self.skip_whitespace();
            if matches!(self.current_char(), None | Some(',')) {
                break;
            }
        }
        match (chain, self.current_char()) {
            (Some(m), _) => Ok(m),
            (None, Some(c)) if c != ',' => Err(SelectorError::Unexpected { found: c, pos: self.pos }),
            (None, _) => Err(SelectorError::Empty),
        }
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        if self.current_char() == Some('*') {
            self.advance();
            compound.tag = Some("*".to_string());
        } else {
            let tag = self.parse_ident();
            if !tag.is_empty() {
                compound.tag = Some(tag.to_ascii_lowercase());
            }
        }
        loop {
            match self.current_char() {
                Some('#') => {
                    self.advance();
                    compound.id = Some(self.parse_required_ident()?);
                }
                Some('.') => {
                    self.advance();
                    compound.classes.push(self.parse_required_ident()?);
                }
                Some('[') => {
                    self.advance();
                    compound.attrs.push(self.parse_attr_test()?);
                }
                _ => break,
            }
        }
        Ok(compound)
    }

    fn parse_attr_test(&mut self) -> Result<AttrTest, SelectorError> {
        self.skip_whitespace();
        let name = self.parse_required_ident()?;
        self.skip_whitespace();
        let value = match self.current_char() {
            Some('=') => {
                self.advance();
                self.skip_whitespace();
                Some(self.parse_attr_value()?)
            }
            Some(']') => None,
            Some(c) => return Err(SelectorError::Unexpected { found: c, pos: self.pos }),
            None => return Err(SelectorError::UnterminatedAttribute),
        };
        self.skip_whitespace();
        match self.current_char() {
            Some(']') => {
                self.advance();
                Ok(AttrTest::new(&name, value))
            }
            Some(c) => Err(SelectorError::Unexpected { found: c, pos: self.pos }),
            None => Err(SelectorError::UnterminatedAttribute),
        }
    }

    fn parse_attr_value(&mut self) -> Result<String, SelectorError> {
        match self.current_char() {
            Some(quote @ ('"' | '\'')) => {
                self.advance();
                let mut value = String::new();
                loop {
                    match self.current_char() {
                        Some(c) if c == quote => {
                            self.advance();
                            return Ok(value);
                        }
                        Some(c) => {
                            value.push(c);
                            self.advance();
                        }
                        None => return Err(SelectorError::UnterminatedAttribute),
                    }
                }
            }
            _ => self.parse_required_ident(),
        }
    }

    fn parse_required_ident(&mut self) -> Result<String, SelectorError> {
        let ident = self.parse_ident();
        if ident.is_empty() {
            return match self.current_char() {
                Some(c) => Err(SelectorError::Unexpected { found: c, pos: self.pos }),
                None => Err(SelectorError::UnterminatedAttribute),
            };
        }
        Ok(ident)
    }

    fn parse_ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '/' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }
}
