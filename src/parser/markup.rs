//! 片段标记解析器
//!
//! 把一段 HTML 风格的片段直接解析进 [`Document`]，挂到给定父节点下。
//! 只处理元素、属性、文本和注释；不做模板求值。
//! 文本与属性值中的常见字符实体会被解码。

use crate::error::MarkupError;
use crate::ui::{Document, NodeId};

/// 无需结束标签的元素
const VOID_TAGS: &[&str] = &["input", "br", "hr", "img", "meta", "link"];

const ENTITIES: &[(&str, char)] = &[
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&#39;", '\''),
    ("&apos;", '\''),
];

/// 解码字符实体，不认识的 `&` 原样保留
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];
        match ENTITIES.iter().find(|(entity, _)| tail.starts_with(entity)) {
            Some((entity, c)) => {
                out.push(*c);
                rest = &tail[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// 片段解析器
pub struct FragmentParser<'d> {
    doc: &'d mut Document,
    input: Vec<char>,
    pos: usize,
}

impl<'d> FragmentParser<'d> {
    pub fn new(doc: &'d mut Document, input: &str) -> Self {
        Self {
            doc,
            input: input.chars().collect(),
            pos: 0,
        }
    }

    /// 解析整段输入并追加到 `parent`，返回新建的顶层节点
    pub fn parse_into(mut self, parent: NodeId) -> Result<Vec<NodeId>, MarkupError> {
        if !self.doc.is_element(parent) {
            return Err(MarkupError::DetachedParent);
        }
        let nodes = self.parse_nodes(parent)?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            // 多余的结束标签
            return Err(MarkupError::Expected {
                expected: '<',
                found: self.current_char(),
                pos: self.pos,
            });
        }
        Ok(nodes)
    }

    fn parse_nodes(&mut self, parent: NodeId) -> Result<Vec<NodeId>, MarkupError> {
        let mut nodes = Vec::new();

        while self.pos < self.input.len() {
            if self.starts_with("<!--") {
                self.skip_comment();
            } else if self.current_char() == '<' {
                if self.starts_with("</") {
                    break;
                }
                nodes.push(self.parse_element(parent)?);
            } else {
                let text = self.parse_text();
                if !text.trim().is_empty() {
                    let node = self.doc.create_text(&decode_entities(text.trim()));
                    self.doc.append_child(parent, node);
                    nodes.push(node);
                }
            }
        }

        Ok(nodes)
    }

    fn parse_element(&mut self, parent: NodeId) -> Result<NodeId, MarkupError> {
        self.expect('<')?;

        let tag = self.parse_name();
        if tag.is_empty() {
            return Err(MarkupError::EmptyTag(self.pos));
        }

        let node = self.doc.create_element(&tag);
        self.doc.append_child(parent, node);

        loop {
            self.skip_whitespace();
            if self.pos >= self.input.len() {
                return Err(MarkupError::Expected { expected: '>', found: '\0', pos: self.pos });
            }
            if self.current_char() == '>' || self.starts_with("/>") {
                break;
            }
            let (name, value) = self.parse_attribute()?;
            self.doc.set_attr(node, &name, &value);
        }

        if self.starts_with("/>") {
            self.pos += 2;
            return Ok(node);
        }
        self.expect('>')?;

        if VOID_TAGS.contains(&tag.to_ascii_lowercase().as_str()) {
            return Ok(node);
        }

        self.parse_nodes(node)?;

        if !self.starts_with("</") {
            return Err(MarkupError::Mismatched { open: tag, close: String::new() });
        }
        self.pos += 2;
        let close = self.parse_name();
        if !close.eq_ignore_ascii_case(&tag) {
            return Err(MarkupError::Mismatched { open: tag, close });
        }
        self.skip_whitespace();
        self.expect('>')?;

        Ok(node)
    }

    fn parse_name(&mut self) -> String {
        let mut name = String::new();
        while self.pos < self.input.len() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' || c == '.' {
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        name
    }

    fn parse_attribute(&mut self) -> Result<(String, String), MarkupError> {
        let name = self.parse_name();
        if name.is_empty() {
            return Err(MarkupError::Expected {
                expected: '>',
                found: self.current_char(),
                pos: self.pos,
            });
        }

        self.skip_whitespace();
        if self.current_char() != '=' {
            return Ok((name, String::new()));
        }
        self.pos += 1;
        self.skip_whitespace();

        let quote = self.current_char();
        if quote != '"' && quote != '\'' {
            let mut value = String::new();
            while self.pos < self.input.len() {
                let c = self.current_char();
                if c.is_whitespace() || c == '>' || c == '/' {
                    break;
                }
                value.push(c);
                self.pos += 1;
            }
            return Ok((name, decode_entities(&value)));
        }

        self.pos += 1;
        let mut value = String::new();
        while self.pos < self.input.len() && self.current_char() != quote {
            value.push(self.current_char());
            self.pos += 1;
        }
        self.expect(quote)?;

        Ok((name, decode_entities(&value)))
    }

    fn parse_text(&mut self) -> String {
        let mut text = String::new();
        while self.pos < self.input.len() && self.current_char() != '<' {
            text.push(self.current_char());
            self.pos += 1;
        }
        text
    }

    fn skip_comment(&mut self) {
        self.pos += 4;
        while self.pos < self.input.len() && !self.starts_with("-->") {
            self.pos += 1;
        }
        self.pos = (self.pos + 3).min(self.input.len());
    }

    fn current_char(&self) -> char {
        self.input.get(self.pos).copied().unwrap_or('\0')
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.current_char().is_whitespace() {
            self.pos += 1;
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.input.get(self.pos + i) == Some(&c))
    }

    fn expect(&mut self, c: char) -> Result<(), MarkupError> {
        if self.current_char() == c {
            self.pos += 1;
            Ok(())
        } else {
            Err(MarkupError::Expected { expected: c, found: self.current_char(), pos: self.pos })
        }
    }
}

/// 解析片段并追加到 `parent`
pub fn append_fragment(doc: &mut Document, parent: NodeId, markup: &str) -> Result<Vec<NodeId>, MarkupError> {
    FragmentParser::new(doc, markup).parse_into(parent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_fragment() {
        let mut doc = Document::new();
        let root = doc.root();
        let nodes = append_fragment(
            &mut doc,
            root,
            r#"<menu><h2 to="expenses" class="active">Expenses</h2></menu>
               <!-- balance -->
               <section path="balance" hidden><dl id="balance_list"></dl></section>"#,
        )
        .unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(doc.tag(nodes[0]), Some("menu"));
        let h2 = doc.children(nodes[0])[0];
        assert_eq!(doc.attr(h2, "to"), Some("expenses"));
        assert_eq!(doc.text_content(h2), "Expenses");
        assert_eq!(doc.attr(nodes[1], "hidden"), Some(""));
        assert!(doc.element_by_id("balance_list").is_some());
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        let mut doc = Document::new();
        let root = doc.root();
        let nodes =
            append_fragment(&mut doc, root, r#"<form><input name="title"><br/><button>Go</button></form>"#).unwrap();
        assert_eq!(doc.children(nodes[0]).len(), 3);
    }

    #[test]
    fn test_entities_are_decoded() {
        let mut doc = Document::new();
        let root = doc.root();
        let nodes = append_fragment(
            &mut doc,
            root,
            r#"<option value="Ana &amp; &quot;Bo&quot; &lt;3">Ana &amp; &#39;Bo&#39; &gt; R&D</option>"#,
        )
        .unwrap();
        assert_eq!(doc.attr(nodes[0], "value"), Some(r#"Ana & "Bo" <3"#));
        assert_eq!(doc.text_content(nodes[0]), "Ana & 'Bo' > R&D");
    }

    #[test]
    fn test_mismatched_tags() {
        let mut doc = Document::new();
        let root = doc.root();
        let err = append_fragment(&mut doc, root, "<ul><li></ul>").unwrap_err();
        assert!(matches!(err, MarkupError::Mismatched { .. }));
    }
}
