//! 元素树
//!
//! 以 arena 方式存放节点，[`NodeId`] 可复制，带槽位的代数。节点被移除后
//! 槽位进入空闲表并在下次创建时复用；旧 id 的代数对不上，
//! 读操作返回 `None`/`false`，写操作静默忽略。

use super::selector::Matcher;
use serde_json::Value as JsonValue;
use std::fmt;

/// 节点 ID：槽位下标加代数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "#{}", self.index)
        } else {
            write!(f, "#{}v{}", self.index, self.generation)
        }
    }
}

/// 节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: Option<JsonValue>,
}

impl Node {
    fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element,
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            data: None,
        }
    }

    fn text(content: &str) -> Self {
        Self {
            kind: NodeKind::Text,
            tag: String::new(),
            attributes: Vec::new(),
            text: content.to_string(),
            parent: None,
            children: Vec::new(),
            data: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// 文档
pub struct Document {
    slots: Vec<Slot>,
    /// 可复用的空槽位
    free: Vec<usize>,
    root: NodeId,
    focused: Option<NodeId>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot { generation: 0, node: Some(Node::element("body")) }],
            free: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
            focused: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.node = Some(node);
            return NodeId { index, generation: slot.generation };
        }
        self.slots.push(Slot { generation: 0, node: Some(node) });
        NodeId { index: self.slots.len() - 1, generation: 0 }
    }

    /// 存活节点数（含游离节点）
    pub fn node_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// 已分配的槽位数
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.node_mut(id).filter(|n| n.kind == NodeKind::Element)
    }

    /// 创建游离元素
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(Node::element(tag))
    }

    /// 创建游离文本节点
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(Node::text(text))
    }

    /// 节点是否仍存在（可能是游离的）
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// 节点是否挂在根节点下
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.ancestors(id).last() == Some(&self.root)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(|n| n.kind)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.kind(id) == Some(NodeKind::Element)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.node(id)
            .filter(|n| n.kind == NodeKind::Element)
            .map(|n| n.tag.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// 从自身开始向上的祖先链
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.contains(id).then_some(id);
        while let Some(node) = current {
            chain.push(node);
            current = self.parent(node);
        }
        chain
    }

    /// 先序遍历的后代（不含自身）
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// 追加子节点，会先从原父节点摘下；形成环时拒绝
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.is_element(parent) || !self.contains(child) {
            return false;
        }
        if self.ancestors(parent).contains(&child) {
            return false;
        }
        self.detach(child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        true
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(old) = self.parent(child) {
            if let Some(node) = self.node_mut(old) {
                node.children.retain(|c| *c != child);
            }
            if let Some(node) = self.node_mut(child) {
                node.parent = None;
            }
        }
    }

    /// 移除并释放整棵子树，返回被释放的节点
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        if id == self.root || !self.contains(id) {
            return Vec::new();
        }
        self.detach(id);
        let mut removed = vec![id];
        removed.extend(self.descendants(id));
        for node in &removed {
            let slot = &mut self.slots[node.index];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(node.index);
        }
        if self.focused.is_some_and(|f| removed.contains(&f)) {
            self.focused = None;
        }
        removed
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)?
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(node) = self.element_mut(id) else {
            return;
        };
        match node.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => node.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(node) = self.element_mut(id) {
            node.attributes.retain(|(k, _)| k != name);
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        self.node(id).map(|n| n.attributes.as_slice()).unwrap_or(&[])
    }

    pub fn has_class(&self, id: NodeId, class_name: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class_name))
    }

    pub fn add_class(&mut self, id: NodeId, class_name: &str) {
        if self.has_class(id, class_name) || !self.is_element(id) {
            return;
        }
        let classes = match self.attr(id, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class_name),
            _ => class_name.to_string(),
        };
        self.set_attr(id, "class", &classes);
    }

    pub fn remove_class(&mut self, id: NodeId, class_name: &str) {
        let Some(existing) = self.attr(id, "class") else {
            return;
        };
        let classes: Vec<&str> = existing.split_whitespace().filter(|c| *c != class_name).collect();
        let classes = classes.join(" ");
        if classes.is_empty() {
            self.remove_attr(id, "class");
        } else {
            self.set_attr(id, "class", &classes);
        }
    }

    /// 元素：以单个文本节点替换全部子节点；文本节点：直接改写
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        match self.kind(id) {
            Some(NodeKind::Text) => {
                if let Some(node) = self.node_mut(id) {
                    node.text = text.to_string();
                }
            }
            Some(NodeKind::Element) => {
                for child in self.children(id).to_vec() {
                    self.remove(child);
                }
                let t = self.create_text(text);
                self.append_child(id, t);
            }
            None => {}
        }
    }

    pub fn text_content(&self, id: NodeId) -> String {
        match self.node(id) {
            Some(node) if node.kind == NodeKind::Text => node.text.clone(),
            Some(_) => self
                .descendants(id)
                .into_iter()
                .filter_map(|d| self.node(d))
                .filter(|n| n.kind == NodeKind::Text)
                .map(|n| n.text.as_str())
                .collect(),
            None => String::new(),
        }
    }

    pub fn set_data(&mut self, id: NodeId, data: JsonValue) {
        if let Some(node) = self.element_mut(id) {
            node.data = Some(data);
        }
    }

    pub fn data(&self, id: NodeId) -> Option<&JsonValue> {
        self.node(id).and_then(|n| n.data.as_ref())
    }

    pub fn focus(&mut self, id: NodeId) {
        if self.is_element(id) {
            self.focused = Some(id);
        }
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn matches(&self, id: NodeId, matcher: &Matcher) -> bool {
        matcher.matches(self, id)
    }

    /// 从自身向上找第一个匹配的元素，`limit` 为包含在内的上界
    pub fn closest(&self, id: NodeId, matcher: &Matcher, limit: Option<NodeId>) -> Option<NodeId> {
        for node in self.ancestors(id) {
            if matcher.matches(self, node) {
                return Some(node);
            }
            if Some(node) == limit {
                break;
            }
        }
        None
    }

    pub fn query(&self, scope: NodeId, matcher: &Matcher) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|d| matcher.matches(self, *d))
    }

    pub fn query_all(&self, scope: NodeId, matcher: &Matcher) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|d| matcher.matches(self, *d))
            .collect()
    }

    pub fn element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.query(self.root, &Matcher::id(element_id))
    }

    /// 缩进形式输出子树（调试用）
    pub fn dump(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.dump_into(id, 0, &mut out);
        out
    }

    fn dump_into(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        match node.kind {
            NodeKind::Text => {
                let text = node.text.trim();
                if !text.is_empty() {
                    out.push_str(&format!("{}\"{}\"\n", indent, text));
                }
            }
            NodeKind::Element => {
                out.push_str(&format!("{}<{}", indent, node.tag));
                for (k, v) in &node.attributes {
                    if v.is_empty() {
                        out.push_str(&format!(" {}", k));
                    } else {
                        out.push_str(&format!(" {}=\"{}\"", k, v));
                    }
                }
                out.push_str(">\n");
                for child in &node.children {
                    self.dump_into(*child, depth + 1, out);
                }
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
