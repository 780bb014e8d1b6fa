//! 区块导航
//!
//! 一组具名区块中只有一个可见。导航器同时负责菜单标签的高亮，
//! 区块与标签按同一名称关联，由这里统一维护。

use crate::error::NavigationError;
use crate::ui::{Capability, Document, Matcher, NodeId};
use tracing::{info, warn};

const ACTIVE_CLASS: &str = "active";
const HIDDEN_ATTR: &str = "hidden";

/// 导航结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// 目标已是当前区块
    Unchanged,
    Activated {
        section: NodeId,
        previous: Option<NodeId>,
    },
}

/// 单一活动区块状态机
#[derive(Debug, Default)]
pub struct SectionNavigator {
    sections: Vec<(String, NodeId)>,
    tabs: Vec<(String, NodeId)>,
    active: Option<String>,
}

impl SectionNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册区块；已有活动区块时新区块保持隐藏
    pub fn register(&mut self, doc: &mut Document, name: &str, section: NodeId) {
        match self.sections.iter_mut().find(|(n, _)| n == name) {
            Some((_, node)) => *node = section,
            None => self.sections.push((name.to_string(), section)),
        }
        match self.active.as_deref() {
            Some(active) if active == name => show(doc, section),
            Some(_) => hide(doc, section),
            None => {}
        }
    }

    pub fn register_tab(&mut self, doc: &mut Document, name: &str, tab: NodeId) {
        match self.tabs.iter_mut().find(|(n, _)| n == name) {
            Some((_, node)) => *node = tab,
            None => self.tabs.push((name.to_string(), tab)),
        }
        if self.active.as_deref() == Some(name) {
            doc.add_class(tab, ACTIVE_CLASS);
        } else {
            doc.remove_class(tab, ACTIVE_CLASS);
        }
    }

    /// 注销区块及同名标签
    pub fn unregister(&mut self, name: &str) {
        self.sections.retain(|(n, _)| n != name);
        self.tabs.retain(|(n, _)| n != name);
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
    }

    /// 收集 `root` 下所有 `[path]` 区块与 `menu [to]` 标签
    pub fn scan(&mut self, doc: &mut Document, root: NodeId) {
        for section in doc.query_all(root, &Matcher::has(Capability::Section)) {
            if let Some(name) = doc.attr(section, "path").map(str::to_string) {
                self.register(doc, &name, section);
            }
        }
        let tab_matcher = Matcher::within(Matcher::tag("menu"), Matcher::has(Capability::NavigatesTo));
        for tab in doc.query_all(root, &tab_matcher) {
            if let Some(name) = doc.attr(tab, "to").map(str::to_string) {
                self.register_tab(doc, &name, tab);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    pub fn section(&self, name: &str) -> Option<NodeId> {
        self.sections.iter().find(|(n, _)| n == name).map(|(_, node)| *node)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(n, _)| n.as_str())
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_section(&self) -> Option<NodeId> {
        self.active.as_deref().and_then(|name| self.section(name))
    }

    /// 切换到指定区块；未知名称直接拒绝，不改动任何状态
    pub fn go_to(&mut self, doc: &mut Document, name: &str) -> Result<Transition, NavigationError> {
        let Some(section) = self.section(name) else {
            warn!(section = name, "navigation to unknown section rejected");
            return Err(NavigationError::UnknownSection(name.to_string()));
        };
        if self.active.as_deref() == Some(name) {
            return Ok(Transition::Unchanged);
        }

        let previous = self.active_section();
        for (n, node) in &self.sections {
            if n == name {
                show(doc, *node);
            } else {
                hide(doc, *node);
            }
        }
        for (n, tab) in &self.tabs {
            if n == name {
                doc.add_class(*tab, ACTIVE_CLASS);
            } else {
                doc.remove_class(*tab, ACTIVE_CLASS);
            }
        }
        self.active = Some(name.to_string());
        info!(section = name, "section activated");

        Ok(Transition::Activated { section, previous })
    }
}

fn show(doc: &mut Document, node: NodeId) {
    doc.add_class(node, ACTIVE_CLASS);
    doc.remove_attr(node, HIDDEN_ATTR);
}

fn hide(doc: &mut Document, node: NodeId) {
    doc.remove_class(node, ACTIVE_CLASS);
    doc.set_attr(node, HIDDEN_ATTR, "");
}
