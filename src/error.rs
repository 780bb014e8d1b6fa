//! 错误类型

use thiserror::Error;

/// 选择器解析错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected '{found}' at {pos} in selector")]
    Unexpected { found: char, pos: usize },
    #[error("unterminated attribute test in selector")]
    UnterminatedAttribute,
    #[error("route `{0}` has no event type")]
    MissingEventType(String),
}

/// 片段标记解析错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("empty tag name at {0}")]
    EmptyTag(usize),
    #[error("mismatched tags: <{open}> closed by </{close}>")]
    Mismatched { open: String, close: String },
    #[error("expected '{expected}', got '{found}' at {pos}")]
    Expected { expected: char, found: char, pos: usize },
    #[error("parent node is not attached to the document")]
    DetachedParent,
}

/// 区块导航错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("unknown section `{0}`")]
    UnknownSection(String),
}

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// 汇总错误
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Markup(#[from] MarkupError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
