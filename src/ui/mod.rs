//! 元素树与选择器

mod element;
pub mod selector;

pub use element::{Document, NodeId, NodeKind};
pub use selector::{AttrTest, Capability, Compound, Matcher};
