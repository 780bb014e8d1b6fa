//! 片段标记解析器

pub mod markup;

pub use markup::{append_fragment, FragmentParser};
