//! Trip View - 记账行程视图
//! 声明式事件路由、应用总线、下拉刷新手势、单活动区块导航

mod geometry;

pub use geometry::{Delta, Point};

pub mod error;
pub use error::{Error, Result};

// 配置
pub mod config;
pub use config::ViewConfig;

// 事件与元素树
pub mod event;
pub mod ui;

// 片段解析
pub mod parser;

// 总线、路由、手势、导航
pub mod runtime;

// 行程视图
pub mod trip;
pub use trip::{Collaborators, TripView};

// 单元测试
#[cfg(test)]
mod tests;
