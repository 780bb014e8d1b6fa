//! 视图配置

use crate::error::ConfigError;
use crate::runtime::PullThresholds;
use serde::Deserialize;
use std::path::Path;

/// 行程视图配置（JSON）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewConfig {
    #[serde(default)]
    pub pull: PullThresholds,
    /// 行程初始化后显示的区块
    #[serde(default = "default_initial_section")]
    pub initial_section: String,
    /// 显示行程名称的标题元素
    #[serde(default = "default_heading")]
    pub heading: String,
}

fn default_initial_section() -> String { "expenses".to_string() }
fn default_heading() -> String { "h1".to_string() }

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            pull: PullThresholds::default(),
            initial_section: default_initial_section(),
            heading: default_heading(),
        }
    }
}

impl ViewConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
