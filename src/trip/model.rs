//! 行程数据模型

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::rc::Rc;

/// 行程描述
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trip {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
    /// 访问口令
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
}

/// 一笔支出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub amount: f64,
    pub payer: String,
    /// 为空表示全员分摊
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub date: String,
}

/// 交给命令执行方的命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub command: String,
    pub data: JsonValue,
}

impl Command {
    pub const ADD_EXPENSE: &'static str = "add_expense";

    pub fn add_expense(data: JsonValue) -> Self {
        Self {
            command: Self::ADD_EXPENSE.to_string(),
            data,
        }
    }
}

/// 本地存储的行程更新函数
#[derive(Clone)]
pub struct TripUpdate(Rc<dyn Fn(Trip) -> Trip>);

impl TripUpdate {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Trip) -> Trip + 'static,
    {
        Self(Rc::new(f))
    }

    /// 写入访问口令
    pub fn set_key(key: String) -> Self {
        Self::new(move |trip| Trip {
            key: Some(key.clone()),
            ..trip
        })
    }

    pub fn apply(&self, trip: Trip) -> Trip {
        (self.0)(trip)
    }
}

impl fmt::Debug for TripUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TripUpdate(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trip_deserializes_with_defaults() {
        let trip: Trip = serde_json::from_value(json!({ "name": "Lisbon" })).unwrap();
        assert_eq!(trip.name, "Lisbon");
        assert!(trip.members.is_empty());
        assert!(trip.key.is_none());
    }

    #[test]
    fn test_set_key_update_keeps_other_fields() {
        let trip = Trip {
            name: "Lisbon".to_string(),
            members: vec!["Ana".to_string()],
            ..Trip::default()
        };
        let updated = TripUpdate::set_key("s3cret".to_string()).apply(trip);
        assert_eq!(updated.key.as_deref(), Some("s3cret"));
        assert_eq!(updated.members, vec!["Ana"]);
    }
}
