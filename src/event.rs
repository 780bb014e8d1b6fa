//! 事件系统 - 原始输入事件与应用总线事件
//!
//! 原始输入（点击、触摸）与应用事件（`init-trip`、`sync` ...）共用同一套
//! [`EventType`]，都从来源元素沿祖先链向上传播。

use crate::trip::model::{Command, Expense, Trip, TripUpdate};
use crate::ui::NodeId;
use crate::Point;
use serde_json::Value as JsonValue;
use std::cell::Cell;
use std::fmt;

/// 事件类型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    // 原始输入事件
    Click,
    TouchStart,
    TouchEnd,

    // 组件事件
    Navigate,
    JsonSubmit,

    // 应用总线事件
    InitTrip,
    AddExpense,
    ImmediateAddExpense,
    UnsyncedAddExpense,
    Unauthorized,
    Empty,
    Synced,
    SettleUp,
    Pull,
    Sync,
    PostCommand,
    RequestFinished,
    StoreTrip,
    LocalFetch,

    Custom(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Click => "click",
            EventType::TouchStart => "touchstart",
            EventType::TouchEnd => "touchend",
            EventType::Navigate => "navigate",
            EventType::JsonSubmit => "json-submit",
            EventType::InitTrip => "init-trip",
            EventType::AddExpense => "add-expense",
            EventType::ImmediateAddExpense => "immediate-add-expense",
            EventType::UnsyncedAddExpense => "unsynced-add-expense",
            EventType::Unauthorized => "unauthorized",
            EventType::Empty => "empty",
            EventType::Synced => "synced",
            EventType::SettleUp => "settle-up",
            EventType::Pull => "pull",
            EventType::Sync => "sync",
            EventType::PostCommand => "post-command",
            EventType::RequestFinished => "request-finished",
            EventType::StoreTrip => "store-trip",
            EventType::LocalFetch => "local-fetch",
            EventType::Custom(name) => name,
        }
    }

    /// 按名称解析，未知名称作为自定义事件
    pub fn from_name(name: &str) -> Self {
        match name {
            "click" => EventType::Click,
            "touchstart" => EventType::TouchStart,
            "touchend" => EventType::TouchEnd,
            "navigate" => EventType::Navigate,
            "json-submit" => EventType::JsonSubmit,
            "init-trip" => EventType::InitTrip,
            "add-expense" => EventType::AddExpense,
            "immediate-add-expense" => EventType::ImmediateAddExpense,
            "unsynced-add-expense" => EventType::UnsyncedAddExpense,
            "unauthorized" => EventType::Unauthorized,
            "empty" => EventType::Empty,
            "synced" => EventType::Synced,
            "settle-up" => EventType::SettleUp,
            "pull" => EventType::Pull,
            "sync" => EventType::Sync,
            "post-command" => EventType::PostCommand,
            "request-finished" => EventType::RequestFinished,
            "store-trip" => EventType::StoreTrip,
            "local-fetch" => EventType::LocalFetch,
            other => EventType::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

/// 触摸事件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TouchEvent {
    /// 仍停留在目标元素上的触点
    pub touches: Vec<Touch>,
    /// 本次事件中状态发生变化的触点
    pub changed_touches: Vec<Touch>,
    /// 毫秒时间戳
    pub timestamp: u64,
}

impl TouchEvent {
    pub fn start(touches: Vec<Touch>, timestamp: u64) -> Self {
        Self {
            changed_touches: touches.clone(),
            touches,
            timestamp,
        }
    }

    pub fn end(changed_touches: Vec<Touch>, timestamp: u64) -> Self {
        Self {
            touches: Vec::new(),
            changed_touches,
            timestamp,
        }
    }
}

/// 单个触摸点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

impl Touch {
    pub fn new(id: u32, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// 事件负载，总线本身不解释
#[derive(Debug, Clone, Default)]
pub enum Detail {
    #[default]
    None,
    Touch(TouchEvent),
    Trip(Trip),
    Expense(Expense),
    /// `sync` 携带的授权口令
    Key(String),
    Command(Command),
    /// 表单提交的 JSON
    Json(JsonValue),
    TripUpdate(TripUpdate),
}

impl Detail {
    pub fn is_none(&self) -> bool {
        matches!(self, Detail::None)
    }

    pub fn as_touch(&self) -> Option<&TouchEvent> {
        match self {
            Detail::Touch(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_trip(&self) -> Option<&Trip> {
        match self {
            Detail::Trip(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_expense(&self) -> Option<&Expense> {
        match self {
            Detail::Expense(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Detail::Key(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_command(&self) -> Option<&Command> {
        match self {
            Detail::Command(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Detail::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_trip_update(&self) -> Option<&TripUpdate> {
        match self {
            Detail::TripUpdate(u) => Some(u),
            _ => None,
        }
    }
}

/// 传播中的事件
///
/// 只在一次同步分发期间存在，不排队也不缓存。
#[derive(Debug)]
pub struct Event {
    event_type: EventType,
    origin: NodeId,
    detail: Detail,
    default_prevented: Cell<bool>,
}

impl Event {
    pub fn new(event_type: EventType, origin: NodeId, detail: Detail) -> Self {
        Self {
            event_type,
            origin,
            detail,
            default_prevented: Cell::new(false),
        }
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    /// 事件的原始目标
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    pub fn detail(&self) -> &Detail {
        &self.detail
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}
