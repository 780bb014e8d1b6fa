//! 下拉手势识别
//!
//! 状态机：Idle → Armed → Classifying → Idle。
//! 触摸开始时记录起点与时间并挂一个一次性的 `touchend` 监听；
//! 触摸结束时判定位移与时长，满足条件则从结束事件的目标发出 `pull`。

use super::bus::{EventBus, ListenerId};
use super::router::RoutedEvent;
use crate::event::{Detail, Event, EventType};
use crate::ui::NodeId;
use crate::Point;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

/// 下拉判定阈值
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullThresholds {
    /// 时长下界（不含），毫秒
    pub min_duration_ms: u64,
    /// 时长上界（含），毫秒
    pub max_duration_ms: u64,
    /// 水平位移绝对值上界（不含）
    pub max_horizontal: f32,
    /// 向下位移下界（不含）
    pub min_vertical: f32,
}

impl Default for PullThresholds {
    fn default() -> Self {
        Self {
            min_duration_ms: 100,
            max_duration_ms: 2000,
            max_horizontal: 80.0,
            min_vertical: 100.0,
        }
    }
}

/// 一次触摸是否构成下拉
pub fn classify(start: Point, end: Point, duration_ms: u64, thresholds: &PullThresholds) -> bool {
    if duration_ms <= thresholds.min_duration_ms || duration_ms > thresholds.max_duration_ms {
        return false;
    }
    let d = end - start;
    d.dx.abs() < thresholds.max_horizontal && d.dy > thresholds.min_vertical
}

struct Armed {
    listener: ListenerId,
}

/// 下拉识别器
pub struct PullRecognizer {
    thresholds: PullThresholds,
    armed: RefCell<HashMap<NodeId, Armed>>,
}

impl PullRecognizer {
    pub fn new(thresholds: PullThresholds) -> Rc<Self> {
        Rc::new(Self {
            thresholds,
            armed: RefCell::new(HashMap::new()),
        })
    }

    pub fn thresholds(&self) -> &PullThresholds {
        &self.thresholds
    }

    /// 元素上是否有等待 `touchend` 的手势
    pub fn is_armed(&self, bus: &EventBus, node: NodeId) -> bool {
        self.prune(bus);
        self.armed.borrow().contains_key(&node)
    }

    /// 等待中的手势数
    pub fn armed_count(&self, bus: &EventBus) -> usize {
        self.prune(bus);
        self.armed.borrow().len()
    }

    /// 丢弃监听器已不在总线上的手势（元素被移除时监听器随之消失）
    fn prune(&self, bus: &EventBus) {
        self.armed.borrow_mut().retain(|node, armed| {
            let live = bus.has_listener(armed.listener);
            if !live {
                trace!(node = %node, "dropping gesture of removed element");
            }
            live
        });
    }

    /// `touchstart` 路由处理器
    pub fn check_pull(self: &Rc<Self>, bus: &EventBus, event: &RoutedEvent<'_>) {
        let touch = event.detail().as_touch();
        let Some((first, start_time)) = touch.and_then(|t| t.touches.first().map(|p| (*p, t.timestamp))) else {
            trace!(node = %event.target, "touch start without touch points");
            return;
        };
        let start_point = first.position();
        let target = event.target;
        self.prune(bus);

        // 同一元素上未决的旧手势被新手势替换
        let stale = self.armed.borrow_mut().remove(&target);
        if let Some(previous) = stale {
            bus.remove_listener(previous.listener);
        }

        let recognizer = Rc::clone(self);
        let listener = bus.once(target, EventType::TouchEnd, move |bus, end, _| {
            recognizer.armed.borrow_mut().remove(&target);
            recognizer.classify_end(bus, end, start_point, start_time);
        });
        self.armed.borrow_mut().insert(target, Armed { listener });
        trace!(node = %target, x = start_point.x, y = start_point.y, "pull gesture armed");
    }

    fn classify_end(&self, bus: &EventBus, end: &Event, start_point: Point, start_time: u64) {
        let Some(touch) = end.detail().as_touch() else {
            return;
        };
        let Some(end_touch) = touch.changed_touches.first() else {
            return;
        };
        let duration = touch.timestamp.saturating_sub(start_time);
        let end_point = end_touch.position();
        if classify(start_point, end_point, duration, &self.thresholds) {
            debug!(origin = %end.origin(), duration, "pull recognized");
            bus.dispatch(end.origin(), EventType::Pull, Detail::None);
        } else {
            trace!(duration, dx = end_point.x - start_point.x, dy = end_point.y - start_point.y, "touch is not a pull");
        }
    }
}
