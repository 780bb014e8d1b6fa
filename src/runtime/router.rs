//! 声明式事件路由
//!
//! 每个作用域根上、每种事件类型只注册一个委托监听器。事件到达时，
//! 对每条路由从原始目标向上（直到作用域根，含）找最近的匹配元素，
//! 找到则调用处理器，找不到则静默跳过。

use super::bus::{EventBus, ListenerId, ListenerOptions};
use crate::error::SelectorError;
use crate::event::{Detail, Event, EventType};
use crate::ui::{Document, Matcher, NodeId};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// 传给处理器的规范化事件
pub struct RoutedEvent<'e> {
    /// 匹配到的元素
    pub target: NodeId,
    /// 作用域根
    pub current_target: NodeId,
    pub event: &'e Event,
}

impl RoutedEvent<'_> {
    pub fn detail(&self) -> &Detail {
        self.event.detail()
    }

    pub fn origin(&self) -> NodeId {
        self.event.origin()
    }

    pub fn prevent_default(&self) {
        self.event.prevent_default();
    }
}

pub type Handler = Rc<dyn Fn(&EventBus, &RoutedEvent<'_>)>;

/// 路由：(事件类型, 可选选择器) → 处理器
#[derive(Clone)]
pub struct Route {
    event_type: EventType,
    matcher: Option<Matcher>,
    handler: Handler,
}

impl Route {
    pub fn new<F>(event_type: EventType, matcher: Option<Matcher>, handler: F) -> Self
    where
        F: Fn(&EventBus, &RoutedEvent<'_>) + 'static,
    {
        Self {
            event_type,
            matcher,
            handler: Rc::new(handler),
        }
    }

    /// 无选择器的路由，目标即事件来源
    pub fn on<F>(event_type: EventType, handler: F) -> Self
    where
        F: Fn(&EventBus, &RoutedEvent<'_>) + 'static,
    {
        Self::new(event_type, None, handler)
    }

    pub fn matching<F>(event_type: EventType, matcher: Matcher, handler: F) -> Self
    where
        F: Fn(&EventBus, &RoutedEvent<'_>) + 'static,
    {
        Self::new(event_type, Some(matcher), handler)
    }

    /// 解析 `"click -> menu h2"` 或 `"synced"` 形式的路由声明
    pub fn parse<F>(declaration: &str, handler: F) -> Result<Self, SelectorError>
    where
        F: Fn(&EventBus, &RoutedEvent<'_>) + 'static,
    {
        let (event_name, selector) = match declaration.split_once("->") {
            Some((name, selector)) => (name.trim(), Some(selector)),
            None => (declaration.trim(), None),
        };
        if event_name.is_empty() {
            return Err(SelectorError::MissingEventType(declaration.to_string()));
        }
        let matcher = selector.map(Matcher::parse).transpose()?;
        Ok(Self::new(EventType::from_name(event_name), matcher, handler))
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    /// 找出本条路由对该事件的目标元素
    fn resolve(&self, doc: &Document, event: &Event, scope: NodeId) -> Option<NodeId> {
        match &self.matcher {
            None => Some(event.origin()),
            Some(m) => doc.closest(event.origin(), m, Some(scope)),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("event_type", &self.event_type)
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

/// 已挂载的一组路由
#[derive(Debug)]
pub struct RouteSet {
    scope: NodeId,
    listeners: Vec<ListenerId>,
}

impl RouteSet {
    pub fn scope(&self) -> NodeId {
        self.scope
    }

    /// 委托监听器数量（每种事件类型一个）
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn detach(self, bus: &EventBus) {
        for id in self.listeners {
            bus.remove_listener(id);
        }
    }
}

/// 把路由挂到作用域根上
pub fn attach_routes(bus: &EventBus, routes: Vec<Route>, scope: NodeId) -> RouteSet {
    let mut groups: Vec<(EventType, Vec<Route>)> = Vec::new();
    for route in routes {
        match groups.iter_mut().find(|(ty, _)| *ty == route.event_type) {
            Some((_, group)) => group.push(route),
            None => groups.push((route.event_type.clone(), vec![route])),
        }
    }

    let listeners = groups
        .into_iter()
        .map(|(event_type, group)| {
            bus.add_listener(
                scope,
                event_type,
                move |bus, event, current| {
                    for route in &group {
                        let target = route.resolve(&bus.document(), event, current);
                        let Some(target) = target else {
                            continue;
                        };
                        debug!(event = %event.event_type(), node = %target, "route matched");
                        (route.handler)(
                            bus,
                            &RoutedEvent {
                                target,
                                current_target: current,
                                event,
                            },
                        );
                    }
                },
                ListenerOptions::default(),
            )
        })
        .collect();

    RouteSet { scope, listeners }
}
