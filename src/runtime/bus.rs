//! 应用事件总线
//!
//! 事件从来源元素沿祖先链向上传播，依次交给挂在各节点上的监听器。
//! 分发是同步的：`dispatch` 返回时所有处理器都已执行完毕。
//!
//! 监听器在调用期间不持有文档借用，处理器可以自由修改文档、注册新的
//! 监听器或者嵌套分发新事件。处理器自己借用文档时，必须在嵌套分发前释放。

use crate::event::{Detail, Event, EventType};
use crate::ui::{Document, NodeId};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;
use tracing::trace;

/// 监听器 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// 监听器选项
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenerOptions {
    /// 首次调用前自动移除
    pub once: bool,
}

type Callback = dyn Fn(&EventBus, &Event, NodeId);
type Continuation = Box<dyn FnOnce(&EventBus, &Event, NodeId)>;

enum Slot {
    Repeat(Box<Callback>),
    Once(RefCell<Option<Continuation>>),
}

impl Slot {
    fn invoke(&self, bus: &EventBus, event: &Event, current: NodeId) {
        match self {
            Slot::Repeat(cb) => cb(bus, event, current),
            Slot::Once(cell) => {
                let continuation = cell.borrow_mut().take();
                if let Some(f) = continuation {
                    f(bus, event, current);
                }
            }
        }
    }
}

struct Listener {
    id: ListenerId,
    node: NodeId,
    event_type: EventType,
    once: bool,
    slot: Rc<Slot>,
}

/// 事件总线，持有文档与全部监听器
pub struct EventBus {
    document: RefCell<Document>,
    listeners: RefCell<Vec<Listener>>,
    next_id: Cell<u64>,
}

impl EventBus {
    pub fn new(document: Document) -> Self {
        Self {
            document: RefCell::new(document),
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    pub fn document(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.document.borrow_mut()
    }

    pub fn root(&self) -> NodeId {
        self.document.borrow().root()
    }

    fn next_listener_id(&self) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ListenerId(id)
    }

    fn push(&self, node: NodeId, event_type: EventType, once: bool, slot: Slot) -> ListenerId {
        let id = self.next_listener_id();
        self.listeners.borrow_mut().push(Listener {
            id,
            node,
            event_type,
            once,
            slot: Rc::new(slot),
        });
        id
    }

    /// 在节点上注册监听器
    pub fn add_listener<F>(
        &self,
        node: NodeId,
        event_type: EventType,
        callback: F,
        options: ListenerOptions,
    ) -> ListenerId
    where
        F: Fn(&EventBus, &Event, NodeId) + 'static,
    {
        self.push(node, event_type, options.once, Slot::Repeat(Box::new(callback)))
    }

    /// 一次性监听器：回调只会被消费一次
    pub fn once<F>(&self, node: NodeId, event_type: EventType, callback: F) -> ListenerId
    where
        F: FnOnce(&EventBus, &Event, NodeId) + 'static,
    {
        self.push(
            node,
            event_type,
            true,
            Slot::Once(RefCell::new(Some(Box::new(callback)))),
        )
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.listeners.borrow().iter().any(|l| l.id == id)
    }

    /// 当前注册的监听器总数
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// 移除节点子树，并丢弃挂在这些节点上的监听器
    pub fn remove_node(&self, node: NodeId) -> Vec<NodeId> {
        let removed = self.document.borrow_mut().remove(node);
        if !removed.is_empty() {
            self.listeners
                .borrow_mut()
                .retain(|l| !removed.contains(&l.node));
        }
        removed
    }

    /// 丢弃已不在文档中的节点上的监听器
    fn prune_listeners(&self) {
        let doc = self.document.borrow();
        self.listeners.borrow_mut().retain(|l| doc.contains(l.node));
    }

    /// 从 `origin` 发出事件，返回是否未被 `prevent_default`
    pub fn dispatch(&self, origin: NodeId, event_type: EventType, detail: Detail) -> bool {
        self.dispatch_event(&Event::new(event_type, origin, detail))
    }

    pub fn dispatch_event(&self, event: &Event) -> bool {
        self.prune_listeners();
        let path = self.document.borrow().ancestors(event.origin());
        trace!(event = %event.event_type(), origin = %event.origin(), depth = path.len(), "dispatch");

        for node in path {
            // 到达节点时的快照；之后新增的监听器本次不调用
            let snapshot: Vec<(ListenerId, bool, Rc<Slot>)> = self
                .listeners
                .borrow()
                .iter()
                .filter(|l| l.node == node && &l.event_type == event.event_type())
                .map(|l| (l.id, l.once, Rc::clone(&l.slot)))
                .collect();

            for (id, once, slot) in snapshot {
                if !self.has_listener(id) {
                    continue;
                }
                if once {
                    self.remove_listener(id);
                }
                slot.invoke(self, event, node);
            }
        }

        !event.default_prevented()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (EventBus, NodeId, NodeId) {
        let mut doc = Document::new();
        let section = doc.create_element("section");
        let button = doc.create_element("button");
        doc.append_child(doc.root(), section);
        doc.append_child(section, button);
        (EventBus::new(doc), section, button)
    }

    #[test]
    fn test_bubbles_from_origin_to_root() {
        let (bus, section, button) = tree();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for node in [bus.root(), section, button] {
            let seen = Rc::clone(&seen);
            bus.add_listener(node, EventType::Sync, move |_, _, current| seen.borrow_mut().push(current), ListenerOptions::default());
        }
        bus.dispatch(button, EventType::Sync, Detail::None);
        assert_eq!(*seen.borrow(), vec![button, section, bus.root()]);
    }

    #[test]
    fn test_once_continuation_runs_exactly_once() {
        let (bus, section, button) = tree();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let id = bus.once(section, EventType::RequestFinished, move |_, _, _| c.set(c.get() + 1));
        bus.dispatch(button, EventType::RequestFinished, Detail::None);
        bus.dispatch(button, EventType::RequestFinished, Detail::None);
        assert_eq!(count.get(), 1);
        assert!(!bus.has_listener(id));
    }

    #[test]
    fn test_removed_node_drops_its_listeners() {
        let (bus, section, button) = tree();
        let fired = Rc::new(Cell::new(false));
        let f = Rc::clone(&fired);
        bus.once(button, EventType::InitTrip, move |_, _, _| f.set(true));
        bus.remove_node(section);
        assert_eq!(bus.listener_count(), 0);
        bus.dispatch(bus.root(), EventType::InitTrip, Detail::None);
        assert!(!fired.get());
    }

    #[test]
    fn test_prevent_default_reported() {
        let (bus, _, button) = tree();
        bus.add_listener(button, EventType::Click, |_, event, _| event.prevent_default(), ListenerOptions::default());
        assert!(!bus.dispatch(button, EventType::Click, Detail::None));
        assert!(bus.dispatch(button, EventType::Sync, Detail::None));
    }
}
