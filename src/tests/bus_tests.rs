//! 事件总线单元测试
//! 测试分发顺序、一次性监听器与分发过程中的增删

use crate::event::{Detail, EventType};
use crate::runtime::{EventBus, ListenerOptions};
use crate::ui::{Document, NodeId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// body > section > ul > li
fn list_tree() -> (EventBus, NodeId, NodeId, NodeId) {
    let mut doc = Document::new();
    let section = doc.create_element("section");
    let ul = doc.create_element("ul");
    let li = doc.create_element("li");
    doc.append_child(doc.root(), section);
    doc.append_child(section, ul);
    doc.append_child(ul, li);
    (EventBus::new(doc), section, ul, li)
}

/// 同一节点上的监听器按注册顺序调用
#[test]
fn test_listeners_run_in_registration_order() {
    let (bus, section, _, li) = list_tree();
    let order = Rc::new(RefCell::new(Vec::new()));
    for label in ["first", "second", "third"] {
        let order = Rc::clone(&order);
        bus.add_listener(section, EventType::AddExpense, move |_, _, _| order.borrow_mut().push(label), ListenerOptions::default());
    }

    bus.dispatch(li, EventType::AddExpense, Detail::None);

    // 分发是同步的，返回时全部处理器已执行
    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}

/// 只有同类型事件的监听器被调用
#[test]
fn test_event_type_filters_listeners() {
    let (bus, section, _, li) = list_tree();
    let count = Rc::new(Cell::new(0));
    let c = Rc::clone(&count);
    bus.add_listener(section, EventType::Synced, move |_, _, _| c.set(c.get() + 1), ListenerOptions::default());

    bus.dispatch(li, EventType::Sync, Detail::None);
    bus.dispatch(li, EventType::Custom("synced-later".to_string()), Detail::None);
    assert_eq!(count.get(), 0);

    bus.dispatch(li, EventType::from_name("synced"), Detail::None);
    assert_eq!(count.get(), 1);
}

/// 分发过程中被移除的监听器不再调用
#[test]
fn test_listener_removed_mid_dispatch_is_skipped() {
    let (bus, section, ul, li) = list_tree();
    let fired = Rc::new(Cell::new(false));
    let f = Rc::clone(&fired);
    let victim = bus.add_listener(section, EventType::Empty, move |_, _, _| f.set(true), ListenerOptions::default());
    bus.add_listener(ul, EventType::Empty, move |bus, _, _| {
        bus.remove_listener(victim);
    }, ListenerOptions::default());

    bus.dispatch(li, EventType::Empty, Detail::None);
    assert!(!fired.get(), "listener removed by an earlier handler must not run");
}

/// 分发过程中新增的监听器本次不调用，下次才调用
#[test]
fn test_listener_added_mid_dispatch_waits_for_next_event() {
    let (bus, section, _, li) = list_tree();
    let late = Rc::new(Cell::new(0));
    let l = Rc::clone(&late);
    bus.once(section, EventType::Synced, move |bus, _, current| {
        let l = Rc::clone(&l);
        bus.add_listener(current, EventType::Synced, move |_, _, _| l.set(l.get() + 1), ListenerOptions::default());
    });

    bus.dispatch(li, EventType::Synced, Detail::None);
    assert_eq!(late.get(), 0);
    bus.dispatch(li, EventType::Synced, Detail::None);
    assert_eq!(late.get(), 1);
}

/// 一次性监听器在调用前移除，处理器内嵌套分发同类事件不会重入
#[test]
fn test_once_listener_is_removed_before_invocation() {
    let (bus, section, _, li) = list_tree();
    let calls = Rc::new(Cell::new(0));
    let c = Rc::clone(&calls);
    bus.add_listener(
        section,
        EventType::RequestFinished,
        move |bus, event, _| {
            c.set(c.get() + 1);
            bus.dispatch(event.origin(), EventType::RequestFinished, Detail::None);
        },
        ListenerOptions { once: true },
    );

    bus.dispatch(li, EventType::RequestFinished, Detail::None);
    assert_eq!(calls.get(), 1);
    assert_eq!(bus.listener_count(), 0);
}

/// 处理器可以在分发中修改文档
#[test]
fn test_handlers_may_mutate_document() {
    let (bus, section, ul, li) = list_tree();
    bus.add_listener(ul, EventType::ImmediateAddExpense, |bus, _, current| {
        let mut doc = bus.document_mut();
        let item = doc.create_element("li");
        doc.add_class(item, "pending");
        doc.append_child(current, item);
    }, ListenerOptions::default());
    let seen_items = Rc::new(Cell::new(0));
    let s = Rc::clone(&seen_items);
    bus.add_listener(section, EventType::ImmediateAddExpense, move |bus, _, _| {
        s.set(bus.document().children(ul).len());
    }, ListenerOptions::default());

    bus.dispatch(li, EventType::ImmediateAddExpense, Detail::None);
    assert_eq!(seen_items.get(), 2);
}

/// 监听器所在节点被移除后，分发时清理掉它
#[test]
fn test_detached_listener_never_fires() {
    let (bus, section, ul, li) = list_tree();
    let fired = Rc::new(Cell::new(false));
    let f = Rc::clone(&fired);
    bus.add_listener(ul, EventType::Unauthorized, move |_, _, _| f.set(true), ListenerOptions::default());

    // 直接在文档上移除，不经过总线
    bus.document_mut().remove(ul);
    assert!(!bus.document().contains(li));

    bus.dispatch(li, EventType::Unauthorized, Detail::None);
    bus.dispatch(section, EventType::Unauthorized, Detail::None);
    assert!(!fired.get());
    assert_eq!(bus.listener_count(), 0);
}
