//! 声明式路由单元测试
//! 测试最近祖先匹配、作用域边界与路由的挂载卸载

use crate::event::{Detail, EventType};
use crate::parser::append_fragment;
use crate::runtime::{attach_routes, EventBus, Route};
use crate::ui::{Document, Matcher, NodeId};
use std::cell::RefCell;
use std::rc::Rc;

type Hits = Rc<RefCell<Vec<(&'static str, NodeId)>>>;

/// 作用域根 `fc-trip` 下的菜单与区块
fn menu_view() -> (EventBus, NodeId) {
    let mut doc = Document::new();
    let outer = doc.create_element("div");
    doc.set_attr(outer, "to", "elsewhere");
    doc.append_child(doc.root(), outer);
    let scope = doc.create_element("fc-trip");
    doc.append_child(outer, scope);
    append_fragment(
        &mut doc,
        scope,
        r#"<menu>
             <h2 to="expenses" id="tab_expenses"><span id="label">Expenses</span></h2>
             <h2 to="balance">Balance</h2>
           </menu>
           <section path="expenses"><p id="plain">nothing to route</p></section>"#,
    )
    .unwrap();
    (EventBus::new(doc), scope)
}

fn recorder(hits: &Hits, label: &'static str) -> impl Fn(&EventBus, &crate::runtime::RoutedEvent<'_>) + 'static {
    let hits = Rc::clone(hits);
    move |_, ev| hits.borrow_mut().push((label, ev.target))
}

fn by_id(bus: &EventBus, id: &str) -> NodeId {
    bus.document().element_by_id(id).unwrap()
}

/// 事件来自匹配元素的后代时，目标是最近的匹配祖先
#[test]
fn test_target_is_closest_matching_ancestor() {
    let (bus, scope) = menu_view();
    let hits: Hits = Rc::default();
    attach_routes(&bus, vec![Route::parse("click -> menu h2", recorder(&hits, "tab")).unwrap()], scope);

    let label = by_id(&bus, "label");
    bus.dispatch(label, EventType::Click, Detail::None);

    let tab = by_id(&bus, "tab_expenses");
    assert_eq!(*hits.borrow(), vec![("tab", tab)]);
}

/// 没有匹配祖先时静默跳过
#[test]
fn test_unmatched_event_is_ignored() {
    let (bus, scope) = menu_view();
    let hits: Hits = Rc::default();
    attach_routes(&bus, vec![Route::parse("click -> menu h2", recorder(&hits, "tab")).unwrap()], scope);

    let plain = by_id(&bus, "plain");
    assert!(bus.dispatch(plain, EventType::Click, Detail::None));
    assert!(hits.borrow().is_empty());
}

/// 作用域之外的匹配元素不算
#[test]
fn test_match_outside_scope_is_not_considered() {
    let (bus, scope) = menu_view();
    let hits: Hits = Rc::default();
    attach_routes(&bus, vec![Route::parse("click -> [to]", recorder(&hits, "link")).unwrap()], scope);

    // `div[to]` 在作用域根之上
    let plain = by_id(&bus, "plain");
    bus.dispatch(plain, EventType::Click, Detail::None);
    assert!(hits.borrow().is_empty());

    let label = by_id(&bus, "label");
    bus.dispatch(label, EventType::Click, Detail::None);
    assert_eq!(hits.borrow().len(), 1);
    assert_eq!(hits.borrow()[0].1, by_id(&bus, "tab_expenses"));
}

/// 匹配元素已被移除时不再触发
#[test]
fn test_removed_ancestor_does_not_fire() {
    let (bus, scope) = menu_view();
    let hits: Hits = Rc::default();
    attach_routes(&bus, vec![Route::parse("click -> menu h2", recorder(&hits, "tab")).unwrap()], scope);

    let label = by_id(&bus, "label");
    let tab = by_id(&bus, "tab_expenses");
    bus.remove_node(tab);

    bus.dispatch(label, EventType::Click, Detail::None);
    assert!(hits.borrow().is_empty());
}

/// 同一事件的多条路由按声明顺序依次处理
#[test]
fn test_routes_fire_in_declaration_order() {
    let (bus, scope) = menu_view();
    let hits: Hits = Rc::default();
    let routes = vec![
        Route::parse("click -> [to]", recorder(&hits, "to")).unwrap(),
        Route::matching(EventType::Click, Matcher::tag("menu"), recorder(&hits, "menu")),
        Route::on(EventType::Click, recorder(&hits, "any")),
        Route::parse("click -> #plain", recorder(&hits, "plain")).unwrap(),
    ];
    let set = attach_routes(&bus, routes, scope);
    assert_eq!(set.listener_count(), 1);

    let label = by_id(&bus, "label");
    bus.dispatch(label, EventType::Click, Detail::None);

    let labels: Vec<&str> = hits.borrow().iter().map(|(l, _)| *l).collect();
    assert_eq!(labels, vec!["to", "menu", "any"]);
    // 无选择器的路由目标为事件来源
    assert_eq!(hits.borrow()[2].1, label);
}

/// 处理器看到的 current_target 是作用域根
#[test]
fn test_current_target_is_scope_root() {
    let (bus, scope) = menu_view();
    let seen = Rc::new(RefCell::new(None));
    let s = Rc::clone(&seen);
    attach_routes(
        &bus,
        vec![Route::on(EventType::Synced, move |_, ev| *s.borrow_mut() = Some(ev.current_target))],
        scope,
    );

    bus.dispatch(by_id(&bus, "plain"), EventType::Synced, Detail::None);
    assert_eq!(*seen.borrow(), Some(scope));
}

/// 卸载后路由不再响应
#[test]
fn test_detached_routes_stop_handling() {
    let (bus, scope) = menu_view();
    let hits: Hits = Rc::default();
    let set = attach_routes(&bus, vec![Route::parse("click -> [to]", recorder(&hits, "to")).unwrap()], scope);
    assert_eq!(set.scope(), scope);

    set.detach(&bus);
    bus.dispatch(by_id(&bus, "label"), EventType::Click, Detail::None);
    assert!(hits.borrow().is_empty());
    assert_eq!(bus.listener_count(), 0);
}
