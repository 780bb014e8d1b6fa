//! 行程视图
//!
//! 把路由表挂到视图根节点上，处理数据层、同步方发来的总线事件，
//! 以及用户的点击、触摸与表单提交。各功能之间不直接引用，
//! 只通过总线事件联系。

pub mod model;
pub mod render;

use crate::config::ViewConfig;
use crate::error::{Error, NavigationError};
use crate::event::{Detail, EventType};
use crate::parser::append_fragment;
use crate::runtime::{attach_routes, EventBus, PullRecognizer, Route, RouteSet, RoutedEvent, SectionNavigator, Transition};
use crate::ui::{Capability, Document, Matcher, NodeId};
use model::{Command, Trip, TripUpdate};
use render::{BalanceRenderer, ExpenseListRenderer, SimpleBalance, SimpleExpenseList};
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, error, warn};

pub const EXPENSES: &str = "expenses";
pub const BALANCE: &str = "balance";
pub const ADD_EXPENSE: &str = "add_expense";
pub const PASSWORD_INPUT: &str = "password_input";

const EXPENSE_LIST_ID: &str = "expense_list";
const BALANCE_LIST_ID: &str = "balance_list";

/// 视图依赖的渲染协作方
pub struct Collaborators {
    pub list: Box<dyn ExpenseListRenderer>,
    pub balance: Box<dyn BalanceRenderer>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            list: Box::new(SimpleExpenseList),
            balance: Box::new(SimpleBalance::default()),
        }
    }
}

struct ViewState {
    navigator: SectionNavigator,
    list: Box<dyn ExpenseListRenderer>,
    balance: Box<dyn BalanceRenderer>,
    heading: Matcher,
    initial_section: String,
    initialized: bool,
    password_form: Option<NodeId>,
    empty_notice: Option<NodeId>,
    /// 每个表单上等待 `request-finished` 的命令数
    pending_commands: HashMap<NodeId, usize>,
}

type SharedState = Rc<RefCell<ViewState>>;

/// 行程视图
pub struct TripView {
    root: NodeId,
    routes: RouteSet,
    state: SharedState,
    recognizer: Rc<PullRecognizer>,
}

impl TripView {
    /// 挂载到 `root`，随后请求本地数据与同步
    pub fn attach(bus: &EventBus, root: NodeId, collaborators: Collaborators, config: ViewConfig) -> Result<Self, Error> {
        let state = Rc::new(RefCell::new(ViewState {
            navigator: SectionNavigator::new(),
            list: collaborators.list,
            balance: collaborators.balance,
            heading: Matcher::parse(&config.heading)?,
            initial_section: config.initial_section,
            initialized: false,
            password_form: None,
            empty_notice: None,
            pending_commands: HashMap::new(),
        }));
        let recognizer = PullRecognizer::new(config.pull);
        let routes = attach_routes(bus, route_table(&state, &recognizer)?, root);

        bus.dispatch(root, EventType::LocalFetch, Detail::None);
        bus.dispatch(root, EventType::Sync, Detail::None);

        Ok(Self {
            root,
            routes,
            state,
            recognizer,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().initialized
    }

    pub fn active_section(&self) -> Option<String> {
        self.state.borrow().navigator.active().map(str::to_string)
    }

    pub fn section(&self, name: &str) -> Option<NodeId> {
        self.state.borrow().navigator.section(name)
    }

    pub fn sections(&self) -> Vec<String> {
        self.state.borrow().navigator.names().map(str::to_string).collect()
    }

    pub fn recognizer(&self) -> &Rc<PullRecognizer> {
        &self.recognizer
    }

    /// 程序内导航，与点击 `[to]` 效果相同
    pub fn go_to(&self, bus: &EventBus, name: &str) -> Result<Transition, NavigationError> {
        navigate(bus, &self.state, name)
    }

    pub fn detach(self, bus: &EventBus) {
        self.routes.detach(bus);
    }
}

/// 切换区块，新激活的区块上发出 `navigate`
fn navigate(bus: &EventBus, state: &RefCell<ViewState>, name: &str) -> Result<Transition, NavigationError> {
    let transition = {
        let mut state = state.borrow_mut();
        let mut doc = bus.document_mut();
        state.navigator.go_to(&mut doc, name)?
    };
    if let Transition::Activated { section, .. } = transition {
        bus.dispatch(section, EventType::Navigate, Detail::None);
    }
    Ok(transition)
}

fn route_table(state: &SharedState, recognizer: &Rc<PullRecognizer>) -> Result<Vec<Route>, Error> {
    // 每个闭包各自持有一份共享状态
    let s = || Rc::clone(state);

    let st = s();
    let on_navigate_click = move |bus: &EventBus, ev: &RoutedEvent<'_>| {
        let to = bus.document().attr(ev.target, "to").map(str::to_string);
        if let Some(name) = to {
            if let Err(err) = navigate(bus, &st, &name) {
                warn!(%err, "navigation link ignored");
            }
        }
    };

    let r = Rc::clone(recognizer);
    let on_touch_start = move |bus: &EventBus, ev: &RoutedEvent<'_>| r.check_pull(bus, ev);

    let st = s();
    let on_init = move |bus: &EventBus, ev: &RoutedEvent<'_>| on_init_trip(bus, &st, ev);

    let st = s();
    let on_add = move |bus: &EventBus, ev: &RoutedEvent<'_>| {
        let Some(expense) = ev.detail().as_expense() else {
            return;
        };
        let mut doc = bus.document_mut();
        let doc = &mut *doc;
        let mut state = st.borrow_mut();
        let state = &mut *state;
        if let Some(list) = doc.element_by_id(EXPENSE_LIST_ID) {
            state.list.add(doc, list, expense);
        }
        if let Some(balance) = doc.element_by_id(BALANCE_LIST_ID) {
            state.balance.add(doc, balance, expense);
        }
    };

    let st = s();
    let on_pending = move |bus: &EventBus, ev: &RoutedEvent<'_>| {
        with_expense_list(bus, &st, ev, |list, doc, id, expense| list.add_pending(doc, id, expense));
    };

    let st = s();
    let on_unsynced = move |bus: &EventBus, ev: &RoutedEvent<'_>| {
        with_expense_list(bus, &st, ev, |list, doc, id, expense| list.add_unsynced(doc, id, expense));
    };

    let st = s();
    let on_unauth = move |bus: &EventBus, ev: &RoutedEvent<'_>| on_unauthorized(bus, &st, ev);

    let st = s();
    let on_empty_trip = move |bus: &EventBus, ev: &RoutedEvent<'_>| on_empty(bus, &st, ev);

    let st = s();
    let on_settle = move |bus: &EventBus, _ev: &RoutedEvent<'_>| {
        let mut doc = bus.document_mut();
        let doc = &mut *doc;
        if let Some(balance) = doc.element_by_id(BALANCE_LIST_ID) {
            st.borrow_mut().balance.settle_up(doc, balance);
        }
    };

    let st = s();
    let on_submit = move |bus: &EventBus, ev: &RoutedEvent<'_>| on_add_expense_submit(bus, &st, ev);

    Ok(vec![
        Route::parse("click -> [to]", on_navigate_click)?,
        Route::parse("click -> #refresh_button", on_refresh_click)?,
        Route::parse(r#"touchstart -> h1,[path="/trip"]"#, on_touch_start)?,
        Route::on(EventType::InitTrip, on_init),
        Route::on(EventType::AddExpense, on_add),
        Route::on(EventType::ImmediateAddExpense, on_pending),
        Route::on(EventType::UnsyncedAddExpense, on_unsynced),
        Route::on(EventType::Unauthorized, on_unauth),
        Route::on(EventType::Empty, on_empty_trip),
        Route::on(EventType::Synced, on_synced),
        Route::on(EventType::SettleUp, on_settle),
        Route::parse(r#"navigate -> [path="add_expense"]"#, on_add_expense_open)?,
        Route::parse(r#"json-submit -> [name="add_expense"]"#, on_submit)?,
        Route::parse(r#"json-submit -> [name="password_input"]"#, on_password_submit)?,
        Route::on(EventType::Pull, |bus, ev| {
            bus.dispatch(ev.target, EventType::Sync, Detail::None);
        }),
    ])
}

fn with_expense_list<F>(bus: &EventBus, state: &RefCell<ViewState>, ev: &RoutedEvent<'_>, f: F)
where
    F: FnOnce(&mut dyn ExpenseListRenderer, &mut Document, NodeId, &model::Expense),
{
    let Some(expense) = ev.detail().as_expense() else {
        return;
    };
    let mut doc = bus.document_mut();
    let doc = &mut *doc;
    if let Some(list) = doc.element_by_id(EXPENSE_LIST_ID) {
        f(state.borrow_mut().list.as_mut(), doc, list, expense);
    }
}

fn on_refresh_click(bus: &EventBus, ev: &RoutedEvent<'_>) {
    ev.prevent_default();
    bus.dispatch(ev.target, EventType::Sync, Detail::None);
}

fn on_init_trip(bus: &EventBus, state: &SharedState, ev: &RoutedEvent<'_>) {
    let Some(trip) = ev.detail().as_trip() else {
        warn!("init-trip without a trip descriptor");
        return;
    };
    let root = ev.current_target;

    // 口令表单只在授权失败到行程初始化之间存在
    let form = state.borrow_mut().password_form.take();
    if let Some(form) = form {
        state.borrow_mut().navigator.unregister(PASSWORD_INPUT);
        bus.remove_node(form);
    }

    let first_time = !state.borrow().initialized;
    if first_time {
        let built = append_fragment(&mut bus.document_mut(), root, &skeleton(trip));
        if let Err(err) = built {
            error!(%err, "failed to build trip view");
            return;
        }
        state.borrow_mut().initialized = true;
    }

    {
        let mut doc = bus.document_mut();
        let doc = &mut *doc;
        let mut st = state.borrow_mut();
        let st = &mut *st;
        let doc_root = doc.root();
        if let Some(heading) = doc.query(doc_root, &st.heading) {
            doc.set_text(heading, &trip.name);
        }
        if let Some(list) = doc.element_by_id(EXPENSE_LIST_ID) {
            st.list.init(doc, list, trip);
        }
        if let Some(balance) = doc.element_by_id(BALANCE_LIST_ID) {
            st.balance.init(doc, balance, trip);
        }
        st.navigator.scan(doc, root);
    }

    if first_time {
        let st = Rc::clone(state);
        bus.once(root, EventType::AddExpense, move |bus, _, _| {
            let mut doc = bus.document_mut();
            let doc = &mut *doc;
            if let Some(list) = doc.element_by_id(EXPENSE_LIST_ID) {
                st.borrow_mut().list.first_expense(doc, list);
            }
        });
    }

    let initial = state.borrow().initial_section.clone();
    if let Err(err) = navigate(bus, state, &initial) {
        error!(%err, "initial section missing from trip view");
    }
}

fn on_unauthorized(bus: &EventBus, state: &SharedState, ev: &RoutedEvent<'_>) {
    let existing = state.borrow().password_form;
    if existing.is_none() {
        let root = ev.current_target;
        let built = append_fragment(
            &mut bus.document_mut(),
            root,
            r#"<password-input-form path="password_input" name="password_input"></password-input-form>"#,
        );
        let form = match built {
            Ok(nodes) if !nodes.is_empty() => nodes[0],
            Ok(_) => return,
            Err(err) => {
                error!(%err, "failed to build password form");
                return;
            }
        };
        let mut st = state.borrow_mut();
        st.password_form = Some(form);
        st.navigator.register(&mut bus.document_mut(), PASSWORD_INPUT, form);
    }
    if let Err(err) = navigate(bus, state, PASSWORD_INPUT) {
        error!(%err, "password form not registered");
    }
}

fn on_empty(bus: &EventBus, state: &SharedState, ev: &RoutedEvent<'_>) {
    if state.borrow().empty_notice.is_some() {
        return;
    }
    let built = append_fragment(
        &mut bus.document_mut(),
        ev.current_target,
        r#"<hgroup class="full-width">
             <h2>There is nothing here</h2>
             <h3>If you had a trip at that address, it might have been cleaned after 30 days of inactivity</h3>
           </hgroup>"#,
    );
    match built {
        Ok(nodes) => state.borrow_mut().empty_notice = nodes.first().copied(),
        Err(err) => error!(%err, "failed to build empty notice"),
    }
}

/// 重新提交所有离线条目
fn on_synced(bus: &EventBus, ev: &RoutedEvent<'_>) {
    let scope = ev.current_target;
    let pending: Vec<JsonValue> = {
        let doc = bus.document();
        let unsynced = Matcher::classes(&["expense-item", "unsynced"]);
        doc.query_all(scope, &unsynced)
            .into_iter()
            .filter_map(|li| doc.data(li).cloned())
            .collect()
    };
    debug!(count = pending.len(), "resubmitting unsynced expenses");
    for data in pending {
        bus.dispatch(scope, EventType::PostCommand, Detail::Command(Command::add_expense(data)));
    }
}

/// 打开表单：标题为空则聚焦，日期为空则填今天
fn on_add_expense_open(bus: &EventBus, ev: &RoutedEvent<'_>) {
    let mut doc = bus.document_mut();
    let doc = &mut *doc;
    let field = |name: &str| Matcher::within(Matcher::tag("form"), Matcher::is(Capability::Named, name));

    if let Some(title) = doc.query(ev.target, &field("title")) {
        if doc.attr(title, "value").unwrap_or_default().is_empty() {
            doc.focus(title);
        }
    }
    if let Some(date) = doc.query(ev.target, &field("date")) {
        if doc.attr(date, "value").unwrap_or_default().is_empty() {
            let today = chrono::Local::now().format("%Y-%m-%d").to_string();
            doc.set_attr(date, "value", &today);
        }
    }
}

/// 提交支出：发出命令，等到 `request-finished` 后再同步并回到列表
fn on_add_expense_submit(bus: &EventBus, state: &SharedState, ev: &RoutedEvent<'_>) {
    let form = ev.target;
    let data = ev.detail().as_json().cloned().unwrap_or(JsonValue::Null);

    let waiting = {
        let mut st = state.borrow_mut();
        let count = st.pending_commands.entry(form).or_insert(0);
        *count += 1;
        *count
    };
    if waiting == 1 {
        await_request_finished(bus, state, form);
    }

    bus.dispatch(form, EventType::PostCommand, Detail::Command(Command::add_expense(data)));
}

/// 每个 `request-finished` 只恢复一个等待中的命令
fn await_request_finished(bus: &EventBus, state: &SharedState, form: NodeId) {
    let st = Rc::clone(state);
    bus.once(form, EventType::RequestFinished, move |bus, _, _| {
        let remaining = {
            let mut state = st.borrow_mut();
            let count = state.pending_commands.entry(form).or_insert(1);
            *count = count.saturating_sub(1);
            let remaining = *count;
            if remaining == 0 {
                state.pending_commands.remove(&form);
            }
            remaining
        };
        if remaining > 0 {
            await_request_finished(bus, &st, form);
        }

        bus.dispatch(form, EventType::Sync, Detail::None);
        if let Err(err) = navigate(bus, &st, EXPENSES) {
            warn!(%err, "cannot return to expenses");
        }
    });
}

fn on_password_submit(bus: &EventBus, ev: &RoutedEvent<'_>) {
    let Some(key) = password_from(ev.detail().as_json()) else {
        warn!("password submission without a key");
        return;
    };
    let scope = ev.current_target;
    bus.dispatch(scope, EventType::Sync, Detail::Key(key.clone()));
    bus.dispatch(scope, EventType::StoreTrip, Detail::TripUpdate(TripUpdate::set_key(key)));
}

fn password_from(detail: Option<&JsonValue>) -> Option<String> {
    match detail? {
        JsonValue::String(key) => Some(key.clone()),
        JsonValue::Object(fields) => ["key", "password"]
            .iter()
            .find_map(|f| fields.get(*f).and_then(JsonValue::as_str))
            .map(str::to_string),
        _ => None,
    }
}

/// 行程骨架
fn skeleton(trip: &Trip) -> String {
    format!(
        r##"<menu>
      <h2 to="expenses" class="active">Expenses</h2>
      <h2 to="balance">Balance</h2>
    </menu>
    <section path="expenses">
      <div class="spinner"></div>
      <ul id="expense_list" class="expense-list">
        <li class="placeholder">
          <p>You haven't spent anything yet, well done!</p>
          <p>When someone buys something, just click on "Add an expense" below to record it.</p>
        </li>
      </ul>
      <footer>
        <a href="./" title="Home page" class="nav">❮ Home</a>
        <button to="add_expense" title="Add an expense">Add an expense</button>
        <a href="#" title="Refresh the expenses" role="button" class="nav" id="refresh_button">↻ Refresh</a>
      </footer>
    </section>
    <section path="balance">
      <dl id="balance_list" class="balance-list"></dl>
      <div class="debt-list">
        <h4>How to balance?</h4>
        <ul></ul>
      </div>
    </section>
    <section path="add_expense">{}</section>"##,
        add_expense_form(&trip.members)
    )
}

fn add_expense_form(members: &[String]) -> String {
    let mut payers = String::new();
    let mut participants = String::new();
    for member in members {
        let m = escape(member);
        payers.push_str(&format!(r#"<option value="{m}">{m}</option>"#));
        participants.push_str(&format!(
            r#"<label><input type="checkbox" name="participants" value="{m}" checked>{m}</label>"#
        ));
    }
    format!(
        r#"<form name="add_expense">
        <input name="title" placeholder="What was it?">
        <input name="amount" type="number" step="0.01">
        <input name="date" type="date">
        <select name="payer">{payers}</select>
        <fieldset>{participants}</fieldset>
        <button type="submit">Add</button>
      </form>"#
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(members: &[&str]) -> Trip {
        Trip {
            name: "Lisbon".to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
            ..Trip::default()
        }
    }

    #[test]
    fn test_skeleton_parses() {
        let mut doc = Document::new();
        let root = doc.root();
        let nodes = append_fragment(&mut doc, root, &skeleton(&trip(&["Ana", "Bo"]))).unwrap();

        let tags: Vec<_> = nodes.iter().filter_map(|n| doc.tag(*n)).collect();
        assert_eq!(tags, vec!["menu", "section", "section", "section"]);
        let refresh = doc.element_by_id("refresh_button").unwrap();
        assert_eq!(doc.attr(refresh, "href"), Some("#"));
        assert!(doc.element_by_id(EXPENSE_LIST_ID).is_some());
        assert!(doc.element_by_id(BALANCE_LIST_ID).is_some());
        assert_eq!(doc.query_all(root, &Matcher::tag("option")).len(), 2);
    }

    #[test]
    fn test_member_names_survive_form_markup() {
        let name = r#"Ana & "Bo" <3 O'Neil"#;
        let mut doc = Document::new();
        let root = doc.root();
        append_fragment(&mut doc, root, &add_expense_form(&[name.to_string()])).unwrap();

        let option = doc.query(root, &Matcher::tag("option")).unwrap();
        assert_eq!(doc.attr(option, "value"), Some(name));
        assert_eq!(doc.text_content(option), name);

        let checkbox = doc.query(root, &Matcher::is(Capability::Named, "participants")).unwrap();
        assert_eq!(doc.attr(checkbox, "value"), Some(name));
        assert!(doc.has_attr(checkbox, "checked"));
    }
}
