//! 行程视图演示程序
//!
//! 用进程内的同步桩代替服务端，回放一段用户操作后打印元素树。
//! 用法：`trip-demo [scenario.json]`，日志级别由 `RUST_LOG` 控制。

use serde::Deserialize;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trip_view::error::ConfigError;
use trip_view::event::{Detail, EventType, Touch, TouchEvent};
use trip_view::runtime::{EventBus, ListenerOptions};
use trip_view::trip::model::{Expense, Trip};
use trip_view::trip::{ADD_EXPENSE, BALANCE, PASSWORD_INPUT};
use trip_view::ui::{Capability, Document, Matcher, NodeId};
use trip_view::{Collaborators, TripView, ViewConfig};

const SAMPLE_SCENARIO: &str = r#"{
  "trip": {
    "name": "Lisbon, October",
    "members": ["Ana", "Bo", "Chen"],
    "key": "tram28",
    "expenses": [
      { "id": "e1", "title": "Pastéis", "amount": 12.5, "payer": "Ana", "date": "2026-10-02" },
      { "id": "e2", "title": "Tram tickets", "amount": 27.0, "payer": "Bo", "date": "2026-10-02" }
    ]
  },
  "arrivals": [
    { "id": "e3", "title": "Dinner at Ramiro", "amount": 96.0, "payer": "Chen", "date": "2026-10-03" }
  ],
  "password": "tram28",
  "newExpense": { "title": "Sunscreen", "amount": 8.9, "payer": "Ana", "participants": ["Ana", "Bo"] }
}"#;

/// 演示场景
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scenario {
    trip: Trip,
    /// 首次同步后陆续到达的支出
    #[serde(default)]
    arrivals: Vec<Expense>,
    /// 口令表单里输入的口令
    #[serde(default)]
    password: Option<String>,
    /// 通过添加表单提交的支出
    #[serde(default)]
    new_expense: Option<serde_json::Value>,
    #[serde(default)]
    config: Option<ViewConfig>,
}

fn load_scenario(path: Option<String>) -> Result<Scenario, ConfigError> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => SAMPLE_SCENARIO.to_string(),
    };
    Ok(serde_json::from_str(&content)?)
}

/// 服务端状态
struct Server {
    trip: Trip,
    arrivals: Vec<Expense>,
    /// 本地保存的口令
    stored_key: Option<String>,
    initialized: bool,
    next_id: usize,
}

/// 同步桩：应答 `sync`、`post-command` 与 `store-trip`
fn install_sync_stub(bus: &EventBus, root: NodeId, server: Rc<RefCell<Server>>) {
    let body = bus.root();

    let srv = Rc::clone(&server);
    bus.add_listener(
        body,
        EventType::Sync,
        move |bus, event, _| {
            let supplied = event.detail().as_key().map(str::to_string);
            let (authorized, trip, arrivals) = {
                let mut s = srv.borrow_mut();
                let key = supplied.or_else(|| s.stored_key.clone());
                let authorized = s.trip.key.is_none() || s.trip.key == key;
                let arrivals = if authorized && !s.initialized {
                    s.initialized = true;
                    std::mem::take(&mut s.arrivals)
                } else {
                    Vec::new()
                };
                (authorized, s.trip.clone(), arrivals)
            };
            if !authorized {
                info!("sync rejected: key required");
                bus.dispatch(root, EventType::Unauthorized, Detail::None);
                return;
            }
            bus.dispatch(root, EventType::InitTrip, Detail::Trip(trip));
            for expense in arrivals {
                srv.borrow_mut().trip.expenses.push(expense.clone());
                bus.dispatch(root, EventType::AddExpense, Detail::Expense(expense));
            }
            bus.dispatch(root, EventType::Synced, Detail::None);
        },
        ListenerOptions::default(),
    );

    let srv = Rc::clone(&server);
    bus.add_listener(
        body,
        EventType::PostCommand,
        move |bus, event, _| {
            let Some(command) = event.detail().as_command() else {
                return;
            };
            let mut data = command.data.clone();
            if let Some(fields) = data.as_object_mut() {
                let mut s = srv.borrow_mut();
                s.next_id += 1;
                let id = format!("n{}", s.next_id);
                fields.entry("id").or_insert_with(|| json!(id));
                fields
                    .entry("date")
                    .or_insert_with(|| json!(chrono::Local::now().format("%Y-%m-%d").to_string()));
            }
            match serde_json::from_value::<Expense>(data) {
                Ok(expense) => {
                    info!(title = %expense.title, amount = expense.amount, "command accepted");
                    srv.borrow_mut().trip.expenses.push(expense);
                }
                Err(err) => warn!(%err, "command rejected"),
            }
            bus.dispatch(event.origin(), EventType::RequestFinished, Detail::None);
        },
        ListenerOptions::default(),
    );

    bus.add_listener(
        body,
        EventType::StoreTrip,
        move |_, event, _| {
            if let Some(update) = event.detail().as_trip_update() {
                let mut s = server.borrow_mut();
                let stored = update.apply(Trip::default());
                s.stored_key = stored.key;
            }
        },
        ListenerOptions::default(),
    );
}

fn find(bus: &EventBus, root: NodeId, matcher: &Matcher) -> Option<NodeId> {
    bus.document().query(root, matcher)
}

fn click(bus: &EventBus, node: Option<NodeId>) {
    if let Some(node) = node {
        bus.dispatch(node, EventType::Click, Detail::None);
    }
}

fn main() -> Result<(), trip_view::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let scenario = load_scenario(std::env::args().nth(1))?;
    let config = scenario.config.clone().unwrap_or_default();

    let mut doc = Document::new();
    let root = doc.create_element("fc-trip");
    doc.set_attr(root, "path", "/trip");
    doc.append_child(doc.root(), root);
    let heading = doc.create_element("h1");
    doc.append_child(root, heading);
    let bus = EventBus::new(doc);

    let server = Rc::new(RefCell::new(Server {
        trip: scenario.trip.clone(),
        arrivals: scenario.arrivals.clone(),
        stored_key: None,
        initialized: false,
        next_id: 0,
    }));
    install_sync_stub(&bus, root, server);

    let view = TripView::attach(&bus, root, Collaborators::default(), config)?;
    info!(section = ?view.active_section(), "trip view attached");

    // 需要口令时在口令表单里提交
    if view.active_section().as_deref() == Some(PASSWORD_INPUT) {
        if let (Some(form), Some(password)) = (view.section(PASSWORD_INPUT), &scenario.password) {
            bus.dispatch(form, EventType::JsonSubmit, Detail::Json(json!({ "key": password })));
        }
    }

    let tab = |name: &str| Matcher::within(Matcher::tag("menu"), Matcher::is(Capability::NavigatesTo, name));
    click(&bus, find(&bus, root, &tab(BALANCE)));
    bus.dispatch(root, EventType::SettleUp, Detail::None);

    if let Some(data) = &scenario.new_expense {
        click(&bus, find(&bus, root, &Matcher::within(Matcher::tag("footer"), Matcher::is(Capability::NavigatesTo, ADD_EXPENSE))));
        if let Some(form) = find(&bus, root, &Matcher::is(Capability::Named, ADD_EXPENSE)) {
            bus.dispatch(form, EventType::JsonSubmit, Detail::Json(data.clone()));
        }
    }

    // 在支出列表上下拉刷新
    let list = bus.document().element_by_id("expense_list");
    if let Some(list) = list {
        let start = TouchEvent::start(vec![Touch::new(0, 160.0, 80.0)], 1_000);
        bus.dispatch(list, EventType::TouchStart, Detail::Touch(start));
        let end = TouchEvent::end(vec![Touch::new(0, 170.0, 260.0)], 1_450);
        bus.dispatch(list, EventType::TouchEnd, Detail::Touch(end));
    }

    let refresh = bus.document().element_by_id("refresh_button");
    click(&bus, refresh);

    info!(section = ?view.active_section(), listeners = bus.listener_count(), "script finished");
    println!("{}", bus.document().dump(bus.root()));
    Ok(())
}
