//! 支出列表与结余的渲染协作方
//!
//! 视图只通过这两个 trait 把数据交给渲染方，具体展示方式不归视图管。

use super::model::{Expense, Trip};
use crate::ui::{Document, Matcher, NodeId};
use serde_json::Value as JsonValue;

/// 支出列表渲染
pub trait ExpenseListRenderer {
    /// 行程初始化（可能重复调用）
    fn init(&mut self, doc: &mut Document, list: NodeId, trip: &Trip);

    /// 已同步的新支出
    fn add(&mut self, doc: &mut Document, list: NodeId, expense: &Expense);

    /// 乐观添加，等待同步
    fn add_pending(&mut self, doc: &mut Document, list: NodeId, expense: &Expense);

    /// 离线添加，尚未提交
    fn add_unsynced(&mut self, doc: &mut Document, list: NodeId, expense: &Expense);

    /// 第一笔支出到达
    fn first_expense(&mut self, doc: &mut Document, list: NodeId) {
        for placeholder in doc.query_all(list, &Matcher::class("placeholder")) {
            doc.remove(placeholder);
        }
    }
}

/// 结余渲染
pub trait BalanceRenderer {
    fn init(&mut self, doc: &mut Document, balance: NodeId, trip: &Trip);

    fn add(&mut self, doc: &mut Document, balance: NodeId, expense: &Expense);

    fn settle_up(&mut self, doc: &mut Document, balance: NodeId);
}

const ITEM_CLASS: &str = "expense-item";
const PENDING_CLASS: &str = "pending";
const UNSYNCED_CLASS: &str = "unsynced";

/// 默认列表渲染：每笔支出一个 `li`，数据挂在元素上
#[derive(Debug, Default)]
pub struct SimpleExpenseList;

impl SimpleExpenseList {
    fn find_item(doc: &Document, list: NodeId, expense: &Expense) -> Option<NodeId> {
        let id = expense.id.as_deref()?;
        doc.children(list)
            .iter()
            .copied()
            .find(|li| doc.attr(*li, "data-id") == Some(id))
    }

    fn append(doc: &mut Document, list: NodeId, expense: &Expense, state: Option<&str>) -> NodeId {
        if let Some(existing) = Self::find_item(doc, list, expense) {
            doc.remove_class(existing, PENDING_CLASS);
            doc.remove_class(existing, UNSYNCED_CLASS);
            if let Some(state) = state {
                doc.add_class(existing, state);
            }
            return existing;
        }

        let li = doc.create_element("li");
        doc.add_class(li, ITEM_CLASS);
        if let Some(state) = state {
            doc.add_class(li, state);
        }
        if let Some(id) = &expense.id {
            doc.set_attr(li, "data-id", id);
        }
        doc.set_text(li, &format!("{} {:.2} ({})", expense.title, expense.amount, expense.payer));
        if let Ok(data) = serde_json::to_value(expense) {
            doc.set_data(li, data);
        }
        doc.append_child(list, li);
        li
    }
}

impl ExpenseListRenderer for SimpleExpenseList {
    fn init(&mut self, doc: &mut Document, list: NodeId, trip: &Trip) {
        // 保留尚未提交的离线条目
        let synced: Vec<NodeId> = doc
            .children(list)
            .iter()
            .copied()
            .filter(|li| doc.has_class(*li, ITEM_CLASS) && !doc.has_class(*li, UNSYNCED_CLASS))
            .collect();
        for li in synced {
            doc.remove(li);
        }
        if !trip.expenses.is_empty() {
            self.first_expense(doc, list);
        }
        for expense in &trip.expenses {
            Self::append(doc, list, expense, None);
        }
    }

    fn add(&mut self, doc: &mut Document, list: NodeId, expense: &Expense) {
        Self::append(doc, list, expense, None);
    }

    fn add_pending(&mut self, doc: &mut Document, list: NodeId, expense: &Expense) {
        self.first_expense(doc, list);
        Self::append(doc, list, expense, Some(PENDING_CLASS));
    }

    fn add_unsynced(&mut self, doc: &mut Document, list: NodeId, expense: &Expense) {
        self.first_expense(doc, list);
        Self::append(doc, list, expense, Some(UNSYNCED_CLASS));
    }
}

/// 默认结余渲染：按成员累计已付减应摊
#[derive(Debug, Default)]
pub struct SimpleBalance {
    members: Vec<(String, f64)>,
}

impl SimpleBalance {
    pub fn balances(&self) -> &[(String, f64)] {
        &self.members
    }

    fn entry(&mut self, member: &str) -> &mut f64 {
        let pos = match self.members.iter().position(|(m, _)| m == member) {
            Some(pos) => pos,
            None => {
                self.members.push((member.to_string(), 0.0));
                self.members.len() - 1
            }
        };
        &mut self.members[pos].1
    }

    fn apply(&mut self, expense: &Expense) {
        let participants: Vec<String> = if expense.participants.is_empty() {
            self.members.iter().map(|(m, _)| m.clone()).collect()
        } else {
            expense.participants.clone()
        };
        *self.entry(&expense.payer) += expense.amount;
        if participants.is_empty() {
            return;
        }
        let share = expense.amount / participants.len() as f64;
        for member in &participants {
            *self.entry(member) -= share;
        }
    }

    fn render(&self, doc: &mut Document, balance: NodeId) {
        for child in doc.children(balance).to_vec() {
            doc.remove(child);
        }
        for (member, amount) in &self.members {
            let dt = doc.create_element("dt");
            doc.set_text(dt, member);
            doc.append_child(balance, dt);
            let dd = doc.create_element("dd");
            doc.set_text(dd, &format!("{:+.2}", amount));
            if *amount < 0.0 {
                doc.add_class(dd, "negative");
            }
            doc.append_child(balance, dd);
        }
    }

    /// 贪心配对：欠款最多的先还给应收最多的
    pub fn settlements(&self) -> Vec<(String, String, f64)> {
        let mut debtors: Vec<(String, f64)> =
            self.members.iter().filter(|(_, a)| *a < -0.005).map(|(m, a)| (m.clone(), -a)).collect();
        let mut creditors: Vec<(String, f64)> =
            self.members.iter().filter(|(_, a)| *a > 0.005).cloned().collect();
        debtors.sort_by(|a, b| b.1.total_cmp(&a.1));
        creditors.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < debtors.len() && j < creditors.len() {
            let amount = debtors[i].1.min(creditors[j].1);
            out.push((debtors[i].0.clone(), creditors[j].0.clone(), amount));
            debtors[i].1 -= amount;
            creditors[j].1 -= amount;
            if debtors[i].1 < 0.005 {
                i += 1;
            }
            if creditors[j].1 < 0.005 {
                j += 1;
            }
        }
        out
    }
}

impl BalanceRenderer for SimpleBalance {
    fn init(&mut self, doc: &mut Document, balance: NodeId, trip: &Trip) {
        self.members = trip.members.iter().map(|m| (m.clone(), 0.0)).collect();
        for expense in &trip.expenses {
            self.apply(expense);
        }
        self.render(doc, balance);
    }

    fn add(&mut self, doc: &mut Document, balance: NodeId, expense: &Expense) {
        self.apply(expense);
        self.render(doc, balance);
    }

    fn settle_up(&mut self, doc: &mut Document, balance: NodeId) {
        let Some(container) = doc.parent(balance) else {
            return;
        };
        let Some(debts) = doc.query(container, &Matcher::within(Matcher::class("debt-list"), Matcher::tag("ul")))
        else {
            return;
        };
        for child in doc.children(debts).to_vec() {
            doc.remove(child);
        }
        for (from, to, amount) in self.settlements() {
            let li = doc.create_element("li");
            doc.set_text(li, &format!("{} → {}: {:.2}", from, to, amount));
            doc.set_data(li, JsonValue::from(amount));
            doc.append_child(debts, li);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(id: &str, amount: f64, payer: &str) -> Expense {
        Expense {
            id: Some(id.to_string()),
            title: "Dinner".to_string(),
            amount,
            payer: payer.to_string(),
            participants: Vec::new(),
            date: "2026-10-16".to_string(),
        }
    }

    #[test]
    fn test_pending_item_confirmed_by_synced_add() {
        let mut doc = Document::new();
        let list = doc.create_element("ul");
        doc.append_child(doc.root(), list);
        let mut renderer = SimpleExpenseList;

        renderer.add_pending(&mut doc, list, &expense("e1", 30.0, "Ana"));
        renderer.add(&mut doc, list, &expense("e1", 30.0, "Ana"));

        let items = doc.children(list).to_vec();
        assert_eq!(items.len(), 1);
        assert!(!doc.has_class(items[0], "pending"));
        assert_eq!(doc.data(items[0]).and_then(|d| d["amount"].as_f64()), Some(30.0));
    }

    #[test]
    fn test_balance_splits_between_members() {
        let mut doc = Document::new();
        let dl = doc.create_element("dl");
        doc.append_child(doc.root(), dl);
        let trip = Trip {
            name: "Lisbon".to_string(),
            members: vec!["Ana".to_string(), "Bo".to_string()],
            ..Trip::default()
        };
        let mut balance = SimpleBalance::default();
        balance.init(&mut doc, dl, &trip);
        balance.add(&mut doc, dl, &expense("e1", 30.0, "Ana"));

        assert_eq!(balance.balances(), &[("Ana".to_string(), 15.0), ("Bo".to_string(), -15.0)]);
        assert_eq!(balance.settlements(), vec![("Bo".to_string(), "Ana".to_string(), 15.0)]);
        assert_eq!(doc.children(dl).len(), 4);
    }
}
