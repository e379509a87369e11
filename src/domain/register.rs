use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

pub type ExpenseId = i64;
pub type HistoryId = i64;

/// The single register row.
pub const MAIN_REGISTER_ID: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashRegister {
    pub id: i64,
    pub money: Cents,
}

impl CashRegister {
    pub fn can_pay(&self, amount: Cents) -> bool {
        self.money >= amount
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub title: String,
    pub price: Cents,
    /// Paid out of the cash register
    pub from_case: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    /// Amount this expense currently holds out of the register.
    pub fn register_charge(&self) -> Cents {
        if self.from_case { self.price } else { 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpense {
    pub title: String,
    pub price: Cents,
    pub from_case: bool,
}

pub type ExpenseUpdate = NewExpense;

impl NewExpense {
    pub fn register_charge(&self) -> Cents {
        if self.from_case { self.price } else { 0 }
    }
}

/// Register balance after swapping `old` for `new`, before anything is written.
pub fn projected_balance(money: Cents, old: &Expense, new: &ExpenseUpdate) -> Cents {
    money + old.register_charge() - new.register_charge()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Situation {
    Increase,
    Decrease,
}

impl Situation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Situation::Increase => "increase",
            Situation::Decrease => "decrease",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "increase" => Some(Situation::Increase),
            "decrease" => Some(Situation::Decrease),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Expense,
    Deposit,
    Withdrawal,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Expense => "expense",
            HistoryKind::Deposit => "deposit",
            HistoryKind::Withdrawal => "withdrawal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "expense" => Some(HistoryKind::Expense),
            "deposit" => Some(HistoryKind::Deposit),
            "withdrawal" => Some(HistoryKind::Withdrawal),
            _ => None,
        }
    }

    pub fn situation(&self) -> Situation {
        match self {
            HistoryKind::Deposit => Situation::Increase,
            HistoryKind::Expense | HistoryKind::Withdrawal => Situation::Decrease,
        }
    }
}

impl std::fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One funding event of the register. Expense rows follow their expense's
/// `deleted` flag and are replaced, never edited, when the expense changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub situation: Situation,
    pub money: Cents,
    pub kind: HistoryKind,
    pub case_id: i64,
    pub expense_id: Option<ExpenseId>,
    pub note: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(price: Cents, from_case: bool) -> Expense {
        Expense {
            id: 1,
            title: "Rent".into(),
            price,
            from_case,
            deleted: false,
            created_at: Utc::now(),
        }
    }

    fn update(price: Cents, from_case: bool) -> ExpenseUpdate {
        ExpenseUpdate {
            title: "Rent".into(),
            price,
            from_case,
        }
    }

    #[test]
    fn test_projected_balance_reverses_then_reapplies() {
        // 300 already out of a register holding 200
        let old = expense(300, true);
        assert_eq!(projected_balance(200, &old, &update(250, true)), 250);
        assert_eq!(projected_balance(200, &old, &update(300, true)), 200);
        assert_eq!(projected_balance(200, &old, &update(600, true)), -100);
    }

    #[test]
    fn test_projected_balance_switching_funding() {
        assert_eq!(projected_balance(200, &expense(300, true), &update(300, false)), 500);
        assert_eq!(projected_balance(200, &expense(300, false), &update(300, true)), -100);
        assert_eq!(projected_balance(200, &expense(300, false), &update(50, false)), 200);
    }

    #[test]
    fn test_history_kind_situation() {
        assert_eq!(HistoryKind::Expense.situation(), Situation::Decrease);
        assert_eq!(HistoryKind::Withdrawal.situation(), Situation::Decrease);
        assert_eq!(HistoryKind::Deposit.situation(), Situation::Increase);
    }
}
