use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, ItemId, line_total};

pub type SaleId = i64;
pub type LineId = i64;

/// Lifecycle of a sale line.
///
/// Persisted as the `deleted` / `self_deleted` flag pair; `SaleRemoved` always
/// implies both flags are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineState {
    Active,
    /// Removed by the operator while the sale stays open
    LineRemoved,
    /// Removed together with its sale header
    SaleRemoved,
}

impl LineState {
    pub fn from_flags(deleted: bool, self_deleted: bool) -> Self {
        match (deleted, self_deleted) {
            (true, _) => LineState::SaleRemoved,
            (false, true) => LineState::LineRemoved,
            (false, false) => LineState::Active,
        }
    }

    /// `(deleted, self_deleted)` as stored.
    pub fn flags(&self) -> (bool, bool) {
        match self {
            LineState::Active => (false, false),
            LineState::LineRemoved => (false, true),
            LineState::SaleRemoved => (true, true),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LineState::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineState::Active => "active",
            LineState::LineRemoved => "line_removed",
            LineState::SaleRemoved => "sale_removed",
        }
    }
}

impl std::fmt::Display for LineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sale header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub customer_id: i64,
    /// Sales agent, if the sale went through one
    pub mandub_id: Option<i64>,
    pub discount: Cents,
    /// Credit sale (unpaid) rather than cash
    pub dept: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// One item on a sale. `quantity` is always an absolute count of singles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub id: LineId,
    pub sale_id: SaleId,
    pub item_id: ItemId,
    pub quantity: i64,
    pub item_sell_price: Cents,
    pub item_produce_price: Cents,
    pub state: LineState,
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    pub fn total(&self) -> Cents {
        line_total(self.quantity, self.item_sell_price)
    }
}

/// Sum of active lines before the header discount.
pub fn sale_subtotal(lines: &[SaleLine]) -> Cents {
    lines
        .iter()
        .filter(|line| line.state.is_active())
        .map(SaleLine::total)
        .sum()
}

/// Which sale a new line goes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaleTarget {
    Existing(SaleId),
    /// Open a header first, then add the line to it
    New(NewSale),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSale {
    pub customer_id: i64,
    pub mandub_id: Option<i64>,
    pub dept: bool,
    pub discount: Cents,
}

impl NewSale {
    pub fn cash(customer_id: i64) -> Self {
        Self {
            customer_id,
            mandub_id: None,
            dept: false,
            discount: 0,
        }
    }

    pub fn with_mandub(mut self, mandub_id: i64) -> Self {
        self.mandub_id = Some(mandub_id);
        self
    }

    pub fn on_credit(mut self) -> Self {
        self.dept = true;
        self
    }
}

pub type SaleUpdate = NewSale;

/// How to find the item for a new line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    Id(ItemId),
    Barcode(String),
}

/// Which way money would move in the register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashDirection {
    Increase,
    Decrease,
}

/// Register movement implied by a line edit. Reported to the caller, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashEffect {
    pub amount: Cents,
    pub direction: CashDirection,
}

impl CashEffect {
    /// Effect of a line going from `before` to `after`; `None` when nothing moves.
    pub fn between(before: Cents, after: Cents) -> Option<Self> {
        match after - before {
            0 => None,
            diff if diff > 0 => Some(CashEffect {
                amount: diff,
                direction: CashDirection::Increase,
            }),
            diff => Some(CashEffect {
                amount: -diff,
                direction: CashDirection::Decrease,
            }),
        }
    }
}
