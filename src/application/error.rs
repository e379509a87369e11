use thiserror::Error;

use crate::domain::{Cents, ExpenseId, ItemId, LineId, LineState, SaleId};

/// Broad class of a failure, for callers that map errors to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input, rejected before any read
    Input,
    /// The request is well-formed but the ledgers cannot absorb it
    BusinessRule,
    NotFound,
    Internal,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("No item with barcode: {0}")]
    BarcodeNotFound(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(SaleId),

    #[error("Sale {0} is deleted")]
    SaleDeleted(SaleId),

    #[error("Sale line not found: {0}")]
    LineNotFound(LineId),

    #[error("Sale line {line_id} is {state}, expected {expected}")]
    LineState {
        line_id: LineId,
        state: LineState,
        expected: LineState,
    },

    #[error("Expense not found: {0}")]
    ExpenseNotFound(ExpenseId),

    #[error("Expense {0} is deleted")]
    ExpenseDeleted(ExpenseId),

    #[error("Expense {0} is not deleted")]
    ExpenseNotDeleted(ExpenseId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient stock for item {item_id}: available {available}, required {required}")]
    InsufficientStock {
        item_id: ItemId,
        available: i64,
        required: i64,
    },

    #[error(
        "Cannot reduce stock of item {item_id} to {resulting}: {committed} already committed to open sales"
    )]
    BelowCommittedStock {
        item_id: ItemId,
        committed: i64,
        resulting: i64,
    },

    #[error("Sale line {line_id} would drop to {resulting}")]
    LineQuantityTooLow { line_id: LineId, resulting: i64 },

    #[error("Insufficient register balance: balance {balance}, required {required}")]
    InsufficientRegisterBalance { balance: Cents, required: Cents },

    #[error("Cash register is missing")]
    RegisterMissing,

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidAmount(_) | AppError::InvalidInput(_) | AppError::BarcodeNotFound(_) => {
                ErrorKind::Input
            }
            AppError::ItemNotFound(_)
            | AppError::SaleNotFound(_)
            | AppError::LineNotFound(_)
            | AppError::ExpenseNotFound(_) => ErrorKind::NotFound,
            AppError::SaleDeleted(_)
            | AppError::LineState { .. }
            | AppError::ExpenseDeleted(_)
            | AppError::ExpenseNotDeleted(_)
            | AppError::InsufficientStock { .. }
            | AppError::BelowCommittedStock { .. }
            | AppError::LineQuantityTooLow { .. }
            | AppError::InsufficientRegisterBalance { .. } => ErrorKind::BusinessRule,
            AppError::RegisterMissing | AppError::Database(_) => ErrorKind::Internal,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.into())
    }
}
