use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{
    CashRegister, Cents, Expense, ExpenseId, HistoryEntry, HistoryId, HistoryKind,
    MAIN_REGISTER_ID, NewExpense, Situation,
};

use super::repository::parse_timestamp;

const HISTORY_COLUMNS: &str =
    "id, situation, money, type, case_id, expense_id, note, deleted, created_at";

/// Take the write lock on the register row. Returns false if the row is missing.
pub async fn claim(conn: &mut SqliteConnection) -> Result<bool> {
    let result = sqlx::query("UPDATE cases SET money = money WHERE id = ?")
        .bind(MAIN_REGISTER_ID)
        .execute(&mut *conn)
        .await
        .context("Failed to claim register")?;
    Ok(result.rows_affected() > 0)
}

pub async fn get(conn: &mut SqliteConnection) -> Result<Option<CashRegister>> {
    let row = sqlx::query("SELECT id, money FROM cases WHERE id = ?")
        .bind(MAIN_REGISTER_ID)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch register")?;

    row.map(|row| -> Result<CashRegister> {
        Ok(CashRegister {
            id: row.try_get("id")?,
            money: row.try_get("money")?,
        })
    })
    .transpose()
    .context("Failed to read register balance")
}

/// Move the balance by `delta` (negative to take money out) and return the new balance.
pub async fn adjust_money(conn: &mut SqliteConnection, delta: Cents) -> Result<Cents> {
    let row = sqlx::query("UPDATE cases SET money = money + ? WHERE id = ? RETURNING money")
        .bind(delta)
        .bind(MAIN_REGISTER_ID)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to update register balance")?;

    row.try_get("money")
        .context("Register balance is no longer an integer")
}

// ========================
// Expenses
// ========================

pub async fn insert_expense(
    conn: &mut SqliteConnection,
    expense: &NewExpense,
    created_at: DateTime<Utc>,
) -> Result<ExpenseId> {
    let result = sqlx::query(
        r#"
        INSERT INTO expenses (title, price, from_case, deleted, created_at)
        VALUES (?, ?, ?, 0, ?)
        "#,
    )
    .bind(&expense.title)
    .bind(expense.price)
    .bind(expense.from_case)
    .bind(created_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .context("Failed to save expense")?;

    Ok(result.last_insert_rowid())
}

pub async fn get_expense(conn: &mut SqliteConnection, id: ExpenseId) -> Result<Option<Expense>> {
    let row = sqlx::query(
        "SELECT id, title, price, from_case, deleted, created_at FROM expenses WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to fetch expense")?;

    row.as_ref().map(row_to_expense).transpose()
}

pub async fn update_expense(
    conn: &mut SqliteConnection,
    id: ExpenseId,
    expense: &NewExpense,
) -> Result<()> {
    sqlx::query("UPDATE expenses SET title = ?, price = ?, from_case = ? WHERE id = ?")
        .bind(&expense.title)
        .bind(expense.price)
        .bind(expense.from_case)
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to update expense")?;
    Ok(())
}

pub async fn set_expense_deleted(
    conn: &mut SqliteConnection,
    id: ExpenseId,
    deleted: bool,
) -> Result<()> {
    sqlx::query("UPDATE expenses SET deleted = ? WHERE id = ?")
        .bind(deleted)
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to update expense deleted flag")?;
    Ok(())
}

pub async fn list_expenses(conn: &mut SqliteConnection, include_deleted: bool) -> Result<Vec<Expense>> {
    let query = if include_deleted {
        "SELECT id, title, price, from_case, deleted, created_at FROM expenses ORDER BY id"
    } else {
        "SELECT id, title, price, from_case, deleted, created_at FROM expenses WHERE deleted = 0 ORDER BY id"
    };

    let rows = sqlx::query(query)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list expenses")?;

    rows.iter().map(row_to_expense).collect()
}

// ========================
// History
// ========================

pub async fn insert_history(
    conn: &mut SqliteConnection,
    kind: HistoryKind,
    money: Cents,
    expense_id: Option<ExpenseId>,
    note: Option<&str>,
    created_at: DateTime<Utc>,
) -> Result<HistoryId> {
    let result = sqlx::query(
        r#"
        INSERT INTO case_history (situation, money, type, case_id, expense_id, note, deleted, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(kind.situation().as_str())
    .bind(money)
    .bind(kind.as_str())
    .bind(MAIN_REGISTER_ID)
    .bind(expense_id)
    .bind(note)
    .bind(created_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .context("Failed to save register history")?;

    Ok(result.last_insert_rowid())
}

/// Drop the history rows of an expense. Returns how many were removed.
pub async fn delete_history_for_expense(
    conn: &mut SqliteConnection,
    expense_id: ExpenseId,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM case_history WHERE expense_id = ?")
        .bind(expense_id)
        .execute(&mut *conn)
        .await
        .context("Failed to delete register history")?;
    Ok(result.rows_affected())
}

/// Flag the history rows of an expense to follow the expense's own flag.
pub async fn set_history_deleted_for_expense(
    conn: &mut SqliteConnection,
    expense_id: ExpenseId,
    deleted: bool,
) -> Result<u64> {
    let result = sqlx::query("UPDATE case_history SET deleted = ? WHERE expense_id = ?")
        .bind(deleted)
        .bind(expense_id)
        .execute(&mut *conn)
        .await
        .context("Failed to flag register history")?;
    Ok(result.rows_affected())
}

pub async fn history_for_expense(
    conn: &mut SqliteConnection,
    expense_id: ExpenseId,
) -> Result<Vec<HistoryEntry>> {
    let rows = sqlx::query(&format!(
        "SELECT {HISTORY_COLUMNS} FROM case_history WHERE expense_id = ? ORDER BY id"
    ))
    .bind(expense_id)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to fetch register history")?;

    rows.iter().map(row_to_history).collect()
}

pub async fn list_history(conn: &mut SqliteConnection, include_deleted: bool) -> Result<Vec<HistoryEntry>> {
    let filter = if include_deleted { "" } else { "WHERE deleted = 0" };
    let rows = sqlx::query(&format!(
        "SELECT {HISTORY_COLUMNS} FROM case_history {filter} ORDER BY id"
    ))
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list register history")?;

    rows.iter().map(row_to_history).collect()
}

fn row_to_expense(row: &SqliteRow) -> Result<Expense> {
    let created_at_str: String = row.get("created_at");

    Ok(Expense {
        id: row.get("id"),
        title: row.get("title"),
        price: row.get("price"),
        from_case: row.get::<i32, _>("from_case") != 0,
        deleted: row.get::<i32, _>("deleted") != 0,
        created_at: parse_timestamp(&created_at_str)?,
    })
}

fn row_to_history(row: &SqliteRow) -> Result<HistoryEntry> {
    let situation_str: String = row.get("situation");
    let kind_str: String = row.get("type");
    let created_at_str: String = row.get("created_at");

    Ok(HistoryEntry {
        id: row.get("id"),
        situation: Situation::from_str(&situation_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid history situation: {}", situation_str))?,
        money: row.get("money"),
        kind: HistoryKind::from_str(&kind_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid history type: {}", kind_str))?,
        case_id: row.get("case_id"),
        expense_id: row.get("expense_id"),
        note: row.get("note"),
        deleted: row.get::<i32, _>("deleted") != 0,
        created_at: parse_timestamp(&created_at_str)?,
    })
}
