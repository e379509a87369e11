use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{Cents, ItemId, LineId, LineState, NewSale, Sale, SaleId, SaleLine};

use super::repository::parse_timestamp;

const LINE_COLUMNS: &str = "id, sale_id, item_id, quantity, item_sell_price, item_produce_price, deleted, self_deleted, created_at";

/// Take the write lock on a sale header. Returns false if the sale does not exist.
pub async fn claim(conn: &mut SqliteConnection, id: SaleId) -> Result<bool> {
    let result = sqlx::query("UPDATE sales SET deleted = deleted WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to claim sale")?;
    Ok(result.rows_affected() > 0)
}

/// Take the write lock on a single sale line. Returns false if the line does not exist.
pub async fn claim_line(conn: &mut SqliteConnection, id: LineId) -> Result<bool> {
    let result = sqlx::query("UPDATE sell_items SET quantity = quantity WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to claim sale line")?;
    Ok(result.rows_affected() > 0)
}

/// Insert an empty sale header.
pub async fn insert(
    conn: &mut SqliteConnection,
    sale: &NewSale,
    created_at: DateTime<Utc>,
) -> Result<SaleId> {
    let result = sqlx::query(
        r#"
        INSERT INTO sales (customer_id, mandub_id, discount, dept, deleted, created_at)
        VALUES (?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(sale.customer_id)
    .bind(sale.mandub_id)
    .bind(sale.discount)
    .bind(sale.dept)
    .bind(created_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .context("Failed to save sale")?;

    Ok(result.last_insert_rowid())
}

/// Get a sale header by ID, deleted or not.
pub async fn get(conn: &mut SqliteConnection, id: SaleId) -> Result<Option<Sale>> {
    let row = sqlx::query(
        r#"
        SELECT id, customer_id, mandub_id, discount, dept, deleted, created_at
        FROM sales
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to fetch sale")?;

    row.as_ref().map(row_to_sale).transpose()
}

/// Overwrite the editable header fields.
pub async fn update(conn: &mut SqliteConnection, id: SaleId, sale: &NewSale) -> Result<()> {
    sqlx::query(
        "UPDATE sales SET customer_id = ?, mandub_id = ?, discount = ?, dept = ? WHERE id = ?",
    )
    .bind(sale.customer_id)
    .bind(sale.mandub_id)
    .bind(sale.discount)
    .bind(sale.dept)
    .bind(id)
    .execute(&mut *conn)
    .await
    .context("Failed to update sale")?;
    Ok(())
}

pub async fn set_deleted(conn: &mut SqliteConnection, id: SaleId, deleted: bool) -> Result<()> {
    sqlx::query("UPDATE sales SET deleted = ? WHERE id = ?")
        .bind(deleted)
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to update sale deleted flag")?;
    Ok(())
}

/// Insert an active line.
pub async fn insert_line(
    conn: &mut SqliteConnection,
    sale_id: SaleId,
    item_id: ItemId,
    quantity: i64,
    sell_price: Cents,
    produce_price: Cents,
    created_at: DateTime<Utc>,
) -> Result<LineId> {
    let result = sqlx::query(
        r#"
        INSERT INTO sell_items (sale_id, item_id, quantity, item_sell_price, item_produce_price, deleted, self_deleted, created_at)
        VALUES (?, ?, ?, ?, ?, 0, 0, ?)
        "#,
    )
    .bind(sale_id)
    .bind(item_id)
    .bind(quantity)
    .bind(sell_price)
    .bind(produce_price)
    .bind(created_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .context("Failed to save sale line")?;

    Ok(result.last_insert_rowid())
}

pub async fn get_line(conn: &mut SqliteConnection, id: LineId) -> Result<Option<SaleLine>> {
    let row = sqlx::query(&format!("SELECT {LINE_COLUMNS} FROM sell_items WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch sale line")?;

    row.as_ref().map(row_to_line).transpose()
}

/// The most recent line for an item on a sale that is in `state`.
pub async fn find_line(
    conn: &mut SqliteConnection,
    sale_id: SaleId,
    item_id: ItemId,
    state: LineState,
) -> Result<Option<SaleLine>> {
    let (deleted, self_deleted) = state.flags();
    let row = sqlx::query(&format!(
        r#"
        SELECT {LINE_COLUMNS}
        FROM sell_items
        WHERE sale_id = ? AND item_id = ? AND deleted = ? AND self_deleted = ?
        ORDER BY id DESC
        LIMIT 1
        "#
    ))
    .bind(sale_id)
    .bind(item_id)
    .bind(deleted)
    .bind(self_deleted)
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to look up sale line")?;

    row.as_ref().map(row_to_line).transpose()
}

/// Every line of a sale, in insertion order.
pub async fn list_lines(conn: &mut SqliteConnection, sale_id: SaleId) -> Result<Vec<SaleLine>> {
    let rows = sqlx::query(&format!(
        "SELECT {LINE_COLUMNS} FROM sell_items WHERE sale_id = ? ORDER BY id"
    ))
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list sale lines")?;

    rows.iter().map(row_to_line).collect()
}

/// Overwrite a line's quantity with an absolute value.
pub async fn set_line_quantity(conn: &mut SqliteConnection, id: LineId, quantity: i64) -> Result<()> {
    sqlx::query("UPDATE sell_items SET quantity = ? WHERE id = ?")
        .bind(quantity)
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to update line quantity")?;
    Ok(())
}

pub async fn set_line_price(conn: &mut SqliteConnection, id: LineId, price: Cents) -> Result<()> {
    sqlx::query("UPDATE sell_items SET item_sell_price = ? WHERE id = ?")
        .bind(price)
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to update line price")?;
    Ok(())
}

pub async fn set_line_state(conn: &mut SqliteConnection, id: LineId, state: LineState) -> Result<()> {
    let (deleted, self_deleted) = state.flags();
    sqlx::query("UPDATE sell_items SET deleted = ?, self_deleted = ? WHERE id = ?")
        .bind(deleted)
        .bind(self_deleted)
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to update line state")?;
    Ok(())
}

/// Move every line of a sale into `state`. Returns the number of lines touched.
pub async fn set_sale_lines_state(
    conn: &mut SqliteConnection,
    sale_id: SaleId,
    state: LineState,
) -> Result<u64> {
    let (deleted, self_deleted) = state.flags();
    let result = sqlx::query("UPDATE sell_items SET deleted = ?, self_deleted = ? WHERE sale_id = ?")
        .bind(deleted)
        .bind(self_deleted)
        .bind(sale_id)
        .execute(&mut *conn)
        .await
        .context("Failed to cascade line state")?;
    Ok(result.rows_affected())
}

fn row_to_sale(row: &SqliteRow) -> Result<Sale> {
    let created_at_str: String = row.get("created_at");

    Ok(Sale {
        id: row.get("id"),
        customer_id: row.get("customer_id"),
        mandub_id: row.get("mandub_id"),
        discount: row.get("discount"),
        dept: row.get::<i32, _>("dept") != 0,
        deleted: row.get::<i32, _>("deleted") != 0,
        created_at: parse_timestamp(&created_at_str)?,
    })
}

fn row_to_line(row: &SqliteRow) -> Result<SaleLine> {
    let created_at_str: String = row.get("created_at");

    Ok(SaleLine {
        id: row.get("id"),
        sale_id: row.get("sale_id"),
        item_id: row.get("item_id"),
        quantity: row.get("quantity"),
        item_sell_price: row.get("item_sell_price"),
        item_produce_price: row.get("item_produce_price"),
        state: LineState::from_flags(
            row.get::<i32, _>("deleted") != 0,
            row.get::<i32, _>("self_deleted") != 0,
        ),
        created_at: parse_timestamp(&created_at_str)?,
    })
}
