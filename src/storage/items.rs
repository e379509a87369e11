use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{Cents, Item, ItemId, ItemPrices, ItemStock, LineId};

use super::repository::parse_timestamp;

const ITEM_COLUMNS: &str = "id, name, barcode, quantity, item_per_cartoon, plural_retail_price, single_retail_price, plural_wholesale_price, single_wholesale_price, item_produce_price, deleted, created_at";

/// Stock of every live item, with active sale lines subtracted.
const STOCK_QUERY: &str = r#"
    SELECT
        i.id AS item_id,
        i.quantity,
        i.item_per_cartoon,
        i.quantity - COALESCE(SUM(CASE WHEN s.deleted = 0 AND s.self_deleted = 0 THEN s.quantity ELSE 0 END), 0) AS actual_quantity
    FROM items i
    LEFT JOIN sell_items s ON s.item_id = i.id
    WHERE i.deleted = 0
"#;

/// Take the write lock on an item row. Returns false if the item is gone.
pub async fn claim(conn: &mut SqliteConnection, id: ItemId) -> Result<bool> {
    let result = sqlx::query("UPDATE items SET quantity = quantity WHERE id = ? AND deleted = 0")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to claim item")?;
    Ok(result.rows_affected() > 0)
}

/// Take the write lock on the item a sale line points at. Returns false if
/// the line or its item is gone.
pub async fn claim_for_line(conn: &mut SqliteConnection, line_id: LineId) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE items SET quantity = quantity
        WHERE deleted = 0 AND id = (SELECT item_id FROM sell_items WHERE id = ?)
        "#,
    )
    .bind(line_id)
    .execute(&mut *conn)
    .await
    .context("Failed to claim item for sale line")?;
    Ok(result.rows_affected() > 0)
}

/// Insert an item with already-normalized per-single prices.
pub async fn insert(
    conn: &mut SqliteConnection,
    name: &str,
    barcode: Option<&str>,
    quantity: i64,
    item_per_cartoon: i64,
    prices: &ItemPrices,
    produce_price: Cents,
    created_at: DateTime<Utc>,
) -> Result<ItemId> {
    let result = sqlx::query(
        r#"
        INSERT INTO items (name, barcode, quantity, item_per_cartoon, plural_retail_price, single_retail_price, plural_wholesale_price, single_wholesale_price, item_produce_price, deleted, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(name)
    .bind(barcode)
    .bind(quantity)
    .bind(item_per_cartoon)
    .bind(prices.plural_retail)
    .bind(prices.single_retail)
    .bind(prices.plural_wholesale)
    .bind(prices.single_wholesale)
    .bind(produce_price)
    .bind(created_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .context("Failed to save item")?;

    Ok(result.last_insert_rowid())
}

/// Overwrite catalog fields. Quantity is left alone.
pub async fn update(
    conn: &mut SqliteConnection,
    id: ItemId,
    name: &str,
    barcode: Option<&str>,
    item_per_cartoon: i64,
    prices: &ItemPrices,
    produce_price: Cents,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE items
        SET name = ?, barcode = ?, item_per_cartoon = ?,
            plural_retail_price = ?, single_retail_price = ?,
            plural_wholesale_price = ?, single_wholesale_price = ?,
            item_produce_price = ?
        WHERE id = ?
        "#,
    )
    .bind(name)
    .bind(barcode)
    .bind(item_per_cartoon)
    .bind(prices.plural_retail)
    .bind(prices.single_retail)
    .bind(prices.plural_wholesale)
    .bind(prices.single_wholesale)
    .bind(produce_price)
    .bind(id)
    .execute(&mut *conn)
    .await
    .context("Failed to update item")?;
    Ok(())
}

/// Overwrite the stock with an absolute quantity.
pub async fn set_quantity(conn: &mut SqliteConnection, id: ItemId, quantity: i64) -> Result<()> {
    sqlx::query("UPDATE items SET quantity = ? WHERE id = ?")
        .bind(quantity)
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to update item quantity")?;
    Ok(())
}

/// Get a live item by ID.
pub async fn get(conn: &mut SqliteConnection, id: ItemId) -> Result<Option<Item>> {
    let row = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE id = ? AND deleted = 0"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to fetch item")?;

    row.as_ref().map(row_to_item).transpose()
}

/// Resolve a barcode to a live item ID.
pub async fn find_id_by_barcode(
    conn: &mut SqliteConnection,
    barcode: &str,
) -> Result<Option<ItemId>> {
    let row = sqlx::query("SELECT id FROM items WHERE barcode = ? AND deleted = 0")
        .bind(barcode)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to look up barcode")?;

    Ok(row.map(|row| row.get("id")))
}

/// List all live items, ordered by name.
pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Item>> {
    let rows = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE deleted = 0 ORDER BY name, id"
    ))
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list items")?;

    rows.iter().map(row_to_item).collect()
}

/// Stock figures for one live item.
pub async fn stock(conn: &mut SqliteConnection, id: ItemId) -> Result<Option<ItemStock>> {
    let row = sqlx::query(&format!("{STOCK_QUERY} AND i.id = ? GROUP BY i.id"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to compute item stock")?;

    Ok(row.as_ref().map(row_to_stock))
}

/// Stock figures for every live item.
pub async fn list_stock(conn: &mut SqliteConnection) -> Result<Vec<ItemStock>> {
    let rows = sqlx::query(&format!("{STOCK_QUERY} GROUP BY i.id ORDER BY i.id"))
        .fetch_all(&mut *conn)
        .await
        .context("Failed to compute stock")?;

    Ok(rows.iter().map(row_to_stock).collect())
}

fn row_to_stock(row: &SqliteRow) -> ItemStock {
    ItemStock {
        item_id: row.get("item_id"),
        quantity: row.get("quantity"),
        item_per_cartoon: row.get("item_per_cartoon"),
        actual_quantity: row.get("actual_quantity"),
    }
}

fn row_to_item(row: &SqliteRow) -> Result<Item> {
    let created_at_str: String = row.get("created_at");

    Ok(Item {
        id: row.get("id"),
        name: row.get("name"),
        barcode: row.get("barcode"),
        quantity: row.get("quantity"),
        item_per_cartoon: row.get("item_per_cartoon"),
        prices: ItemPrices {
            plural_retail: row.get("plural_retail_price"),
            single_retail: row.get("single_retail_price"),
            plural_wholesale: row.get("plural_wholesale_price"),
            single_wholesale: row.get("single_wholesale_price"),
        },
        item_produce_price: row.get("item_produce_price"),
        deleted: row.get::<i32, _>("deleted") != 0,
        created_at: parse_timestamp(&created_at_str)?,
    })
}
