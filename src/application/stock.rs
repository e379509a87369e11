use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument};

use crate::domain::{
    Item, ItemId, ItemStock, ItemUpdate, NewItem, PricingError, QuantityChangeError,
    StockDirection, Unit, normalize_prices, resolve_quantity_change,
};
use crate::storage::items;

use super::service::rejected;
use super::{AppError, RetailService};

/// An item together with its live stock figures.
#[derive(Debug, Clone, Serialize)]
pub struct ItemWithStock {
    pub item: Item,
    pub stock: ItemStock,
}

impl RetailService {
    // ========================
    // Catalog
    // ========================

    /// Create an item from per-carton prices and a stock count in cartons.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_item(&self, input: NewItem) -> Result<ItemWithStock, AppError> {
        if input.cartons < 0 {
            return Err(rejected(AppError::InvalidAmount(
                "Initial stock cannot be negative".to_string(),
            )));
        }
        let (prices, produce_price) = normalize_prices(
            input.item_per_cartoon,
            &input.carton_prices,
            input.carton_produce_price,
        )
        .map_err(|e| rejected(pricing_error(e)))?;
        let quantity = input
            .cartons
            .checked_mul(input.item_per_cartoon)
            .ok_or_else(|| rejected(AppError::InvalidAmount("Initial stock is too large".into())))?;

        let mut conn = self.repo.acquire().await?;
        if let Some(barcode) = input.barcode.as_deref() {
            ensure_barcode_free(&mut conn, barcode, None).await?;
        }

        let id = items::insert(
            &mut conn,
            &input.name,
            input.barcode.as_deref(),
            quantity,
            input.item_per_cartoon,
            &prices,
            produce_price,
            Utc::now(),
        )
        .await?;

        let created = load_item(&mut conn, id).await?;
        info!(item_id = id, quantity, "Item created");
        Ok(created)
    }

    /// Replace catalog fields and prices. Stock is untouched.
    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        item_id: ItemId,
        input: ItemUpdate,
    ) -> Result<ItemWithStock, AppError> {
        let (prices, produce_price) = normalize_prices(
            input.item_per_cartoon,
            &input.carton_prices,
            input.carton_produce_price,
        )
        .map_err(|e| rejected(pricing_error(e)))?;

        let mut tx = self.repo.begin().await?;
        if !items::claim(&mut tx, item_id).await? {
            return Err(rejected(AppError::ItemNotFound(item_id)));
        }
        if let Some(barcode) = input.barcode.as_deref() {
            ensure_barcode_free(&mut tx, barcode, Some(item_id)).await?;
        }

        items::update(
            &mut tx,
            item_id,
            &input.name,
            input.barcode.as_deref(),
            input.item_per_cartoon,
            &prices,
            produce_price,
        )
        .await?;
        let updated = load_item(&mut tx, item_id).await?;
        tx.commit().await?;

        info!(item_id, "Item updated");
        Ok(updated)
    }

    pub async fn get_item(&self, item_id: ItemId) -> Result<ItemWithStock, AppError> {
        let mut conn = self.repo.acquire().await?;
        load_item(&mut conn, item_id).await
    }

    pub async fn find_item_by_barcode(&self, barcode: &str) -> Result<ItemWithStock, AppError> {
        let mut conn = self.repo.acquire().await?;
        let item_id = items::find_id_by_barcode(&mut conn, barcode)
            .await?
            .ok_or_else(|| AppError::BarcodeNotFound(barcode.to_string()))?;
        load_item(&mut conn, item_id).await
    }

    /// List all live items with their stock.
    pub async fn list_items(&self) -> Result<Vec<ItemWithStock>, AppError> {
        let mut conn = self.repo.acquire().await?;
        let catalog = items::list(&mut conn).await?;
        let mut stock_by_id: HashMap<ItemId, ItemStock> = items::list_stock(&mut conn)
            .await?
            .into_iter()
            .map(|s| (s.item_id, s))
            .collect();

        catalog
            .into_iter()
            .map(|item| {
                let stock = stock_by_id
                    .remove(&item.id)
                    .ok_or(AppError::ItemNotFound(item.id))?;
                Ok(ItemWithStock { item, stock })
            })
            .collect()
    }

    // ========================
    // Stock
    // ========================

    /// Quantity on hand, carton size, and what is still free to sell.
    pub async fn item_stock(&self, item_id: ItemId) -> Result<ItemStock, AppError> {
        let mut conn = self.repo.acquire().await?;
        items::stock(&mut conn, item_id)
            .await?
            .ok_or(AppError::ItemNotFound(item_id))
    }

    /// Move stock up or down by `amount` cartons or singles.
    ///
    /// Stock can never drop below what open sales already hold, and single-unit
    /// increases must add whole cartons.
    #[instrument(skip(self))]
    pub async fn change_quantity(
        &self,
        item_id: ItemId,
        direction: StockDirection,
        unit: Unit,
        amount: i64,
    ) -> Result<ItemWithStock, AppError> {
        if amount < 0 {
            return Err(rejected(AppError::InvalidAmount(
                "Amount cannot be negative".to_string(),
            )));
        }

        let mut tx = self.repo.begin().await?;
        if !items::claim(&mut tx, item_id).await? {
            return Err(rejected(AppError::ItemNotFound(item_id)));
        }
        let stock = items::stock(&mut tx, item_id)
            .await?
            .ok_or(AppError::ItemNotFound(item_id))?;

        let quantity = resolve_quantity_change(&stock, direction, unit, amount)
            .map_err(|e| rejected(quantity_error(item_id, e)))?;

        items::set_quantity(&mut tx, item_id, quantity).await?;
        let updated = load_item(&mut tx, item_id).await?;
        tx.commit().await?;

        info!(
            item_id,
            quantity = updated.stock.quantity,
            actual_quantity = updated.stock.actual_quantity,
            "Stock changed"
        );
        Ok(updated)
    }
}

/// Load an item and its stock on the given connection.
pub(super) async fn load_item(
    conn: &mut SqliteConnection,
    item_id: ItemId,
) -> Result<ItemWithStock, AppError> {
    let item = items::get(conn, item_id)
        .await?
        .ok_or(AppError::ItemNotFound(item_id))?;
    let stock = items::stock(conn, item_id)
        .await?
        .ok_or(AppError::ItemNotFound(item_id))?;
    Ok(ItemWithStock { item, stock })
}

async fn ensure_barcode_free(
    conn: &mut SqliteConnection,
    barcode: &str,
    owner: Option<ItemId>,
) -> Result<(), AppError> {
    match items::find_id_by_barcode(conn, barcode).await? {
        Some(existing) if Some(existing) != owner => Err(rejected(AppError::InvalidInput(
            format!("Barcode {} already belongs to item {}", barcode, existing),
        ))),
        _ => Ok(()),
    }
}

fn pricing_error(err: PricingError) -> AppError {
    match err {
        PricingError::NonPositiveCartonSize(size) => AppError::InvalidInput(format!(
            "item_per_cartoon must be a positive integer, got {}",
            size
        )),
        PricingError::NegativePrice(price) => {
            AppError::InvalidAmount(format!("Price cannot be negative: {}", price))
        }
    }
}

fn quantity_error(item_id: ItemId, err: QuantityChangeError) -> AppError {
    match err {
        QuantityChangeError::NegativeAmount => {
            AppError::InvalidAmount("Amount cannot be negative".to_string())
        }
        QuantityChangeError::PartialCarton {
            amount,
            item_per_cartoon,
        } => AppError::InvalidAmount(format!(
            "Single-unit increase of {} does not complete whole cartons of {}",
            amount, item_per_cartoon
        )),
        QuantityChangeError::BelowCommitted {
            committed,
            resulting,
        } => AppError::BelowCommittedStock {
            item_id,
            committed,
            resulting,
        },
        QuantityChangeError::TooLarge => AppError::InvalidAmount("Amount is too large".to_string()),
    }
}
