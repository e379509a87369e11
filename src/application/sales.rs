use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument};

use crate::domain::{
    CashEffect, Cents, ItemId, ItemRef, ItemStock, LineId, LineState, NewSale, PriceTier, Sale,
    SaleId, SaleLine, SaleTarget, SaleUpdate, Unit, sale_subtotal,
};
use crate::storage::{items, sales};

use super::service::rejected;
use super::{AppError, RetailService};

/// Request to put one carton or one single of an item on a sale.
#[derive(Debug, Clone)]
pub struct AddItem {
    pub sale: SaleTarget,
    pub item: ItemRef,
    pub unit: Unit,
    pub tier: PriceTier,
}

/// What `add_item_to_sale` did to the sale's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineChange {
    Inserted,
    Increased,
    Restored,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddItemOutcome {
    pub sale: Sale,
    pub line: SaleLine,
    pub change: LineChange,
    /// A header was opened for this request
    pub sale_created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineQuantityUpdate {
    pub line: SaleLine,
    pub previous_quantity: i64,
    pub cash_effect: Option<CashEffect>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinePriceUpdate {
    pub line: SaleLine,
    pub total_before: Cents,
    pub total_after: Cents,
    pub cash_effect: Option<CashEffect>,
}

/// A sale header with its lines and totals over the active ones.
#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
    pub subtotal: Cents,
    pub total: Cents,
}

impl RetailService {
    // ========================
    // Headers
    // ========================

    /// Open an empty sale.
    #[instrument(skip(self))]
    pub async fn create_sale(&self, input: NewSale) -> Result<Sale, AppError> {
        validate_header(&input)?;

        let mut conn = self.repo.acquire().await?;
        let id = sales::insert(&mut conn, &input, Utc::now()).await?;
        let sale = sales::get(&mut conn, id)
            .await?
            .ok_or(AppError::SaleNotFound(id))?;

        info!(sale_id = id, customer_id = input.customer_id, "Sale created");
        Ok(sale)
    }

    /// Edit the header of a live sale.
    #[instrument(skip(self))]
    pub async fn update_sale(&self, sale_id: SaleId, input: SaleUpdate) -> Result<Sale, AppError> {
        validate_header(&input)?;

        let mut tx = self.repo.begin().await?;
        if !sales::claim(&mut tx, sale_id).await? {
            return Err(rejected(AppError::SaleNotFound(sale_id)));
        }
        let sale = open_sale(&mut tx, sale_id).await?;

        sales::update(&mut tx, sale.id, &input).await?;
        let updated = sales::get(&mut tx, sale_id)
            .await?
            .ok_or(AppError::SaleNotFound(sale_id))?;
        tx.commit().await?;

        info!(sale_id, discount = updated.discount, "Sale updated");
        Ok(updated)
    }

    pub async fn get_sale(&self, sale_id: SaleId) -> Result<SaleDetail, AppError> {
        let mut conn = self.repo.acquire().await?;
        load_sale(&mut conn, sale_id).await
    }

    pub async fn list_sale_lines(
        &self,
        sale_id: SaleId,
        include_removed: bool,
    ) -> Result<Vec<SaleLine>, AppError> {
        let mut conn = self.repo.acquire().await?;
        if sales::get(&mut conn, sale_id).await?.is_none() {
            return Err(AppError::SaleNotFound(sale_id));
        }
        let lines = sales::list_lines(&mut conn, sale_id).await?;
        Ok(lines
            .into_iter()
            .filter(|line| include_removed || line.state.is_active())
            .collect())
    }

    /// Soft-delete a sale and every line on it.
    #[instrument(skip(self))]
    pub async fn delete_sale(&self, sale_id: SaleId) -> Result<SaleDetail, AppError> {
        let mut tx = self.repo.begin().await?;
        if !sales::claim(&mut tx, sale_id).await? {
            return Err(rejected(AppError::SaleNotFound(sale_id)));
        }
        let sale = open_sale(&mut tx, sale_id).await?;

        sales::set_deleted(&mut tx, sale.id, true).await?;
        let lines = sales::set_sale_lines_state(&mut tx, sale_id, LineState::SaleRemoved).await?;
        let detail = load_sale(&mut tx, sale_id).await?;
        tx.commit().await?;

        info!(sale_id, lines, "Sale deleted");
        Ok(detail)
    }

    /// Bring a deleted sale back.
    ///
    /// Lines whose item is in `item_ids` become active again, each checked
    /// against free stock. Every other line comes back as operator-removed
    /// (`LineState::LineRemoved`), not sale-removed: a live header cannot
    /// carry sale-removed lines, and removed lines can still be restored one
    /// by one. A single line that no longer fits rejects the whole restore.
    /// Restoring a live sale changes nothing.
    #[instrument(skip(self))]
    pub async fn restore_sale(
        &self,
        sale_id: SaleId,
        item_ids: &[ItemId],
    ) -> Result<SaleDetail, AppError> {
        let mut tx = self.repo.begin().await?;
        if !sales::claim(&mut tx, sale_id).await? {
            return Err(rejected(AppError::SaleNotFound(sale_id)));
        }
        let sale = sales::get(&mut tx, sale_id)
            .await?
            .ok_or(AppError::SaleNotFound(sale_id))?;
        if !sale.deleted {
            return load_sale(&mut tx, sale_id).await;
        }

        sales::set_deleted(&mut tx, sale_id, false).await?;
        let lines = sales::list_lines(&mut tx, sale_id).await?;
        let mut restored = 0;
        for line in lines {
            if !item_ids.contains(&line.item_id) {
                sales::set_line_state(&mut tx, line.id, LineState::LineRemoved).await?;
                continue;
            }
            // stock is re-read per line so earlier restores in this loop count
            let stock = items::stock(&mut tx, line.item_id)
                .await?
                .ok_or_else(|| rejected(AppError::ItemNotFound(line.item_id)))?;
            ensure_available(&stock, line.quantity)?;
            sales::set_line_state(&mut tx, line.id, LineState::Active).await?;
            restored += 1;
        }

        let detail = load_sale(&mut tx, sale_id).await?;
        tx.commit().await?;

        info!(sale_id, restored, total = detail.total, "Sale restored");
        Ok(detail)
    }

    // ========================
    // Lines
    // ========================

    /// Put one carton or one single of an item on a sale.
    ///
    /// A removed line for the same item is brought back instead of opening a
    /// new one, and an active line grows by one unit.
    #[instrument(skip(self))]
    pub async fn add_item_to_sale(&self, input: AddItem) -> Result<AddItemOutcome, AppError> {
        let item_id = match &input.item {
            ItemRef::Id(id) => *id,
            ItemRef::Barcode(barcode) => {
                let mut conn = self.repo.acquire().await?;
                items::find_id_by_barcode(&mut conn, barcode)
                    .await?
                    .ok_or_else(|| rejected(AppError::BarcodeNotFound(barcode.clone())))?
            }
        };
        if let SaleTarget::New(header) = &input.sale {
            validate_header(header)?;
        }

        let mut tx = self.repo.begin().await?;
        if !items::claim(&mut tx, item_id).await? {
            return Err(rejected(AppError::ItemNotFound(item_id)));
        }
        let item = items::get(&mut tx, item_id)
            .await?
            .ok_or(AppError::ItemNotFound(item_id))?;
        let stock = items::stock(&mut tx, item_id)
            .await?
            .ok_or(AppError::ItemNotFound(item_id))?;

        let existing = match &input.sale {
            SaleTarget::Existing(sale_id) => Some(open_sale(&mut tx, *sale_id).await?),
            SaleTarget::New(_) => None,
        };

        if let Some(sale) = &existing {
            let removed = sales::find_line(&mut tx, sale.id, item_id, LineState::LineRemoved).await?;
            if let Some(line) = removed {
                ensure_available(&stock, line.quantity)?;
                sales::set_line_state(&mut tx, line.id, LineState::Active).await?;
                return finish_add(tx, sale.id, line.id, LineChange::Restored, false).await;
            }
        }

        if !stock.can_open_line() {
            return Err(rejected(AppError::InsufficientStock {
                item_id,
                available: stock.actual_quantity,
                required: stock.item_per_cartoon,
            }));
        }

        let (sale_id, sale_created) = match (&input.sale, existing) {
            (_, Some(sale)) => (sale.id, false),
            (SaleTarget::New(header), None) => (sales::insert(&mut tx, header, Utc::now()).await?, true),
            (SaleTarget::Existing(sale_id), None) => return Err(AppError::SaleNotFound(*sale_id)),
        };

        let factor = input.unit.factor(item.item_per_cartoon);
        let active = sales::find_line(&mut tx, sale_id, item_id, LineState::Active).await?;
        if let Some(line) = active {
            grow_line(&mut tx, &line, &stock, factor).await?;
            return finish_add(tx, sale_id, line.id, LineChange::Increased, sale_created).await;
        }

        let line_id = sales::insert_line(
            &mut tx,
            sale_id,
            item_id,
            factor,
            item.prices.for_tier(input.tier),
            item.item_produce_price,
            Utc::now(),
        )
        .await?;
        finish_add(tx, sale_id, line_id, LineChange::Inserted, sale_created).await
    }

    /// Grow an active line by one carton or one single.
    #[instrument(skip(self))]
    pub async fn increase_line(
        &self,
        line_id: LineId,
        unit: Unit,
    ) -> Result<LineQuantityUpdate, AppError> {
        let mut tx = self.repo.begin().await?;
        let (line, stock) = claim_line_with_stock(&mut tx, line_id).await?;
        require_active(&line)?;

        let factor = unit.factor(stock.item_per_cartoon);
        let updated = grow_line(&mut tx, &line, &stock, factor).await?;
        tx.commit().await?;

        info!(line_id, quantity = updated.quantity, "Sale line increased");
        Ok(quantity_update(line, updated))
    }

    /// Shrink an active line by one carton or one single. A line may reach
    /// zero but never goes below it.
    #[instrument(skip(self))]
    pub async fn decrease_line(
        &self,
        line_id: LineId,
        unit: Unit,
    ) -> Result<LineQuantityUpdate, AppError> {
        let mut tx = self.repo.begin().await?;
        let (line, stock) = claim_line_with_stock(&mut tx, line_id).await?;
        require_active(&line)?;

        let resulting = line.quantity - unit.factor(stock.item_per_cartoon);
        if resulting < 0 {
            return Err(rejected(AppError::LineQuantityTooLow { line_id, resulting }));
        }

        sales::set_line_quantity(&mut tx, line_id, resulting).await?;
        let updated = reload_line(&mut tx, line_id).await?;
        tx.commit().await?;

        info!(line_id, quantity = updated.quantity, "Sale line decreased");
        Ok(quantity_update(line, updated))
    }

    /// Set an active line to `target` cartons or singles.
    #[instrument(skip(self))]
    pub async fn set_line_quantity(
        &self,
        line_id: LineId,
        unit: Unit,
        target: i64,
    ) -> Result<LineQuantityUpdate, AppError> {
        if target < 0 {
            return Err(rejected(AppError::InvalidAmount(
                "Line quantity cannot be negative".to_string(),
            )));
        }

        let mut tx = self.repo.begin().await?;
        let (line, stock) = claim_line_with_stock(&mut tx, line_id).await?;
        require_active(&line)?;

        let quantity = target
            .checked_mul(unit.factor(stock.item_per_cartoon))
            .ok_or_else(|| rejected(AppError::InvalidAmount("Quantity is too large".into())))?;
        let delta = quantity - line.quantity;
        if delta > 0 {
            ensure_available(&stock, delta)?;
        }

        sales::set_line_quantity(&mut tx, line_id, quantity).await?;
        let updated = reload_line(&mut tx, line_id).await?;
        tx.commit().await?;

        info!(line_id, quantity, delta, "Sale line quantity set");
        Ok(quantity_update(line, updated))
    }

    /// Reprice an active line. Quantity and stock are untouched.
    #[instrument(skip(self))]
    pub async fn set_line_price(
        &self,
        line_id: LineId,
        price: Cents,
    ) -> Result<LinePriceUpdate, AppError> {
        if price < 0 {
            return Err(rejected(AppError::InvalidAmount(
                "Price cannot be negative".to_string(),
            )));
        }

        let mut tx = self.repo.begin().await?;
        if !sales::claim_line(&mut tx, line_id).await? {
            return Err(rejected(AppError::LineNotFound(line_id)));
        }
        let line = reload_line(&mut tx, line_id).await?;
        require_active(&line)?;

        sales::set_line_price(&mut tx, line_id, price).await?;
        let updated = reload_line(&mut tx, line_id).await?;
        tx.commit().await?;

        let total_before = line.total();
        let total_after = updated.total();
        info!(line_id, price, total_after, "Sale line repriced");
        Ok(LinePriceUpdate {
            line: updated,
            total_before,
            total_after,
            cash_effect: CashEffect::between(total_before, total_after),
        })
    }

    /// Take a line off its sale, keeping quantity and price for a later restore.
    #[instrument(skip(self))]
    pub async fn remove_line(&self, line_id: LineId) -> Result<SaleLine, AppError> {
        let mut tx = self.repo.begin().await?;
        if !sales::claim_line(&mut tx, line_id).await? {
            return Err(rejected(AppError::LineNotFound(line_id)));
        }
        let line = reload_line(&mut tx, line_id).await?;

        match line.state {
            LineState::Active => {}
            LineState::LineRemoved => return Ok(line),
            LineState::SaleRemoved => return Err(rejected(AppError::SaleDeleted(line.sale_id))),
        }

        sales::set_line_state(&mut tx, line_id, LineState::LineRemoved).await?;
        let updated = reload_line(&mut tx, line_id).await?;
        tx.commit().await?;

        info!(line_id, sale_id = updated.sale_id, "Sale line removed");
        Ok(updated)
    }

    /// Put a removed line back, if its quantity is still free in stock.
    #[instrument(skip(self))]
    pub async fn restore_line(&self, line_id: LineId) -> Result<SaleLine, AppError> {
        let mut tx = self.repo.begin().await?;
        let (line, stock) = claim_line_with_stock(&mut tx, line_id).await?;

        match line.state {
            LineState::LineRemoved => {}
            LineState::Active => return Ok(line),
            LineState::SaleRemoved => return Err(rejected(AppError::SaleDeleted(line.sale_id))),
        }
        ensure_available(&stock, line.quantity)?;

        sales::set_line_state(&mut tx, line_id, LineState::Active).await?;
        let updated = reload_line(&mut tx, line_id).await?;
        tx.commit().await?;

        info!(
            line_id,
            actual_quantity = stock.actual_quantity - updated.quantity,
            "Sale line restored"
        );
        Ok(updated)
    }
}

async fn finish_add(
    mut tx: sqlx::Transaction<'static, sqlx::Sqlite>,
    sale_id: SaleId,
    line_id: LineId,
    change: LineChange,
    sale_created: bool,
) -> Result<AddItemOutcome, AppError> {
    let sale = sales::get(&mut tx, sale_id)
        .await?
        .ok_or(AppError::SaleNotFound(sale_id))?;
    let line = reload_line(&mut tx, line_id).await?;
    tx.commit().await?;

    info!(
        sale_id,
        line_id,
        ?change,
        sale_created,
        quantity = line.quantity,
        "Item added to sale"
    );
    Ok(AddItemOutcome {
        sale,
        line,
        change,
        sale_created,
    })
}

/// Add `singles` to an active line if the stock can cover them.
async fn grow_line(
    conn: &mut SqliteConnection,
    line: &SaleLine,
    stock: &ItemStock,
    singles: i64,
) -> Result<SaleLine, AppError> {
    ensure_available(stock, singles)?;
    let quantity = line
        .quantity
        .checked_add(singles)
        .ok_or_else(|| rejected(AppError::InvalidAmount("Quantity is too large".into())))?;
    sales::set_line_quantity(conn, line.id, quantity).await?;
    reload_line(conn, line.id).await
}

/// Claim the item behind a line and read both.
async fn claim_line_with_stock(
    conn: &mut SqliteConnection,
    line_id: LineId,
) -> Result<(SaleLine, ItemStock), AppError> {
    let claimed = items::claim_for_line(conn, line_id).await?;
    let line = sales::get_line(conn, line_id)
        .await?
        .ok_or_else(|| rejected(AppError::LineNotFound(line_id)))?;
    if !claimed {
        return Err(rejected(AppError::ItemNotFound(line.item_id)));
    }
    let stock = items::stock(conn, line.item_id)
        .await?
        .ok_or(AppError::ItemNotFound(line.item_id))?;
    Ok((line, stock))
}

async fn reload_line(conn: &mut SqliteConnection, line_id: LineId) -> Result<SaleLine, AppError> {
    sales::get_line(conn, line_id)
        .await?
        .ok_or(AppError::LineNotFound(line_id))
}

/// A sale that exists and is not deleted.
async fn open_sale(conn: &mut SqliteConnection, sale_id: SaleId) -> Result<Sale, AppError> {
    let sale = sales::get(conn, sale_id)
        .await?
        .ok_or_else(|| rejected(AppError::SaleNotFound(sale_id)))?;
    if sale.deleted {
        return Err(rejected(AppError::SaleDeleted(sale_id)));
    }
    Ok(sale)
}

async fn load_sale(conn: &mut SqliteConnection, sale_id: SaleId) -> Result<SaleDetail, AppError> {
    let sale = sales::get(conn, sale_id)
        .await?
        .ok_or(AppError::SaleNotFound(sale_id))?;
    let lines = sales::list_lines(conn, sale_id).await?;
    let subtotal = sale_subtotal(&lines);
    let total = subtotal - sale.discount;
    Ok(SaleDetail {
        sale,
        lines,
        subtotal,
        total,
    })
}

fn require_active(line: &SaleLine) -> Result<(), AppError> {
    match line.state {
        LineState::Active => Ok(()),
        LineState::SaleRemoved => Err(rejected(AppError::SaleDeleted(line.sale_id))),
        state => Err(rejected(AppError::LineState {
            line_id: line.id,
            state,
            expected: LineState::Active,
        })),
    }
}

fn ensure_available(stock: &ItemStock, singles: i64) -> Result<(), AppError> {
    if stock.can_commit(singles) {
        Ok(())
    } else {
        Err(rejected(AppError::InsufficientStock {
            item_id: stock.item_id,
            available: stock.actual_quantity,
            required: singles,
        }))
    }
}

fn validate_header(header: &NewSale) -> Result<(), AppError> {
    if header.discount < 0 {
        return Err(rejected(AppError::InvalidAmount(
            "Discount cannot be negative".to_string(),
        )));
    }
    Ok(())
}

fn quantity_update(before: SaleLine, after: SaleLine) -> LineQuantityUpdate {
    LineQuantityUpdate {
        cash_effect: CashEffect::between(before.total(), after.total()),
        previous_quantity: before.quantity,
        line: after,
    }
}
