// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Once;

use anyhow::Result;
use retail_ledger::application::{AddItem, AddItemOutcome, ItemWithStock, RetailService};
use retail_ledger::config::DatabaseSettings;
use retail_ledger::domain::{
    ItemId, ItemPrices, ItemRef, NewItem, NewSale, PriceTier, SaleId, SaleTarget, Unit,
};
use tempfile::TempDir;

static TRACING: Once = Once::new();

fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("retail_ledger=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(RetailService, TempDir)> {
    init_test_tracing();
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let settings = DatabaseSettings::with_path(db_path.to_string_lossy());
    let service = RetailService::init(&settings).await?;
    Ok((service, temp_dir))
}

/// Carton prices that come out as round per-single values for a carton of 10.
pub fn carton_prices() -> ItemPrices {
    ItemPrices {
        plural_retail: 1_000,
        single_retail: 1_200,
        plural_wholesale: 800,
        single_wholesale: 900,
    }
}

/// Create an item with `cartons` cartons of `per_carton` singles.
pub async fn stocked_item(
    service: &RetailService,
    name: &str,
    cartons: i64,
    per_carton: i64,
) -> Result<ItemWithStock> {
    Ok(service
        .create_item(NewItem {
            name: name.to_string(),
            barcode: None,
            cartons,
            item_per_cartoon: per_carton,
            carton_prices: carton_prices(),
            carton_produce_price: 500,
        })
        .await?)
}

/// Put money in the register.
pub async fn fund_register(service: &RetailService, amount: i64) -> Result<()> {
    service.deposit(amount, Some("opening float")).await?;
    Ok(())
}

pub fn add(sale: SaleTarget, item_id: ItemId, unit: Unit) -> AddItem {
    AddItem {
        sale,
        item: ItemRef::Id(item_id),
        unit,
        tier: PriceTier::PluralRetail,
    }
}

/// Open a new cash sale with one carton of `item_id`.
pub async fn sale_with_carton(service: &RetailService, item_id: ItemId) -> Result<AddItemOutcome> {
    Ok(service
        .add_item_to_sale(add(SaleTarget::New(NewSale::cash(1)), item_id, Unit::Carton))
        .await?)
}

/// Add one unit of `item_id` to an existing sale.
pub async fn add_to_sale(
    service: &RetailService,
    sale_id: SaleId,
    item_id: ItemId,
    unit: Unit,
) -> Result<AddItemOutcome> {
    Ok(service
        .add_item_to_sale(add(SaleTarget::Existing(sale_id), item_id, unit))
        .await?)
}
