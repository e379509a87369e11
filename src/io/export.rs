use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::{ItemWithStock, RetailService};
use crate::domain::{CashRegister, format_cents};

/// Point-in-time view of stock and register for the JSON export
#[derive(Debug, Clone, Serialize)]
pub struct StockSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub register: CashRegister,
    pub items: Vec<ItemWithStock>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a RetailService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a RetailService) -> Self {
        Self { service }
    }

    /// Export one row per live item with its stock figures
    pub async fn export_stock_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let items = self.service.list_items().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "name",
            "barcode",
            "quantity",
            "item_per_cartoon",
            "cartons",
            "actual_quantity",
            "committed",
            "single_retail_price",
            "single_wholesale_price",
            "item_produce_price",
        ])?;

        let mut count = 0;
        for entry in &items {
            let item = &entry.item;
            csv_writer.write_record([
                item.id.to_string(),
                item.name.clone(),
                item.barcode.clone().unwrap_or_default(),
                entry.stock.quantity.to_string(),
                entry.stock.item_per_cartoon.to_string(),
                item.cartons().to_string(),
                entry.stock.actual_quantity.to_string(),
                entry.stock.committed().to_string(),
                format_cents(item.prices.single_retail),
                format_cents(item.prices.single_wholesale),
                format_cents(item.item_produce_price),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export every register history row, deleted ones flagged
    pub async fn export_register_history_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let history = self.service.register_history(true).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "created_at",
            "type",
            "situation",
            "money",
            "expense_id",
            "note",
            "deleted",
        ])?;

        let mut count = 0;
        for entry in &history {
            csv_writer.write_record([
                entry.id.to_string(),
                entry.created_at.to_rfc3339(),
                entry.kind.as_str().to_string(),
                entry.situation.as_str().to_string(),
                format_cents(entry.money),
                entry.expense_id.map(|id| id.to_string()).unwrap_or_default(),
                entry.note.clone().unwrap_or_default(),
                entry.deleted.to_string(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export stock and the register balance as a JSON snapshot
    pub async fn export_stock_json<W: Write>(&self, mut writer: W) -> Result<StockSnapshot> {
        let snapshot = StockSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            register: self.service.register().await?,
            items: self.service.list_items().await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
