// Application layer: the service that runs every ledger operation inside
// a single transaction and maps storage failures to `AppError`.

pub mod error;
mod register;
mod sales;
mod service;
mod stock;

pub use error::*;
pub use sales::{
    AddItem, AddItemOutcome, LineChange, LinePriceUpdate, LineQuantityUpdate, SaleDetail,
};
pub use service::RetailService;
pub use stock::ItemWithStock;
