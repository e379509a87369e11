mod common;

use anyhow::Result;
use common::{add, add_to_sale, sale_with_carton, stocked_item, test_service};
use retail_ledger::application::{AddItem, AppError, ErrorKind, LineChange};
use retail_ledger::domain::{
    CashDirection, CashEffect, ItemRef, LineState, NewItem, NewSale, PriceTier, SaleTarget,
    StockDirection, Unit,
};

#[tokio::test]
async fn test_add_item_opens_sale_and_snapshots_prices() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let item = stocked_item(&service, "Milk", 10, 10).await?;

    let outcome = service
        .add_item_to_sale(AddItem {
            sale: SaleTarget::New(NewSale::cash(7).with_mandub(3).on_credit()),
            item: ItemRef::Id(item.item.id),
            unit: Unit::Carton,
            tier: PriceTier::PluralWholesale,
        })
        .await?;

    assert!(outcome.sale_created);
    assert_eq!(outcome.change, LineChange::Inserted);
    assert_eq!(outcome.sale.customer_id, 7);
    assert!(outcome.sale.dept);
    assert_eq!(outcome.sale.mandub_id, Some(3));
    assert_eq!(outcome.line.quantity, 10);
    assert_eq!(outcome.line.item_sell_price, 80);
    assert_eq!(outcome.line.item_produce_price, 50);
    assert_eq!(outcome.line.state, LineState::Active);

    // later price changes leave the line alone
    service
        .update_item(
            item.item.id,
            retail_ledger::domain::ItemUpdate {
                name: "Milk".to_string(),
                barcode: None,
                item_per_cartoon: 10,
                carton_prices: retail_ledger::domain::ItemPrices {
                    plural_wholesale: 5_000,
                    ..common::carton_prices()
                },
                carton_produce_price: 5_000,
            },
        )
        .await?;
    let detail = service.get_sale(outcome.sale.id).await?;
    assert_eq!(detail.lines[0].item_sell_price, 80);
    assert_eq!(detail.lines[0].item_produce_price, 50);

    Ok(())
}

#[tokio::test]
async fn test_add_by_barcode() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let created = service
        .create_item(NewItem {
            name: "Juice".to_string(),
            barcode: Some("5000".to_string()),
            cartons: 2,
            item_per_cartoon: 6,
            carton_prices: common::carton_prices(),
            carton_produce_price: 0,
        })
        .await?;

    let outcome = service
        .add_item_to_sale(AddItem {
            sale: SaleTarget::New(NewSale::cash(1)),
            item: ItemRef::Barcode("5000".to_string()),
            unit: Unit::Single,
            tier: PriceTier::SingleRetail,
        })
        .await?;
    assert_eq!(outcome.line.item_id, created.item.id);
    assert_eq!(outcome.line.quantity, 1);
    assert_eq!(outcome.line.item_sell_price, 200);

    let miss = service
        .add_item_to_sale(AddItem {
            sale: SaleTarget::New(NewSale::cash(1)),
            item: ItemRef::Barcode("nope".to_string()),
            unit: Unit::Single,
            tier: PriceTier::SingleRetail,
        })
        .await
        .unwrap_err();
    assert!(matches!(miss, AppError::BarcodeNotFound(_)));
    assert_eq!(miss.kind(), ErrorKind::Input);

    // the miss did not open a header
    let next = service.get_sale(outcome.sale.id + 1).await;
    assert!(matches!(next, Err(AppError::SaleNotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_add_requires_a_free_carton() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let item = stocked_item(&service, "Eggs", 1, 10).await?;
    let item_id = item.item.id;

    service
        .change_quantity(item_id, StockDirection::Decrease, Unit::Single, 3)
        .await?;

    // 7 singles left, less than a carton, even for a single
    let result = service
        .add_item_to_sale(add(SaleTarget::New(NewSale::cash(1)), item_id, Unit::Single))
        .await;
    match result {
        Err(AppError::InsufficientStock {
            available,
            required,
            ..
        }) => {
            assert_eq!(available, 7);
            assert_eq!(required, 10);
        }
        other => panic!("expected InsufficientStock, got {:?}", other.map(|_| ())),
    }

    // a rejected add never opens a header
    let first = service.create_sale(NewSale::cash(1)).await?;
    assert_eq!(first.id, 1);
    Ok(())
}

#[tokio::test]
async fn test_repeat_add_grows_the_active_line() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let item = stocked_item(&service, "Cheese", 5, 10).await?;
    let item_id = item.item.id;

    let first = sale_with_carton(&service, item_id).await?;
    let second = add_to_sale(&service, first.sale.id, item_id, Unit::Single).await?;

    assert!(!second.sale_created);
    assert_eq!(second.change, LineChange::Increased);
    assert_eq!(second.line.id, first.line.id);
    assert_eq!(second.line.quantity, 11);
    assert_eq!(service.item_stock(item_id).await?.actual_quantity, 39);
    Ok(())
}

#[tokio::test]
async fn test_increase_and_decrease_line() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let item = stocked_item(&service, "Butter", 2, 10).await?;
    let item_id = item.item.id;
    let outcome = sale_with_carton(&service, item_id).await?;
    let line_id = outcome.line.id;

    let grown = service.increase_line(line_id, Unit::Single).await?;
    assert_eq!(grown.previous_quantity, 10);
    assert_eq!(grown.line.quantity, 11);
    assert_eq!(
        grown.cash_effect,
        Some(CashEffect {
            amount: 100,
            direction: CashDirection::Increase
        })
    );

    // 9 singles free, a carton does not fit
    let too_much = service.increase_line(line_id, Unit::Carton).await;
    assert!(matches!(too_much, Err(AppError::InsufficientStock { .. })));

    let shrunk = service.decrease_line(line_id, Unit::Carton).await?;
    assert_eq!(shrunk.line.quantity, 1);

    let zeroed = service.decrease_line(line_id, Unit::Single).await?;
    assert_eq!(zeroed.line.quantity, 0);
    assert_eq!(zeroed.line.state, LineState::Active);

    let below = service.decrease_line(line_id, Unit::Single).await;
    assert!(matches!(
        below,
        Err(AppError::LineQuantityTooLow { resulting: -1, .. })
    ));
    assert_eq!(service.item_stock(item_id).await?.actual_quantity, 20);
    Ok(())
}

#[tokio::test]
async fn test_decrease_full_carton_line_to_zero() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let item = stocked_item(&service, "Rice", 1, 10).await?;
    let item_id = item.item.id;
    let outcome = sale_with_carton(&service, item_id).await?;
    let line_id = outcome.line.id;

    let update = service.decrease_line(line_id, Unit::Carton).await?;
    assert_eq!(update.previous_quantity, 10);
    assert_eq!(update.line.quantity, 0);
    assert_eq!(service.item_stock(item_id).await?.actual_quantity, 10);

    let again = service.decrease_line(line_id, Unit::Carton).await;
    assert!(matches!(
        again,
        Err(AppError::LineQuantityTooLow { resulting: -10, .. })
    ));
    assert_eq!(service.get_sale(outcome.sale.id).await?.lines[0].quantity, 0);
    Ok(())
}

#[tokio::test]
async fn test_set_line_quantity_reports_cash_effect() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let item = stocked_item(&service, "Coffee", 5, 10).await?;
    let item_id = item.item.id;
    let outcome = sale_with_carton(&service, item_id).await?;
    let line_id = outcome.line.id;

    let update = service.set_line_quantity(line_id, Unit::Carton, 3).await?;
    assert_eq!(update.line.quantity, 30);
    assert_eq!(
        update.cash_effect,
        Some(CashEffect {
            amount: 2_000,
            direction: CashDirection::Increase
        })
    );

    let update = service.set_line_quantity(line_id, Unit::Single, 25).await?;
    assert_eq!(update.line.quantity, 25);
    assert_eq!(
        update.cash_effect,
        Some(CashEffect {
            amount: 500,
            direction: CashDirection::Decrease
        })
    );

    // 25 held, 25 free: 6 cartons needs 35 more
    let over = service.set_line_quantity(line_id, Unit::Carton, 6).await;
    assert!(matches!(
        over,
        Err(AppError::InsufficientStock { required: 35, .. })
    ));

    let negative = service.set_line_quantity(line_id, Unit::Single, -1).await;
    assert!(matches!(negative, Err(AppError::InvalidAmount(_))));
    assert_eq!(service.get_sale(outcome.sale.id).await?.lines[0].quantity, 25);

    let zero = service.set_line_quantity(line_id, Unit::Single, 0).await?;
    assert_eq!(zero.previous_quantity, 25);
    assert_eq!(zero.line.quantity, 0);
    assert_eq!(
        zero.cash_effect,
        Some(CashEffect {
            amount: 2_500,
            direction: CashDirection::Decrease
        })
    );
    assert_eq!(service.item_stock(item_id).await?.actual_quantity, 50);
    Ok(())
}

#[tokio::test]
async fn test_set_line_price() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let item = stocked_item(&service, "Honey", 1, 10).await?;
    let outcome = sale_with_carton(&service, item.item.id).await?;

    let update = service.set_line_price(outcome.line.id, 80).await?;
    assert_eq!(update.total_before, 1_000);
    assert_eq!(update.total_after, 800);
    assert_eq!(
        update.cash_effect,
        Some(CashEffect {
            amount: 200,
            direction: CashDirection::Decrease
        })
    );
    assert_eq!(update.line.quantity, 10);

    let negative = service.set_line_price(outcome.line.id, -1).await;
    assert!(matches!(negative, Err(AppError::InvalidAmount(_))));

    let missing = service.set_line_price(999, 10).await;
    assert!(matches!(missing, Err(AppError::LineNotFound(999))));
    Ok(())
}

#[tokio::test]
async fn test_remove_and_restore_line() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let item = stocked_item(&service, "Bread", 2, 10).await?;
    let item_id = item.item.id;
    let outcome = sale_with_carton(&service, item_id).await?;
    let line_id = outcome.line.id;

    let removed = service.remove_line(line_id).await?;
    assert_eq!(removed.state, LineState::LineRemoved);
    assert_eq!(removed.quantity, 10);
    assert_eq!(service.item_stock(item_id).await?.actual_quantity, 20);

    // removing twice changes nothing
    let again = service.remove_line(line_id).await?;
    assert_eq!(again.state, LineState::LineRemoved);

    let on_removed = service.increase_line(line_id, Unit::Single).await;
    assert!(matches!(on_removed, Err(AppError::LineState { .. })));

    let restored = service.restore_line(line_id).await?;
    assert_eq!(restored.state, LineState::Active);
    assert_eq!(restored.quantity, 10);
    assert_eq!(restored.item_sell_price, outcome.line.item_sell_price);
    assert_eq!(service.item_stock(item_id).await?.actual_quantity, 10);
    Ok(())
}

#[tokio::test]
async fn test_restore_line_rechecks_stock() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let item = stocked_item(&service, "Jam", 1, 10).await?;
    let item_id = item.item.id;

    let first = sale_with_carton(&service, item_id).await?;
    service.remove_line(first.line.id).await?;

    // another sale takes the freed carton
    sale_with_carton(&service, item_id).await?;

    let result = service.restore_line(first.line.id).await;
    assert!(matches!(result, Err(AppError::InsufficientStock { .. })));
    let line = &service.get_sale(first.sale.id).await?.lines[0];
    assert_eq!(line.state, LineState::LineRemoved);
    Ok(())
}

#[tokio::test]
async fn test_add_brings_back_removed_line() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let item = stocked_item(&service, "Pasta", 3, 10).await?;
    let item_id = item.item.id;

    let outcome = sale_with_carton(&service, item_id).await?;
    service.increase_line(outcome.line.id, Unit::Single).await?;
    service.remove_line(outcome.line.id).await?;

    let again = add_to_sale(&service, outcome.sale.id, item_id, Unit::Carton).await?;
    assert_eq!(again.change, LineChange::Restored);
    assert_eq!(again.line.id, outcome.line.id);
    assert_eq!(again.line.quantity, 11);

    let detail = service.get_sale(outcome.sale.id).await?;
    assert_eq!(detail.lines.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_delete_sale_cascades_and_blocks_edits() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let tea = stocked_item(&service, "Tea", 2, 10).await?;
    let rice = stocked_item(&service, "Rice", 2, 5).await?;

    let outcome = sale_with_carton(&service, tea.item.id).await?;
    let sale_id = outcome.sale.id;
    let rice_line = add_to_sale(&service, sale_id, rice.item.id, Unit::Carton).await?;
    service.remove_line(rice_line.line.id).await?;

    let deleted = service.delete_sale(sale_id).await?;
    assert!(deleted.sale.deleted);
    assert!(
        deleted
            .lines
            .iter()
            .all(|line| line.state == LineState::SaleRemoved)
    );
    assert_eq!(deleted.subtotal, 0);
    assert_eq!(service.item_stock(tea.item.id).await?.actual_quantity, 20);

    let add_to_deleted = add_to_sale(&service, sale_id, tea.item.id, Unit::Carton).await;
    assert!(add_to_deleted.is_err());

    let remove = service.remove_line(outcome.line.id).await;
    assert!(matches!(remove, Err(AppError::SaleDeleted(id)) if id == sale_id));
    let restore = service.restore_line(outcome.line.id).await;
    assert!(matches!(restore, Err(AppError::SaleDeleted(_))));

    let twice = service.delete_sale(sale_id).await;
    assert!(matches!(twice, Err(AppError::SaleDeleted(_))));
    Ok(())
}

#[tokio::test]
async fn test_restore_sale_brings_back_listed_items() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let tea = stocked_item(&service, "Tea", 2, 10).await?;
    let rice = stocked_item(&service, "Rice", 2, 5).await?;

    let outcome = sale_with_carton(&service, tea.item.id).await?;
    let sale_id = outcome.sale.id;
    add_to_sale(&service, sale_id, rice.item.id, Unit::Carton).await?;
    service.delete_sale(sale_id).await?;

    let restored = service.restore_sale(sale_id, &[tea.item.id]).await?;
    assert!(!restored.sale.deleted);
    let tea_line = restored
        .lines
        .iter()
        .find(|line| line.item_id == tea.item.id)
        .expect("tea line");
    let rice_line = restored
        .lines
        .iter()
        .find(|line| line.item_id == rice.item.id)
        .expect("rice line");
    assert_eq!(tea_line.state, LineState::Active);
    assert_eq!(rice_line.state, LineState::LineRemoved);
    assert_eq!(restored.subtotal, 1_000);

    assert_eq!(service.item_stock(tea.item.id).await?.actual_quantity, 10);
    assert_eq!(service.item_stock(rice.item.id).await?.actual_quantity, 10);

    // the unlisted line can still come back on its own
    service.restore_line(rice_line.id).await?;
    assert_eq!(service.item_stock(rice.item.id).await?.actual_quantity, 5);
    Ok(())
}

#[tokio::test]
async fn test_restore_sale_is_all_or_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let tea = stocked_item(&service, "Tea", 2, 10).await?;
    let jam = stocked_item(&service, "Jam", 1, 10).await?;

    let outcome = sale_with_carton(&service, tea.item.id).await?;
    let sale_id = outcome.sale.id;
    add_to_sale(&service, sale_id, jam.item.id, Unit::Carton).await?;
    service.delete_sale(sale_id).await?;

    // the only jam carton goes to someone else
    sale_with_carton(&service, jam.item.id).await?;

    let result = service
        .restore_sale(sale_id, &[tea.item.id, jam.item.id])
        .await;
    assert!(matches!(result, Err(AppError::InsufficientStock { .. })));

    let detail = service.get_sale(sale_id).await?;
    assert!(detail.sale.deleted);
    assert!(
        detail
            .lines
            .iter()
            .all(|line| line.state == LineState::SaleRemoved)
    );
    assert_eq!(service.item_stock(tea.item.id).await?.actual_quantity, 20);
    Ok(())
}

#[tokio::test]
async fn test_sale_totals_and_header_update() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let tea = stocked_item(&service, "Tea", 5, 10).await?;
    let rice = stocked_item(&service, "Rice", 5, 5).await?;

    let outcome = sale_with_carton(&service, tea.item.id).await?;
    let sale_id = outcome.sale.id;
    let rice_line = add_to_sale(&service, sale_id, rice.item.id, Unit::Carton).await?;

    let updated = service
        .update_sale(
            sale_id,
            NewSale {
                customer_id: 9,
                mandub_id: None,
                dept: true,
                discount: 150,
            },
        )
        .await?;
    assert!(updated.dept);
    assert_eq!(updated.customer_id, 9);

    // tea 10 x 100 + rice 5 x 200
    let detail = service.get_sale(sale_id).await?;
    assert_eq!(detail.subtotal, 2_000);
    assert_eq!(detail.total, 1_850);

    service.remove_line(rice_line.line.id).await?;
    let detail = service.get_sale(sale_id).await?;
    assert_eq!(detail.subtotal, 1_000);
    assert_eq!(detail.total, 850);

    assert_eq!(service.list_sale_lines(sale_id, false).await?.len(), 1);
    assert_eq!(service.list_sale_lines(sale_id, true).await?.len(), 2);

    let negative = service
        .update_sale(
            sale_id,
            NewSale {
                discount: -1,
                ..NewSale::cash(9)
            },
        )
        .await;
    assert!(matches!(negative, Err(AppError::InvalidAmount(_))));
    Ok(())
}
