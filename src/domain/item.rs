use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, per_single_price};

pub type ItemId = i64;

/// Counting unit for stock and sale-line movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// A full pack of `item_per_cartoon` singles
    Carton,
    Single,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Carton => "carton",
            Unit::Single => "single",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "carton" | "cartoon" | "plural" => Some(Unit::Carton),
            "single" => Some(Unit::Single),
            _ => None,
        }
    }

    /// Number of singles one of this unit stands for.
    pub fn factor(&self, item_per_cartoon: i64) -> i64 {
        match self {
            Unit::Carton => item_per_cartoon,
            Unit::Single => 1,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    Increase,
    Decrease,
}

impl StockDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::Increase => "increase",
            StockDirection::Decrease => "decrease",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "increase" | "inc" => Some(StockDirection::Increase),
            "decrease" | "dec" => Some(StockDirection::Decrease),
            _ => None,
        }
    }
}

/// Which of the four stored sell prices a sale line snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    PluralRetail,
    SingleRetail,
    PluralWholesale,
    SingleWholesale,
}

impl PriceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceTier::PluralRetail => "plural_retail",
            PriceTier::SingleRetail => "single_retail",
            PriceTier::PluralWholesale => "plural_wholesale",
            PriceTier::SingleWholesale => "single_wholesale",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "plural_retail" => Some(PriceTier::PluralRetail),
            "single_retail" => Some(PriceTier::SingleRetail),
            "plural_wholesale" => Some(PriceTier::PluralWholesale),
            "single_wholesale" => Some(PriceTier::SingleWholesale),
            _ => None,
        }
    }
}

/// Per-single sell prices, as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPrices {
    pub plural_retail: Cents,
    pub single_retail: Cents,
    pub plural_wholesale: Cents,
    pub single_wholesale: Cents,
}

impl ItemPrices {
    pub fn for_tier(&self, tier: PriceTier) -> Cents {
        match tier {
            PriceTier::PluralRetail => self.plural_retail,
            PriceTier::SingleRetail => self.single_retail,
            PriceTier::PluralWholesale => self.plural_wholesale,
            PriceTier::SingleWholesale => self.single_wholesale,
        }
    }

    fn iter(&self) -> impl Iterator<Item = Cents> {
        [
            self.plural_retail,
            self.single_retail,
            self.plural_wholesale,
            self.single_wholesale,
        ]
        .into_iter()
    }
}

/// A catalog item. `quantity` is the authoritative stock, in singles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub barcode: Option<String>,
    pub quantity: i64,
    pub item_per_cartoon: i64,
    pub prices: ItemPrices,
    /// Cost of one single
    pub item_produce_price: Cents,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn cartons(&self) -> i64 {
        self.quantity / self.item_per_cartoon
    }
}

/// Stock figures for one item, read in a single aggregate query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStock {
    pub item_id: ItemId,
    pub quantity: i64,
    pub item_per_cartoon: i64,
    /// `quantity` minus every active sale line of this item
    pub actual_quantity: i64,
}

impl ItemStock {
    /// Singles committed to open sale lines.
    pub fn committed(&self) -> i64 {
        self.quantity - self.actual_quantity
    }

    /// Whether a new sale line may be opened: a whole carton must be free.
    pub fn can_open_line(&self) -> bool {
        self.actual_quantity > 0 && self.actual_quantity >= self.item_per_cartoon
    }

    pub fn can_commit(&self, singles: i64) -> bool {
        self.actual_quantity >= singles
    }
}

/// Rejections of a quantity change, before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityChangeError {
    NegativeAmount,
    PartialCarton { amount: i64, item_per_cartoon: i64 },
    BelowCommitted { committed: i64, resulting: i64 },
    TooLarge,
}

/// Resolve a stock movement into the new absolute quantity.
pub fn resolve_quantity_change(
    stock: &ItemStock,
    direction: StockDirection,
    unit: Unit,
    amount: i64,
) -> Result<i64, QuantityChangeError> {
    if amount < 0 {
        return Err(QuantityChangeError::NegativeAmount);
    }

    let singles = amount
        .checked_mul(unit.factor(stock.item_per_cartoon))
        .ok_or(QuantityChangeError::TooLarge)?;
    match direction {
        StockDirection::Increase => {
            // single-unit increases must complete whole cartons; decreases are free
            if unit == Unit::Single && amount % stock.item_per_cartoon != 0 {
                return Err(QuantityChangeError::PartialCarton {
                    amount,
                    item_per_cartoon: stock.item_per_cartoon,
                });
            }
            stock
                .quantity
                .checked_add(singles)
                .ok_or(QuantityChangeError::TooLarge)
        }
        StockDirection::Decrease => {
            let resulting = stock.quantity - singles;
            if resulting < stock.committed() {
                return Err(QuantityChangeError::BelowCommitted {
                    committed: stock.committed(),
                    resulting,
                });
            }
            Ok(resulting)
        }
    }
}

/// Catalog input. Prices are per carton, stock is in cartons.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub barcode: Option<String>,
    pub cartons: i64,
    pub item_per_cartoon: i64,
    pub carton_prices: ItemPrices,
    pub carton_produce_price: Cents,
}

/// Catalog edit. Prices are per carton; stock moves only through quantity changes.
#[derive(Debug, Clone)]
pub struct ItemUpdate {
    pub name: String,
    pub barcode: Option<String>,
    pub item_per_cartoon: i64,
    pub carton_prices: ItemPrices,
    pub carton_produce_price: Cents,
}

/// Rejections of catalog price input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    NonPositiveCartonSize(i64),
    NegativePrice(Cents),
}

/// Convert per-carton prices and cost into the per-single values that get stored.
pub fn normalize_prices(
    item_per_cartoon: i64,
    carton_prices: &ItemPrices,
    carton_produce_price: Cents,
) -> Result<(ItemPrices, Cents), PricingError> {
    if item_per_cartoon <= 0 {
        return Err(PricingError::NonPositiveCartonSize(item_per_cartoon));
    }
    if let Some(bad) = carton_prices
        .iter()
        .chain(std::iter::once(carton_produce_price))
        .find(|price| *price < 0)
    {
        return Err(PricingError::NegativePrice(bad));
    }

    let per_single = |price| per_single_price(price, item_per_cartoon);
    Ok((
        ItemPrices {
            plural_retail: per_single(carton_prices.plural_retail),
            single_retail: per_single(carton_prices.single_retail),
            plural_wholesale: per_single(carton_prices.plural_wholesale),
            single_wholesale: per_single(carton_prices.single_wholesale),
        },
        per_single(carton_produce_price),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(quantity: i64, per_cartoon: i64, actual: i64) -> ItemStock {
        ItemStock {
            item_id: 1,
            quantity,
            item_per_cartoon: per_cartoon,
            actual_quantity: actual,
        }
    }

    #[test]
    fn test_unit_factor() {
        assert_eq!(Unit::Carton.factor(12), 12);
        assert_eq!(Unit::Single.factor(12), 1);
    }

    #[test]
    fn test_increase_by_cartons() {
        let s = stock(100, 10, 80);
        assert_eq!(
            resolve_quantity_change(&s, StockDirection::Increase, Unit::Carton, 3),
            Ok(130)
        );
    }

    #[test]
    fn test_single_increase_must_complete_cartons() {
        let s = stock(100, 10, 100);
        assert_eq!(
            resolve_quantity_change(&s, StockDirection::Increase, Unit::Single, 7),
            Err(QuantityChangeError::PartialCarton {
                amount: 7,
                item_per_cartoon: 10
            })
        );
        assert_eq!(
            resolve_quantity_change(&s, StockDirection::Increase, Unit::Single, 20),
            Ok(120)
        );
    }

    #[test]
    fn test_single_decrease_is_unrestricted() {
        let s = stock(100, 10, 100);
        assert_eq!(
            resolve_quantity_change(&s, StockDirection::Decrease, Unit::Single, 7),
            Ok(93)
        );
    }

    #[test]
    fn test_decrease_cannot_cut_committed_stock() {
        // 20 singles sit in open sale lines
        let s = stock(100, 10, 80);
        assert_eq!(
            resolve_quantity_change(&s, StockDirection::Decrease, Unit::Carton, 9),
            Err(QuantityChangeError::BelowCommitted {
                committed: 20,
                resulting: 10
            })
        );
        assert_eq!(
            resolve_quantity_change(&s, StockDirection::Decrease, Unit::Carton, 8),
            Ok(20)
        );
    }

    #[test]
    fn test_negative_amount_rejected() {
        let s = stock(100, 10, 100);
        assert_eq!(
            resolve_quantity_change(&s, StockDirection::Increase, Unit::Carton, -1),
            Err(QuantityChangeError::NegativeAmount)
        );
    }

    #[test]
    fn test_overflowing_amount_rejected() {
        let s = stock(100, 10, 100);
        assert_eq!(
            resolve_quantity_change(&s, StockDirection::Increase, Unit::Carton, i64::MAX),
            Err(QuantityChangeError::TooLarge)
        );
    }

    #[test]
    fn test_can_open_line_needs_a_whole_carton() {
        assert!(stock(100, 10, 10).can_open_line());
        assert!(!stock(100, 10, 9).can_open_line());
        assert!(!stock(0, 1, 0).can_open_line());
    }

    #[test]
    fn test_normalize_prices_divides_by_carton_size() {
        let carton = ItemPrices {
            plural_retail: 12_000,
            single_retail: 13_200,
            plural_wholesale: 10_800,
            single_wholesale: 11_400,
        };
        let (single, cost) = normalize_prices(12, &carton, 9_600).unwrap();
        assert_eq!(single.plural_retail, 1_000);
        assert_eq!(single.single_retail, 1_100);
        assert_eq!(single.plural_wholesale, 900);
        assert_eq!(single.single_wholesale, 950);
        assert_eq!(cost, 800);
    }

    #[test]
    fn test_normalize_prices_rejects_bad_input() {
        let carton = ItemPrices {
            plural_retail: 100,
            single_retail: 100,
            plural_wholesale: -1,
            single_wholesale: 100,
        };
        assert_eq!(
            normalize_prices(0, &carton, 0),
            Err(PricingError::NonPositiveCartonSize(0))
        );
        assert_eq!(
            normalize_prices(10, &carton, 0),
            Err(PricingError::NegativePrice(-1))
        );
    }

    #[test]
    fn test_price_tier_roundtrip() {
        for tier in [
            PriceTier::PluralRetail,
            PriceTier::SingleRetail,
            PriceTier::PluralWholesale,
            PriceTier::SingleWholesale,
        ] {
            assert_eq!(PriceTier::from_str(tier.as_str()), Some(tier));
        }
        assert_eq!(
            PriceTier::from_str("single-wholesale"),
            Some(PriceTier::SingleWholesale)
        );
    }
}
