//! Money calculation using rust_decimal for precision
//!
//! All amounts are `Decimal`; every stage is rounded to 2 decimal places
//! (half away from zero) before it feeds the next stage, so a taxed total is
//! `round(round(subtotal + tip) × 1.03)` rather than a single rounding of the
//! full-precision product.

use rust_decimal::prelude::*;
use thiserror::Error;

use crate::error::{AppError, ErrorCode};
use crate::models::OrderItem;

/// Rounding precision for monetary values
const DECIMAL_PLACES: u32 = 2;

/// Fixed tax rate applied to `subtotal + tip` (3%)
pub const TAX_RATE: Decimal = Decimal::from_parts(3, 0, 0, false, 2);

/// One-tap tip percentage presets
pub const TIP_PRESETS: [u32; 4] = [15, 18, 20, 25];

/// Largest accepted tip percentage (1000%)
pub const MAX_TIP_PERCENT: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Largest accepted absolute tip
pub const MAX_TIP_AMOUNT: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("{field} must be non-negative, got {value}")]
    InvalidAmount { field: &'static str, value: Decimal },

    #[error("{field} must not exceed {max}, got {value}")]
    TooLarge {
        field: &'static str,
        value: Decimal,
        max: Decimal,
    },

    #[error("{field} is too large to calculate")]
    Overflow { field: &'static str },
}

impl From<MoneyError> for AppError {
    fn from(err: MoneyError) -> Self {
        let field = match &err {
            MoneyError::InvalidAmount { field, .. }
            | MoneyError::TooLarge { field, .. }
            | MoneyError::Overflow { field } => *field,
        };
        AppError::with_message(ErrorCode::InvalidAmount, err.to_string()).with_detail("field", field)
    }
}

/// Breakdown of an order's money
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tip_amount: Decimal,
    /// `subtotal + tip_amount`; this is what an order record stores as its total
    pub pre_tax_total: Decimal,
    pub tax_amount: Decimal,
    /// `pre_tax_total + tax_amount`
    pub total: Decimal,
}

/// Round to 2 dp, midpoint away from zero
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

fn require_non_negative(value: Decimal, field: &'static str) -> Result<(), MoneyError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(MoneyError::InvalidAmount { field, value });
    }
    Ok(())
}

pub(crate) fn require_at_most(
    value: Decimal,
    max: Decimal,
    field: &'static str,
) -> Result<(), MoneyError> {
    if value > max {
        return Err(MoneyError::TooLarge { field, value, max });
    }
    Ok(())
}

#[inline]
fn checked(value: Option<Decimal>, field: &'static str) -> Result<Decimal, MoneyError> {
    value.ok_or(MoneyError::Overflow { field })
}

/// Sum of `price × quantity` over the lines; zero for no lines
pub fn subtotal_of(items: &[OrderItem]) -> Result<Decimal, MoneyError> {
    items.iter().try_fold(Decimal::ZERO, |acc, item| {
        let line = checked(item.line_total(), "subtotal")?;
        checked(acc.checked_add(line), "subtotal")
    })
}

/// Tip for a percentage of the subtotal: `round(subtotal × percent / 100)`
pub fn calculate_tip(subtotal: Decimal, percent: Decimal) -> Result<Decimal, MoneyError> {
    require_non_negative(subtotal, "subtotal")?;
    require_non_negative(percent, "tip_percent")?;
    let scaled = checked(subtotal.checked_mul(percent), "tip_amount")?;
    Ok(round_money(checked(
        scaled.checked_div(Decimal::ONE_HUNDRED),
        "tip_amount",
    )?))
}

/// Full breakdown with an optional tip percentage
pub fn calculate_order_total(
    subtotal: Decimal,
    tip_percent: Option<Decimal>,
) -> Result<OrderTotals, MoneyError> {
    let tip_amount = match tip_percent {
        Some(percent) => calculate_tip(subtotal, percent)?,
        None => Decimal::ZERO,
    };
    totals_with_tip_amount(subtotal, tip_amount)
}

/// Full breakdown with an absolute tip amount
pub fn totals_with_tip_amount(
    subtotal: Decimal,
    tip_amount: Decimal,
) -> Result<OrderTotals, MoneyError> {
    require_non_negative(subtotal, "subtotal")?;
    require_non_negative(tip_amount, "tip_amount")?;

    let subtotal = round_money(subtotal);
    let tip_amount = round_money(tip_amount);
    let pre_tax_total = round_money(checked(subtotal.checked_add(tip_amount), "total")?);
    let total = round_money(checked(
        pre_tax_total.checked_mul(Decimal::ONE + TAX_RATE),
        "total",
    )?);
    let tax_amount = total - pre_tax_total;

    Ok(OrderTotals {
        subtotal,
        tip_amount,
        pre_tax_total,
        tax_amount,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_tip_percentage() {
        assert_eq!(calculate_tip(dec("19.00"), dec("15")).unwrap(), dec("2.85"));
        assert_eq!(calculate_tip(dec("33.33"), dec("18")).unwrap(), dec("6.00"));
        assert_eq!(calculate_tip(dec("10.05"), dec("10")).unwrap(), dec("1.01"));
        assert_eq!(calculate_tip(dec("0"), dec("25")).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_taxed_total_rounds_each_stage() {
        // 47.85 + 20% tip = 57.42; 57.42 × 1.03 = 59.1426 → 59.14
        let totals = calculate_order_total(dec("47.85"), Some(dec("20"))).unwrap();
        assert_eq!(totals.tip_amount, dec("9.57"));
        assert_eq!(totals.pre_tax_total, dec("57.42"));
        assert_eq!(totals.total, dec("59.14"));
        assert_eq!(totals.tax_amount, dec("1.72"));
    }

    #[test]
    fn test_no_tip() {
        let totals = calculate_order_total(dec("19.00"), None).unwrap();
        assert_eq!(totals.tip_amount, Decimal::ZERO);
        assert_eq!(totals.pre_tax_total, dec("19.00"));
        assert_eq!(totals.total, dec("19.57"));
    }

    #[test]
    fn test_property_over_grid() {
        // tip == round(S×P/100) and total == round(round(S+tip) × 1.03)
        let subtotals = ["0", "0.01", "1.99", "9.50", "19.00", "47.85", "123.45", "999.99"];
        for s in subtotals {
            let s = dec(s);
            for p in 0..=100u32 {
                let p = Decimal::from(p);
                let totals = calculate_order_total(s, Some(p)).unwrap();
                let tip = round_money(s * p / dec("100"));
                assert_eq!(totals.tip_amount, tip);
                assert_eq!(totals.total, round_money(round_money(s + tip) * dec("1.03")));
                assert_eq!(totals.pre_tax_total + totals.tax_amount, totals.total);
            }
        }
    }

    #[test]
    fn test_negative_inputs_rejected() {
        assert_eq!(
            calculate_tip(dec("-1"), dec("10")),
            Err(MoneyError::InvalidAmount {
                field: "subtotal",
                value: dec("-1")
            })
        );
        assert!(calculate_tip(dec("10"), dec("-5")).is_err());
        assert!(totals_with_tip_amount(dec("10"), dec("-0.01")).is_err());
    }

    #[test]
    fn test_money_error_maps_to_invalid_amount() {
        let err: AppError = calculate_tip(dec("-1"), dec("10")).unwrap_err().into();
        assert_eq!(err.code, ErrorCode::InvalidAmount);
        assert_eq!(err.details.unwrap().get("field").unwrap(), "subtotal");
    }

    #[test]
    fn test_subtotal_of_empty_is_zero() {
        assert_eq!(subtotal_of(&[]), Ok(Decimal::ZERO));
    }

    #[test]
    fn test_huge_values_error_instead_of_panicking() {
        assert_eq!(
            calculate_tip(dec("9.50"), Decimal::from_scientific("1e28").unwrap()),
            Err(MoneyError::Overflow { field: "tip_amount" })
        );
        assert_eq!(
            totals_with_tip_amount(Decimal::MAX, dec("1")),
            Err(MoneyError::Overflow { field: "total" })
        );
        // fits before tax, overflows once taxed
        assert_eq!(
            totals_with_tip_amount(Decimal::MAX - dec("1"), Decimal::ZERO),
            Err(MoneyError::Overflow { field: "total" })
        );

        let line = OrderItem {
            id: 1,
            name: "Wagyu".to_string(),
            price: Decimal::MAX,
            category: "Mains".to_string(),
            quantity: 2,
        };
        assert_eq!(
            subtotal_of(&[line]),
            Err(MoneyError::Overflow { field: "subtotal" })
        );
    }

    #[test]
    fn test_overflow_maps_to_invalid_amount() {
        let err: AppError = MoneyError::Overflow { field: "total" }.into();
        assert_eq!(err.code, ErrorCode::InvalidAmount);
        assert_eq!(err.details.unwrap().get("field").unwrap(), "total");
    }
}
