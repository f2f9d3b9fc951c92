//! Line and document arithmetic for invoices and orders.
//!
//! All amounts are rounded to two decimal places at the line level; document
//! totals are plain sums of line amounts so that
//! `total_amount == sub_total + tax_amount - discount_amount` holds exactly.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::read::DocumentLine;

pub const MONEY_DP: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TotalsError {
    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,
    #[error("unit price cannot be negative")]
    NegativePrice,
    #[error("tax rate must be between 0 and 100, got {0}")]
    TaxRateOutOfRange(Decimal),
    #[error("discount cannot be negative")]
    NegativeDiscount,
    #[error("discount of {discount} exceeds the line amount of {sub_total}")]
    DiscountExceedsLine { discount: Decimal, sub_total: Decimal },
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub sub_total: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

pub fn compute_line(quantity: Decimal, unit_price: Decimal, tax_rate: Decimal, discount: Decimal) -> Result<LineAmounts, TotalsError> {
    if quantity <= Decimal::ZERO {
        return Err(TotalsError::NonPositiveQuantity);
    }
    if unit_price < Decimal::ZERO {
        return Err(TotalsError::NegativePrice);
    }
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE_HUNDRED {
        return Err(TotalsError::TaxRateOutOfRange(tax_rate));
    }
    if discount < Decimal::ZERO {
        return Err(TotalsError::NegativeDiscount);
    }

    let sub_total = round_money(quantity * unit_price);
    let tax_amount = round_money(sub_total * tax_rate / Decimal::ONE_HUNDRED);
    let discount = round_money(discount);
    // Discounts apply to the pre-tax amount.
    if discount > sub_total {
        return Err(TotalsError::DiscountExceedsLine { discount, sub_total });
    }

    Ok(LineAmounts {
        sub_total,
        tax_amount,
        total: sub_total + tax_amount - discount,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTotals {
    pub sub_total: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

impl DocumentTotals {
    pub fn from_lines(lines: &[DocumentLine]) -> Self {
        let mut totals = DocumentTotals::default();
        for line in lines {
            totals.sub_total += line.sub_total;
            totals.tax_amount += line.tax_amount;
            totals.discount_amount += line.discount;
        }
        totals.total_amount = totals.sub_total + totals.tax_amount - totals.discount_amount;
        totals
    }

    /// The amount that lands in income (or expense) accounts: everything but tax.
    pub fn net_amount(&self) -> Decimal {
        self.sub_total - self.discount_amount
    }

    pub fn is_consistent(&self) -> bool {
        self.total_amount == self.sub_total + self.tax_amount - self.discount_amount
    }
}
