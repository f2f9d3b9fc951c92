use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{text_enum, ParseEnumError};
use crate::totals::DocumentTotals;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: Uuid,
    pub sequence: u64,
    pub date: Date,
    pub description: String,
    pub reference: Option<String>,
    pub created_at: OffsetDateTime,
}

/// A priced line on an invoice or order. Amounts are computed once, when the
/// line is resolved, and stored alongside the inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLine {
    pub product_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_id: Option<Uuid>,
    pub tax_rate: Decimal,
    pub discount: Decimal,
    pub account_id: Option<Uuid>,
    pub sub_total: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

text_enum! {
    InvoiceKind {
        CustomerInvoice => "customer_invoice",
        VendorBill => "vendor_bill",
    }
}

text_enum! {
    InvoiceStatus {
        Draft => "draft",
        Posted => "posted",
        PartiallyPaid => "partially_paid",
        Paid => "paid",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvoiceError {
    #[error("invoice is {0}, payments need a posted invoice")]
    NotOpen(InvoiceStatus),
    #[error("payment amount must be positive")]
    NonPositiveAmount,
    #[error("payment of {amount} exceeds the outstanding balance of {balance}")]
    ExceedsBalance { amount: Decimal, balance: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub number: String,
    pub kind: InvoiceKind,
    pub contact_id: Uuid,
    pub invoice_date: Date,
    pub due_date: Date,
    pub reference: Option<String>,
    pub currency: String,
    /// Base-currency value of one unit of `currency`, fixed when the invoice is posted.
    #[serde(default = "unit_rate")]
    pub exchange_rate: Decimal,
    pub status: InvoiceStatus,
    pub lines: Vec<DocumentLine>,
    #[serde(flatten)]
    pub totals: DocumentTotals,
    pub paid_amount: Decimal,
    pub balance_amount: Decimal,
    pub journal_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
}

fn unit_rate() -> Decimal {
    Decimal::ONE
}

impl Invoice {
    pub fn is_open(&self) -> bool {
        matches!(self.status, InvoiceStatus::Posted | InvoiceStatus::PartiallyPaid)
    }

    pub fn is_overdue(&self, today: Date) -> bool {
        self.is_open() && self.due_date < today
    }

    /// Replaces the lines and recomputes totals and balance.
    pub fn set_lines(&mut self, lines: Vec<DocumentLine>) {
        self.totals = DocumentTotals::from_lines(&lines);
        self.lines = lines;
        self.balance_amount = self.totals.total_amount - self.paid_amount;
    }

    /// Checks that `amount` may be paid against this invoice without applying it.
    pub fn check_payment(&self, amount: Decimal) -> Result<(), InvoiceError> {
        if !self.is_open() {
            return Err(InvoiceError::NotOpen(self.status));
        }
        if amount <= Decimal::ZERO {
            return Err(InvoiceError::NonPositiveAmount);
        }
        if amount > self.balance_amount {
            return Err(InvoiceError::ExceedsBalance {
                amount,
                balance: self.balance_amount,
            });
        }
        Ok(())
    }

    pub fn apply_payment(&mut self, amount: Decimal) -> Result<(), InvoiceError> {
        self.check_payment(amount)?;
        self.paid_amount += amount;
        self.balance_amount = self.totals.total_amount - self.paid_amount;
        self.status = if self.balance_amount.is_zero() {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::PartiallyPaid
        };
        Ok(())
    }
}

text_enum! {
    PaymentKind {
        Inbound => "inbound",
        Outbound => "outbound",
    }
}

impl From<InvoiceKind> for PaymentKind {
    fn from(kind: InvoiceKind) -> Self {
        match kind {
            InvoiceKind::CustomerInvoice => PaymentKind::Inbound,
            InvoiceKind::VendorBill => PaymentKind::Outbound,
        }
    }
}

text_enum! {
    PaymentMethod {
        Cash => "cash",
        Bank => "bank",
        Upi => "upi",
        Cheque => "cheque",
        Card => "card",
    }
}

impl PaymentMethod {
    /// Cash payments settle through the cash account, everything else through the bank.
    pub fn is_cash(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub number: String,
    pub invoice_id: Uuid,
    pub contact_id: Uuid,
    pub kind: PaymentKind,
    pub date: Date,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub journal_id: Uuid,
    pub created_at: OffsetDateTime,
}

text_enum! {
    OrderKind {
        Sales => "sales",
        Purchase => "purchase",
    }
}

impl OrderKind {
    pub fn invoice_kind(&self) -> InvoiceKind {
        match self {
            OrderKind::Sales => InvoiceKind::CustomerInvoice,
            OrderKind::Purchase => InvoiceKind::VendorBill,
        }
    }
}

text_enum! {
    OrderStatus {
        Draft => "draft",
        Confirmed => "confirmed",
        Invoiced => "invoiced",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub number: String,
    pub kind: OrderKind,
    pub contact_id: Uuid,
    pub order_date: Date,
    pub expected_date: Option<Date>,
    pub status: OrderStatus,
    pub lines: Vec<DocumentLine>,
    #[serde(flatten)]
    pub totals: DocumentTotals,
    pub invoice_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::{date, datetime};

    fn posted_invoice(total: Decimal) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            number: "INV/2024/0001".to_string(),
            kind: InvoiceKind::CustomerInvoice,
            contact_id: Uuid::new_v4(),
            invoice_date: date!(2024 - 04 - 01),
            due_date: date!(2024 - 05 - 01),
            reference: None,
            currency: "INR".to_string(),
            exchange_rate: Decimal::ONE,
            status: InvoiceStatus::Posted,
            lines: Vec::new(),
            totals: DocumentTotals {
                sub_total: total,
                tax_amount: Decimal::ZERO,
                discount_amount: Decimal::ZERO,
                total_amount: total,
            },
            paid_amount: Decimal::ZERO,
            balance_amount: total,
            journal_id: None,
            order_id: None,
            notes: None,
            created_at: datetime!(2024-04-01 10:00 UTC),
        }
    }

    #[test]
    fn partial_then_full_payment() {
        let mut invoice = posted_invoice(dec!(1180));
        invoice.apply_payment(dec!(180)).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(invoice.balance_amount, dec!(1000));

        invoice.apply_payment(dec!(1000)).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.balance_amount, Decimal::ZERO);
        assert_eq!(invoice.balance_amount, invoice.totals.total_amount - invoice.paid_amount);
    }

    #[test]
    fn overpayment_is_rejected() {
        let mut invoice = posted_invoice(dec!(500));
        let err = invoice.apply_payment(dec!(500.01)).unwrap_err();
        assert_eq!(
            err,
            InvoiceError::ExceedsBalance {
                amount: dec!(500.01),
                balance: dec!(500)
            }
        );
        assert_eq!(invoice.paid_amount, Decimal::ZERO);
    }

    #[test]
    fn draft_invoices_take_no_payments() {
        let mut invoice = posted_invoice(dec!(500));
        invoice.status = InvoiceStatus::Draft;
        assert_eq!(
            invoice.apply_payment(dec!(1)),
            Err(InvoiceError::NotOpen(InvoiceStatus::Draft))
        );
        assert_eq!(invoice.check_payment(dec!(0)), Err(InvoiceError::NotOpen(InvoiceStatus::Draft)));
    }

    #[test]
    fn overdue_only_when_open() {
        let mut invoice = posted_invoice(dec!(10));
        assert!(invoice.is_overdue(date!(2024 - 05 - 02)));
        assert!(!invoice.is_overdue(date!(2024 - 05 - 01)));
        invoice.apply_payment(dec!(10)).unwrap();
        assert!(!invoice.is_overdue(date!(2024 - 06 - 01)));
    }
}
