use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use super::{AccountType, Address, ContactKind, ProductKind, TaxScope};
use super::read::{InvoiceKind, OrderKind, PaymentMethod};

#[derive(Debug, Clone, PartialEq)]
pub struct CreateJournalCommand {
    pub date: Date,
    pub description: String,
    pub reference: Option<String>,
    pub ledger_entries: Vec<LedgerEntryCommand>,
}

impl CreateJournalCommand {
    pub fn total_debits(&self) -> Decimal {
        self.ledger_entries
            .iter()
            .filter_map(|e| match e {
                LedgerEntryCommand::Debit { amount, .. } => Some(*amount),
                LedgerEntryCommand::Credit { .. } => None,
            })
            .sum()
    }

    pub fn total_credits(&self) -> Decimal {
        self.ledger_entries
            .iter()
            .filter_map(|e| match e {
                LedgerEntryCommand::Credit { amount, .. } => Some(*amount),
                LedgerEntryCommand::Debit { .. } => None,
            })
            .sum()
    }

    pub fn is_balanced(&self) -> bool {
        !self.ledger_entries.is_empty() && self.total_debits() == self.total_credits()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEntryCommand {
    Debit { account_id: Uuid, amount: Decimal },
    Credit { account_id: Uuid, amount: Decimal },
}

impl LedgerEntryCommand {
    pub fn account_id(&self) -> Uuid {
        match self {
            LedgerEntryCommand::Debit { account_id, .. } | LedgerEntryCommand::Credit { account_id, .. } => *account_id,
        }
    }

    /// Debits positive, credits negative.
    pub fn debit_positive(&self) -> Decimal {
        match self {
            LedgerEntryCommand::Debit { amount, .. } => *amount,
            LedgerEntryCommand::Credit { amount, .. } => -*amount,
        }
    }

    pub fn from_debit_positive(account_id: Uuid, amount: Decimal) -> Self {
        if amount.is_sign_negative() {
            LedgerEntryCommand::Credit { account_id, amount: -amount }
        } else {
            LedgerEntryCommand::Debit { account_id, amount }
        }
    }

    /// The same amount on the opposite side.
    pub fn reversed(&self) -> Self {
        match self {
            LedgerEntryCommand::Debit { account_id, amount } => LedgerEntryCommand::Credit { account_id: *account_id, amount: *amount },
            LedgerEntryCommand::Credit { account_id, amount } => LedgerEntryCommand::Debit { account_id: *account_id, amount: *amount },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInput {
    pub name: String,
    pub kind: ContactKind,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub gstin: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub kind: ProductKind,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub hsn_code: Option<String>,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub sales_price: Decimal,
    #[serde(default)]
    pub purchase_price: Decimal,
    #[serde(default)]
    pub sales_tax_id: Option<Uuid>,
    #[serde(default)]
    pub purchase_tax_id: Option<Uuid>,
    #[serde(default)]
    pub income_account_id: Option<Uuid>,
    #[serde(default)]
    pub expense_account_id: Option<Uuid>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_unit() -> String {
    "unit".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxInput {
    pub name: String,
    pub rate: Decimal,
    #[serde(default = "default_scope")]
    pub scope: TaxScope,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_scope() -> TaxScope {
    TaxScope::Both
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInput {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A requested document line. Anything left out is filled in from the product.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineInput {
    #[serde(default)]
    pub product_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub tax_id: Option<Uuid>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub account_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceInput {
    pub kind: InvoiceKind,
    pub contact_id: Uuid,
    pub invoice_date: Date,
    #[serde(default)]
    pub due_date: Option<Date>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    pub lines: Vec<LineInput>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInput {
    pub invoice_id: Uuid,
    pub date: Date,
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInput {
    pub kind: OrderKind,
    pub contact_id: Uuid,
    pub order_date: Date,
    #[serde(default)]
    pub expected_date: Option<Date>,
    pub lines: Vec<LineInput>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::date;

    #[test]
    fn journal_balance_check() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut cmd = CreateJournalCommand {
            date: date!(2024 - 01 - 01),
            description: "Capital".to_string(),
            reference: None,
            ledger_entries: vec![
                LedgerEntryCommand::Debit { account_id: a, amount: dec!(100) },
                LedgerEntryCommand::Credit { account_id: b, amount: dec!(100) },
            ],
        };
        assert!(cmd.is_balanced());

        cmd.ledger_entries.push(LedgerEntryCommand::Credit { account_id: b, amount: dec!(0.01) });
        assert!(!cmd.is_balanced());
    }

    #[test]
    fn line_input_accepts_minimal_json() {
        let line: LineInput = serde_json::from_str(r#"{"quantity": "2"}"#).unwrap();
        assert_eq!(line.quantity, dec!(2));
        assert!(line.unit_price.is_none());
    }
}
