use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub mod read;
pub mod write;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a fieldless enum stored as text, with serde names matching the
/// storage representation.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use text_enum;

text_enum! {
    /// Top-level classification of a ledger account.
    AccountType {
        Asset => "asset",
        Liability => "liability",
        Equity => "equity",
        Income => "income",
        Expense => "expense",
    }
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Income,
        AccountType::Expense,
    ];

    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }

    /// Converts a raw debit-positive amount into this account's natural balance direction.
    pub fn natural_amount(&self, debit_positive: Decimal) -> Decimal {
        if self.is_debit_normal() {
            debit_positive
        } else {
            -debit_positive
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub parent_id: Option<Uuid>,
    pub description: Option<String>,
    pub is_system: bool,
    pub active: bool,
}

text_enum! {
    ContactKind {
        Customer => "customer",
        Vendor => "vendor",
        Both => "both",
    }
}

impl ContactKind {
    /// Whether a contact of this kind shows up when filtering for `wanted`.
    pub fn matches(&self, wanted: ContactKind) -> bool {
        *self == wanted || *self == ContactKind::Both || wanted == ContactKind::Both
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "India".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub kind: ContactKind,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gstin: Option<String>,
    pub address: Option<Address>,
    pub created_at: OffsetDateTime,
}

text_enum! {
    ProductKind {
        Goods => "goods",
        Service => "service",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub kind: ProductKind,
    pub sku: Option<String>,
    pub hsn_code: Option<String>,
    pub unit: String,
    pub sales_price: Decimal,
    pub purchase_price: Decimal,
    pub sales_tax_id: Option<Uuid>,
    pub purchase_tax_id: Option<Uuid>,
    pub income_account_id: Option<Uuid>,
    pub expense_account_id: Option<Uuid>,
    pub active: bool,
}

text_enum! {
    TaxScope {
        Sales => "sales",
        Purchase => "purchase",
        Both => "both",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tax {
    pub id: Uuid,
    pub name: String,
    /// Percentage, e.g. `18` for 18% GST.
    pub rate: Decimal,
    pub scope: TaxScope,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub code: String,
    pub name: String,
    pub symbol: String,
    pub rate_to_base: Decimal,
    pub is_base: bool,
}

/// Account codes the books post to when a document carries no override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingAccounts {
    pub receivable: String,
    pub payable: String,
    pub sales: String,
    pub purchases: String,
    pub tax_output: String,
    pub tax_input: String,
    pub cash: String,
    pub bank: String,
}

impl Default for PostingAccounts {
    fn default() -> Self {
        Self {
            receivable: "1200".to_string(),
            payable: "2100".to_string(),
            sales: "4100".to_string(),
            purchases: "5100".to_string(),
            tax_output: "2200".to_string(),
            tax_input: "1300".to_string(),
            cash: "1100".to_string(),
            bank: "1110".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanySettings {
    pub company_name: String,
    pub gstin: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub base_currency: String,
    pub invoice_prefix: String,
    pub bill_prefix: String,
    pub payment_prefix: String,
    pub sales_order_prefix: String,
    pub purchase_order_prefix: String,
    pub payment_terms_days: u16,
    pub posting: PostingAccounts,
}

impl Default for CompanySettings {
    fn default() -> Self {
        Self {
            company_name: "Shiv Accounts".to_string(),
            gstin: None,
            email: None,
            phone: None,
            address: None,
            base_currency: "INR".to_string(),
            invoice_prefix: "INV".to_string(),
            bill_prefix: "BILL".to_string(),
            payment_prefix: "PAY".to_string(),
            sales_order_prefix: "SO".to_string(),
            purchase_order_prefix: "PO".to_string(),
            payment_terms_days: 30,
            posting: PostingAccounts::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementTxn {
    pub journal_id: Uuid,
    pub date: time::Date,
    pub description: String,
    pub amount: Decimal,
    pub balance: Decimal,
}
