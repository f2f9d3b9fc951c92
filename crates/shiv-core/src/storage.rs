use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use crate::models::{
    read::{Invoice, InvoiceKind, InvoiceStatus, JournalEntry, Order, OrderKind, OrderStatus, Payment},
    write::{CreateJournalCommand, LedgerEntryCommand},
    Account, CompanySettings, Contact, ContactKind, Currency, Product, StatementTxn, Tax,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("duplicate {0}")]
    Duplicate(String),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("schema already exists")]
    SchemaExists,
    #[error("no active transaction")]
    NoActiveTransaction,
}

impl StorageError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        StorageError::NotFound { kind, id: id.to_string() }
    }
}

pub type TransactionId = u64;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContactFilter {
    pub kind: Option<ContactKind>,
    pub search: Option<String>,
}

impl ContactFilter {
    pub fn matches(&self, contact: &Contact) -> bool {
        if let Some(kind) = self.kind {
            if !contact.kind.matches(kind) {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                contact.name.to_lowercase().contains(&needle)
                    || contact.email.as_deref().is_some_and(|e| e.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub active: Option<bool>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if self.active.is_some_and(|a| a != product.active) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                product.name.to_lowercase().contains(&needle)
                    || product.sku.as_deref().is_some_and(|s| s.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InvoiceFilter {
    pub kind: Option<InvoiceKind>,
    pub status: Option<InvoiceStatus>,
    pub contact_id: Option<Uuid>,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.kind.map_or(true, |k| k == invoice.kind)
            && self.status.map_or(true, |s| s == invoice.status)
            && self.contact_id.map_or(true, |c| c == invoice.contact_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrderFilter {
    pub kind: Option<OrderKind>,
    pub status: Option<OrderStatus>,
    pub contact_id: Option<Uuid>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.kind.map_or(true, |k| k == order.kind)
            && self.status.map_or(true, |s| s == order.status)
            && self.contact_id.map_or(true, |c| c == order.contact_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentFilter {
    pub invoice_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        self.invoice_id.map_or(true, |i| i == payment.invoice_id)
            && self.contact_id.map_or(true, |c| c == payment.contact_id)
    }
}

/// Persistence for every record the books keep. Lists come back in a stable
/// order: master data by name or code, documents by date then number.
pub trait StorageBackend: Send + Sync {
    // Contacts
    fn create_contact(&self, contact: &Contact) -> Result<(), StorageError>;
    fn get_contact(&self, id: Uuid) -> Result<Contact, StorageError>;
    fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>, StorageError>;
    fn update_contact(&self, contact: &Contact) -> Result<(), StorageError>;
    fn delete_contact(&self, id: Uuid) -> Result<(), StorageError>;

    // Products
    fn create_product(&self, product: &Product) -> Result<(), StorageError>;
    fn get_product(&self, id: Uuid) -> Result<Product, StorageError>;
    fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StorageError>;
    fn update_product(&self, product: &Product) -> Result<(), StorageError>;
    fn delete_product(&self, id: Uuid) -> Result<(), StorageError>;

    // Taxes and currencies
    fn create_tax(&self, tax: &Tax) -> Result<(), StorageError>;
    fn get_tax(&self, id: Uuid) -> Result<Tax, StorageError>;
    fn list_taxes(&self) -> Result<Vec<Tax>, StorageError>;
    fn update_tax(&self, tax: &Tax) -> Result<(), StorageError>;
    fn delete_tax(&self, id: Uuid) -> Result<(), StorageError>;
    fn upsert_currency(&self, currency: &Currency) -> Result<(), StorageError>;
    fn list_currencies(&self) -> Result<Vec<Currency>, StorageError>;

    // Chart of accounts
    fn create_account(&self, account: &Account) -> Result<(), StorageError>;
    fn get_account(&self, id: Uuid) -> Result<Account, StorageError>;
    fn find_account_by_code(&self, code: &str) -> Result<Option<Account>, StorageError>;
    fn list_accounts(&self) -> Result<Vec<Account>, StorageError>;
    fn update_account(&self, account: &Account) -> Result<(), StorageError>;
    fn delete_account(&self, id: Uuid) -> Result<(), StorageError>;
    fn account_has_entries(&self, id: Uuid) -> Result<bool, StorageError>;

    // Ledger
    fn create_journal(&self, command: &CreateJournalCommand) -> Result<Uuid, StorageError>;
    fn get_journal(&self, id: Uuid) -> Result<JournalEntry, StorageError>;
    /// The ledger lines written for a journal, in the order they were written.
    fn get_journal_entries(&self, id: Uuid) -> Result<Vec<LedgerEntryCommand>, StorageError>;
    /// Natural-sign balance of the account including every entry dated on or before `date`.
    fn get_balance(&self, account_id: Uuid, date: Date) -> Result<Decimal, StorageError>;
    /// Entries dated within `from..=to`, each carrying the running balance.
    fn get_statement(&self, account_id: Uuid, from: Date, to: Date) -> Result<Vec<StatementTxn>, StorageError>;

    // Documents
    fn save_invoice(&self, invoice: &Invoice) -> Result<(), StorageError>;
    fn get_invoice(&self, id: Uuid) -> Result<Invoice, StorageError>;
    fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StorageError>;
    fn delete_invoice(&self, id: Uuid) -> Result<(), StorageError>;
    fn save_order(&self, order: &Order) -> Result<(), StorageError>;
    fn get_order(&self, id: Uuid) -> Result<Order, StorageError>;
    fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StorageError>;
    fn delete_order(&self, id: Uuid) -> Result<(), StorageError>;
    fn create_payment(&self, payment: &Payment) -> Result<(), StorageError>;
    fn get_payment(&self, id: Uuid) -> Result<Payment, StorageError>;
    fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StorageError>;

    // Settings and numbering
    fn get_settings(&self) -> Result<Option<CompanySettings>, StorageError>;
    fn save_settings(&self, settings: &CompanySettings) -> Result<(), StorageError>;
    fn next_sequence(&self, name: &str) -> Result<u64, StorageError>;

    fn begin_transaction(&self) -> Result<TransactionId, StorageError>;
    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError>;
    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError>;
}
