//! Core types and traits for Shiv Accounts storage backends.
//!
//! This crate provides the `StorageBackend` trait and all associated types,
//! along with the pure bookkeeping computations shared by every backend:
//! document totals, the chart-of-accounts tree and financial reports.

pub mod coa;
pub mod format;
pub mod models;
pub mod reports;
pub mod storage;
pub mod totals;

// Re-export key types at crate root for convenience
pub use models::{Account, AccountType, Address, CompanySettings, Contact, ContactKind, Currency, PostingAccounts, Product, ProductKind, StatementTxn, Tax, TaxScope};
pub use models::read::{DocumentLine, Invoice, InvoiceKind, InvoiceStatus, JournalEntry, Order, OrderKind, OrderStatus, Payment, PaymentKind, PaymentMethod};
pub use models::write::{CreateJournalCommand, LedgerEntryCommand};
pub use storage::{StorageBackend, StorageError, TransactionId};
pub use totals::DocumentTotals;
