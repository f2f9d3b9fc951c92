//! The books: business rules on top of a [`StorageBackend`].
//!
//! Reads go straight to storage. Every mutating operation takes the write
//! lock and runs inside one storage transaction, so a failed posting leaves
//! no half-written journal, invoice or sequence number behind.

use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use shiv_core::{storage::InvoiceFilter, totals::round_money, Account, CompanySettings, StorageBackend};

use crate::error::{BooksError, BooksResult};

mod accounts;
mod documents;
mod masters;
mod payments;
mod reports;

pub use accounts::AccountStatement;
pub use reports::Dashboard;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;

/// `skip`/`limit` query parameters for list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl Pagination {
    pub fn new(skip: usize, limit: usize) -> Self {
        Self {
            skip: Some(skip),
            limit: Some(limit),
        }
    }

    pub fn skip(&self) -> usize {
        self.skip.unwrap_or(0)
    }

    /// Clamped to `1..=MAX_LIMIT`, `DEFAULT_LIMIT` when absent.
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len();
        let (skip, limit) = (self.skip(), self.limit());
        Page {
            data: items.into_iter().skip(skip).take(limit).collect(),
            total,
            skip,
            limit,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
}

pub struct Books {
    storage: Arc<dyn StorageBackend>,
    write_lock: Mutex<()>,
}

impl Books {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }

    /// Runs `op` under the write lock inside a storage transaction.
    pub(crate) fn write<T>(&self, op: &'static str, f: impl FnOnce(&dyn StorageBackend) -> BooksResult<T>) -> BooksResult<T> {
        let _guard = self.write_lock.lock().unwrap();
        let storage = self.storage.as_ref();
        let tx_id = storage.begin_transaction()?;

        match f(storage) {
            Ok(value) => {
                storage.commit_transaction(tx_id)?;
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(op, tx_id, error = %e, "Rolling back");
                if let Err(rb) = storage.rollback_transaction(tx_id) {
                    tracing::error!(op, tx_id, error = %rb, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    pub fn settings(&self) -> BooksResult<CompanySettings> {
        load_settings(self.storage())
    }

    pub fn update_settings(&self, settings: CompanySettings) -> BooksResult<CompanySettings> {
        self.write("update_settings", |storage| {
            let name = required(&settings.company_name, "company name")?;
            if let Some(gstin) = settings.gstin.as_deref() {
                check_gstin(gstin)?;
            }
            check_currency_code(&settings.base_currency)?;
            for (field, prefix) in [
                ("invoice prefix", &settings.invoice_prefix),
                ("bill prefix", &settings.bill_prefix),
                ("payment prefix", &settings.payment_prefix),
                ("sales order prefix", &settings.sales_order_prefix),
                ("purchase order prefix", &settings.purchase_order_prefix),
            ] {
                if prefix.trim().is_empty() || prefix.contains('/') {
                    return Err(BooksError::validation(format!("{field} must be non-empty and must not contain '/'")));
                }
            }

            let posting = &settings.posting;
            for code in [
                &posting.receivable,
                &posting.payable,
                &posting.sales,
                &posting.purchases,
                &posting.tax_output,
                &posting.tax_input,
                &posting.cash,
                &posting.bank,
            ] {
                posting_account(storage, code)?;
            }

            let previous = load_settings(storage)?;
            if settings.base_currency != previous.base_currency {
                let booked = storage.list_invoices(&InvoiceFilter::default())?.iter().any(|i| i.journal_id.is_some());
                if booked {
                    return Err(BooksError::conflict("the base currency cannot change once invoices are posted"));
                }
                flag_base_currency(storage, &settings.base_currency)?;
            }

            let settings = CompanySettings {
                company_name: name,
                ..settings
            };
            storage.save_settings(&settings)?;
            tracing::info!(company = %settings.company_name, "Company settings updated");
            Ok(settings)
        })
    }
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

pub(crate) fn load_settings(storage: &dyn StorageBackend) -> BooksResult<CompanySettings> {
    Ok(storage.get_settings()?.unwrap_or_default())
}

/// Looks up a posting account by code. A missing account is a setup problem,
/// reported as a validation error naming the code.
pub(crate) fn posting_account(storage: &dyn StorageBackend, code: &str) -> BooksResult<Account> {
    storage
        .find_account_by_code(code)?
        .ok_or_else(|| BooksError::validation(format!("posting account {code} is not in the chart of accounts")))
}

/// Moves the base flag onto `code`, which must be configured at a rate of 1.
fn flag_base_currency(storage: &dyn StorageBackend, code: &str) -> BooksResult<()> {
    let currencies = storage.list_currencies()?;
    match currencies.iter().find(|c| c.code == code) {
        Some(c) if c.rate_to_base != Decimal::ONE => {
            return Err(BooksError::validation(format!("{code} must have a rate of 1 to become the base currency")));
        }
        Some(_) => {}
        None => return Err(BooksError::validation(format!("currency {code} is not configured"))),
    }
    for mut currency in currencies {
        let is_base = currency.code == code;
        if currency.is_base != is_base {
            currency.is_base = is_base;
            storage.upsert_currency(&currency)?;
        }
    }
    Ok(())
}

/// Value of one unit of `code` in the base currency.
pub(crate) fn exchange_rate(storage: &dyn StorageBackend, settings: &CompanySettings, code: &str) -> BooksResult<Decimal> {
    if code == settings.base_currency {
        return Ok(Decimal::ONE);
    }
    storage
        .list_currencies()?
        .into_iter()
        .find(|c| c.code == code)
        .map(|c| c.rate_to_base)
        .ok_or_else(|| BooksError::validation(format!("currency {code} is not configured")))
}

pub(crate) fn to_base(amount: Decimal, rate: Decimal) -> Decimal {
    round_money(amount * rate)
}

/// `{prefix}/{year}/{seq:04}`, numbered per prefix and year.
pub(crate) fn next_number(storage: &dyn StorageBackend, prefix: &str, year: i32) -> BooksResult<String> {
    let seq = storage.next_sequence(&format!("{prefix}/{year}"))?;
    Ok(format!("{prefix}/{year}/{seq:04}"))
}

pub(crate) fn required(value: &str, field: &str) -> BooksResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BooksError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trims and drops empty strings.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub(crate) fn check_gstin(gstin: &str) -> BooksResult<()> {
    if gstin.len() != 15 || !gstin.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(BooksError::validation(format!("GSTIN {gstin} must be 15 letters or digits")));
    }
    Ok(())
}

pub(crate) fn check_currency_code(code: &str) -> BooksResult<()> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(BooksError::validation(format!("currency code {code} must be three uppercase letters")));
    }
    Ok(())
}
