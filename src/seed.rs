//! Default chart of accounts, GST rates, currencies and company settings.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use shiv_core::{Account, AccountType, CompanySettings, Currency, StorageBackend, Tax, TaxScope};

use crate::{books::Books, error::BooksResult};

use AccountType::{Asset, Equity, Expense, Income, Liability};

struct SeedAccount {
    code: &'static str,
    name: &'static str,
    account_type: AccountType,
    parent: Option<&'static str>,
    system: bool,
}

const fn acct(code: &'static str, name: &'static str, account_type: AccountType, parent: Option<&'static str>, system: bool) -> SeedAccount {
    SeedAccount {
        code,
        name,
        account_type,
        parent,
        system,
    }
}

/// Parents come before their children.
const DEFAULT_ACCOUNTS: &[SeedAccount] = &[
    acct("1000", "Current Assets", Asset, None, true),
    acct("1100", "Cash", Asset, Some("1000"), true),
    acct("1110", "Bank", Asset, Some("1000"), true),
    acct("1200", "Accounts Receivable", Asset, Some("1000"), true),
    acct("1300", "GST Input Credit", Asset, Some("1000"), true),
    acct("1400", "Inventory", Asset, Some("1000"), false),
    acct("1500", "Fixed Assets", Asset, None, false),
    acct("2000", "Current Liabilities", Liability, None, true),
    acct("2100", "Accounts Payable", Liability, Some("2000"), true),
    acct("2200", "GST Output Payable", Liability, Some("2000"), true),
    acct("3000", "Equity", Equity, None, true),
    acct("3100", "Owner's Capital", Equity, Some("3000"), false),
    acct("3200", "Retained Earnings", Equity, Some("3000"), true),
    acct("4000", "Income", Income, None, true),
    acct("4100", "Sales", Income, Some("4000"), true),
    acct("4200", "Service Revenue", Income, Some("4000"), false),
    acct("4900", "Other Income", Income, Some("4000"), false),
    acct("5000", "Expenses", Expense, None, true),
    acct("5100", "Purchases", Expense, Some("5000"), true),
    acct("5200", "Rent", Expense, Some("5000"), false),
    acct("5300", "Salaries", Expense, Some("5000"), false),
    acct("5400", "Utilities", Expense, Some("5000"), false),
    acct("5900", "Bank Charges", Expense, Some("5000"), false),
];

const GST_RATES: [u32; 5] = [0, 5, 12, 18, 28];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub accounts: usize,
    pub taxes: usize,
    pub currencies: usize,
    pub settings: bool,
}

impl std::fmt::Display for SeedSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} accounts, {} taxes, {} currencies{}",
            self.accounts,
            self.taxes,
            self.currencies,
            if self.settings { ", company settings" } else { "" }
        )
    }
}

fn seed_accounts(storage: &dyn StorageBackend) -> BooksResult<usize> {
    let mut ids: HashMap<&str, Uuid> = HashMap::new();
    let mut inserted = 0;
    for seed in DEFAULT_ACCOUNTS {
        if let Some(existing) = storage.find_account_by_code(seed.code)? {
            ids.insert(seed.code, existing.id);
            continue;
        }
        let account = Account {
            id: Uuid::new_v4(),
            code: seed.code.to_string(),
            name: seed.name.to_string(),
            account_type: seed.account_type,
            parent_id: seed.parent.and_then(|p| ids.get(p).copied()),
            description: None,
            is_system: seed.system,
            active: true,
        };
        storage.create_account(&account)?;
        ids.insert(seed.code, account.id);
        inserted += 1;
    }
    Ok(inserted)
}

fn seed_taxes(storage: &dyn StorageBackend) -> BooksResult<usize> {
    let existing = storage.list_taxes()?;
    let mut inserted = 0;
    for rate in GST_RATES {
        let name = format!("GST {rate}%");
        if existing.iter().any(|t| t.name == name) {
            continue;
        }
        storage.create_tax(&Tax {
            id: Uuid::new_v4(),
            name,
            rate: Decimal::from(rate),
            scope: TaxScope::Both,
            active: true,
        })?;
        inserted += 1;
    }
    Ok(inserted)
}

fn seed_currencies(storage: &dyn StorageBackend) -> BooksResult<usize> {
    let existing = storage.list_currencies()?;
    let defaults = [
        ("INR", "Indian Rupee", "₹", Decimal::ONE, true),
        ("USD", "US Dollar", "$", Decimal::new(8300, 2), false),
        ("EUR", "Euro", "€", Decimal::new(9000, 2), false),
    ];
    let mut inserted = 0;
    for (code, name, symbol, rate_to_base, is_base) in defaults {
        if existing.iter().any(|c| c.code == code) {
            continue;
        }
        // Keep whatever base an operator already chose.
        let is_base = is_base && !existing.iter().any(|c| c.is_base);
        storage.upsert_currency(&Currency {
            code: code.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            rate_to_base,
            is_base,
        })?;
        inserted += 1;
    }
    Ok(inserted)
}

/// Inserts the defaults that are missing. Running it twice adds nothing.
pub fn seed(books: &Books) -> BooksResult<SeedSummary> {
    let summary = books.write("seed", |storage| {
        let settings = if storage.get_settings()?.is_none() {
            storage.save_settings(&CompanySettings::default())?;
            true
        } else {
            false
        };
        Ok(SeedSummary {
            accounts: seed_accounts(storage)?,
            taxes: seed_taxes(storage)?,
            currencies: seed_currencies(storage)?,
            settings,
        })
    })?;
    tracing::info!(
        accounts = summary.accounts,
        taxes = summary.taxes,
        currencies = summary.currencies,
        settings = summary.settings,
        "Seed complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chart_is_a_valid_tree() {
        let books = Books::new(std::sync::Arc::new(crate::storage::InMemoryStorage::new()));
        seed(&books).unwrap();
        let accounts = books.list_accounts().unwrap();
        assert_eq!(accounts.len(), DEFAULT_ACCOUNTS.len());

        let tree = books.account_tree().unwrap();
        let mut ids = Vec::new();
        for node in &tree {
            node.ids(&mut ids);
        }
        assert_eq!(ids.len(), accounts.len());
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn parents_share_their_childrens_type() {
        for seed in DEFAULT_ACCOUNTS {
            if let Some(parent) = seed.parent {
                let parent = DEFAULT_ACCOUNTS.iter().find(|a| a.code == parent).unwrap();
                assert_eq!(parent.account_type, seed.account_type, "{}", seed.code);
            }
        }
    }

    #[test]
    fn seeding_twice_adds_nothing() {
        let books = Books::new(std::sync::Arc::new(crate::storage::InMemoryStorage::new()));
        let first = seed(&books).unwrap();
        assert_eq!(first.taxes, 5);
        assert_eq!(first.currencies, 3);
        assert!(first.settings);

        assert_eq!(seed(&books).unwrap(), SeedSummary::default());
    }
}
