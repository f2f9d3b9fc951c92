//! Financial statements computed from ledger balances.

use std::fmt::Display;

use prettytable::{row, Table};
use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;
use uuid::Uuid;

use crate::{
    format::format_inr,
    models::{Account, AccountType},
    storage::{StorageBackend, StorageError},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLine {
    pub account_id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSection {
    pub lines: Vec<ReportLine>,
    pub total: Decimal,
}

impl ReportSection {
    fn push(&mut self, line: ReportLine) {
        self.total += line.balance;
        self.lines.push(line);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialBalanceLine {
    pub account_id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub debit: Decimal,
    pub credit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialBalance {
    pub as_of: Date,
    pub lines: Vec<TrialBalanceLine>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
}

impl TrialBalance {
    pub fn is_balanced(&self) -> bool {
        self.total_debit == self.total_credit
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSheet {
    pub as_of: Date,
    pub assets: ReportSection,
    pub liabilities: ReportSection,
    pub equity: ReportSection,
    /// Income minus expenses to date, not yet closed into retained earnings.
    pub current_earnings: Decimal,
    pub total_liabilities_and_equity: Decimal,
}

impl BalanceSheet {
    pub fn is_balanced(&self) -> bool {
        self.assets.total == self.total_liabilities_and_equity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitAndLoss {
    pub from: Date,
    pub to: Date,
    pub income: ReportSection,
    pub expenses: ReportSection,
    pub net_profit: Decimal,
}

fn sorted_accounts(storage: &dyn StorageBackend) -> Result<Vec<Account>, StorageError> {
    let mut accounts = storage.list_accounts()?;
    accounts.sort_by(|a, b| a.code.cmp(&b.code));
    Ok(accounts)
}

fn line(account: &Account, balance: Decimal) -> ReportLine {
    ReportLine {
        account_id: account.id,
        code: account.code.clone(),
        name: account.name.clone(),
        account_type: account.account_type,
        balance,
    }
}

pub fn trial_balance(storage: &dyn StorageBackend, as_of: Date) -> Result<TrialBalance, StorageError> {
    let mut result = TrialBalance {
        as_of,
        lines: Vec::new(),
        total_debit: Decimal::ZERO,
        total_credit: Decimal::ZERO,
    };

    for account in sorted_accounts(storage)? {
        let balance = storage.get_balance(account.id, as_of)?;
        if balance.is_zero() {
            continue;
        }
        // A natural balance on the wrong side (e.g. an overdrawn bank) moves columns.
        let debit_positive = account.account_type.natural_amount(balance);
        let (debit, credit) = if debit_positive >= Decimal::ZERO {
            (debit_positive, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -debit_positive)
        };
        result.total_debit += debit;
        result.total_credit += credit;
        result.lines.push(TrialBalanceLine {
            account_id: account.id,
            code: account.code.clone(),
            name: account.name.clone(),
            account_type: account.account_type,
            debit,
            credit,
        });
    }

    Ok(result)
}

pub fn balance_sheet(storage: &dyn StorageBackend, as_of: Date) -> Result<BalanceSheet, StorageError> {
    let mut assets = ReportSection::default();
    let mut liabilities = ReportSection::default();
    let mut equity = ReportSection::default();
    let mut current_earnings = Decimal::ZERO;

    for account in sorted_accounts(storage)? {
        let balance = storage.get_balance(account.id, as_of)?;
        if balance.is_zero() {
            continue;
        }
        match account.account_type {
            AccountType::Asset => assets.push(line(&account, balance)),
            AccountType::Liability => liabilities.push(line(&account, balance)),
            AccountType::Equity => equity.push(line(&account, balance)),
            AccountType::Income => current_earnings += balance,
            AccountType::Expense => current_earnings -= balance,
        }
    }

    let total_liabilities_and_equity = liabilities.total + equity.total + current_earnings;
    Ok(BalanceSheet {
        as_of,
        assets,
        liabilities,
        equity,
        current_earnings,
        total_liabilities_and_equity,
    })
}

/// Income and expense movement for entries dated within `from..=to`.
pub fn profit_and_loss(storage: &dyn StorageBackend, from: Date, to: Date) -> Result<ProfitAndLoss, StorageError> {
    let opening = from.previous_day();
    let mut income = ReportSection::default();
    let mut expenses = ReportSection::default();

    for account in sorted_accounts(storage)? {
        if !matches!(account.account_type, AccountType::Income | AccountType::Expense) {
            continue;
        }
        let closing = storage.get_balance(account.id, to)?;
        let before = match opening {
            Some(day) => storage.get_balance(account.id, day)?,
            None => Decimal::ZERO,
        };
        let change = closing - before;
        if change.is_zero() {
            continue;
        }
        match account.account_type {
            AccountType::Income => income.push(line(&account, change)),
            _ => expenses.push(line(&account, change)),
        }
    }

    let net_profit = income.total - expenses.total;
    Ok(ProfitAndLoss {
        from,
        to,
        income,
        expenses,
        net_profit,
    })
}

fn section_rows(table: &mut Table, title: &str, section: &ReportSection) {
    table.add_row(row![b->title, "", ""]);
    for l in &section.lines {
        table.add_row(row![l.code, l.name, r->format_inr(l.balance)]);
    }
    table.add_row(row!["", i->format!("Total {}", title), r->format_inr(section.total)]);
}

impl Display for TrialBalance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Code", "Account", "Debit", "Credit"]);
        table.add_empty_row();
        for l in &self.lines {
            let debit = if l.debit.is_zero() { String::new() } else { format_inr(l.debit) };
            let credit = if l.credit.is_zero() { String::new() } else { format_inr(l.credit) };
            table.add_row(row![l.code, l.name, r->debit, r->credit]);
        }
        table.add_row(row!["", b->"Total", r->format_inr(self.total_debit), r->format_inr(self.total_credit)]);
        write!(f, "\nTrial balance as of {}\n{}\n", self.as_of, table)
    }
}

impl Display for BalanceSheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        section_rows(&mut table, "Assets", &self.assets);
        table.add_empty_row();
        section_rows(&mut table, "Liabilities", &self.liabilities);
        table.add_empty_row();
        section_rows(&mut table, "Equity", &self.equity);
        table.add_row(row!["", "Current earnings", r->format_inr(self.current_earnings)]);
        table.add_row(row!["", b->"Liabilities + equity", r->format_inr(self.total_liabilities_and_equity)]);
        write!(f, "\nBalance sheet as of {}\n{}\n", self.as_of, table)
    }
}

impl Display for ProfitAndLoss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        section_rows(&mut table, "Income", &self.income);
        table.add_empty_row();
        section_rows(&mut table, "Expenses", &self.expenses);
        table.add_row(row!["", b->"Net profit", r->format_inr(self.net_profit)]);
        write!(f, "\nProfit and loss {} to {}\n{}\n", self.from, self.to, table)
    }
}
