use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

use shiv_core::{
    format::first_of_month,
    reports::{self, BalanceSheet, ProfitAndLoss, TrialBalance},
    storage::InvoiceFilter,
    Invoice, InvoiceKind, InvoiceStatus,
};

use super::{load_settings, to_base, Books};
use crate::error::{BooksError, BooksResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub as_of: Date,
    pub receivable_outstanding: Decimal,
    pub payable_outstanding: Decimal,
    pub overdue_invoices: usize,
    pub overdue_bills: usize,
    /// Posted sales, net of tax, dated from the first of the month to `as_of`.
    pub month_sales: Decimal,
    pub month_purchases: Decimal,
    pub cash_and_bank: Decimal,
}

fn counts_as_booked(invoice: &Invoice) -> bool {
    !matches!(invoice.status, InvoiceStatus::Draft | InvoiceStatus::Cancelled)
}

impl Books {
    pub fn trial_balance(&self, as_of: Date) -> BooksResult<TrialBalance> {
        Ok(reports::trial_balance(self.storage(), as_of)?)
    }

    pub fn balance_sheet(&self, as_of: Date) -> BooksResult<BalanceSheet> {
        Ok(reports::balance_sheet(self.storage(), as_of)?)
    }

    pub fn profit_and_loss(&self, from: Date, to: Date) -> BooksResult<ProfitAndLoss> {
        if from > to {
            return Err(BooksError::validation("report start date is after its end date"));
        }
        Ok(reports::profit_and_loss(self.storage(), from, to)?)
    }

    pub fn dashboard(&self, as_of: Date) -> BooksResult<Dashboard> {
        let storage = self.storage();
        let month_start = first_of_month(as_of);
        let invoices = storage.list_invoices(&InvoiceFilter::default())?;

        let mut dashboard = Dashboard {
            as_of,
            receivable_outstanding: Decimal::ZERO,
            payable_outstanding: Decimal::ZERO,
            overdue_invoices: 0,
            overdue_bills: 0,
            month_sales: Decimal::ZERO,
            month_purchases: Decimal::ZERO,
            cash_and_bank: Decimal::ZERO,
        };

        // Amounts are in the base currency; documents dated after `as_of` are ignored.
        for invoice in invoices.iter().filter(|i| counts_as_booked(i) && i.invoice_date <= as_of) {
            let sales = invoice.kind == InvoiceKind::CustomerInvoice;
            let rate = invoice.exchange_rate;
            if invoice.is_open() {
                if sales {
                    dashboard.receivable_outstanding += to_base(invoice.balance_amount, rate);
                } else {
                    dashboard.payable_outstanding += to_base(invoice.balance_amount, rate);
                }
            }
            if invoice.is_overdue(as_of) {
                if sales {
                    dashboard.overdue_invoices += 1;
                } else {
                    dashboard.overdue_bills += 1;
                }
            }
            if invoice.invoice_date >= month_start {
                if sales {
                    dashboard.month_sales += to_base(invoice.totals.net_amount(), rate);
                } else {
                    dashboard.month_purchases += to_base(invoice.totals.net_amount(), rate);
                }
            }
        }

        let posting = load_settings(storage)?.posting;
        for code in [&posting.cash, &posting.bank] {
            if let Some(account) = storage.find_account_by_code(code)? {
                dashboard.cash_and_bank += storage.get_balance(account.id, as_of)?;
            }
        }

        Ok(dashboard)
    }
}
