//! Invoices, vendor bills and orders.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

use shiv_core::{
    models::write::{InvoiceInput, LineInput, OrderInput},
    storage::{InvoiceFilter, OrderFilter, PaymentFilter},
    totals::{compute_line, round_money},
    AccountType, CompanySettings, ContactKind, CreateJournalCommand, DocumentLine, DocumentTotals, Invoice, InvoiceKind,
    InvoiceStatus, LedgerEntryCommand, Order, OrderKind, OrderStatus, StorageBackend, TaxScope,
};

use super::{
    exchange_rate, load_settings, next_number, optional, posting_account, to_base, today, Books, Page, Pagination,
};
use crate::error::{BooksError, BooksResult};

fn is_sales(kind: InvoiceKind) -> bool {
    kind == InvoiceKind::CustomerInvoice
}

fn invoice_prefix(settings: &CompanySettings, kind: InvoiceKind) -> &str {
    match kind {
        InvoiceKind::CustomerInvoice => &settings.invoice_prefix,
        InvoiceKind::VendorBill => &settings.bill_prefix,
    }
}

fn order_prefix(settings: &CompanySettings, kind: OrderKind) -> &str {
    match kind {
        OrderKind::Sales => &settings.sales_order_prefix,
        OrderKind::Purchase => &settings.purchase_order_prefix,
    }
}

/// The contact must exist and be able to sit on the given side of a document.
fn check_party(storage: &dyn StorageBackend, contact_id: Uuid, sales: bool) -> BooksResult<()> {
    let contact = storage
        .get_contact(contact_id)
        .map_err(|_| BooksError::validation(format!("contact {contact_id} does not exist")))?;
    let wanted = if sales { ContactKind::Customer } else { ContactKind::Vendor };
    if contact.kind != ContactKind::Both && contact.kind != wanted {
        return Err(BooksError::validation(format!("{} is not a {}", contact.name, wanted)));
    }
    Ok(())
}

/// Turns requested lines into priced lines. Product defaults fill whatever
/// the request leaves out.
fn resolve_lines(storage: &dyn StorageBackend, sales: bool, inputs: Vec<LineInput>) -> BooksResult<Vec<DocumentLine>> {
    if inputs.is_empty() {
        return Err(BooksError::validation("a document needs at least one line"));
    }

    let mut lines = Vec::with_capacity(inputs.len());
    for (n, input) in inputs.into_iter().enumerate() {
        let line_err = |msg: String| BooksError::validation(format!("line {}: {}", n + 1, msg));

        let product = input
            .product_id
            .map(|id| storage.get_product(id).map_err(|_| line_err(format!("product {id} does not exist"))))
            .transpose()?;

        let description = optional(input.description)
            .or_else(|| product.as_ref().map(|p| p.name.clone()))
            .ok_or_else(|| line_err("a description or product is required".to_string()))?;

        let unit_price = input
            .unit_price
            .or_else(|| product.as_ref().map(|p| if sales { p.sales_price } else { p.purchase_price }))
            .ok_or_else(|| line_err("a unit price or product is required".to_string()))?;

        let tax_id = input
            .tax_id
            .or_else(|| product.as_ref().and_then(|p| if sales { p.sales_tax_id } else { p.purchase_tax_id }));
        let tax_rate = match tax_id {
            Some(id) => {
                let tax = storage.get_tax(id).map_err(|_| line_err(format!("tax {id} does not exist")))?;
                let side_ok = match tax.scope {
                    TaxScope::Both => true,
                    TaxScope::Sales => sales,
                    TaxScope::Purchase => !sales,
                };
                if !tax.active || !side_ok {
                    return Err(line_err(format!("tax {} cannot be used here", tax.name)));
                }
                tax.rate
            }
            None => Decimal::ZERO,
        };

        if let Some(account_id) = input.account_id {
            let account = storage
                .get_account(account_id)
                .map_err(|_| line_err(format!("account {account_id} does not exist")))?;
            let allowed = if sales {
                account.account_type == AccountType::Income
            } else {
                matches!(account.account_type, AccountType::Expense | AccountType::Asset)
            };
            if !allowed {
                return Err(line_err(format!("account {} cannot take this line", account.code)));
            }
        }

        let discount = round_money(input.discount.unwrap_or(Decimal::ZERO));
        let amounts = compute_line(input.quantity, unit_price, tax_rate, discount).map_err(|e| line_err(e.to_string()))?;

        lines.push(DocumentLine {
            product_id: input.product_id,
            description,
            quantity: input.quantity,
            unit_price,
            tax_id,
            tax_rate,
            discount,
            account_id: input.account_id,
            sub_total: amounts.sub_total,
            tax_amount: amounts.tax_amount,
            total: amounts.total,
        });
    }
    Ok(lines)
}

/// Builds the posting journal for an invoice.
///
/// Customer invoice: Dr receivable, Cr income per account, Cr tax output.
/// Vendor bill: Dr expense per account, Dr tax input, Cr payable.
///
/// Amounts are converted to the base currency at the invoice's exchange rate;
/// any rounding difference lands on the last income or expense entry.
fn posting_journal(storage: &dyn StorageBackend, settings: &CompanySettings, invoice: &Invoice) -> BooksResult<CreateJournalCommand> {
    let sales = is_sales(invoice.kind);
    let posting = &settings.posting;
    let default_code = if sales { &posting.sales } else { &posting.purchases };
    let default_account = posting_account(storage, default_code)?.id;

    // Net amounts grouped per income/expense account, in first-seen order.
    let mut order: Vec<Uuid> = Vec::new();
    let mut nets: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for line in &invoice.lines {
        let product_account = match line.product_id {
            Some(id) => {
                let product = storage.get_product(id)?;
                if sales { product.income_account_id } else { product.expense_account_id }
            }
            None => None,
        };
        let account_id = line.account_id.or(product_account).unwrap_or(default_account);
        let net = line.sub_total - line.discount;
        if net.is_zero() {
            continue;
        }
        if !nets.contains_key(&account_id) {
            order.push(account_id);
        }
        *nets.entry(account_id).or_insert(Decimal::ZERO) += net;
    }

    let rate = invoice.exchange_rate;
    let total = to_base(invoice.totals.total_amount, rate);
    let mut tax = to_base(invoice.totals.tax_amount, rate);
    let mut lines: Vec<(Uuid, Decimal)> = order.iter().map(|id| (*id, to_base(nets[id], rate))).collect();
    let residual = total - tax - lines.iter().map(|(_, amount)| *amount).sum::<Decimal>();
    match lines.last_mut() {
        Some((_, amount)) => *amount += residual,
        None => tax += residual,
    }
    let mut entries = Vec::new();

    if sales {
        let receivable = posting_account(storage, &posting.receivable)?.id;
        entries.push(LedgerEntryCommand::Debit { account_id: receivable, amount: total });
        for (account_id, amount) in &lines {
            entries.push(LedgerEntryCommand::Credit { account_id: *account_id, amount: *amount });
        }
        if !tax.is_zero() {
            let output = posting_account(storage, &posting.tax_output)?.id;
            entries.push(LedgerEntryCommand::Credit { account_id: output, amount: tax });
        }
    } else {
        for (account_id, amount) in &lines {
            entries.push(LedgerEntryCommand::Debit { account_id: *account_id, amount: *amount });
        }
        if !tax.is_zero() {
            let input = posting_account(storage, &posting.tax_input)?.id;
            entries.push(LedgerEntryCommand::Debit { account_id: input, amount: tax });
        }
        let payable = posting_account(storage, &posting.payable)?.id;
        entries.push(LedgerEntryCommand::Credit { account_id: payable, amount: total });
    }

    let command = CreateJournalCommand {
        date: invoice.invoice_date,
        description: format!("{} {}", if sales { "Invoice" } else { "Bill" }, invoice.number),
        reference: Some(invoice.number.clone()),
        ledger_entries: entries,
    };
    if !command.is_balanced() {
        return Err(BooksError::Storage(shiv_core::StorageError::Other(format!(
            "posting journal for {} does not balance",
            invoice.number
        ))));
    }
    Ok(command)
}

fn check_dates(invoice_date: Date, due_date: Date) -> BooksResult<()> {
    if due_date < invoice_date {
        return Err(BooksError::validation("due date is before the invoice date"));
    }
    Ok(())
}

fn due_date(settings: &CompanySettings, invoice_date: Date, requested: Option<Date>) -> Date {
    requested.unwrap_or_else(|| invoice_date + Duration::days(i64::from(settings.payment_terms_days)))
}

fn resolve_currency(storage: &dyn StorageBackend, settings: &CompanySettings, requested: Option<String>) -> BooksResult<String> {
    let currency = optional(requested).unwrap_or_else(|| settings.base_currency.clone());
    if currency != settings.base_currency && !storage.list_currencies()?.iter().any(|c| c.code == currency) {
        return Err(BooksError::validation(format!("currency {currency} is not configured")));
    }
    Ok(currency)
}

/// An unsaved, unnumbered draft with no lines.
fn blank_invoice(kind: InvoiceKind, contact_id: Uuid, invoice_date: Date, currency: String) -> Invoice {
    Invoice {
        id: Uuid::new_v4(),
        number: String::new(),
        kind,
        contact_id,
        invoice_date,
        due_date: invoice_date,
        reference: None,
        currency,
        exchange_rate: Decimal::ONE,
        status: InvoiceStatus::Draft,
        lines: Vec::new(),
        totals: DocumentTotals::default(),
        paid_amount: Decimal::ZERO,
        balance_amount: Decimal::ZERO,
        journal_id: None,
        order_id: None,
        notes: None,
        created_at: OffsetDateTime::now_utc(),
    }
}

/// Numbers, prices and saves a draft. Shared by `create_invoice` and order conversion.
fn insert_draft(
    storage: &dyn StorageBackend,
    settings: &CompanySettings,
    mut invoice: Invoice,
    due: Option<Date>,
    lines: Vec<DocumentLine>,
) -> BooksResult<Invoice> {
    invoice.due_date = due_date(settings, invoice.invoice_date, due);
    check_dates(invoice.invoice_date, invoice.due_date)?;
    invoice.number = next_number(storage, invoice_prefix(settings, invoice.kind), invoice.invoice_date.year())?;
    invoice.set_lines(lines);
    storage.save_invoice(&invoice)?;
    Ok(invoice)
}

impl Books {
    pub fn create_invoice(&self, input: InvoiceInput) -> BooksResult<Invoice> {
        self.write("create_invoice", |storage| {
            let settings = load_settings(storage)?;
            let sales = is_sales(input.kind);
            check_party(storage, input.contact_id, sales)?;
            let lines = resolve_lines(storage, sales, input.lines)?;
            let currency = resolve_currency(storage, &settings, input.currency)?;

            let mut draft = blank_invoice(input.kind, input.contact_id, input.invoice_date, currency);
            draft.reference = optional(input.reference);
            draft.notes = optional(input.notes);
            let invoice = insert_draft(storage, &settings, draft, input.due_date, lines)?;
            tracing::info!(invoice_id = %invoice.id, number = %invoice.number, total = %invoice.totals.total_amount, "Invoice drafted");
            Ok(invoice)
        })
    }

    pub fn get_invoice(&self, id: Uuid) -> BooksResult<Invoice> {
        Ok(self.storage().get_invoice(id)?)
    }

    pub fn list_invoices(&self, filter: &InvoiceFilter, page: &Pagination) -> BooksResult<Page<Invoice>> {
        Ok(page.apply(self.storage().list_invoices(filter)?))
    }

    /// Open invoices of `kind` whose due date has passed.
    pub fn overdue_invoices(&self, kind: InvoiceKind, today: Date) -> BooksResult<Vec<Invoice>> {
        let invoices = self.storage().list_invoices(&InvoiceFilter {
            kind: Some(kind),
            ..Default::default()
        })?;
        Ok(invoices.into_iter().filter(|i| i.is_overdue(today)).collect())
    }

    /// Replaces a draft's header and lines. Number and kind stay fixed.
    pub fn update_invoice(&self, id: Uuid, input: InvoiceInput) -> BooksResult<Invoice> {
        self.write("update_invoice", |storage| {
            let mut invoice = storage.get_invoice(id)?;
            if invoice.status != InvoiceStatus::Draft {
                return Err(BooksError::conflict(format!("invoice {} is {}; only drafts can be edited", invoice.number, invoice.status)));
            }
            if input.kind != invoice.kind {
                return Err(BooksError::validation("an invoice cannot change kind"));
            }
            let settings = load_settings(storage)?;
            check_party(storage, input.contact_id, is_sales(invoice.kind))?;
            let lines = resolve_lines(storage, is_sales(invoice.kind), input.lines)?;

            invoice.contact_id = input.contact_id;
            invoice.invoice_date = input.invoice_date;
            invoice.due_date = due_date(&settings, input.invoice_date, input.due_date);
            check_dates(invoice.invoice_date, invoice.due_date)?;
            invoice.reference = optional(input.reference);
            if input.currency.is_some() {
                invoice.currency = resolve_currency(storage, &settings, input.currency)?;
            }
            invoice.notes = optional(input.notes);
            invoice.set_lines(lines);
            storage.save_invoice(&invoice)?;
            Ok(invoice)
        })
    }

    pub fn delete_invoice(&self, id: Uuid) -> BooksResult<()> {
        self.write("delete_invoice", |storage| {
            let invoice = storage.get_invoice(id)?;
            if invoice.status != InvoiceStatus::Draft {
                return Err(BooksError::conflict(format!("invoice {} is {}; cancel it instead", invoice.number, invoice.status)));
            }
            // A draft made from an order hands the order back.
            if let Some(order_id) = invoice.order_id {
                let mut order = storage.get_order(order_id)?;
                order.status = OrderStatus::Confirmed;
                order.invoice_id = None;
                storage.save_order(&order)?;
            }
            storage.delete_invoice(id)?;
            tracing::info!(invoice_id = %id, number = %invoice.number, "Draft invoice deleted");
            Ok(())
        })
    }

    pub fn post_invoice(&self, id: Uuid) -> BooksResult<Invoice> {
        let invoice = self.write("post_invoice", |storage| {
            let mut invoice = storage.get_invoice(id)?;
            if invoice.status != InvoiceStatus::Draft {
                return Err(BooksError::conflict(format!("invoice {} is already {}", invoice.number, invoice.status)));
            }
            if invoice.totals.total_amount <= Decimal::ZERO {
                return Err(BooksError::validation("an invoice with a zero total cannot be posted"));
            }
            let settings = load_settings(storage)?;
            invoice.exchange_rate = exchange_rate(storage, &settings, &invoice.currency)?;
            let journal = posting_journal(storage, &settings, &invoice)?;
            let journal_id = storage.create_journal(&journal)?;

            invoice.status = InvoiceStatus::Posted;
            invoice.journal_id = Some(journal_id);
            invoice.balance_amount = invoice.totals.total_amount - invoice.paid_amount;
            storage.save_invoice(&invoice)?;
            Ok(invoice)
        })?;

        metrics::increment_counter!("shiv_invoices_posted_total", "kind" => invoice.kind.as_str());
        tracing::info!(
            invoice_id = %invoice.id,
            number = %invoice.number,
            total = %invoice.totals.total_amount,
            currency = %invoice.currency,
            rate = %invoice.exchange_rate,
            "Invoice posted"
        );
        Ok(invoice)
    }

    /// Cancels a draft outright, or a posted invoice without payments by
    /// writing a reversing journal.
    pub fn cancel_invoice(&self, id: Uuid) -> BooksResult<Invoice> {
        self.write("cancel_invoice", |storage| {
            let mut invoice = storage.get_invoice(id)?;
            match invoice.status {
                InvoiceStatus::Draft => {}
                InvoiceStatus::Posted => {
                    let payments = storage.list_payments(&PaymentFilter {
                        invoice_id: Some(id),
                        ..Default::default()
                    })?;
                    if !payments.is_empty() || !invoice.paid_amount.is_zero() {
                        return Err(BooksError::conflict(format!("invoice {} has payments recorded", invoice.number)));
                    }
                    if let Some(journal_id) = invoice.journal_id {
                        let entries = storage.get_journal_entries(journal_id)?;
                        let reversal = CreateJournalCommand {
                            date: invoice.invoice_date.max(today()),
                            description: format!("Cancellation of {}", invoice.number),
                            reference: Some(invoice.number.clone()),
                            ledger_entries: entries.iter().map(LedgerEntryCommand::reversed).collect(),
                        };
                        storage.create_journal(&reversal)?;
                    }
                }
                InvoiceStatus::PartiallyPaid | InvoiceStatus::Paid => {
                    return Err(BooksError::conflict(format!("invoice {} has payments recorded", invoice.number)));
                }
                InvoiceStatus::Cancelled => {
                    return Err(BooksError::conflict(format!("invoice {} is already cancelled", invoice.number)));
                }
            }

            invoice.status = InvoiceStatus::Cancelled;
            invoice.balance_amount = Decimal::ZERO;
            storage.save_invoice(&invoice)?;
            tracing::info!(invoice_id = %id, number = %invoice.number, "Invoice cancelled");
            Ok(invoice)
        })
    }

    pub fn create_order(&self, input: OrderInput) -> BooksResult<Order> {
        self.write("create_order", |storage| {
            let settings = load_settings(storage)?;
            let sales = is_sales(input.kind.invoice_kind());
            check_party(storage, input.contact_id, sales)?;
            let lines = resolve_lines(storage, sales, input.lines)?;
            if input.expected_date.is_some_and(|d| d < input.order_date) {
                return Err(BooksError::validation("expected date is before the order date"));
            }

            let order = Order {
                id: Uuid::new_v4(),
                number: next_number(storage, order_prefix(&settings, input.kind), input.order_date.year())?,
                kind: input.kind,
                contact_id: input.contact_id,
                order_date: input.order_date,
                expected_date: input.expected_date,
                status: OrderStatus::Draft,
                totals: DocumentTotals::from_lines(&lines),
                lines,
                invoice_id: None,
                notes: optional(input.notes),
                created_at: OffsetDateTime::now_utc(),
            };
            storage.save_order(&order)?;
            tracing::info!(order_id = %order.id, number = %order.number, "Order created");
            Ok(order)
        })
    }

    pub fn get_order(&self, id: Uuid) -> BooksResult<Order> {
        Ok(self.storage().get_order(id)?)
    }

    pub fn list_orders(&self, filter: &OrderFilter, page: &Pagination) -> BooksResult<Page<Order>> {
        Ok(page.apply(self.storage().list_orders(filter)?))
    }

    pub fn update_order(&self, id: Uuid, input: OrderInput) -> BooksResult<Order> {
        self.write("update_order", |storage| {
            let mut order = storage.get_order(id)?;
            if order.status != OrderStatus::Draft {
                return Err(BooksError::conflict(format!("order {} is {}; only drafts can be edited", order.number, order.status)));
            }
            if input.kind != order.kind {
                return Err(BooksError::validation("an order cannot change kind"));
            }
            let sales = is_sales(order.kind.invoice_kind());
            check_party(storage, input.contact_id, sales)?;
            let lines = resolve_lines(storage, sales, input.lines)?;
            if input.expected_date.is_some_and(|d| d < input.order_date) {
                return Err(BooksError::validation("expected date is before the order date"));
            }

            order.contact_id = input.contact_id;
            order.order_date = input.order_date;
            order.expected_date = input.expected_date;
            order.notes = optional(input.notes);
            order.totals = DocumentTotals::from_lines(&lines);
            order.lines = lines;
            storage.save_order(&order)?;
            Ok(order)
        })
    }

    pub fn delete_order(&self, id: Uuid) -> BooksResult<()> {
        self.write("delete_order", |storage| {
            let order = storage.get_order(id)?;
            if order.status != OrderStatus::Draft {
                return Err(BooksError::conflict(format!("order {} is {}; cancel it instead", order.number, order.status)));
            }
            storage.delete_order(id)?;
            Ok(())
        })
    }

    pub fn confirm_order(&self, id: Uuid) -> BooksResult<Order> {
        self.write("confirm_order", |storage| {
            let mut order = storage.get_order(id)?;
            if order.status != OrderStatus::Draft {
                return Err(BooksError::conflict(format!("order {} is {}", order.number, order.status)));
            }
            order.status = OrderStatus::Confirmed;
            storage.save_order(&order)?;
            tracing::info!(order_id = %id, number = %order.number, "Order confirmed");
            Ok(order)
        })
    }

    pub fn cancel_order(&self, id: Uuid) -> BooksResult<Order> {
        self.write("cancel_order", |storage| {
            let mut order = storage.get_order(id)?;
            match order.status {
                OrderStatus::Draft | OrderStatus::Confirmed => {}
                OrderStatus::Invoiced => {
                    return Err(BooksError::conflict(format!("order {} has been invoiced", order.number)));
                }
                OrderStatus::Cancelled => {
                    return Err(BooksError::conflict(format!("order {} is already cancelled", order.number)));
                }
            }
            order.status = OrderStatus::Cancelled;
            storage.save_order(&order)?;
            Ok(order)
        })
    }

    /// Turns a confirmed order into a draft invoice dated `invoice_date`.
    pub fn invoice_order(&self, id: Uuid, invoice_date: Date) -> BooksResult<Invoice> {
        self.write("invoice_order", |storage| {
            let mut order = storage.get_order(id)?;
            if order.status != OrderStatus::Confirmed {
                return Err(BooksError::conflict(format!("order {} is {}; only confirmed orders can be invoiced", order.number, order.status)));
            }
            let settings = load_settings(storage)?;
            let mut draft = blank_invoice(order.kind.invoice_kind(), order.contact_id, invoice_date, settings.base_currency.clone());
            draft.reference = Some(order.number.clone());
            draft.order_id = Some(order.id);
            draft.notes = order.notes.clone();
            let invoice = insert_draft(storage, &settings, draft, None, order.lines.clone())?;

            order.status = OrderStatus::Invoiced;
            order.invoice_id = Some(invoice.id);
            storage.save_order(&order)?;
            tracing::info!(order_id = %id, invoice_id = %invoice.id, number = %invoice.number, "Order invoiced");
            Ok(invoice)
        })
    }
}
