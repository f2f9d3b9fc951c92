//! Printable invoice document. Produces standalone HTML; turning it into a
//! PDF is left to whatever tool prints it.

use askama::Template;
use rust_decimal::Decimal;

use shiv_core::{
    format::{format_date, format_inr, format_money},
    Address, CompanySettings, Contact, Invoice, InvoiceKind,
};

use crate::error::BooksResult;

struct LineRow<'a> {
    description: &'a str,
    quantity: String,
    unit_price: String,
    tax_rate: String,
    discount: String,
    total: String,
}

struct TotalRow {
    label: &'static str,
    amount: String,
    strong: bool,
}

#[derive(Template)]
#[template(path = "invoice.html")]
struct InvoiceTemplate<'a> {
    title: &'static str,
    party: &'static str,
    number: &'a str,
    invoice_date: String,
    due_date: String,
    status: String,
    reference: Option<&'a str>,
    company_name: &'a str,
    company_address: Vec<String>,
    company_gstin: Option<&'a str>,
    contact_name: &'a str,
    contact_address: Vec<String>,
    contact_gstin: Option<&'a str>,
    lines: Vec<LineRow<'a>>,
    totals: Vec<TotalRow>,
    notes: Option<&'a str>,
}

fn address_lines(address: Option<&Address>) -> Vec<String> {
    let Some(a) = address else {
        return Vec::new();
    };
    let mut lines = vec![a.line1.clone()];
    lines.extend(a.line2.clone());
    lines.push(format!("{}, {} {}", a.city, a.state, a.postal_code));
    lines.push(a.country.clone());
    lines
}

fn total_row(label: &'static str, amount: Decimal, currency: &str, strong: bool) -> TotalRow {
    TotalRow {
        label,
        amount: format_money(amount, currency),
        strong,
    }
}

fn totals_rows(invoice: &Invoice) -> Vec<TotalRow> {
    let currency = invoice.currency.as_str();
    let totals = &invoice.totals;
    let mut rows = vec![
        total_row("Subtotal", totals.sub_total, currency, false),
        total_row("Tax", totals.tax_amount, currency, false),
    ];
    if !totals.discount_amount.is_zero() {
        rows.push(total_row("Discount", -totals.discount_amount, currency, false));
    }
    rows.push(total_row("Total", totals.total_amount, currency, true));
    if !invoice.paid_amount.is_zero() {
        rows.push(total_row("Paid", invoice.paid_amount, currency, false));
        rows.push(total_row("Balance due", invoice.balance_amount, currency, true));
    }
    rows
}

pub fn invoice_html(invoice: &Invoice, contact: &Contact, settings: &CompanySettings) -> BooksResult<String> {
    let (title, party) = match invoice.kind {
        InvoiceKind::CustomerInvoice => ("Tax Invoice", "Bill to"),
        InvoiceKind::VendorBill => ("Vendor Bill", "Vendor"),
    };

    let lines = invoice
        .lines
        .iter()
        .map(|line| LineRow {
            description: &line.description,
            quantity: line.quantity.normalize().to_string(),
            unit_price: format_inr(line.unit_price),
            tax_rate: line.tax_rate.normalize().to_string(),
            discount: format_inr(line.discount),
            total: format_inr(line.total),
        })
        .collect();

    let template = InvoiceTemplate {
        title,
        party,
        number: &invoice.number,
        invoice_date: format_date(invoice.invoice_date),
        due_date: format_date(invoice.due_date),
        status: invoice.status.to_string(),
        reference: invoice.reference.as_deref(),
        company_name: &settings.company_name,
        company_address: address_lines(settings.address.as_ref()),
        company_gstin: settings.gstin.as_deref(),
        contact_name: &contact.name,
        contact_address: address_lines(contact.address.as_ref()),
        contact_gstin: contact.gstin.as_deref(),
        lines,
        totals: totals_rows(invoice),
        notes: invoice.notes.as_deref(),
    };
    Ok(template.render()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use shiv_core::{ContactKind, DocumentLine, DocumentTotals, InvoiceStatus};
    use time::{macros::date, OffsetDateTime};
    use uuid::Uuid;

    fn sample() -> (Invoice, Contact) {
        let contact = Contact {
            id: Uuid::new_v4(),
            name: "Tom & Jerry <Traders>".to_string(),
            kind: ContactKind::Customer,
            email: None,
            phone: None,
            gstin: Some("27AAPFU0939F1ZV".to_string()),
            address: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let lines = vec![DocumentLine {
            product_id: None,
            description: "Widget".to_string(),
            quantity: dec!(2),
            unit_price: dec!(50000),
            tax_id: None,
            tax_rate: dec!(18),
            discount: dec!(0),
            account_id: None,
            sub_total: dec!(100000.00),
            tax_amount: dec!(18000.00),
            total: dec!(118000.00),
        }];
        let totals = DocumentTotals::from_lines(&lines);
        let invoice = Invoice {
            id: Uuid::new_v4(),
            number: "INV/2024/0007".to_string(),
            kind: InvoiceKind::CustomerInvoice,
            contact_id: contact.id,
            invoice_date: date!(2024 - 04 - 05),
            due_date: date!(2024 - 05 - 05),
            reference: None,
            currency: "INR".to_string(),
            exchange_rate: Decimal::ONE,
            status: InvoiceStatus::Posted,
            lines,
            totals,
            paid_amount: dec!(0),
            balance_amount: totals.total_amount,
            journal_id: None,
            order_id: None,
            notes: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        (invoice, contact)
    }

    #[test]
    fn renders_escaped_invoice() {
        let (invoice, contact) = sample();
        let html = invoice_html(&invoice, &contact, &CompanySettings::default()).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Tax Invoice"));
        assert!(html.contains("INV/2024/0007"));
        assert!(html.contains("05/04/2024"));
        assert!(html.contains("Tom &amp; Jerry &lt;Traders&gt;"));
        assert!(html.contains("₹1,18,000.00"));
        assert!(!html.contains("Balance due"));
    }

    #[test]
    fn vendor_bill_shows_address_and_balance() {
        let (mut invoice, mut contact) = sample();
        invoice.kind = InvoiceKind::VendorBill;
        invoice.paid_amount = dec!(18000);
        invoice.balance_amount = dec!(100000);
        contact.address = Some(Address {
            line1: "12 Mill Road".to_string(),
            line2: None,
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            postal_code: "411001".to_string(),
            country: "India".to_string(),
        });

        let html = invoice_html(&invoice, &contact, &CompanySettings::default()).unwrap();
        assert!(html.contains("Vendor Bill"));
        assert!(html.contains("<div>Pune, Maharashtra 411001</div>"));
        assert!(html.contains("<strong>Balance due</strong>"));
        assert!(html.contains("₹1,00,000.00"));
    }
}
