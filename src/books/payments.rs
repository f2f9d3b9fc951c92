use time::OffsetDateTime;
use uuid::Uuid;

use shiv_core::{
    models::write::PaymentInput, storage::PaymentFilter, totals::round_money, CreateJournalCommand, InvoiceKind,
    LedgerEntryCommand, Payment, PaymentKind,
};

use super::{load_settings, next_number, optional, posting_account, to_base, Books, Page, Pagination};
use crate::error::{BooksError, BooksResult};

impl Books {
    /// Records a payment against a posted invoice. The journal, the payment
    /// and the invoice's new balance land in one transaction.
    pub fn record_payment(&self, input: PaymentInput) -> BooksResult<Payment> {
        let payment = self.write("record_payment", |storage| {
            let mut invoice = storage
                .get_invoice(input.invoice_id)
                .map_err(|_| BooksError::validation(format!("invoice {} does not exist", input.invoice_id)))?;
            if round_money(input.amount) != input.amount {
                return Err(BooksError::validation("payment amount has more than two decimal places"));
            }
            if input.date < invoice.invoice_date {
                return Err(BooksError::validation("payment date is before the invoice date"));
            }
            let paid_before = invoice.paid_amount;
            invoice.apply_payment(input.amount)?;
            // Converting the running total keeps a fully paid invoice at exactly
            // the base amount that was posted.
            let rate = invoice.exchange_rate;
            let base_amount = to_base(invoice.paid_amount, rate) - to_base(paid_before, rate);

            let settings = load_settings(storage)?;
            let posting = &settings.posting;
            let money_code = if input.method.is_cash() { &posting.cash } else { &posting.bank };
            let money = posting_account(storage, money_code)?.id;

            let kind = PaymentKind::from(invoice.kind);
            let (debit, credit) = match invoice.kind {
                InvoiceKind::CustomerInvoice => (money, posting_account(storage, &posting.receivable)?.id),
                InvoiceKind::VendorBill => (posting_account(storage, &posting.payable)?.id, money),
            };

            let number = next_number(storage, &settings.payment_prefix, input.date.year())?;
            let journal_id = storage.create_journal(&CreateJournalCommand {
                date: input.date,
                description: format!("Payment {} for {}", number, invoice.number),
                reference: Some(number.clone()),
                ledger_entries: vec![
                    LedgerEntryCommand::Debit { account_id: debit, amount: base_amount },
                    LedgerEntryCommand::Credit { account_id: credit, amount: base_amount },
                ],
            })?;

            let payment = Payment {
                id: Uuid::new_v4(),
                number,
                invoice_id: invoice.id,
                contact_id: invoice.contact_id,
                kind,
                date: input.date,
                amount: input.amount,
                method: input.method,
                reference: optional(input.reference),
                journal_id,
                created_at: OffsetDateTime::now_utc(),
            };
            storage.save_invoice(&invoice)?;
            storage.create_payment(&payment)?;
            Ok(payment)
        })?;

        metrics::increment_counter!("shiv_payments_recorded_total", "kind" => payment.kind.as_str());
        tracing::info!(
            payment_id = %payment.id,
            number = %payment.number,
            invoice_id = %payment.invoice_id,
            amount = %payment.amount,
            "Payment recorded"
        );
        Ok(payment)
    }

    pub fn get_payment(&self, id: Uuid) -> BooksResult<Payment> {
        Ok(self.storage().get_payment(id)?)
    }

    pub fn list_payments(&self, filter: &PaymentFilter, page: &Pagination) -> BooksResult<Page<Payment>> {
        Ok(page.apply(self.storage().list_payments(filter)?))
    }
}
