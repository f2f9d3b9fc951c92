use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::{macros::date, Date};
use uuid::Uuid;

use shiv_accounts::books::{Books, Pagination};
use shiv_accounts::error::BooksError;
use shiv_accounts::seed;
use shiv_accounts::storage::{InMemoryStorage, StorageBackend};
use shiv_core::models::write::{AccountInput, ContactInput, InvoiceInput, LineInput, OrderInput, PaymentInput};
use shiv_core::storage::{ContactFilter, InvoiceFilter};
use shiv_core::{
    AccountType, CompanySettings, ContactKind, CreateJournalCommand, Currency, InvoiceKind, InvoiceStatus,
    LedgerEntryCommand, OrderKind, OrderStatus, PaymentMethod,
};
use shiv_sqlite::SqliteStorage;

const LATER: Date = date!(2100 - 01 - 01);

/// Seeded books on every backend.
fn setup() -> Vec<(&'static str, Books)> {
    let backends: Vec<(&'static str, Arc<dyn StorageBackend>)> = vec![
        ("memory", Arc::new(InMemoryStorage::new())),
        ("sqlite", Arc::new(SqliteStorage::open(":memory:").unwrap())),
    ];
    backends
        .into_iter()
        .map(|(name, storage)| {
            let books = Books::new(storage);
            seed::seed(&books).unwrap();
            (name, books)
        })
        .collect()
}

fn contact(books: &Books, name: &str, kind: ContactKind) -> Uuid {
    books
        .create_contact(ContactInput {
            name: name.to_string(),
            kind,
            email: None,
            phone: None,
            gstin: None,
            address: None,
        })
        .unwrap()
        .id
}

fn tax(books: &Books, name: &str) -> Uuid {
    books.list_taxes().unwrap().into_iter().find(|t| t.name == name).unwrap().id
}

fn account(books: &Books, code: &str) -> Uuid {
    books.storage().find_account_by_code(code).unwrap().unwrap().id
}

fn balance(books: &Books, code: &str, as_of: Date) -> Decimal {
    books.storage().get_balance(account(books, code), as_of).unwrap()
}

fn line(description: &str, quantity: Decimal, unit_price: Decimal, tax_id: Option<Uuid>) -> LineInput {
    LineInput {
        product_id: None,
        description: Some(description.to_string()),
        quantity,
        unit_price: Some(unit_price),
        tax_id,
        discount: None,
        account_id: None,
    }
}

fn invoice_input(kind: InvoiceKind, contact_id: Uuid, invoice_date: Date, lines: Vec<LineInput>) -> InvoiceInput {
    InvoiceInput {
        kind,
        contact_id,
        invoice_date,
        due_date: None,
        reference: None,
        currency: None,
        lines,
        notes: None,
    }
}

/// Two widgets at 500 with 18% GST: 1000 + 180 = 1180.
fn posted_sale(books: &Books) -> Uuid {
    let customer = contact(books, "Acme Traders", ContactKind::Customer);
    let gst = tax(books, "GST 18%");
    let invoice = books
        .create_invoice(invoice_input(
            InvoiceKind::CustomerInvoice,
            customer,
            date!(2024 - 04 - 05),
            vec![line("Widget", dec!(2), dec!(500), Some(gst))],
        ))
        .unwrap();
    books.post_invoice(invoice.id).unwrap().id
}

fn currency(code: &str, rate_to_base: Decimal, is_base: bool) -> Currency {
    Currency {
        code: code.to_string(),
        name: code.to_string(),
        symbol: code.to_string(),
        rate_to_base,
        is_base,
    }
}

fn payment(invoice_id: Uuid, amount: Decimal, method: PaymentMethod) -> PaymentInput {
    PaymentInput {
        invoice_id,
        date: date!(2024 - 04 - 20),
        amount,
        method,
        reference: None,
    }
}

#[test]
fn test_post_customer_invoice() {
    for (backend, books) in setup() {
        let id = posted_sale(&books);
        let invoice = books.get_invoice(id).unwrap();

        assert_eq!(invoice.number, "INV/2024/0001", "{backend}");
        assert_eq!(invoice.status, InvoiceStatus::Posted);
        assert_eq!(invoice.totals.total_amount, dec!(1180.00));
        assert_eq!(invoice.balance_amount, dec!(1180.00));
        assert_eq!(invoice.due_date, date!(2024 - 05 - 05));

        assert_eq!(balance(&books, "1200", invoice.invoice_date), dec!(1180));
        assert_eq!(balance(&books, "4100", invoice.invoice_date), dec!(1000));
        assert_eq!(balance(&books, "2200", invoice.invoice_date), dec!(180));
        assert!(books.trial_balance(invoice.invoice_date).unwrap().is_balanced(), "{backend}");

        let journal = books.storage().get_journal(invoice.journal_id.unwrap()).unwrap();
        assert_eq!(journal.reference.as_deref(), Some("INV/2024/0001"));
    }
}

#[test]
fn test_vendor_bill_posts_to_expense_and_input_tax() {
    for (backend, books) in setup() {
        let vendor = contact(&books, "Landlord", ContactKind::Vendor);
        let mut rent = line("April rent", dec!(1), dec!(2000), Some(tax(&books, "GST 12%")));
        rent.account_id = Some(account(&books, "5200"));

        let bill = books
            .create_invoice(invoice_input(InvoiceKind::VendorBill, vendor, date!(2024 - 04 - 01), vec![rent]))
            .unwrap();
        assert_eq!(bill.number, "BILL/2024/0001", "{backend}");
        books.post_invoice(bill.id).unwrap();

        let day = date!(2024 - 04 - 01);
        assert_eq!(balance(&books, "5200", day), dec!(2000));
        assert_eq!(balance(&books, "1300", day), dec!(240));
        assert_eq!(balance(&books, "2100", day), dec!(2240));
        assert_eq!(balance(&books, "5100", day), Decimal::ZERO);
    }
}

#[test]
fn test_line_discount_reduces_income() {
    for (backend, books) in setup() {
        let customer = contact(&books, "Acme", ContactKind::Customer);
        let mut discounted = line("Service", dec!(1), dec!(1000), Some(tax(&books, "GST 18%")));
        discounted.discount = Some(dec!(100));

        let invoice = books
            .create_invoice(invoice_input(InvoiceKind::CustomerInvoice, customer, date!(2024 - 04 - 05), vec![discounted]))
            .unwrap();
        assert_eq!(invoice.totals.total_amount, dec!(1080.00), "{backend}");
        books.post_invoice(invoice.id).unwrap();

        let day = invoice.invoice_date;
        assert_eq!(balance(&books, "4100", day), dec!(900));
        assert_eq!(balance(&books, "1200", day), dec!(1080));
        assert!(books.trial_balance(day).unwrap().is_balanced());
    }
}

#[test]
fn test_payments_settle_invoice() {
    for (backend, books) in setup() {
        let id = posted_sale(&books);

        let first = books.record_payment(payment(id, dec!(180), PaymentMethod::Upi)).unwrap();
        assert_eq!(first.number, "PAY/2024/0001", "{backend}");
        let invoice = books.get_invoice(id).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(invoice.balance_amount, dec!(1000));

        books.record_payment(payment(id, dec!(1000), PaymentMethod::Cash)).unwrap();
        let invoice = books.get_invoice(id).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.balance_amount, Decimal::ZERO);

        let day = date!(2024 - 04 - 20);
        assert_eq!(balance(&books, "1110", day), dec!(180));
        assert_eq!(balance(&books, "1100", day), dec!(1000));
        assert_eq!(balance(&books, "1200", day), Decimal::ZERO);

        let err = books.record_payment(payment(id, dec!(1), PaymentMethod::Cash)).unwrap_err();
        assert!(matches!(err, BooksError::Conflict(_)), "{backend}: {err}");
    }
}

#[test]
fn test_rejected_payment_writes_nothing() {
    for (backend, books) in setup() {
        let id = posted_sale(&books);

        let err = books.record_payment(payment(id, dec!(1180.01), PaymentMethod::Bank)).unwrap_err();
        assert!(matches!(err, BooksError::Validation(_)), "{backend}: {err}");
        let err = books.record_payment(payment(id, dec!(10.005), PaymentMethod::Bank)).unwrap_err();
        assert!(matches!(err, BooksError::Validation(_)), "{backend}: {err}");
        let mut early = payment(id, dec!(10), PaymentMethod::Bank);
        early.date = date!(2024 - 04 - 01);
        assert!(books.record_payment(early).is_err());

        let payments = books.list_payments(&Default::default(), &Pagination::default()).unwrap();
        assert_eq!(payments.total, 0);
        assert_eq!(balance(&books, "1110", LATER), Decimal::ZERO);
        assert_eq!(books.get_invoice(id).unwrap().status, InvoiceStatus::Posted);
    }
}

#[test]
fn test_vendor_payment_reduces_payable() {
    for (backend, books) in setup() {
        let vendor = contact(&books, "Supplier", ContactKind::Both);
        let bill = books
            .create_invoice(invoice_input(
                InvoiceKind::VendorBill,
                vendor,
                date!(2024 - 04 - 02),
                vec![line("Stock", dec!(10), dec!(50), None)],
            ))
            .unwrap();
        books.post_invoice(bill.id).unwrap();
        books.record_payment(payment(bill.id, dec!(500), PaymentMethod::Cheque)).unwrap();

        assert_eq!(balance(&books, "2100", LATER), Decimal::ZERO, "{backend}");
        assert_eq!(balance(&books, "1110", LATER), dec!(-500));
        assert_eq!(balance(&books, "5100", LATER), dec!(500));
    }
}

#[test]
fn test_cancel_posted_invoice_reverses_journal() {
    for (backend, books) in setup() {
        let id = posted_sale(&books);
        let cancelled = books.cancel_invoice(id).unwrap();
        assert_eq!(cancelled.status, InvoiceStatus::Cancelled);
        assert_eq!(cancelled.balance_amount, Decimal::ZERO);

        for code in ["1200", "4100", "2200"] {
            assert_eq!(balance(&books, code, LATER), Decimal::ZERO, "{backend} {code}");
        }
        assert!(matches!(books.cancel_invoice(id), Err(BooksError::Conflict(_))));
    }
}

#[test]
fn test_cancel_refused_with_payments() {
    for (backend, books) in setup() {
        let id = posted_sale(&books);
        books.record_payment(payment(id, dec!(100), PaymentMethod::Bank)).unwrap();
        let err = books.cancel_invoice(id).unwrap_err();
        assert!(matches!(err, BooksError::Conflict(_)), "{backend}: {err}");
    }
}

#[test]
fn test_only_drafts_are_editable() {
    for (backend, books) in setup() {
        let customer = contact(&books, "Acme", ContactKind::Customer);
        let input = invoice_input(
            InvoiceKind::CustomerInvoice,
            customer,
            date!(2024 - 04 - 05),
            vec![line("Widget", dec!(1), dec!(100), None)],
        );
        let draft = books.create_invoice(input.clone()).unwrap();

        let mut edited = input.clone();
        edited.lines = vec![line("Widget", dec!(3), dec!(100), None)];
        let updated = books.update_invoice(draft.id, edited.clone()).unwrap();
        assert_eq!(updated.totals.total_amount, dec!(300.00), "{backend}");
        assert_eq!(updated.number, draft.number);

        books.post_invoice(draft.id).unwrap();
        assert!(matches!(books.update_invoice(draft.id, edited), Err(BooksError::Conflict(_))));
        assert!(matches!(books.delete_invoice(draft.id), Err(BooksError::Conflict(_))));
        assert!(matches!(books.post_invoice(draft.id), Err(BooksError::Conflict(_))));

        let other = books.create_invoice(input).unwrap();
        books.delete_invoice(other.id).unwrap();
        assert!(matches!(books.get_invoice(other.id), Err(BooksError::NotFound(_))));
    }
}

#[test]
fn test_invoice_validation() {
    for (backend, books) in setup() {
        let customer = contact(&books, "Acme", ContactKind::Customer);
        let vendor = contact(&books, "Supplier", ContactKind::Vendor);
        let day = date!(2024 - 04 - 05);

        let no_lines = invoice_input(InvoiceKind::CustomerInvoice, customer, day, Vec::new());
        assert!(matches!(books.create_invoice(no_lines), Err(BooksError::Validation(_))), "{backend}");

        let wrong_side = invoice_input(InvoiceKind::CustomerInvoice, vendor, day, vec![line("x", dec!(1), dec!(1), None)]);
        assert!(matches!(books.create_invoice(wrong_side), Err(BooksError::Validation(_))));

        let mut backdated = invoice_input(InvoiceKind::CustomerInvoice, customer, day, vec![line("x", dec!(1), dec!(1), None)]);
        backdated.due_date = Some(date!(2024 - 04 - 01));
        assert!(matches!(books.create_invoice(backdated), Err(BooksError::Validation(_))));

        let mut big_discount = line("x", dec!(1), dec!(10), None);
        big_discount.discount = Some(dec!(11));
        let input = invoice_input(InvoiceKind::CustomerInvoice, customer, day, vec![big_discount]);
        match books.create_invoice(input) {
            Err(BooksError::Validation(msg)) => assert!(msg.starts_with("line 1:"), "{msg}"),
            other => panic!("{backend}: unexpected {other:?}"),
        }

        let mut expense_line = line("x", dec!(1), dec!(10), None);
        expense_line.account_id = Some(account(&books, "5200"));
        let input = invoice_input(InvoiceKind::CustomerInvoice, customer, day, vec![expense_line]);
        assert!(matches!(books.create_invoice(input), Err(BooksError::Validation(_))));

        let zero = books
            .create_invoice(invoice_input(InvoiceKind::CustomerInvoice, customer, day, vec![line("free", dec!(1), dec!(0), None)]))
            .unwrap();
        assert!(matches!(books.post_invoice(zero.id), Err(BooksError::Validation(_))));

        assert!(matches!(books.get_invoice(Uuid::new_v4()), Err(BooksError::NotFound(_))));
    }
}

#[test]
fn test_numbering_restarts_each_year() {
    for (backend, books) in setup() {
        let customer = contact(&books, "Acme", ContactKind::Customer);
        let numbers: Vec<String> = [date!(2024 - 04 - 05), date!(2024 - 12 - 31), date!(2025 - 01 - 01)]
            .into_iter()
            .map(|day| {
                books
                    .create_invoice(invoice_input(InvoiceKind::CustomerInvoice, customer, day, vec![line("x", dec!(1), dec!(1), None)]))
                    .unwrap()
                    .number
            })
            .collect();
        assert_eq!(numbers, ["INV/2024/0001", "INV/2024/0002", "INV/2025/0001"], "{backend}");
    }
}

#[test]
fn test_order_to_invoice() {
    for (backend, books) in setup() {
        let customer = contact(&books, "Acme", ContactKind::Customer);
        let order = books
            .create_order(OrderInput {
                kind: OrderKind::Sales,
                contact_id: customer,
                order_date: date!(2024 - 04 - 01),
                expected_date: None,
                lines: vec![line("Widget", dec!(4), dec!(250), Some(tax(&books, "GST 5%")))],
                notes: None,
            })
            .unwrap();
        assert_eq!(order.number, "SO/2024/0001", "{backend}");
        assert_eq!(order.totals.total_amount, dec!(1050.00));

        let day = date!(2024 - 04 - 10);
        assert!(matches!(books.invoice_order(order.id, day), Err(BooksError::Conflict(_))));
        assert_eq!(books.confirm_order(order.id).unwrap().status, OrderStatus::Confirmed);

        let invoice = books.invoice_order(order.id, day).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.kind, InvoiceKind::CustomerInvoice);
        assert_eq!(invoice.reference.as_deref(), Some("SO/2024/0001"));
        assert_eq!(invoice.order_id, Some(order.id));
        assert_eq!(invoice.totals, order.totals);

        let order = books.get_order(order.id).unwrap();
        assert_eq!(order.status, OrderStatus::Invoiced);
        assert_eq!(order.invoice_id, Some(invoice.id));
        assert!(matches!(books.cancel_order(order.id), Err(BooksError::Conflict(_))));

        books.delete_invoice(invoice.id).unwrap();
        assert_eq!(books.get_order(order.id).unwrap().status, OrderStatus::Confirmed);
        assert_eq!(books.cancel_order(order.id).unwrap().status, OrderStatus::Cancelled);
    }
}

#[test]
fn test_reports_balance() {
    for (backend, books) in setup() {
        let capital = CreateJournalCommand {
            date: date!(2024 - 04 - 01),
            description: "Owner's capital".to_string(),
            reference: None,
            ledger_entries: vec![
                LedgerEntryCommand::Debit { account_id: account(&books, "1110"), amount: dec!(50000) },
                LedgerEntryCommand::Credit { account_id: account(&books, "3100"), amount: dec!(50000) },
            ],
        };
        books.storage().create_journal(&capital).unwrap();

        let sale = posted_sale(&books);
        books.record_payment(payment(sale, dec!(1180), PaymentMethod::Bank)).unwrap();

        let vendor = contact(&books, "Landlord", ContactKind::Vendor);
        let mut rent = line("Rent", dec!(1), dec!(2000), None);
        rent.account_id = Some(account(&books, "5200"));
        let bill = books
            .create_invoice(invoice_input(InvoiceKind::VendorBill, vendor, date!(2024 - 04 - 15), vec![rent]))
            .unwrap();
        books.post_invoice(bill.id).unwrap();

        let as_of = date!(2024 - 04 - 30);
        let sheet = books.balance_sheet(as_of).unwrap();
        assert!(sheet.is_balanced(), "{backend}: {sheet}");
        assert_eq!(sheet.current_earnings, dec!(-1000));
        assert_eq!(sheet.assets.total, dec!(51180));

        let pnl = books.profit_and_loss(date!(2024 - 04 - 01), as_of).unwrap();
        assert_eq!(pnl.income.total, dec!(1000));
        assert_eq!(pnl.expenses.total, dec!(2000));
        assert_eq!(pnl.net_profit, dec!(-1000));

        let next_month = books.profit_and_loss(date!(2024 - 05 - 01), date!(2024 - 05 - 31)).unwrap();
        assert_eq!(next_month.net_profit, Decimal::ZERO);
        assert!(matches!(books.profit_and_loss(as_of, date!(2024 - 04 - 01)), Err(BooksError::Validation(_))));

        let tb = books.trial_balance(as_of).unwrap();
        assert!(tb.is_balanced());
        assert_eq!(tb.total_debit, dec!(53180));

        let statement = books.account_statement(account(&books, "1110"), date!(2024 - 04 - 02), as_of).unwrap();
        assert_eq!(statement.opening_balance, dec!(50000));
        assert_eq!(statement.transactions.len(), 1);
        assert_eq!(statement.closing_balance, dec!(51180));
    }
}

#[test]
fn test_dashboard() {
    for (backend, books) in setup() {
        let id = posted_sale(&books);
        books.record_payment(payment(id, dec!(180), PaymentMethod::Cash)).unwrap();

        let customer = books.get_invoice(id).unwrap().contact_id;
        let later = books
            .create_invoice(invoice_input(
                InvoiceKind::CustomerInvoice,
                customer,
                date!(2024 - 05 - 05),
                vec![line("Refill", dec!(1), dec!(400), None)],
            ))
            .unwrap();
        books.post_invoice(later.id).unwrap();

        let april = books.dashboard(date!(2024 - 04 - 30)).unwrap();
        assert_eq!(april.receivable_outstanding, dec!(1000), "{backend}");
        assert_eq!(april.month_sales, dec!(1000));
        assert_eq!(april.overdue_invoices, 0);
        assert_eq!(april.cash_and_bank, dec!(180));

        let may = books.dashboard(date!(2024 - 05 - 10)).unwrap();
        assert_eq!(may.overdue_invoices, 1);
        assert_eq!(may.month_sales, dec!(400));
        assert_eq!(may.receivable_outstanding, dec!(1400));
        assert_eq!(books.overdue_invoices(InvoiceKind::CustomerInvoice, date!(2024 - 05 - 10)).unwrap().len(), 1);
    }
}

#[test]
fn test_contact_listing() {
    for (backend, books) in setup() {
        for name in ["Anand Stores", "Bharat Mills", "Chetan & Co"] {
            contact(&books, name, ContactKind::Customer);
        }
        contact(&books, "Devi Supplies", ContactKind::Vendor);
        contact(&books, "Eshan Exports", ContactKind::Both);

        let customers = ContactFilter {
            kind: Some(ContactKind::Customer),
            search: None,
        };
        let page = books.list_contacts(&customers, &Pagination::new(0, 2)).unwrap();
        assert_eq!(page.total, 4, "{backend}");
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].name, "Anand Stores");

        let search = ContactFilter {
            kind: None,
            search: Some("MILLS".to_string()),
        };
        assert_eq!(books.list_contacts(&search, &Pagination::default()).unwrap().total, 1);

        let bad = ContactInput {
            name: "Bad".to_string(),
            kind: ContactKind::Customer,
            email: Some("nobody".to_string()),
            phone: None,
            gstin: None,
            address: None,
        };
        assert!(matches!(books.create_contact(bad), Err(BooksError::Validation(_))));
    }
}

#[test]
fn test_referenced_masters_are_kept() {
    for (backend, books) in setup() {
        let id = posted_sale(&books);
        let customer = books.get_invoice(id).unwrap().contact_id;
        assert!(matches!(books.delete_contact(customer), Err(BooksError::Conflict(_))), "{backend}");

        let unused = contact(&books, "Walk-in", ContactKind::Customer);
        books.delete_contact(unused).unwrap();
        assert!(matches!(books.get_contact(unused), Err(BooksError::NotFound(_))));
    }
}

#[test]
fn test_account_rules() {
    for (backend, books) in setup() {
        let cash = account(&books, "1100");
        assert!(matches!(books.delete_account(cash), Err(BooksError::Conflict(_))), "{backend}");

        let wrong_type = AccountInput {
            code: "1450".to_string(),
            name: "Petty expenses".to_string(),
            account_type: AccountType::Expense,
            parent_id: Some(account(&books, "1000")),
            description: None,
            active: true,
        };
        assert!(matches!(books.create_account(wrong_type), Err(BooksError::Validation(_))));

        let duplicate = AccountInput {
            code: "1100".to_string(),
            name: "Cash again".to_string(),
            account_type: AccountType::Asset,
            parent_id: None,
            description: None,
            active: true,
        };
        assert!(matches!(books.create_account(duplicate), Err(BooksError::Conflict(_))));

        let petty = books
            .create_account(AccountInput {
                code: "1150".to_string(),
                name: "Petty Cash".to_string(),
                account_type: AccountType::Asset,
                parent_id: Some(account(&books, "1000")),
                description: None,
                active: true,
            })
            .unwrap();
        books
            .storage()
            .create_journal(&CreateJournalCommand {
                date: date!(2024 - 04 - 01),
                description: "Float".to_string(),
                reference: None,
                ledger_entries: vec![
                    LedgerEntryCommand::Debit { account_id: petty.id, amount: dec!(500) },
                    LedgerEntryCommand::Credit { account_id: account(&books, "1110"), amount: dec!(500) },
                ],
            })
            .unwrap();
        assert!(matches!(books.delete_account(petty.id), Err(BooksError::Conflict(_))));

        let tree = books.account_tree().unwrap();
        let assets = tree.iter().find(|n| n.account.code == "1000").unwrap();
        assert!(assets.children.iter().any(|c| c.account.code == "1150"));
    }
}

#[test]
fn test_invoice_filter_by_status() {
    for (backend, books) in setup() {
        let posted = posted_sale(&books);
        let customer = books.get_invoice(posted).unwrap().contact_id;
        books
            .create_invoice(invoice_input(
                InvoiceKind::CustomerInvoice,
                customer,
                date!(2024 - 04 - 06),
                vec![line("x", dec!(1), dec!(1), None)],
            ))
            .unwrap();

        let drafts = InvoiceFilter {
            status: Some(InvoiceStatus::Draft),
            ..Default::default()
        };
        assert_eq!(books.list_invoices(&drafts, &Pagination::default()).unwrap().total, 1, "{backend}");
        assert_eq!(books.list_invoices(&InvoiceFilter::default(), &Pagination::default()).unwrap().total, 2);
    }
}

#[test]
fn test_foreign_currency_posts_at_exchange_rate() {
    for (backend, books) in setup() {
        let customer = contact(&books, "Globex Inc", ContactKind::Customer);
        let mut input = invoice_input(
            InvoiceKind::CustomerInvoice,
            customer,
            date!(2024 - 04 - 05),
            vec![line("Consulting", dec!(2), dec!(50), Some(tax(&books, "GST 18%")))],
        );
        input.currency = Some("USD".to_string());
        let invoice = books.create_invoice(input).unwrap();
        let invoice = books.post_invoice(invoice.id).unwrap();

        assert_eq!(invoice.exchange_rate, dec!(83), "{backend}");
        assert_eq!(invoice.totals.total_amount, dec!(118.00));
        let day = invoice.invoice_date;
        assert_eq!(balance(&books, "1200", day), dec!(9794), "{backend}");
        assert_eq!(balance(&books, "4100", day), dec!(8300));
        assert_eq!(balance(&books, "2200", day), dec!(1494));

        // Later rate changes do not touch an invoice already posted.
        books.upsert_currency(currency("USD", dec!(90), false)).unwrap();
        books.record_payment(payment(invoice.id, dec!(18.33), PaymentMethod::Upi)).unwrap();
        books.record_payment(payment(invoice.id, dec!(99.67), PaymentMethod::Upi)).unwrap();

        let pay_day = date!(2024 - 04 - 20);
        assert_eq!(books.get_invoice(invoice.id).unwrap().status, InvoiceStatus::Paid);
        assert_eq!(balance(&books, "1200", pay_day), Decimal::ZERO, "{backend}");
        assert_eq!(balance(&books, "1110", pay_day), dec!(9794));
        assert!(books.trial_balance(pay_day).unwrap().is_balanced());
    }
}

#[test]
fn test_unknown_currency_is_rejected() {
    for (backend, books) in setup() {
        let customer = contact(&books, "Globex Inc", ContactKind::Customer);
        let mut input = invoice_input(
            InvoiceKind::CustomerInvoice,
            customer,
            date!(2024 - 04 - 05),
            vec![line("Consulting", dec!(1), dec!(50), None)],
        );
        input.currency = Some("JPY".to_string());
        let err = books.create_invoice(input).unwrap_err();
        assert!(matches!(err, BooksError::Validation(_)), "{backend}: {err}");
    }
}

#[test]
fn test_base_currency_follows_settings() {
    for (backend, books) in setup() {
        let err = books.upsert_currency(currency("USD", dec!(1), true)).unwrap_err();
        assert!(matches!(err, BooksError::Validation(_)), "{backend}: {err}");
        let err = books.upsert_currency(currency("INR", dec!(1), false)).unwrap_err();
        assert!(matches!(err, BooksError::Validation(_)), "{backend}: {err}");

        let euro_books = CompanySettings {
            base_currency: "EUR".to_string(),
            ..books.settings().unwrap()
        };
        let err = books.update_settings(euro_books.clone()).unwrap_err();
        assert!(matches!(err, BooksError::Validation(_)), "{backend}: {err}");

        books.upsert_currency(currency("EUR", dec!(1), false)).unwrap();
        books.update_settings(euro_books).unwrap();
        let bases: Vec<String> = books
            .list_currencies()
            .unwrap()
            .into_iter()
            .filter(|c| c.is_base)
            .map(|c| c.code)
            .collect();
        assert_eq!(bases, vec!["EUR".to_string()], "{backend}");

        let sale = books.get_invoice(posted_sale(&books)).unwrap();
        assert_eq!(sale.currency, "EUR");
        let rupee_books = CompanySettings {
            base_currency: "INR".to_string(),
            ..books.settings().unwrap()
        };
        let err = books.update_settings(rupee_books).unwrap_err();
        assert!(matches!(err, BooksError::Conflict(_)), "{backend}: {err}");
    }
}
