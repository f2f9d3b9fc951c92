use super::*;
use rust_decimal_macros::dec;
use shiv_core::{
    models::read::{InvoiceKind, InvoiceStatus},
    ContactKind, LedgerEntryCommand,
};
use time::macros::date;

fn storage() -> SqliteStorage {
    SqliteStorage::open(":memory:").unwrap()
}

fn account(code: &str, account_type: AccountType) -> Account {
    Account {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: format!("Account {code}"),
        account_type,
        parent_id: None,
        description: None,
        is_system: false,
        active: true,
    }
}

fn journal(date: Date, debit: &Account, credit: &Account, amount: Decimal) -> CreateJournalCommand {
    CreateJournalCommand {
        date,
        description: format!("{} to {}", debit.code, credit.code),
        reference: None,
        ledger_entries: vec![
            LedgerEntryCommand::Debit { account_id: debit.id, amount },
            LedgerEntryCommand::Credit { account_id: credit.id, amount },
        ],
    }
}

fn line(quantity: Decimal, unit_price: Decimal) -> DocumentLine {
    DocumentLine {
        product_id: None,
        description: "Consulting".to_string(),
        quantity,
        unit_price,
        tax_id: None,
        tax_rate: dec!(18),
        discount: Decimal::ZERO,
        account_id: None,
        sub_total: quantity * unit_price,
        tax_amount: quantity * unit_price * dec!(0.18),
        total: quantity * unit_price * dec!(1.18),
    }
}

fn invoice(number: &str) -> Invoice {
    let lines = vec![line(dec!(2), dec!(500))];
    let totals = DocumentTotals::from_lines(&lines);
    Invoice {
        id: Uuid::new_v4(),
        number: number.to_string(),
        kind: InvoiceKind::CustomerInvoice,
        contact_id: Uuid::new_v4(),
        invoice_date: date!(2024 - 04 - 01),
        due_date: date!(2024 - 05 - 01),
        reference: Some("PO-77".to_string()),
        currency: "INR".to_string(),
        exchange_rate: Decimal::ONE,
        status: InvoiceStatus::Draft,
        lines,
        totals,
        paid_amount: Decimal::ZERO,
        balance_amount: totals.total_amount,
        journal_id: None,
        order_id: None,
        notes: None,
        created_at: OffsetDateTime::from_unix_timestamp(1_711_929_600).unwrap(),
    }
}

#[test]
fn setup_reports_existing_schema() {
    let storage = SqliteStorage::connect(":memory:").unwrap();
    storage.setup().unwrap();
    assert!(matches!(storage.setup(), Err(StorageError::SchemaExists)));
}

#[test]
fn reset_clears_everything() {
    let storage = storage();
    storage.create_account(&account("1100", AccountType::Asset)).unwrap();
    storage.reset().unwrap();
    assert!(storage.list_accounts().unwrap().is_empty());
    assert!(storage.schema_exists().unwrap());
}

#[test]
fn contact_roundtrips_address() {
    let storage = storage();
    let contact = Contact {
        id: Uuid::new_v4(),
        name: "Acme Traders".to_string(),
        kind: ContactKind::Customer,
        email: Some("billing@acme.in".to_string()),
        phone: None,
        gstin: Some("27AAPFU0939F1ZV".to_string()),
        address: Some(shiv_core::Address {
            line1: "12 MG Road".to_string(),
            line2: None,
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            postal_code: "411001".to_string(),
            country: "India".to_string(),
        }),
        created_at: OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
    };
    storage.create_contact(&contact).unwrap();
    assert_eq!(storage.get_contact(contact.id).unwrap(), contact);

    let found = storage
        .list_contacts(&ContactFilter { kind: None, search: Some("acme".to_string()) })
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn balances_and_statement() {
    let storage = storage();
    let bank = account("1110", AccountType::Asset);
    let capital = account("3100", AccountType::Equity);
    storage.create_account(&bank).unwrap();
    storage.create_account(&capital).unwrap();

    storage.create_journal(&journal(date!(2024 - 01 - 01), &bank, &capital, dec!(100))).unwrap();
    storage.create_journal(&journal(date!(2024 - 02 - 01), &bank, &capital, dec!(50))).unwrap();
    storage.create_journal(&journal(date!(2024 - 02 - 15), &capital, &bank, dec!(30))).unwrap();

    assert_eq!(storage.get_balance(bank.id, date!(2024 - 12 - 31)).unwrap(), dec!(120));
    assert_eq!(storage.get_balance(capital.id, date!(2024 - 01 - 31)).unwrap(), dec!(100));

    let stmt = storage.get_statement(bank.id, date!(2024 - 02 - 01), date!(2024 - 02 - 28)).unwrap();
    let balances: Vec<Decimal> = stmt.iter().map(|t| t.balance).collect();
    assert_eq!(balances, vec![dec!(150), dec!(120)]);
    assert!(storage.account_has_entries(bank.id).unwrap());
}

#[test]
fn journal_with_unknown_account_is_not_written() {
    let storage = storage();
    let bank = account("1110", AccountType::Asset);
    let ghost = account("9999", AccountType::Income);
    storage.create_account(&bank).unwrap();

    let err = storage
        .create_journal(&journal(date!(2024 - 01 - 01), &bank, &ghost, dec!(10)))
        .unwrap_err();
    assert!(matches!(err, StorageError::AccountNotFound(_)));
    assert!(!storage.account_has_entries(bank.id).unwrap());
}

#[test]
fn duplicate_account_code_is_rejected() {
    let storage = storage();
    storage.create_account(&account("1000", AccountType::Asset)).unwrap();
    assert!(matches!(
        storage.create_account(&account("1000", AccountType::Asset)),
        Err(StorageError::Duplicate(_))
    ));
}

#[test]
fn invoice_roundtrips_with_lines() {
    let storage = storage();
    let mut inv = invoice("INV/2024/0001");
    storage.save_invoice(&inv).unwrap();
    assert_eq!(storage.get_invoice(inv.id).unwrap(), inv);

    inv.status = InvoiceStatus::Posted;
    inv.lines.push(line(dec!(1), dec!(100)));
    inv.totals = DocumentTotals::from_lines(&inv.lines);
    storage.save_invoice(&inv).unwrap();

    let loaded = storage.get_invoice(inv.id).unwrap();
    assert_eq!(loaded.lines.len(), 2);
    assert_eq!(loaded.status, InvoiceStatus::Posted);

    let posted = storage
        .list_invoices(&InvoiceFilter { status: Some(InvoiceStatus::Posted), ..Default::default() })
        .unwrap();
    assert_eq!(posted.len(), 1);

    let other = invoice("INV/2024/0001");
    assert!(matches!(storage.save_invoice(&other), Err(StorageError::Duplicate(_))));
}

#[test]
fn rollback_discards_writes() {
    let storage = storage();
    let bank = account("1110", AccountType::Asset);
    let capital = account("3100", AccountType::Equity);
    storage.create_account(&bank).unwrap();
    storage.create_account(&capital).unwrap();

    let tx = storage.begin_transaction().unwrap();
    storage.create_journal(&journal(date!(2024 - 01 - 01), &bank, &capital, dec!(500))).unwrap();
    assert_eq!(storage.next_sequence("INV/2024").unwrap(), 1);
    storage.rollback_transaction(tx).unwrap();

    assert_eq!(storage.get_balance(bank.id, date!(2024 - 12 - 31)).unwrap(), Decimal::ZERO);
    assert_eq!(storage.next_sequence("INV/2024").unwrap(), 1);
    assert_eq!(storage.next_sequence("INV/2024").unwrap(), 2);
}

#[test]
fn settings_are_stored_as_json() {
    let storage = storage();
    assert!(storage.get_settings().unwrap().is_none());

    let mut settings = CompanySettings::default();
    settings.company_name = "Shiv Traders".to_string();
    storage.save_settings(&settings).unwrap();
    assert_eq!(storage.get_settings().unwrap(), Some(settings));
}
