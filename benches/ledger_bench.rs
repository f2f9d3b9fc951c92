use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use time::macros::date;

use shiv_accounts::books::Books;
use shiv_accounts::seed;
use shiv_accounts::storage::{InMemoryStorage, StorageBackend};
use shiv_core::{reports, CreateJournalCommand, LedgerEntryCommand};

fn setup() -> (Arc<dyn StorageBackend>, Books) {
    let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryStorage::new());
    let books = Books::new(storage.clone());
    seed::seed(&books).unwrap();
    (storage, books)
}

fn journal(storage: &dyn StorageBackend, debit: &str, credit: &str, day: time::Date, amount: Decimal) -> CreateJournalCommand {
    let debit = storage.find_account_by_code(debit).unwrap().unwrap().id;
    let credit = storage.find_account_by_code(credit).unwrap().unwrap().id;
    CreateJournalCommand {
        date: day,
        description: "Bench".to_string(),
        reference: None,
        ledger_entries: vec![
            LedgerEntryCommand::Debit { account_id: debit, amount },
            LedgerEntryCommand::Credit { account_id: credit, amount },
        ],
    }
}

/// A year of daily sales and rent payments against the default chart.
fn seed_ledger(storage: &dyn StorageBackend) {
    storage
        .create_journal(&journal(storage, "1110", "3100", date!(2023 - 01 - 01), Decimal::from(1_000_000)))
        .unwrap();
    let mut day = date!(2023 - 01 - 02);
    for i in 0..365 {
        storage
            .create_journal(&journal(storage, "1200", "4100", day, Decimal::from(1000 + i)))
            .unwrap();
        if i % 30 == 0 {
            storage
                .create_journal(&journal(storage, "5200", "1110", day, Decimal::from(25_000)))
                .unwrap();
        }
        day = day.next_day().unwrap();
    }
}

fn bench_balance_query(c: &mut Criterion) {
    let (storage, _books) = setup();
    seed_ledger(storage.as_ref());
    let receivable = storage.find_account_by_code("1200").unwrap().unwrap().id;

    c.bench_function("balance_query", |b| {
        b.iter(|| storage.get_balance(black_box(receivable), date!(2023 - 12 - 31)).unwrap())
    });
}

fn bench_trial_balance(c: &mut Criterion) {
    let (storage, _books) = setup();
    seed_ledger(storage.as_ref());

    c.bench_function("trial_balance", |b| {
        b.iter(|| reports::trial_balance(storage.as_ref(), black_box(date!(2023 - 12 - 31))).unwrap())
    });
}

fn bench_balance_sheet(c: &mut Criterion) {
    let (_storage, books) = setup();
    seed_ledger(books.storage());

    c.bench_function("balance_sheet", |b| {
        b.iter(|| books.balance_sheet(black_box(date!(2023 - 06 - 30))).unwrap())
    });
}

fn bench_journal_creation(c: &mut Criterion) {
    let (storage, _books) = setup();
    let cmd = journal(storage.as_ref(), "1100", "3100", date!(2023 - 01 - 01), Decimal::from(1000));

    c.bench_function("journal_creation", |b| {
        b.iter(|| storage.create_journal(black_box(&cmd)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_balance_query,
    bench_trial_balance,
    bench_balance_sheet,
    bench_journal_creation
);
criterion_main!(benches);
