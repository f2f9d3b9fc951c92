use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
};

use rust_decimal::Decimal;
use time::Date;
use uuid::Uuid;

use shiv_core::{
    storage::{ContactFilter, InvoiceFilter, OrderFilter, PaymentFilter, ProductFilter},
    Account, AccountType, CompanySettings, Contact, CreateJournalCommand, Currency, Invoice, JournalEntry, LedgerEntryCommand, Order,
    Payment, Product, StatementTxn, Tax,
};

// Re-export core storage types so callers can reach everything through crate::storage
pub use shiv_core::storage::{StorageBackend, StorageError, TransactionId};

#[derive(Clone, Default)]
struct BooksData {
    contacts: BTreeMap<Uuid, Contact>,
    products: BTreeMap<Uuid, Product>,
    taxes: BTreeMap<Uuid, Tax>,
    currencies: BTreeMap<String, Currency>,
    accounts: BTreeMap<Uuid, Account>,
    ledgers: BTreeMap<Uuid, LedgerStore>,
    journals: BTreeMap<Uuid, JournalEntry>,
    journal_lines: BTreeMap<Uuid, Vec<LedgerEntryCommand>>,
    invoices: BTreeMap<Uuid, Invoice>,
    orders: BTreeMap<Uuid, Order>,
    payments: BTreeMap<Uuid, Payment>,
    settings: Option<CompanySettings>,
    sequences: BTreeMap<String, u64>,
}

struct Snapshot {
    data: BooksData,
    sequence_value: u64,
}

/// Keeps the whole book set in memory. Transactions snapshot the data and
/// restore it on rollback.
pub struct InMemoryStorage {
    data: RwLock<BooksData>,
    sequence_counter: AtomicU64,
    tx_counter: AtomicU64,
    snapshots: RwLock<HashMap<TransactionId, Snapshot>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BooksData::default()),
            sequence_counter: AtomicU64::new(1),
            tx_counter: AtomicU64::new(1),
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    fn next_journal_sequence(&self) -> u64 {
        self.sequence_counter.fetch_add(1, Ordering::SeqCst)
    }
}

fn sorted<T: Clone>(items: impl Iterator<Item = T>, key: impl FnMut(&T, &T) -> std::cmp::Ordering) -> Vec<T> {
    let mut v: Vec<T> = items.collect();
    v.sort_by(key);
    v
}

impl StorageBackend for InMemoryStorage {
    fn create_contact(&self, contact: &Contact) -> Result<(), StorageError> {
        self.data.write().unwrap().contacts.insert(contact.id, contact.clone());
        Ok(())
    }

    fn get_contact(&self, id: Uuid) -> Result<Contact, StorageError> {
        self.data.read().unwrap().contacts.get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("contact", id))
    }

    fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>, StorageError> {
        let data = self.data.read().unwrap();
        Ok(sorted(
            data.contacts.values().filter(|c| filter.matches(c)).cloned(),
            |a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        ))
    }

    fn update_contact(&self, contact: &Contact) -> Result<(), StorageError> {
        let mut data = self.data.write().unwrap();
        let slot = data.contacts.get_mut(&contact.id)
            .ok_or_else(|| StorageError::not_found("contact", contact.id))?;
        *slot = contact.clone();
        Ok(())
    }

    fn delete_contact(&self, id: Uuid) -> Result<(), StorageError> {
        self.data.write().unwrap().contacts.remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("contact", id))
    }

    fn create_product(&self, product: &Product) -> Result<(), StorageError> {
        self.data.write().unwrap().products.insert(product.id, product.clone());
        Ok(())
    }

    fn get_product(&self, id: Uuid) -> Result<Product, StorageError> {
        self.data.read().unwrap().products.get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("product", id))
    }

    fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StorageError> {
        let data = self.data.read().unwrap();
        Ok(sorted(
            data.products.values().filter(|p| filter.matches(p)).cloned(),
            |a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        ))
    }

    fn update_product(&self, product: &Product) -> Result<(), StorageError> {
        let mut data = self.data.write().unwrap();
        let slot = data.products.get_mut(&product.id)
            .ok_or_else(|| StorageError::not_found("product", product.id))?;
        *slot = product.clone();
        Ok(())
    }

    fn delete_product(&self, id: Uuid) -> Result<(), StorageError> {
        self.data.write().unwrap().products.remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("product", id))
    }

    fn create_tax(&self, tax: &Tax) -> Result<(), StorageError> {
        self.data.write().unwrap().taxes.insert(tax.id, tax.clone());
        Ok(())
    }

    fn get_tax(&self, id: Uuid) -> Result<Tax, StorageError> {
        self.data.read().unwrap().taxes.get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("tax", id))
    }

    fn list_taxes(&self) -> Result<Vec<Tax>, StorageError> {
        let data = self.data.read().unwrap();
        Ok(sorted(data.taxes.values().cloned(), |a, b| {
            a.rate.cmp(&b.rate).then_with(|| a.name.cmp(&b.name))
        }))
    }

    fn update_tax(&self, tax: &Tax) -> Result<(), StorageError> {
        let mut data = self.data.write().unwrap();
        let slot = data.taxes.get_mut(&tax.id)
            .ok_or_else(|| StorageError::not_found("tax", tax.id))?;
        *slot = tax.clone();
        Ok(())
    }

    fn delete_tax(&self, id: Uuid) -> Result<(), StorageError> {
        self.data.write().unwrap().taxes.remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("tax", id))
    }

    fn upsert_currency(&self, currency: &Currency) -> Result<(), StorageError> {
        self.data.write().unwrap().currencies.insert(currency.code.clone(), currency.clone());
        Ok(())
    }

    fn list_currencies(&self) -> Result<Vec<Currency>, StorageError> {
        Ok(self.data.read().unwrap().currencies.values().cloned().collect())
    }

    fn create_account(&self, account: &Account) -> Result<(), StorageError> {
        let mut data = self.data.write().unwrap();
        if data.accounts.values().any(|a| a.code == account.code) {
            return Err(StorageError::Duplicate(format!("account code {}", account.code)));
        }
        data.accounts.insert(account.id, account.clone());
        data.ledgers.insert(account.id, LedgerStore::new(account.account_type));
        Ok(())
    }

    fn get_account(&self, id: Uuid) -> Result<Account, StorageError> {
        self.data.read().unwrap().accounts.get(&id)
            .cloned()
            .ok_or_else(|| StorageError::AccountNotFound(id.to_string()))
    }

    fn find_account_by_code(&self, code: &str) -> Result<Option<Account>, StorageError> {
        Ok(self.data.read().unwrap().accounts.values().find(|a| a.code == code).cloned())
    }

    fn list_accounts(&self) -> Result<Vec<Account>, StorageError> {
        let data = self.data.read().unwrap();
        Ok(sorted(data.accounts.values().cloned(), |a, b| a.code.cmp(&b.code)))
    }

    fn update_account(&self, account: &Account) -> Result<(), StorageError> {
        let mut data = self.data.write().unwrap();
        if data.accounts.values().any(|a| a.code == account.code && a.id != account.id) {
            return Err(StorageError::Duplicate(format!("account code {}", account.code)));
        }
        let slot = data.accounts.get_mut(&account.id)
            .ok_or_else(|| StorageError::AccountNotFound(account.id.to_string()))?;
        *slot = account.clone();
        if let Some(ledger) = data.ledgers.get_mut(&account.id) {
            ledger.account_type = account.account_type;
        }
        Ok(())
    }

    fn delete_account(&self, id: Uuid) -> Result<(), StorageError> {
        let mut data = self.data.write().unwrap();
        data.accounts.remove(&id)
            .ok_or_else(|| StorageError::AccountNotFound(id.to_string()))?;
        data.ledgers.remove(&id);
        Ok(())
    }

    fn account_has_entries(&self, id: Uuid) -> Result<bool, StorageError> {
        let data = self.data.read().unwrap();
        let ledger = data.ledgers.get(&id)
            .ok_or_else(|| StorageError::AccountNotFound(id.to_string()))?;
        Ok(!ledger.days.is_empty())
    }

    fn create_journal(&self, command: &CreateJournalCommand) -> Result<Uuid, StorageError> {
        let jid = Uuid::new_v4();
        let seq = self.next_journal_sequence();

        let entry = JournalEntry {
            id: jid,
            sequence: seq,
            date: command.date,
            description: command.description.clone(),
            reference: command.reference.clone(),
            created_at: time::OffsetDateTime::now_utc(),
        };

        let mut data = self.data.write().unwrap();

        // Validate every account before touching any ledger.
        for ledger_entry in &command.ledger_entries {
            if !data.ledgers.contains_key(&ledger_entry.account_id()) {
                return Err(StorageError::AccountNotFound(ledger_entry.account_id().to_string()));
            }
        }

        data.journals.insert(jid, entry);
        data.journal_lines.insert(jid, command.ledger_entries.clone());
        for ledger_entry in &command.ledger_entries {
            if let Some(ledger) = data.ledgers.get_mut(&ledger_entry.account_id()) {
                ledger.add_entry(command.date, jid, ledger_entry.debit_positive());
            }
        }

        Ok(jid)
    }

    fn get_journal(&self, id: Uuid) -> Result<JournalEntry, StorageError> {
        self.data.read().unwrap().journals.get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("journal", id))
    }

    fn get_journal_entries(&self, id: Uuid) -> Result<Vec<LedgerEntryCommand>, StorageError> {
        self.data.read().unwrap().journal_lines.get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("journal", id))
    }

    fn get_balance(&self, account_id: Uuid, date: Date) -> Result<Decimal, StorageError> {
        let data = self.data.read().unwrap();
        let ledger = data.ledgers.get(&account_id)
            .ok_or_else(|| StorageError::AccountNotFound(account_id.to_string()))?;
        Ok(ledger.get_balance(date))
    }

    fn get_statement(&self, account_id: Uuid, from: Date, to: Date) -> Result<Vec<StatementTxn>, StorageError> {
        let data = self.data.read().unwrap();
        let ledger = data.ledgers.get(&account_id)
            .ok_or_else(|| StorageError::AccountNotFound(account_id.to_string()))?;

        let mut result = Vec::new();
        for (jid, date, amount, balance) in ledger.get_statement(from, to) {
            if let Some(j) = data.journals.get(&jid) {
                result.push(StatementTxn {
                    journal_id: jid,
                    date,
                    description: j.description.clone(),
                    amount,
                    balance,
                });
            }
        }
        Ok(result)
    }

    fn save_invoice(&self, invoice: &Invoice) -> Result<(), StorageError> {
        let mut data = self.data.write().unwrap();
        if data.invoices.values().any(|i| i.number == invoice.number && i.id != invoice.id) {
            return Err(StorageError::Duplicate(format!("invoice number {}", invoice.number)));
        }
        data.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    fn get_invoice(&self, id: Uuid) -> Result<Invoice, StorageError> {
        self.data.read().unwrap().invoices.get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("invoice", id))
    }

    fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StorageError> {
        let data = self.data.read().unwrap();
        Ok(sorted(
            data.invoices.values().filter(|i| filter.matches(i)).cloned(),
            |a, b| a.invoice_date.cmp(&b.invoice_date).then_with(|| a.number.cmp(&b.number)),
        ))
    }

    fn delete_invoice(&self, id: Uuid) -> Result<(), StorageError> {
        self.data.write().unwrap().invoices.remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("invoice", id))
    }

    fn save_order(&self, order: &Order) -> Result<(), StorageError> {
        let mut data = self.data.write().unwrap();
        if data.orders.values().any(|o| o.number == order.number && o.id != order.id) {
            return Err(StorageError::Duplicate(format!("order number {}", order.number)));
        }
        data.orders.insert(order.id, order.clone());
        Ok(())
    }

    fn get_order(&self, id: Uuid) -> Result<Order, StorageError> {
        self.data.read().unwrap().orders.get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("order", id))
    }

    fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StorageError> {
        let data = self.data.read().unwrap();
        Ok(sorted(
            data.orders.values().filter(|o| filter.matches(o)).cloned(),
            |a, b| a.order_date.cmp(&b.order_date).then_with(|| a.number.cmp(&b.number)),
        ))
    }

    fn delete_order(&self, id: Uuid) -> Result<(), StorageError> {
        self.data.write().unwrap().orders.remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("order", id))
    }

    fn create_payment(&self, payment: &Payment) -> Result<(), StorageError> {
        let mut data = self.data.write().unwrap();
        if !data.invoices.contains_key(&payment.invoice_id) {
            return Err(StorageError::not_found("invoice", payment.invoice_id));
        }
        data.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    fn get_payment(&self, id: Uuid) -> Result<Payment, StorageError> {
        self.data.read().unwrap().payments.get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("payment", id))
    }

    fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StorageError> {
        let data = self.data.read().unwrap();
        Ok(sorted(
            data.payments.values().filter(|p| filter.matches(p)).cloned(),
            |a, b| a.date.cmp(&b.date).then_with(|| a.number.cmp(&b.number)),
        ))
    }

    fn get_settings(&self) -> Result<Option<CompanySettings>, StorageError> {
        Ok(self.data.read().unwrap().settings.clone())
    }

    fn save_settings(&self, settings: &CompanySettings) -> Result<(), StorageError> {
        self.data.write().unwrap().settings = Some(settings.clone());
        Ok(())
    }

    fn next_sequence(&self, name: &str) -> Result<u64, StorageError> {
        let mut data = self.data.write().unwrap();
        let value = data.sequences.entry(name.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        let tx_id = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        let snapshot = Snapshot {
            data: self.data.read().unwrap().clone(),
            sequence_value: self.sequence_counter.load(Ordering::SeqCst),
        };
        self.snapshots.write().unwrap().insert(tx_id, snapshot);
        tracing::debug!(tx_id, "Transaction started");
        Ok(tx_id)
    }

    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.snapshots.write().unwrap().remove(&tx_id)
            .ok_or(StorageError::NoActiveTransaction)?;
        tracing::debug!(tx_id, "Transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        let snapshot = self.snapshots.write().unwrap().remove(&tx_id)
            .ok_or(StorageError::NoActiveTransaction)?;
        *self.data.write().unwrap() = snapshot.data;
        self.sequence_counter.store(snapshot.sequence_value, Ordering::SeqCst);
        tracing::debug!(tx_id, "Transaction rolled back");
        Ok(())
    }
}

#[derive(Clone)]
struct LedgerStore {
    account_type: AccountType,
    days: BTreeMap<Date, LedgerDay>,
}

impl LedgerStore {
    pub fn new(account_type: AccountType) -> Self {
        Self {
            account_type,
            days: BTreeMap::new(),
        }
    }

    /// Entries are stored debit-positive; the account type is applied on read
    /// so that a type change re-signs history consistently.
    pub fn add_entry(&mut self, date: Date, journal_id: Uuid, debit_positive: Decimal) {
        let day = self.days.entry(date).or_insert_with(LedgerDay::new);
        day.add_entry(journal_id, debit_positive);
    }

    pub fn get_balance(&self, date: Date) -> Decimal {
        let raw: Decimal = self.days
            .range((Bound::Unbounded, Bound::Included(date)))
            .map(|(_, day)| day.total)
            .sum();
        self.account_type.natural_amount(raw)
    }

    pub fn get_statement(&self, from: Date, to: Date) -> Vec<(Uuid, Date, Decimal, Decimal)> {
        let mut result = Vec::new();
        if from > to {
            return result;
        }

        let mut balance = match from.previous_day() {
            Some(d) => self.get_balance(d),
            None => Decimal::ZERO,
        };

        for (date, day) in self.days.range((Bound::Included(from), Bound::Included(to))) {
            for (jid, raw) in &day.entries {
                let amount = self.account_type.natural_amount(*raw);
                balance += amount;
                result.push((*jid, *date, amount, balance));
            }
        }

        result
    }
}

#[derive(Debug, Clone)]
struct LedgerDay {
    total: Decimal,
    entries: Vec<(Uuid, Decimal)>,
}

impl LedgerDay {
    pub fn new() -> Self {
        Self {
            total: Decimal::ZERO,
            entries: Vec::new(),
        }
    }

    pub fn add_entry(&mut self, journal_id: Uuid, amount: Decimal) {
        self.entries.push((journal_id, amount));
        self.total += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::date;

    fn account(code: &str, account_type: AccountType) -> Account {
        Account {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: code.to_string(),
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
            description: "test".to_string(),
            reference: None,
            ledger_entries: vec![
                LedgerEntryCommand::Debit { account_id: debit.id, amount },
                LedgerEntryCommand::Credit { account_id: credit.id, amount },
            ],
        }
    }

    #[test]
    fn balances_follow_account_side() {
        let storage = InMemoryStorage::new();
        let bank = account("1110", AccountType::Asset);
        let capital = account("3100", AccountType::Equity);
        storage.create_account(&bank).unwrap();
        storage.create_account(&capital).unwrap();

        storage.create_journal(&journal(date!(2024 - 01 - 01), &bank, &capital, dec!(1000))).unwrap();

        assert_eq!(storage.get_balance(bank.id, date!(2024 - 01 - 01)).unwrap(), dec!(1000));
        assert_eq!(storage.get_balance(capital.id, date!(2024 - 01 - 01)).unwrap(), dec!(1000));
        assert_eq!(storage.get_balance(bank.id, date!(2023 - 12 - 31)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn statement_carries_running_balance() {
        let storage = InMemoryStorage::new();
        let bank = account("1110", AccountType::Asset);
        let capital = account("3100", AccountType::Equity);
        storage.create_account(&bank).unwrap();
        storage.create_account(&capital).unwrap();

        storage.create_journal(&journal(date!(2024 - 01 - 01), &bank, &capital, dec!(100))).unwrap();
        storage.create_journal(&journal(date!(2024 - 02 - 01), &bank, &capital, dec!(50))).unwrap();
        storage.create_journal(&journal(date!(2024 - 02 - 15), &capital, &bank, dec!(30))).unwrap();

        let stmt = storage.get_statement(bank.id, date!(2024 - 02 - 01), date!(2024 - 02 - 28)).unwrap();
        let balances: Vec<Decimal> = stmt.iter().map(|t| t.balance).collect();
        assert_eq!(balances, vec![dec!(150), dec!(120)]);
        assert_eq!(stmt[1].amount, dec!(-30));
    }

    #[test]
    fn journal_entries_come_back_in_written_order() {
        let storage = InMemoryStorage::new();
        let bank = account("1110", AccountType::Asset);
        let sales = account("4100", AccountType::Income);
        let tax = account("2200", AccountType::Liability);
        for a in [&bank, &sales, &tax] {
            storage.create_account(a).unwrap();
        }

        let command = CreateJournalCommand {
            date: date!(2024 - 04 - 01),
            description: "Invoice".to_string(),
            reference: None,
            ledger_entries: vec![
                LedgerEntryCommand::Credit { account_id: tax.id, amount: dec!(18) },
                LedgerEntryCommand::Debit { account_id: bank.id, amount: dec!(118) },
                LedgerEntryCommand::Credit { account_id: sales.id, amount: dec!(100) },
            ],
        };
        let jid = storage.create_journal(&command).unwrap();

        assert_eq!(storage.get_journal_entries(jid).unwrap(), command.ledger_entries);
        assert!(matches!(
            storage.get_journal_entries(Uuid::new_v4()),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn journal_with_unknown_account_leaves_no_trace() {
        let storage = InMemoryStorage::new();
        let bank = account("1110", AccountType::Asset);
        let ghost = account("9999", AccountType::Income);
        storage.create_account(&bank).unwrap();

        let err = storage.create_journal(&journal(date!(2024 - 01 - 01), &bank, &ghost, dec!(10))).unwrap_err();
        assert!(matches!(err, StorageError::AccountNotFound(_)));
        assert!(!storage.account_has_entries(bank.id).unwrap());
    }

    #[test]
    fn rollback_restores_snapshot() {
        let storage = InMemoryStorage::new();
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
        assert!(matches!(storage.commit_transaction(tx), Err(StorageError::NoActiveTransaction)));
    }

    #[test]
    fn duplicate_account_codes_are_rejected() {
        let storage = InMemoryStorage::new();
        storage.create_account(&account("1000", AccountType::Asset)).unwrap();
        assert!(matches!(
            storage.create_account(&account("1000", AccountType::Asset)),
            Err(StorageError::Duplicate(_))
        ));
    }
}
