//! SQLite storage backend for Shiv Accounts.

use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use shiv_core::{
    format::{date_to_iso, parse_iso_date},
    storage::{ContactFilter, InvoiceFilter, OrderFilter, PaymentFilter, ProductFilter},
    Account, AccountType, CompanySettings, Contact, CreateJournalCommand, Currency, DocumentLine, DocumentTotals, Invoice,
    JournalEntry, LedgerEntryCommand, Order, Payment, Product, StatementTxn, StorageBackend, StorageError, Tax, TransactionId,
};

mod schema;

pub use schema::SCHEMA_VERSION;

pub struct SqliteStorage {
    conn: Mutex<Connection>,
    tx_counter: AtomicU64,
    active_tx: Mutex<Option<TransactionId>>,
}

fn db_err(e: rusqlite::Error) -> StorageError {
    StorageError::Other(e.to_string())
}

fn corrupt(what: &str, value: &str) -> StorageError {
    StorageError::Corrupt(format!("{what}: {value}"))
}

impl SqliteStorage {
    /// Opens the database, creating any missing tables.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let storage = Self::connect(path)?;
        storage.init_schema()?;
        Ok(storage)
    }

    /// Opens the database without touching the schema.
    pub fn connect(path: &str) -> Result<Self, StorageError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(db_err)?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(db_err)?;

        Ok(Self {
            conn: Mutex::new(conn),
            tx_counter: AtomicU64::new(1),
            active_tx: Mutex::new(None),
        })
    }

    pub fn schema_exists(&self) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .map_err(db_err)
    }

    /// Creates the schema on a fresh database. Fails with `SchemaExists` when
    /// the tables are already there.
    pub fn setup(&self) -> Result<(), StorageError> {
        if self.schema_exists()? {
            return Err(StorageError::SchemaExists);
        }
        self.init_schema()
    }

    /// Drops every table and recreates an empty schema.
    pub fn reset(&self) -> Result<(), StorageError> {
        {
            let conn = self.conn.lock().unwrap();
            conn.execute_batch(schema::DROP_ALL).map_err(db_err)?;
        }
        tracing::info!("dropped all tables");
        self.init_schema()
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(schema::CREATE_ALL).map_err(db_err)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (id, version) VALUES (1, ?1)",
            params![SCHEMA_VERSION],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn write_lines(conn: &Connection, table: &str, owner: &str, owner_id: Uuid, lines: &[DocumentLine]) -> Result<(), StorageError> {
        conn.execute(&format!("DELETE FROM {table} WHERE {owner} = ?1"), params![owner_id.to_string()])
            .map_err(db_err)?;
        let sql = format!(
            "INSERT INTO {table} ({owner}, position, product_id, description, quantity, unit_price, tax_id, tax_rate,
                discount, account_id, sub_total, tax_amount, total)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        for (position, line) in lines.iter().enumerate() {
            stmt.execute(params![
                owner_id.to_string(),
                position as i64,
                line.product_id.map(|u| u.to_string()),
                line.description,
                line.quantity.to_string(),
                line.unit_price.to_string(),
                line.tax_id.map(|u| u.to_string()),
                line.tax_rate.to_string(),
                line.discount.to_string(),
                line.account_id.map(|u| u.to_string()),
                line.sub_total.to_string(),
                line.tax_amount.to_string(),
                line.total.to_string(),
            ])
            .map_err(db_err)?;
        }
        Ok(())
    }

    fn read_lines(conn: &Connection, table: &str, owner: &str, owner_id: &str) -> Result<Vec<DocumentLine>, StorageError> {
        let sql = format!(
            "SELECT product_id, description, quantity, unit_price, tax_id, tax_rate, discount, account_id,
                    sub_total, tax_amount, total
             FROM {table} WHERE {owner} = ?1 ORDER BY position"
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![owner_id], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, String>(10)?,
                ))
            })
            .map_err(db_err)?;

        let mut lines = Vec::new();
        for row in rows {
            let (product_id, description, quantity, unit_price, tax_id, tax_rate, discount, account_id, sub_total, tax_amount, total) =
                row.map_err(db_err)?;
            lines.push(DocumentLine {
                product_id: opt_uuid(product_id)?,
                description,
                quantity: dec(&quantity)?,
                unit_price: dec(&unit_price)?,
                tax_id: opt_uuid(tax_id)?,
                tax_rate: dec(&tax_rate)?,
                discount: dec(&discount)?,
                account_id: opt_uuid(account_id)?,
                sub_total: dec(&sub_total)?,
                tax_amount: dec(&tax_amount)?,
                total: dec(&total)?,
            });
        }
        Ok(lines)
    }

    fn natural_sum(conn: &Connection, account_id: Uuid, up_to: Option<Date>) -> Result<(AccountType, Decimal), StorageError> {
        let account_type = account_type_of(conn, account_id)?;
        let mut stmt = conn
            .prepare("SELECT amount FROM ledger_entries WHERE account_id = ?1 AND date <= ?2")
            .map_err(db_err)?;
        let limit = up_to.map(date_to_iso).unwrap_or_else(|| "9999-12-31".to_string());
        let rows = stmt
            .query_map(params![account_id.to_string(), limit], |row| row.get::<_, String>(0))
            .map_err(db_err)?;
        let mut raw = Decimal::ZERO;
        for row in rows {
            raw += dec(&row.map_err(db_err)?)?;
        }
        Ok((account_type, account_type.natural_amount(raw)))
    }
}

fn account_type_of(conn: &Connection, account_id: Uuid) -> Result<AccountType, StorageError> {
    let text: Option<String> = conn
        .query_row(
            "SELECT account_type FROM accounts WHERE id = ?1",
            params![account_id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)?;
    match text {
        Some(t) => parse_enum(&t),
        None => Err(StorageError::AccountNotFound(account_id.to_string())),
    }
}

fn dec(s: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(s).map_err(|_| corrupt("decimal", s))
}

fn uuid(s: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(s).map_err(|_| corrupt("uuid", s))
}

fn opt_uuid(s: Option<String>) -> Result<Option<Uuid>, StorageError> {
    s.as_deref().map(uuid).transpose()
}

fn date(s: &str) -> Result<Date, StorageError> {
    parse_iso_date(s).ok_or_else(|| corrupt("date", s))
}

fn opt_date(s: Option<String>) -> Result<Option<Date>, StorageError> {
    s.as_deref().map(date).transpose()
}

fn timestamp(s: &str) -> Result<OffsetDateTime, StorageError> {
    let secs: i64 = s.parse().map_err(|_| corrupt("timestamp", s))?;
    OffsetDateTime::from_unix_timestamp(secs).map_err(|_| corrupt("timestamp", s))
}

fn now_ts(t: OffsetDateTime) -> String {
    t.unix_timestamp().to_string()
}

fn parse_enum<T: FromStr>(s: &str) -> Result<T, StorageError> {
    s.parse::<T>().map_err(|_| corrupt("enum", s))
}

fn json<T: serde::de::DeserializeOwned>(s: Option<String>) -> Result<Option<T>, StorageError> {
    s.map(|text| serde_json::from_str(&text).map_err(|e| StorageError::Corrupt(e.to_string())))
        .transpose()
}

fn to_json<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>, StorageError> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v).map_err(|e| StorageError::Other(e.to_string())))
        .transpose()
}

fn check_changed(changed: usize, kind: &'static str, id: impl ToString) -> Result<(), StorageError> {
    if changed == 0 {
        Err(StorageError::not_found(kind, id))
    } else {
        Ok(())
    }
}

fn unique_violation(e: rusqlite::Error, what: String) -> StorageError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, _) if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => {
            StorageError::Duplicate(what)
        }
        other => db_err(other),
    }
}

const CONTACT_COLUMNS: &str = "id, name, kind, email, phone, gstin, address, created_at";

fn contact_from_row(row: &Row) -> rusqlite::Result<[Option<String>; 8]> {
    Ok([
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ])
}

fn build_contact(cols: [Option<String>; 8]) -> Result<Contact, StorageError> {
    let [id, name, kind, email, phone, gstin, address, created_at] = cols;
    Ok(Contact {
        id: uuid(&id.unwrap_or_default())?,
        name: name.unwrap_or_default(),
        kind: parse_enum(&kind.unwrap_or_default())?,
        email,
        phone,
        gstin,
        address: json(address)?,
        created_at: timestamp(&created_at.unwrap_or_default())?,
    })
}

const PRODUCT_COLUMNS: &str = "id, name, kind, sku, hsn_code, unit, sales_price, purchase_price, sales_tax_id, purchase_tax_id,
    income_account_id, expense_account_id, active";

fn product_from_row(row: &Row) -> rusqlite::Result<(Vec<Option<String>>, bool)> {
    let mut cols = Vec::with_capacity(12);
    for i in 0..12 {
        cols.push(row.get::<_, Option<String>>(i)?);
    }
    Ok((cols, row.get(12)?))
}

fn build_product((cols, active): (Vec<Option<String>>, bool)) -> Result<Product, StorageError> {
    let mut it = cols.into_iter();
    let mut next = || it.next().flatten();
    Ok(Product {
        id: uuid(&next().unwrap_or_default())?,
        name: next().unwrap_or_default(),
        kind: parse_enum(&next().unwrap_or_default())?,
        sku: next(),
        hsn_code: next(),
        unit: next().unwrap_or_default(),
        sales_price: dec(&next().unwrap_or_default())?,
        purchase_price: dec(&next().unwrap_or_default())?,
        sales_tax_id: opt_uuid(next())?,
        purchase_tax_id: opt_uuid(next())?,
        income_account_id: opt_uuid(next())?,
        expense_account_id: opt_uuid(next())?,
        active,
    })
}

fn tax_from_row(row: &Row) -> rusqlite::Result<(String, String, String, String, bool)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn build_tax((id, name, rate, scope, active): (String, String, String, String, bool)) -> Result<Tax, StorageError> {
    Ok(Tax {
        id: uuid(&id)?,
        name,
        rate: dec(&rate)?,
        scope: parse_enum(&scope)?,
        active,
    })
}

const ACCOUNT_COLUMNS: &str = "id, code, name, account_type, parent_id, description, is_system, active";

type AccountRow = (String, String, String, String, Option<String>, Option<String>, bool, bool);

fn account_from_row(row: &Row) -> rusqlite::Result<AccountRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn build_account((id, code, name, account_type, parent_id, description, is_system, active): AccountRow) -> Result<Account, StorageError> {
    Ok(Account {
        id: uuid(&id)?,
        code,
        name,
        account_type: parse_enum(&account_type)?,
        parent_id: opt_uuid(parent_id)?,
        description,
        is_system,
        active,
    })
}

const INVOICE_COLUMNS: &str = "id, number, kind, contact_id, invoice_date, due_date, reference, currency, exchange_rate, status,
    sub_total, tax_amount, discount_amount, total_amount, paid_amount, balance_amount, journal_id, order_id, notes, created_at";

fn invoice_from_row(row: &Row) -> rusqlite::Result<Vec<Option<String>>> {
    (0..20).map(|i| row.get::<_, Option<String>>(i)).collect()
}

fn build_invoice(conn: &Connection, cols: Vec<Option<String>>) -> Result<Invoice, StorageError> {
    let mut it = cols.into_iter();
    let mut next = || it.next().flatten().unwrap_or_default();
    let id = next();
    let number = next();
    let kind = parse_enum(&next())?;
    let contact_id = uuid(&next())?;
    let invoice_date = date(&next())?;
    let due_date = date(&next())?;
    let reference = Some(next()).filter(|s| !s.is_empty());
    let currency = next();
    let exchange_rate = dec(&next())?;
    let status = parse_enum(&next())?;
    let totals = DocumentTotals {
        sub_total: dec(&next())?,
        tax_amount: dec(&next())?,
        discount_amount: dec(&next())?,
        total_amount: dec(&next())?,
    };
    let paid_amount = dec(&next())?;
    let balance_amount = dec(&next())?;
    let journal_id = opt_uuid(Some(next()).filter(|s| !s.is_empty()))?;
    let order_id = opt_uuid(Some(next()).filter(|s| !s.is_empty()))?;
    let notes = Some(next()).filter(|s| !s.is_empty());
    let created_at = timestamp(&next())?;
    let lines = SqliteStorage::read_lines(conn, "invoice_lines", "invoice_id", &id)?;

    Ok(Invoice {
        id: uuid(&id)?,
        number,
        kind,
        contact_id,
        invoice_date,
        due_date,
        reference,
        currency,
        exchange_rate,
        status,
        lines,
        totals,
        paid_amount,
        balance_amount,
        journal_id,
        order_id,
        notes,
        created_at,
    })
}

const ORDER_COLUMNS: &str = "id, number, kind, contact_id, order_date, expected_date, status,
    sub_total, tax_amount, discount_amount, total_amount, invoice_id, notes, created_at";

fn order_from_row(row: &Row) -> rusqlite::Result<Vec<Option<String>>> {
    (0..14).map(|i| row.get::<_, Option<String>>(i)).collect()
}

fn build_order(conn: &Connection, cols: Vec<Option<String>>) -> Result<Order, StorageError> {
    let mut it = cols.into_iter();
    let mut next = || it.next().flatten();
    let id = next().unwrap_or_default();
    let number = next().unwrap_or_default();
    let kind = parse_enum(&next().unwrap_or_default())?;
    let contact_id = uuid(&next().unwrap_or_default())?;
    let order_date = date(&next().unwrap_or_default())?;
    let expected_date = opt_date(next())?;
    let status = parse_enum(&next().unwrap_or_default())?;
    let totals = DocumentTotals {
        sub_total: dec(&next().unwrap_or_default())?,
        tax_amount: dec(&next().unwrap_or_default())?,
        discount_amount: dec(&next().unwrap_or_default())?,
        total_amount: dec(&next().unwrap_or_default())?,
    };
    let invoice_id = opt_uuid(next())?;
    let notes = next();
    let created_at = timestamp(&next().unwrap_or_default())?;
    let lines = SqliteStorage::read_lines(conn, "order_lines", "order_id", &id)?;

    Ok(Order {
        id: uuid(&id)?,
        number,
        kind,
        contact_id,
        order_date,
        expected_date,
        status,
        lines,
        totals,
        invoice_id,
        notes,
        created_at,
    })
}

const PAYMENT_COLUMNS: &str = "id, number, invoice_id, contact_id, kind, date, amount, method, reference, journal_id, created_at";

fn payment_from_row(row: &Row) -> rusqlite::Result<Vec<Option<String>>> {
    (0..11).map(|i| row.get::<_, Option<String>>(i)).collect()
}

fn build_payment(cols: Vec<Option<String>>) -> Result<Payment, StorageError> {
    let mut it = cols.into_iter();
    let mut next = || it.next().flatten();
    Ok(Payment {
        id: uuid(&next().unwrap_or_default())?,
        number: next().unwrap_or_default(),
        invoice_id: uuid(&next().unwrap_or_default())?,
        contact_id: uuid(&next().unwrap_or_default())?,
        kind: parse_enum(&next().unwrap_or_default())?,
        date: date(&next().unwrap_or_default())?,
        amount: dec(&next().unwrap_or_default())?,
        method: parse_enum(&next().unwrap_or_default())?,
        reference: next(),
        journal_id: uuid(&next().unwrap_or_default())?,
        created_at: timestamp(&next().unwrap_or_default())?,
    })
}

impl StorageBackend for SqliteStorage {
    fn create_contact(&self, contact: &Contact) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO contacts (id, name, kind, email, phone, gstin, address, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                contact.id.to_string(),
                contact.name,
                contact.kind.as_str(),
                contact.email,
                contact.phone,
                contact.gstin,
                to_json(&contact.address)?,
                now_ts(contact.created_at),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn get_contact(&self, id: Uuid) -> Result<Contact, StorageError> {
        let conn = self.conn.lock().unwrap();
        let cols = conn
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                params![id.to_string()],
                contact_from_row,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| StorageError::not_found("contact", id))?;
        build_contact(cols)
    }

    fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY name COLLATE NOCASE"))
            .map_err(db_err)?;
        let rows = stmt.query_map([], contact_from_row).map_err(db_err)?;
        let mut result = Vec::new();
        for row in rows {
            let contact = build_contact(row.map_err(db_err)?)?;
            if filter.matches(&contact) {
                result.push(contact);
            }
        }
        Ok(result)
    }

    fn update_contact(&self, contact: &Contact) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE contacts SET name = ?2, kind = ?3, email = ?4, phone = ?5, gstin = ?6, address = ?7 WHERE id = ?1",
                params![
                    contact.id.to_string(),
                    contact.name,
                    contact.kind.as_str(),
                    contact.email,
                    contact.phone,
                    contact.gstin,
                    to_json(&contact.address)?,
                ],
            )
            .map_err(db_err)?;
        check_changed(changed, "contact", contact.id)
    }

    fn delete_contact(&self, id: Uuid) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM contacts WHERE id = ?1", params![id.to_string()])
            .map_err(db_err)?;
        check_changed(changed, "contact", id)
    }

    fn create_product(&self, product: &Product) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("INSERT INTO products ({PRODUCT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"),
            params![
                product.id.to_string(),
                product.name,
                product.kind.as_str(),
                product.sku,
                product.hsn_code,
                product.unit,
                product.sales_price.to_string(),
                product.purchase_price.to_string(),
                product.sales_tax_id.map(|u| u.to_string()),
                product.purchase_tax_id.map(|u| u.to_string()),
                product.income_account_id.map(|u| u.to_string()),
                product.expense_account_id.map(|u| u.to_string()),
                product.active,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn get_product(&self, id: Uuid) -> Result<Product, StorageError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
                params![id.to_string()],
                product_from_row,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| StorageError::not_found("product", id))?;
        build_product(row)
    }

    fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name COLLATE NOCASE"))
            .map_err(db_err)?;
        let rows = stmt.query_map([], product_from_row).map_err(db_err)?;
        let mut result = Vec::new();
        for row in rows {
            let product = build_product(row.map_err(db_err)?)?;
            if filter.matches(&product) {
                result.push(product);
            }
        }
        Ok(result)
    }

    fn update_product(&self, product: &Product) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE products SET name = ?2, kind = ?3, sku = ?4, hsn_code = ?5, unit = ?6, sales_price = ?7,
                    purchase_price = ?8, sales_tax_id = ?9, purchase_tax_id = ?10, income_account_id = ?11,
                    expense_account_id = ?12, active = ?13
                 WHERE id = ?1",
                params![
                    product.id.to_string(),
                    product.name,
                    product.kind.as_str(),
                    product.sku,
                    product.hsn_code,
                    product.unit,
                    product.sales_price.to_string(),
                    product.purchase_price.to_string(),
                    product.sales_tax_id.map(|u| u.to_string()),
                    product.purchase_tax_id.map(|u| u.to_string()),
                    product.income_account_id.map(|u| u.to_string()),
                    product.expense_account_id.map(|u| u.to_string()),
                    product.active,
                ],
            )
            .map_err(db_err)?;
        check_changed(changed, "product", product.id)
    }

    fn delete_product(&self, id: Uuid) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM products WHERE id = ?1", params![id.to_string()])
            .map_err(db_err)?;
        check_changed(changed, "product", id)
    }

    fn create_tax(&self, tax: &Tax) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO taxes (id, name, rate, scope, active) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![tax.id.to_string(), tax.name, tax.rate.to_string(), tax.scope.as_str(), tax.active],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn get_tax(&self, id: Uuid) -> Result<Tax, StorageError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, name, rate, scope, active FROM taxes WHERE id = ?1",
                params![id.to_string()],
                tax_from_row,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| StorageError::not_found("tax", id))?;
        build_tax(row)
    }

    fn list_taxes(&self) -> Result<Vec<Tax>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, name, rate, scope, active FROM taxes")
            .map_err(db_err)?;
        let rows = stmt.query_map([], tax_from_row).map_err(db_err)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(build_tax(row.map_err(db_err)?)?);
        }
        // Rates are text columns; order numerically here.
        result.sort_by(|a, b| a.rate.cmp(&b.rate).then_with(|| a.name.cmp(&b.name)));
        Ok(result)
    }

    fn update_tax(&self, tax: &Tax) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE taxes SET name = ?2, rate = ?3, scope = ?4, active = ?5 WHERE id = ?1",
                params![tax.id.to_string(), tax.name, tax.rate.to_string(), tax.scope.as_str(), tax.active],
            )
            .map_err(db_err)?;
        check_changed(changed, "tax", tax.id)
    }

    fn delete_tax(&self, id: Uuid) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM taxes WHERE id = ?1", params![id.to_string()])
            .map_err(db_err)?;
        check_changed(changed, "tax", id)
    }

    fn upsert_currency(&self, currency: &Currency) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO currencies (code, name, symbol, rate_to_base, is_base) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                symbol = excluded.symbol,
                rate_to_base = excluded.rate_to_base,
                is_base = excluded.is_base",
            params![
                currency.code,
                currency.name,
                currency.symbol,
                currency.rate_to_base.to_string(),
                currency.is_base
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn list_currencies(&self) -> Result<Vec<Currency>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT code, name, symbol, rate_to_base, is_base FROM currencies ORDER BY code")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            })
            .map_err(db_err)?;
        let mut result = Vec::new();
        for row in rows {
            let (code, name, symbol, rate, is_base) = row.map_err(db_err)?;
            result.push(Currency {
                code,
                name,
                symbol,
                rate_to_base: dec(&rate)?,
                is_base,
            });
        }
        Ok(result)
    }

    fn create_account(&self, account: &Account) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("INSERT INTO accounts ({ACCOUNT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                account.id.to_string(),
                account.code,
                account.name,
                account.account_type.as_str(),
                account.parent_id.map(|u| u.to_string()),
                account.description,
                account.is_system,
                account.active,
            ],
        )
        .map_err(|e| unique_violation(e, format!("account code {}", account.code)))?;
        Ok(())
    }

    fn get_account(&self, id: Uuid) -> Result<Account, StorageError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                params![id.to_string()],
                account_from_row,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| StorageError::AccountNotFound(id.to_string()))?;
        build_account(row)
    }

    fn find_account_by_code(&self, code: &str) -> Result<Option<Account>, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE code = ?1"),
            params![code],
            account_from_row,
        )
        .optional()
        .map_err(db_err)?
        .map(build_account)
        .transpose()
    }

    fn list_accounts(&self) -> Result<Vec<Account>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY code"))
            .map_err(db_err)?;
        let rows = stmt.query_map([], account_from_row).map_err(db_err)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(build_account(row.map_err(db_err)?)?);
        }
        Ok(result)
    }

    fn update_account(&self, account: &Account) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE accounts SET code = ?2, name = ?3, account_type = ?4, parent_id = ?5, description = ?6,
                    is_system = ?7, active = ?8
                 WHERE id = ?1",
                params![
                    account.id.to_string(),
                    account.code,
                    account.name,
                    account.account_type.as_str(),
                    account.parent_id.map(|u| u.to_string()),
                    account.description,
                    account.is_system,
                    account.active,
                ],
            )
            .map_err(|e| unique_violation(e, format!("account code {}", account.code)))?;
        if changed == 0 {
            return Err(StorageError::AccountNotFound(account.id.to_string()));
        }
        Ok(())
    }

    fn delete_account(&self, id: Uuid) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM accounts WHERE id = ?1", params![id.to_string()])
            .map_err(db_err)?;
        if changed == 0 {
            return Err(StorageError::AccountNotFound(id.to_string()));
        }
        Ok(())
    }

    fn account_has_entries(&self, id: Uuid) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        account_type_of(&conn, id)?;
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM ledger_entries WHERE account_id = ?1)",
            params![id.to_string()],
            |row| row.get(0),
        )
        .map_err(db_err)
    }

    fn create_journal(&self, command: &CreateJournalCommand) -> Result<Uuid, StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let jid = Uuid::new_v4();
        let date_str = date_to_iso(command.date);

        // A savepoint keeps a half-written journal out of the ledger when an
        // account lookup fails midway.
        let sp = conn.savepoint().map_err(db_err)?;
        sp.execute("UPDATE sequences SET value = value + 1 WHERE name = '__journal'", [])
            .map_err(db_err)?;
        let seq: i64 = sp
            .query_row("SELECT value FROM sequences WHERE name = '__journal'", [], |r| r.get(0))
            .map_err(db_err)?;

        sp.execute(
            "INSERT INTO journals (id, sequence, date, description, reference, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                jid.to_string(),
                seq,
                date_str,
                command.description,
                command.reference,
                now_ts(OffsetDateTime::now_utc()),
            ],
        )
        .map_err(db_err)?;

        for entry in &command.ledger_entries {
            account_type_of(&sp, entry.account_id())?;
            sp.execute(
                "INSERT INTO ledger_entries (journal_id, account_id, date, amount) VALUES (?1, ?2, ?3, ?4)",
                params![
                    jid.to_string(),
                    entry.account_id().to_string(),
                    date_str,
                    entry.debit_positive().to_string()
                ],
            )
            .map_err(db_err)?;
        }

        sp.commit().map_err(db_err)?;
        Ok(jid)
    }

    fn get_journal(&self, id: Uuid) -> Result<JournalEntry, StorageError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, sequence, date, description, reference, created_at FROM journals WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| StorageError::not_found("journal", id))?;
        let (jid, sequence, date_str, description, reference, created_at) = row;
        Ok(JournalEntry {
            id: uuid(&jid)?,
            sequence: sequence as u64,
            date: date(&date_str)?,
            description,
            reference,
            created_at: timestamp(&created_at)?,
        })
    }

    fn get_journal_entries(&self, id: Uuid) -> Result<Vec<LedgerEntryCommand>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM journals WHERE id = ?1)",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        if !exists {
            return Err(StorageError::not_found("journal", id));
        }

        let mut stmt = conn
            .prepare("SELECT account_id, amount FROM ledger_entries WHERE journal_id = ?1 ORDER BY id")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![id.to_string()], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(db_err)?;
        let mut result = Vec::new();
        for row in rows {
            let (account_id, amount) = row.map_err(db_err)?;
            result.push(LedgerEntryCommand::from_debit_positive(uuid(&account_id)?, dec(&amount)?));
        }
        Ok(result)
    }

    fn get_balance(&self, account_id: Uuid, date: Date) -> Result<Decimal, StorageError> {
        let conn = self.conn.lock().unwrap();
        let (_, balance) = Self::natural_sum(&conn, account_id, Some(date))?;
        Ok(balance)
    }

    fn get_statement(&self, account_id: Uuid, from: Date, to: Date) -> Result<Vec<StatementTxn>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let (account_type, mut balance) = match from.previous_day() {
            Some(day) => Self::natural_sum(&conn, account_id, Some(day))?,
            None => (account_type_of(&conn, account_id)?, Decimal::ZERO),
        };
        if from > to {
            return Ok(Vec::new());
        }

        let mut stmt = conn
            .prepare(
                "SELECT le.journal_id, le.date, j.description, le.amount
                 FROM ledger_entries le
                 JOIN journals j ON j.id = le.journal_id
                 WHERE le.account_id = ?1 AND le.date >= ?2 AND le.date <= ?3
                 ORDER BY le.date, j.sequence, le.id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![account_id.to_string(), date_to_iso(from), date_to_iso(to)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .map_err(db_err)?;

        let mut result = Vec::new();
        for row in rows {
            let (jid, date_str, description, amount) = row.map_err(db_err)?;
            let amount = account_type.natural_amount(dec(&amount)?);
            balance += amount;
            result.push(StatementTxn {
                journal_id: uuid(&jid)?,
                date: date(&date_str)?,
                description,
                amount,
                balance,
            });
        }
        Ok(result)
    }

    fn save_invoice(&self, invoice: &Invoice) -> Result<(), StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let sp = conn.savepoint().map_err(db_err)?;
        sp.execute(
            &format!(
                "INSERT INTO invoices ({INVOICE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
                 ON CONFLICT(id) DO UPDATE SET
                    number = excluded.number, kind = excluded.kind, contact_id = excluded.contact_id,
                    invoice_date = excluded.invoice_date, due_date = excluded.due_date, reference = excluded.reference,
                    currency = excluded.currency, exchange_rate = excluded.exchange_rate, status = excluded.status,
                    sub_total = excluded.sub_total,
                    tax_amount = excluded.tax_amount, discount_amount = excluded.discount_amount,
                    total_amount = excluded.total_amount, paid_amount = excluded.paid_amount,
                    balance_amount = excluded.balance_amount, journal_id = excluded.journal_id,
                    order_id = excluded.order_id, notes = excluded.notes"
            ),
            params![
                invoice.id.to_string(),
                invoice.number,
                invoice.kind.as_str(),
                invoice.contact_id.to_string(),
                date_to_iso(invoice.invoice_date),
                date_to_iso(invoice.due_date),
                invoice.reference,
                invoice.currency,
                invoice.exchange_rate.to_string(),
                invoice.status.as_str(),
                invoice.totals.sub_total.to_string(),
                invoice.totals.tax_amount.to_string(),
                invoice.totals.discount_amount.to_string(),
                invoice.totals.total_amount.to_string(),
                invoice.paid_amount.to_string(),
                invoice.balance_amount.to_string(),
                invoice.journal_id.map(|u| u.to_string()),
                invoice.order_id.map(|u| u.to_string()),
                invoice.notes,
                now_ts(invoice.created_at),
            ],
        )
        .map_err(|e| unique_violation(e, format!("invoice number {}", invoice.number)))?;
        Self::write_lines(&sp, "invoice_lines", "invoice_id", invoice.id, &invoice.lines)?;
        sp.commit().map_err(db_err)?;
        Ok(())
    }

    fn get_invoice(&self, id: Uuid) -> Result<Invoice, StorageError> {
        let conn = self.conn.lock().unwrap();
        let cols = conn
            .query_row(
                &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"),
                params![id.to_string()],
                invoice_from_row,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| StorageError::not_found("invoice", id))?;
        build_invoice(&conn, cols)
    }

    fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {INVOICE_COLUMNS} FROM invoices
                 WHERE (?1 IS NULL OR kind = ?1) AND (?2 IS NULL OR status = ?2) AND (?3 IS NULL OR contact_id = ?3)
                 ORDER BY invoice_date, number"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![
                    filter.kind.map(|k| k.as_str()),
                    filter.status.map(|s| s.as_str()),
                    filter.contact_id.map(|c| c.to_string()),
                ],
                invoice_from_row,
            )
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        rows.into_iter().map(|cols| build_invoice(&conn, cols)).collect()
    }

    fn delete_invoice(&self, id: Uuid) -> Result<(), StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let sp = conn.savepoint().map_err(db_err)?;
        sp.execute("DELETE FROM invoice_lines WHERE invoice_id = ?1", params![id.to_string()])
            .map_err(db_err)?;
        let changed = sp
            .execute("DELETE FROM invoices WHERE id = ?1", params![id.to_string()])
            .map_err(db_err)?;
        check_changed(changed, "invoice", id)?;
        sp.commit().map_err(db_err)?;
        Ok(())
    }

    fn save_order(&self, order: &Order) -> Result<(), StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let sp = conn.savepoint().map_err(db_err)?;
        sp.execute(
            &format!(
                "INSERT INTO orders ({ORDER_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(id) DO UPDATE SET
                    number = excluded.number, kind = excluded.kind, contact_id = excluded.contact_id,
                    order_date = excluded.order_date, expected_date = excluded.expected_date,
                    status = excluded.status, sub_total = excluded.sub_total, tax_amount = excluded.tax_amount,
                    discount_amount = excluded.discount_amount, total_amount = excluded.total_amount,
                    invoice_id = excluded.invoice_id, notes = excluded.notes"
            ),
            params![
                order.id.to_string(),
                order.number,
                order.kind.as_str(),
                order.contact_id.to_string(),
                date_to_iso(order.order_date),
                order.expected_date.map(date_to_iso),
                order.status.as_str(),
                order.totals.sub_total.to_string(),
                order.totals.tax_amount.to_string(),
                order.totals.discount_amount.to_string(),
                order.totals.total_amount.to_string(),
                order.invoice_id.map(|u| u.to_string()),
                order.notes,
                now_ts(order.created_at),
            ],
        )
        .map_err(|e| unique_violation(e, format!("order number {}", order.number)))?;
        Self::write_lines(&sp, "order_lines", "order_id", order.id, &order.lines)?;
        sp.commit().map_err(db_err)?;
        Ok(())
    }

    fn get_order(&self, id: Uuid) -> Result<Order, StorageError> {
        let conn = self.conn.lock().unwrap();
        let cols = conn
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
                params![id.to_string()],
                order_from_row,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| StorageError::not_found("order", id))?;
        build_order(&conn, cols)
    }

    fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders
                 WHERE (?1 IS NULL OR kind = ?1) AND (?2 IS NULL OR status = ?2) AND (?3 IS NULL OR contact_id = ?3)
                 ORDER BY order_date, number"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![
                    filter.kind.map(|k| k.as_str()),
                    filter.status.map(|s| s.as_str()),
                    filter.contact_id.map(|c| c.to_string()),
                ],
                order_from_row,
            )
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        rows.into_iter().map(|cols| build_order(&conn, cols)).collect()
    }

    fn delete_order(&self, id: Uuid) -> Result<(), StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let sp = conn.savepoint().map_err(db_err)?;
        sp.execute("DELETE FROM order_lines WHERE order_id = ?1", params![id.to_string()])
            .map_err(db_err)?;
        let changed = sp
            .execute("DELETE FROM orders WHERE id = ?1", params![id.to_string()])
            .map_err(db_err)?;
        check_changed(changed, "order", id)?;
        sp.commit().map_err(db_err)?;
        Ok(())
    }

    fn create_payment(&self, payment: &Payment) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let invoice_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM invoices WHERE id = ?1)",
                params![payment.invoice_id.to_string()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        if !invoice_exists {
            return Err(StorageError::not_found("invoice", payment.invoice_id));
        }
        conn.execute(
            &format!("INSERT INTO payments ({PAYMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
            params![
                payment.id.to_string(),
                payment.number,
                payment.invoice_id.to_string(),
                payment.contact_id.to_string(),
                payment.kind.as_str(),
                date_to_iso(payment.date),
                payment.amount.to_string(),
                payment.method.as_str(),
                payment.reference,
                payment.journal_id.to_string(),
                now_ts(payment.created_at),
            ],
        )
        .map_err(|e| unique_violation(e, format!("payment number {}", payment.number)))?;
        Ok(())
    }

    fn get_payment(&self, id: Uuid) -> Result<Payment, StorageError> {
        let conn = self.conn.lock().unwrap();
        let cols = conn
            .query_row(
                &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"),
                params![id.to_string()],
                payment_from_row,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| StorageError::not_found("payment", id))?;
        build_payment(cols)
    }

    fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments
                 WHERE (?1 IS NULL OR invoice_id = ?1) AND (?2 IS NULL OR contact_id = ?2)
                 ORDER BY date, number"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![filter.invoice_id.map(|i| i.to_string()), filter.contact_id.map(|c| c.to_string())],
                payment_from_row,
            )
            .map_err(db_err)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(build_payment(row.map_err(db_err)?)?);
        }
        Ok(result)
    }

    fn get_settings(&self) -> Result<Option<CompanySettings>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let value: Option<String> = conn
            .query_row("SELECT value FROM settings WHERE key = 'company'", [], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        json(value)
    }

    fn save_settings(&self, settings: &CompanySettings) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let value = serde_json::to_string(settings).map_err(|e| StorageError::Other(e.to_string()))?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES ('company', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![value],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn next_sequence(&self, name: &str) -> Result<u64, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sequences (name, value) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET value = value + 1",
            params![name],
        )
        .map_err(db_err)?;
        let value: i64 = conn
            .query_row("SELECT value FROM sequences WHERE name = ?1", params![name], |r| r.get(0))
            .map_err(db_err)?;
        Ok(value as u64)
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        let mut active = self.active_tx.lock().unwrap();
        if active.is_some() {
            return Err(StorageError::Other("a transaction is already active".to_string()));
        }
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("SAVEPOINT shiv_tx").map_err(db_err)?;
        let tx_id = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        *active = Some(tx_id);
        tracing::debug!(tx_id, "SQLite transaction started");
        Ok(tx_id)
    }

    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        let mut active = self.active_tx.lock().unwrap();
        if *active != Some(tx_id) {
            return Err(StorageError::NoActiveTransaction);
        }
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("RELEASE SAVEPOINT shiv_tx").map_err(db_err)?;
        *active = None;
        tracing::debug!(tx_id, "SQLite transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        let mut active = self.active_tx.lock().unwrap();
        if *active != Some(tx_id) {
            return Err(StorageError::NoActiveTransaction);
        }
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("ROLLBACK TO SAVEPOINT shiv_tx; RELEASE SAVEPOINT shiv_tx")
            .map_err(db_err)?;
        *active = None;
        tracing::debug!(tx_id, "SQLite transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
