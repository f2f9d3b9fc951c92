//! Contacts, products, taxes and currencies.

use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

use shiv_core::{
    models::write::{ContactInput, ProductInput, TaxInput},
    storage::{ContactFilter, InvoiceFilter, OrderFilter, ProductFilter},
    Contact, Currency, Product, StorageBackend, Tax,
};

use super::{check_currency_code, check_gstin, load_settings, optional, required, Books, Page, Pagination};
use crate::error::{BooksError, BooksResult};

fn contact_from_input(id: Uuid, created_at: OffsetDateTime, input: ContactInput) -> BooksResult<Contact> {
    let name = required(&input.name, "contact name")?;
    let email = optional(input.email);
    if let Some(email) = email.as_deref() {
        if !email.contains('@') {
            return Err(BooksError::validation(format!("email {email} is not valid")));
        }
    }
    let gstin = optional(input.gstin).map(|g| g.to_ascii_uppercase());
    if let Some(gstin) = gstin.as_deref() {
        check_gstin(gstin)?;
    }

    Ok(Contact {
        id,
        name,
        kind: input.kind,
        email,
        phone: optional(input.phone),
        gstin,
        address: input.address,
        created_at,
    })
}

fn check_tax_ref(storage: &dyn StorageBackend, tax_id: Option<Uuid>) -> BooksResult<()> {
    if let Some(id) = tax_id {
        storage
            .get_tax(id)
            .map_err(|_| BooksError::validation(format!("tax {id} does not exist")))?;
    }
    Ok(())
}

fn check_account_ref(storage: &dyn StorageBackend, account_id: Option<Uuid>) -> BooksResult<()> {
    if let Some(id) = account_id {
        storage
            .get_account(id)
            .map_err(|_| BooksError::validation(format!("account {id} does not exist")))?;
    }
    Ok(())
}

fn product_from_input(storage: &dyn StorageBackend, id: Uuid, input: ProductInput) -> BooksResult<Product> {
    let name = required(&input.name, "product name")?;
    if input.sales_price < Decimal::ZERO || input.purchase_price < Decimal::ZERO {
        return Err(BooksError::validation("prices cannot be negative"));
    }
    check_tax_ref(storage, input.sales_tax_id)?;
    check_tax_ref(storage, input.purchase_tax_id)?;
    check_account_ref(storage, input.income_account_id)?;
    check_account_ref(storage, input.expense_account_id)?;

    Ok(Product {
        id,
        name,
        kind: input.kind,
        sku: optional(input.sku),
        hsn_code: optional(input.hsn_code),
        unit: required(&input.unit, "unit")?,
        sales_price: input.sales_price,
        purchase_price: input.purchase_price,
        sales_tax_id: input.sales_tax_id,
        purchase_tax_id: input.purchase_tax_id,
        income_account_id: input.income_account_id,
        expense_account_id: input.expense_account_id,
        active: input.active,
    })
}

fn tax_from_input(id: Uuid, input: TaxInput) -> BooksResult<Tax> {
    if input.rate < Decimal::ZERO || input.rate > Decimal::ONE_HUNDRED {
        return Err(BooksError::validation(format!("tax rate must be between 0 and 100, got {}", input.rate)));
    }
    Ok(Tax {
        id,
        name: required(&input.name, "tax name")?,
        rate: input.rate,
        scope: input.scope,
        active: input.active,
    })
}

impl Books {
    pub fn create_contact(&self, input: ContactInput) -> BooksResult<Contact> {
        self.write("create_contact", |storage| {
            let contact = contact_from_input(Uuid::new_v4(), OffsetDateTime::now_utc(), input)?;
            storage.create_contact(&contact)?;
            tracing::info!(contact_id = %contact.id, name = %contact.name, "Contact created");
            Ok(contact)
        })
    }

    pub fn get_contact(&self, id: Uuid) -> BooksResult<Contact> {
        Ok(self.storage().get_contact(id)?)
    }

    pub fn list_contacts(&self, filter: &ContactFilter, page: &Pagination) -> BooksResult<Page<Contact>> {
        Ok(page.apply(self.storage().list_contacts(filter)?))
    }

    pub fn update_contact(&self, id: Uuid, input: ContactInput) -> BooksResult<Contact> {
        self.write("update_contact", |storage| {
            let existing = storage.get_contact(id)?;
            let contact = contact_from_input(id, existing.created_at, input)?;
            storage.update_contact(&contact)?;
            Ok(contact)
        })
    }

    /// Contacts that appear on any invoice or order are kept.
    pub fn delete_contact(&self, id: Uuid) -> BooksResult<()> {
        self.write("delete_contact", |storage| {
            storage.get_contact(id)?;
            let invoices = storage.list_invoices(&InvoiceFilter {
                contact_id: Some(id),
                ..Default::default()
            })?;
            let orders = storage.list_orders(&OrderFilter {
                contact_id: Some(id),
                ..Default::default()
            })?;
            if !invoices.is_empty() || !orders.is_empty() {
                return Err(BooksError::conflict(format!(
                    "contact is referenced by {} invoice(s) and {} order(s)",
                    invoices.len(),
                    orders.len()
                )));
            }
            storage.delete_contact(id)?;
            tracing::info!(contact_id = %id, "Contact deleted");
            Ok(())
        })
    }

    pub fn create_product(&self, input: ProductInput) -> BooksResult<Product> {
        self.write("create_product", |storage| {
            let product = product_from_input(storage, Uuid::new_v4(), input)?;
            storage.create_product(&product)?;
            tracing::info!(product_id = %product.id, name = %product.name, "Product created");
            Ok(product)
        })
    }

    pub fn get_product(&self, id: Uuid) -> BooksResult<Product> {
        Ok(self.storage().get_product(id)?)
    }

    pub fn list_products(&self, filter: &ProductFilter, page: &Pagination) -> BooksResult<Page<Product>> {
        Ok(page.apply(self.storage().list_products(filter)?))
    }

    pub fn update_product(&self, id: Uuid, input: ProductInput) -> BooksResult<Product> {
        self.write("update_product", |storage| {
            storage.get_product(id)?;
            let product = product_from_input(storage, id, input)?;
            storage.update_product(&product)?;
            Ok(product)
        })
    }

    /// Products used on a document line are kept; deactivate them instead.
    pub fn delete_product(&self, id: Uuid) -> BooksResult<()> {
        self.write("delete_product", |storage| {
            storage.get_product(id)?;
            let on_line = |lines: &[shiv_core::DocumentLine]| lines.iter().any(|l| l.product_id == Some(id));
            let used = storage.list_invoices(&InvoiceFilter::default())?.iter().any(|i| on_line(&i.lines))
                || storage.list_orders(&OrderFilter::default())?.iter().any(|o| on_line(&o.lines));
            if used {
                return Err(BooksError::conflict("product is used on invoices or orders; deactivate it instead"));
            }
            storage.delete_product(id)?;
            tracing::info!(product_id = %id, "Product deleted");
            Ok(())
        })
    }

    pub fn create_tax(&self, input: TaxInput) -> BooksResult<Tax> {
        self.write("create_tax", |storage| {
            let tax = tax_from_input(Uuid::new_v4(), input)?;
            storage.create_tax(&tax)?;
            tracing::info!(tax_id = %tax.id, name = %tax.name, rate = %tax.rate, "Tax created");
            Ok(tax)
        })
    }

    pub fn get_tax(&self, id: Uuid) -> BooksResult<Tax> {
        Ok(self.storage().get_tax(id)?)
    }

    pub fn list_taxes(&self) -> BooksResult<Vec<Tax>> {
        Ok(self.storage().list_taxes()?)
    }

    pub fn update_tax(&self, id: Uuid, input: TaxInput) -> BooksResult<Tax> {
        self.write("update_tax", |storage| {
            storage.get_tax(id)?;
            let tax = tax_from_input(id, input)?;
            storage.update_tax(&tax)?;
            Ok(tax)
        })
    }

    pub fn delete_tax(&self, id: Uuid) -> BooksResult<()> {
        self.write("delete_tax", |storage| {
            storage.get_tax(id)?;
            let users = storage
                .list_products(&ProductFilter::default())?
                .into_iter()
                .filter(|p| p.sales_tax_id == Some(id) || p.purchase_tax_id == Some(id))
                .count();
            if users > 0 {
                return Err(BooksError::conflict(format!("tax is the default for {users} product(s)")));
            }
            storage.delete_tax(id)?;
            Ok(())
        })
    }

    /// Inserts or replaces a currency. Only the base currency named in the
    /// company settings carries the base flag, always at a rate of 1.
    pub fn upsert_currency(&self, currency: Currency) -> BooksResult<Currency> {
        self.write("upsert_currency", |storage| {
            check_currency_code(&currency.code)?;
            if currency.rate_to_base <= Decimal::ZERO {
                return Err(BooksError::validation("exchange rate must be greater than zero"));
            }
            let base = load_settings(storage)?.base_currency;
            if currency.is_base != (currency.code == base) {
                return Err(BooksError::validation(format!(
                    "{base} is the base currency; change it in the company settings"
                )));
            }
            if currency.is_base && currency.rate_to_base != Decimal::ONE {
                return Err(BooksError::validation("the base currency has a rate of 1"));
            }
            let currency = Currency {
                name: required(&currency.name, "currency name")?,
                ..currency
            };
            storage.upsert_currency(&currency)?;
            Ok(currency)
        })
    }

    pub fn list_currencies(&self) -> BooksResult<Vec<Currency>> {
        Ok(self.storage().list_currencies()?)
    }
}
