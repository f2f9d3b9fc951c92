use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;
use uuid::Uuid;

use shiv_core::{
    coa::{self, AccountNode},
    models::write::AccountInput,
    Account, StatementTxn,
};

use super::{optional, required, Books};
use crate::error::{BooksError, BooksResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatement {
    pub account: Account,
    pub from: Date,
    pub to: Date,
    pub opening_balance: Decimal,
    pub transactions: Vec<StatementTxn>,
    pub closing_balance: Decimal,
}

impl Books {
    pub fn create_account(&self, input: AccountInput) -> BooksResult<Account> {
        self.write("create_account", |storage| {
            let account = Account {
                id: Uuid::new_v4(),
                code: required(&input.code, "account code")?,
                name: required(&input.name, "account name")?,
                account_type: input.account_type,
                parent_id: input.parent_id,
                description: optional(input.description),
                is_system: false,
                active: input.active,
            };
            coa::validate_parent(&storage.list_accounts()?, account.id, account.account_type, account.parent_id)?;
            storage.create_account(&account)?;
            tracing::info!(account_id = %account.id, code = %account.code, "Account created");
            Ok(account)
        })
    }

    pub fn get_account(&self, id: Uuid) -> BooksResult<Account> {
        Ok(self.storage().get_account(id)?)
    }

    pub fn list_accounts(&self) -> BooksResult<Vec<Account>> {
        Ok(self.storage().list_accounts()?)
    }

    pub fn account_tree(&self) -> BooksResult<Vec<AccountNode>> {
        Ok(coa::build_tree(&self.storage().list_accounts()?)?)
    }

    /// System accounts keep their code and type; posting settings refer to them.
    pub fn update_account(&self, id: Uuid, input: AccountInput) -> BooksResult<Account> {
        self.write("update_account", |storage| {
            let existing = storage.get_account(id)?;
            let code = required(&input.code, "account code")?;
            if existing.is_system && (existing.account_type != input.account_type || existing.code != code) {
                return Err(BooksError::conflict(format!("system account {} keeps its code and type", existing.code)));
            }
            if existing.account_type != input.account_type && storage.account_has_entries(id)? {
                return Err(BooksError::conflict("cannot change the type of an account with ledger entries"));
            }

            let accounts = storage.list_accounts()?;
            coa::validate_parent(&accounts, id, input.account_type, input.parent_id)?;
            if let Some(child) = accounts
                .iter()
                .find(|a| a.parent_id == Some(id) && a.account_type != input.account_type)
            {
                return Err(BooksError::conflict(format!("child account {} is {}", child.code, child.account_type)));
            }

            let account = Account {
                id,
                code,
                name: required(&input.name, "account name")?,
                account_type: input.account_type,
                parent_id: input.parent_id,
                description: optional(input.description),
                is_system: existing.is_system,
                active: input.active,
            };
            storage.update_account(&account)?;
            Ok(account)
        })
    }

    pub fn delete_account(&self, id: Uuid) -> BooksResult<()> {
        self.write("delete_account", |storage| {
            let account = storage.get_account(id)?;
            if account.is_system {
                return Err(BooksError::conflict(format!("system account {} cannot be deleted", account.code)));
            }
            if storage.list_accounts()?.iter().any(|a| a.parent_id == Some(id)) {
                return Err(BooksError::conflict(format!("account {} has child accounts", account.code)));
            }
            if storage.account_has_entries(id)? {
                return Err(BooksError::conflict(format!("account {} has ledger entries", account.code)));
            }
            storage.delete_account(id)?;
            tracing::info!(account_id = %id, code = %account.code, "Account deleted");
            Ok(())
        })
    }

    pub fn account_statement(&self, id: Uuid, from: Date, to: Date) -> BooksResult<AccountStatement> {
        if from > to {
            return Err(BooksError::validation("statement start date is after its end date"));
        }
        let storage = self.storage();
        let account = storage.get_account(id)?;
        let opening_balance = match from.previous_day() {
            Some(day) => storage.get_balance(id, day)?,
            None => Decimal::ZERO,
        };
        let transactions = storage.get_statement(id, from, to)?;
        let closing_balance = transactions.last().map_or(opening_balance, |t| t.balance);

        Ok(AccountStatement {
            account,
            from,
            to,
            opening_balance,
            transactions,
            closing_balance,
        })
    }
}
