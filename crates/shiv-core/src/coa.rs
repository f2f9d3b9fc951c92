//! Chart of accounts hierarchy.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Account, AccountType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoaError {
    #[error("parent account not found: {0}")]
    UnknownParent(Uuid),
    #[error("account {0} cannot be its own ancestor")]
    Cycle(Uuid),
    #[error("parent account is {parent}, child account is {child}")]
    TypeMismatch { parent: AccountType, child: AccountType },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNode {
    #[serde(flatten)]
    pub account: Account,
    pub children: Vec<AccountNode>,
}

impl AccountNode {
    pub fn ids(&self, out: &mut Vec<Uuid>) {
        out.push(self.account.id);
        for child in &self.children {
            child.ids(out);
        }
    }
}

/// Builds the account forest from `parent_id` links. Every input account
/// appears exactly once in the result; dangling parents and cycles are errors.
pub fn build_tree(accounts: &[Account]) -> Result<Vec<AccountNode>, CoaError> {
    let by_id: HashMap<Uuid, &Account> = accounts.iter().map(|a| (a.id, a)).collect();
    let mut children: BTreeMap<Option<Uuid>, Vec<&Account>> = BTreeMap::new();

    for account in accounts {
        if let Some(parent) = account.parent_id {
            if !by_id.contains_key(&parent) {
                return Err(CoaError::UnknownParent(parent));
            }
        }
        children.entry(account.parent_id).or_default().push(account);
    }
    for list in children.values_mut() {
        list.sort_by(|a, b| a.code.cmp(&b.code));
    }

    let mut visited = HashSet::new();
    let roots = children.get(&None).cloned().unwrap_or_default();
    let forest = roots
        .into_iter()
        .map(|root| build_node(root, &children, &mut visited))
        .collect::<Result<Vec<_>, _>>()?;

    // Accounts never reached from a root sit on a parent loop.
    if let Some(stray) = accounts.iter().find(|a| !visited.contains(&a.id)) {
        return Err(CoaError::Cycle(stray.id));
    }
    Ok(forest)
}

fn build_node(
    account: &Account,
    children: &BTreeMap<Option<Uuid>, Vec<&Account>>,
    visited: &mut HashSet<Uuid>,
) -> Result<AccountNode, CoaError> {
    if !visited.insert(account.id) {
        return Err(CoaError::Cycle(account.id));
    }
    let kids = children
        .get(&Some(account.id))
        .map(|list| {
            list.iter()
                .map(|child| build_node(child, children, visited))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();
    Ok(AccountNode {
        account: account.clone(),
        children: kids,
    })
}

/// Checks that `account` may hang under `parent_id`: the parent exists, has the
/// same account type, and is not the account itself or one of its descendants.
pub fn validate_parent(accounts: &[Account], account_id: Uuid, account_type: AccountType, parent_id: Option<Uuid>) -> Result<(), CoaError> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    let by_id: HashMap<Uuid, &Account> = accounts.iter().map(|a| (a.id, a)).collect();
    let parent = by_id.get(&parent_id).ok_or(CoaError::UnknownParent(parent_id))?;
    if parent.account_type != account_type {
        return Err(CoaError::TypeMismatch {
            parent: parent.account_type,
            child: account_type,
        });
    }

    let mut cursor = Some(parent_id);
    let mut seen = HashSet::new();
    while let Some(id) = cursor {
        if id == account_id || !seen.insert(id) {
            return Err(CoaError::Cycle(account_id));
        }
        cursor = by_id.get(&id).and_then(|a| a.parent_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(code: &str, parent: Option<&Account>) -> Account {
        Account {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: format!("Account {code}"),
            account_type: AccountType::Asset,
            parent_id: parent.map(|p| p.id),
            description: None,
            is_system: false,
            active: true,
        }
    }

    #[test]
    fn tree_reproduces_node_set() {
        let root = account("1000", None);
        let cash = account("1100", Some(&root));
        let bank = account("1110", Some(&root));
        let petty = account("1101", Some(&cash));
        let other_root = account("1500", None);
        let accounts = vec![petty.clone(), bank.clone(), other_root.clone(), cash.clone(), root.clone()];

        let forest = build_tree(&accounts).unwrap();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].account.code, "1000");
        assert_eq!(forest[0].children[0].account.code, "1100");
        assert_eq!(forest[0].children[0].children[0].account.code, "1101");

        let mut ids = Vec::new();
        forest.iter().for_each(|n| n.ids(&mut ids));
        let mut expected: Vec<Uuid> = accounts.iter().map(|a| a.id).collect();
        ids.sort();
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn detects_parent_loop() {
        let mut a = account("1", None);
        let mut b = account("2", None);
        a.parent_id = Some(b.id);
        b.parent_id = Some(a.id);
        assert!(matches!(build_tree(&[a, b]), Err(CoaError::Cycle(_))));
    }

    #[test]
    fn detects_self_parent() {
        let mut a = account("1", None);
        a.parent_id = Some(a.id);
        assert_eq!(build_tree(&[a.clone()]), Err(CoaError::Cycle(a.id)));
    }

    #[test]
    fn dangling_parent_is_an_error() {
        let mut a = account("1", None);
        let missing = Uuid::new_v4();
        a.parent_id = Some(missing);
        assert_eq!(build_tree(&[a]), Err(CoaError::UnknownParent(missing)));
    }

    #[test]
    fn reparenting_under_descendant_is_rejected() {
        let root = account("1000", None);
        let child = account("1100", Some(&root));
        let grandchild = account("1110", Some(&child));
        let accounts = vec![root.clone(), child.clone(), grandchild.clone()];

        assert_eq!(
            validate_parent(&accounts, root.id, AccountType::Asset, Some(grandchild.id)),
            Err(CoaError::Cycle(root.id))
        );
        assert!(validate_parent(&accounts, grandchild.id, AccountType::Asset, Some(root.id)).is_ok());
    }

    #[test]
    fn parent_type_must_match() {
        let root = account("1000", None);
        assert_eq!(
            validate_parent(&[root.clone()], Uuid::new_v4(), AccountType::Expense, Some(root.id)),
            Err(CoaError::TypeMismatch {
                parent: AccountType::Asset,
                child: AccountType::Expense
            })
        );
    }
}
