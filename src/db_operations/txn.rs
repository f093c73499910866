//! The transactional view shared by every component taking part in one
//! logical operation.

use super::error_utils::ErrorUtils;
use crate::error::VaultError;
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};

pub type TxResult<T> = ConflictableTransactionResult<T, VaultError>;

/// Every vault tree, as seen from inside one transaction.
pub struct TxnTrees<'a> {
    pub users: &'a TransactionalTree,
    pub user_emails: &'a TransactionalTree,
    pub datasets: &'a TransactionalTree,
    pub dataset_heads: &'a TransactionalTree,
    pub dataset_versions: &'a TransactionalTree,
    pub permissions: &'a TransactionalTree,
    pub granted_orgs: &'a TransactionalTree,
    pub audit: &'a TransactionalTree,
    pub rewards: &'a TransactionalTree,
    pub reward_days: &'a TransactionalTree,
}

impl TxnTrees<'_> {
    /// Allocates a monotonically increasing id.
    pub fn next_id(&self) -> TxResult<u64> {
        self.audit
            .generate_id()
            .map_err(ConflictableTransactionError::Storage)
    }
}

/// Converts a plain vault result into one that aborts the transaction.
pub trait AbortOnError<T> {
    fn or_abort(self) -> TxResult<T>;
}

impl<T> AbortOnError<T> for Result<T, VaultError> {
    fn or_abort(self) -> TxResult<T> {
        self.map_err(ErrorUtils::abort)
    }
}

pub fn tx_get<T: DeserializeOwned>(
    tree: &TransactionalTree,
    key: &[u8],
    context: &str,
) -> TxResult<Option<T>> {
    match tree.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ErrorUtils::abort(ErrorUtils::deserialization_error(context, e))),
        None => Ok(None),
    }
}

pub fn tx_put<T: Serialize>(
    tree: &TransactionalTree,
    key: &[u8],
    item: &T,
    context: &str,
) -> TxResult<()> {
    let bytes = serde_json::to_vec(item)
        .map_err(|e| ErrorUtils::abort(ErrorUtils::serialization_error(context, e)))?;
    tree.insert(key, bytes)?;
    Ok(())
}

pub fn tx_remove(tree: &TransactionalTree, key: &[u8]) -> TxResult<bool> {
    Ok(tree.remove(key)?.is_some())
}
