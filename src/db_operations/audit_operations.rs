use super::core::DbOperations;
use super::keys::id_key;
use super::txn::{tx_put, TxResult, TxnTrees};
use crate::error::VaultResult;
use crate::types::AuditLogEntry;

impl TxnTrees<'_> {
    /// Appends an audit row. Rows are never updated or deleted.
    pub fn append_audit(&self, entry: &AuditLogEntry) -> TxResult<()> {
        tx_put(self.audit, &id_key(entry.id), entry, "audit entry")
    }
}

impl DbOperations {
    /// Every audit row in append order.
    pub fn list_audit_entries(&self) -> VaultResult<Vec<AuditLogEntry>> {
        self.list_items_in_tree(&self.audit_tree)
    }

    pub fn audit_len(&self) -> usize {
        self.audit_tree.len()
    }
}
