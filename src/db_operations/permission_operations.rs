use super::core::DbOperations;
use super::keys::{id_key, permission_key};
use super::txn::{tx_get, tx_put, tx_remove, TxResult, TxnTrees};
use crate::error::VaultResult;
use crate::types::{DatasetId, Permission, UserId};
use std::collections::BTreeSet;

impl TxnTrees<'_> {
    pub fn get_permission(&self, dataset_id: DatasetId, org_id: UserId) -> TxResult<Option<Permission>> {
        tx_get(self.permissions, &permission_key(dataset_id, org_id), "permission")
    }

    /// Writes a permission row and keeps the per-dataset granted index in step
    /// with its status.
    pub fn put_permission(&self, permission: &Permission) -> TxResult<()> {
        tx_put(
            self.permissions,
            &permission_key(permission.dataset_id, permission.org_id),
            permission,
            "permission",
        )?;

        let mut granted = self.granted_org_ids(permission.dataset_id)?;
        let changed = if permission.is_active_grant() {
            granted.insert(permission.org_id)
        } else {
            granted.remove(&permission.org_id)
        };
        if changed {
            self.put_granted_org_ids(permission.dataset_id, &granted)?;
        }
        Ok(())
    }

    pub fn remove_permission(&self, dataset_id: DatasetId, org_id: UserId) -> TxResult<()> {
        tx_remove(self.permissions, &permission_key(dataset_id, org_id))?;
        let mut granted = self.granted_org_ids(dataset_id)?;
        if granted.remove(&org_id) {
            self.put_granted_org_ids(dataset_id, &granted)?;
        }
        Ok(())
    }

    /// Organisations currently holding an active grant on `dataset_id`.
    pub fn granted_org_ids(&self, dataset_id: DatasetId) -> TxResult<BTreeSet<UserId>> {
        Ok(tx_get(self.granted_orgs, &id_key(dataset_id), "granted orgs")?.unwrap_or_default())
    }

    fn put_granted_org_ids(&self, dataset_id: DatasetId, granted: &BTreeSet<UserId>) -> TxResult<()> {
        if granted.is_empty() {
            tx_remove(self.granted_orgs, &id_key(dataset_id))?;
            Ok(())
        } else {
            tx_put(self.granted_orgs, &id_key(dataset_id), granted, "granted orgs")
        }
    }

    pub fn clear_granted_org_ids(&self, dataset_id: DatasetId) -> TxResult<()> {
        tx_remove(self.granted_orgs, &id_key(dataset_id))?;
        Ok(())
    }
}

impl DbOperations {
    pub fn get_permission(&self, dataset_id: DatasetId, org_id: UserId) -> VaultResult<Option<Permission>> {
        self.get_from_tree(&self.permissions_tree, &permission_key(dataset_id, org_id))
    }

    pub fn granted_org_ids(&self, dataset_id: DatasetId) -> VaultResult<BTreeSet<UserId>> {
        Ok(self
            .get_from_tree(&self.granted_orgs_tree, &id_key(dataset_id))?
            .unwrap_or_default())
    }

    /// Every permission row of one dataset, ordered by organisation id.
    pub fn permissions_for_dataset(&self, dataset_id: DatasetId) -> VaultResult<Vec<Permission>> {
        Ok(self
            .scan_prefix_in_tree::<Permission>(&self.permissions_tree, &id_key(dataset_id))?
            .into_iter()
            .map(|(_, permission)| permission)
            .collect())
    }

    pub fn list_permissions(&self) -> VaultResult<Vec<Permission>> {
        self.list_items_in_tree(&self.permissions_tree)
    }
}
