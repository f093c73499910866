use super::core::DbOperations;
use super::keys::{head_key, id_key, version_key, version_prefix};
use super::txn::{tx_get, tx_put, tx_remove, TxResult, TxnTrees};
use crate::error::VaultResult;
use crate::types::{DatasetHead, DatasetId, DatasetMeta, DatasetRecord, UserId};

impl TxnTrees<'_> {
    pub fn get_dataset(&self, id: DatasetId) -> TxResult<Option<DatasetRecord>> {
        tx_get(self.datasets, &id_key(id), "dataset")
    }

    pub fn get_dataset_meta(&self, id: DatasetId) -> TxResult<Option<DatasetMeta>> {
        Ok(self.get_dataset(id)?.map(|record| record.meta))
    }

    pub fn put_dataset(&self, record: &DatasetRecord) -> TxResult<()> {
        tx_put(self.datasets, &id_key(record.meta.id), record, "dataset")
    }

    pub fn get_head(&self, owner_id: UserId, name: &str) -> TxResult<Option<DatasetHead>> {
        tx_get(self.dataset_heads, &head_key(owner_id, name), "dataset head")
    }

    /// Indexes a new version and moves the head pointer to it.
    pub fn index_version(&self, meta: &DatasetMeta) -> TxResult<()> {
        tx_put(
            self.dataset_versions,
            &version_key(meta.owner_id, &meta.name, meta.version),
            &meta.id,
            "dataset version",
        )?;
        let head = DatasetHead {
            dataset_id: Some(meta.id),
            version: meta.version,
            issued: meta.version,
        };
        tx_put(
            self.dataset_heads,
            &head_key(meta.owner_id, &meta.name),
            &head,
            "dataset head",
        )
    }

    /// Removes a dataset row and its version index entry. The head is
    /// replaced by `new_head`, or dropped when it is `None`.
    pub fn remove_dataset(&self, meta: &DatasetMeta, new_head: Option<DatasetHead>) -> TxResult<()> {
        tx_remove(self.datasets, &id_key(meta.id))?;
        tx_remove(
            self.dataset_versions,
            &version_key(meta.owner_id, &meta.name, meta.version),
        )?;
        let head = head_key(meta.owner_id, &meta.name);
        match new_head {
            Some(h) => tx_put(self.dataset_heads, &head, &h, "dataset head"),
            None => tx_remove(self.dataset_heads, &head).map(|_| ()),
        }
    }
}

impl DbOperations {
    pub fn get_dataset(&self, id: DatasetId) -> VaultResult<Option<DatasetRecord>> {
        self.get_from_tree(&self.datasets_tree, &id_key(id))
    }

    pub fn get_dataset_meta(&self, id: DatasetId) -> VaultResult<Option<DatasetMeta>> {
        Ok(self.get_dataset(id)?.map(|record| record.meta))
    }

    /// Head pointers of every name owned by `owner_id`.
    pub fn list_heads(&self, owner_id: UserId) -> VaultResult<Vec<DatasetHead>> {
        Ok(self
            .scan_prefix_in_tree::<DatasetHead>(&self.dataset_heads_tree, &id_key(owner_id))?
            .into_iter()
            .map(|(_, head)| head)
            .collect())
    }

    /// Dataset ids of every version of (owner, name), ascending by version.
    pub fn list_version_ids(&self, owner_id: UserId, name: &str) -> VaultResult<Vec<DatasetId>> {
        Ok(self
            .scan_prefix_in_tree::<DatasetId>(
                &self.dataset_versions_tree,
                &version_prefix(owner_id, name),
            )?
            .into_iter()
            .map(|(_, id)| id)
            .collect())
    }

    pub fn list_datasets(&self) -> VaultResult<Vec<DatasetMeta>> {
        Ok(self
            .list_items_in_tree::<DatasetRecord>(&self.datasets_tree)?
            .into_iter()
            .map(|record| record.meta)
            .collect())
    }

    pub fn list_datasets_owned_by(&self, owner_id: UserId) -> VaultResult<Vec<DatasetMeta>> {
        Ok(self
            .list_datasets()?
            .into_iter()
            .filter(|meta| meta.owner_id == owner_id)
            .collect())
    }
}
