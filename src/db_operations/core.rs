use super::error_utils::ErrorUtils;
use super::txn::{TxResult, TxnTrees};
use crate::config::VaultConfig;
use crate::constants::*;
use crate::error::{VaultError, VaultResult};
use log::{debug, error, warn};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use sled::Transactional;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Database operations over the vault's sled trees.
///
/// Readers use the tree handles directly and may run concurrently. Writers go
/// through [`DbOperations::write`], which serializes them behind a writer gate
/// (bounded wait) and runs the whole logical operation as one multi-tree
/// transaction.
#[derive(Clone)]
pub struct DbOperations {
    /// The underlying sled database instance
    db: sled::Db,
    pub(crate) users_tree: sled::Tree,
    pub(crate) user_emails_tree: sled::Tree,
    pub(crate) datasets_tree: sled::Tree,
    pub(crate) dataset_heads_tree: sled::Tree,
    pub(crate) dataset_versions_tree: sled::Tree,
    pub(crate) permissions_tree: sled::Tree,
    pub(crate) granted_orgs_tree: sled::Tree,
    pub(crate) audit_tree: sled::Tree,
    pub(crate) rewards_tree: sled::Tree,
    pub(crate) reward_days_tree: sled::Tree,
    write_gate: Arc<Mutex<()>>,
    write_timeout: Duration,
}

impl DbOperations {
    /// Creates a new DbOperations instance with all required trees
    pub fn new(db: sled::Db, write_timeout: Duration) -> Result<Self, sled::Error> {
        Ok(Self {
            users_tree: db.open_tree(USERS_TREE)?,
            user_emails_tree: db.open_tree(USER_EMAILS_TREE)?,
            datasets_tree: db.open_tree(DATASETS_TREE)?,
            dataset_heads_tree: db.open_tree(DATASET_HEADS_TREE)?,
            dataset_versions_tree: db.open_tree(DATASET_VERSIONS_TREE)?,
            permissions_tree: db.open_tree(PERMISSIONS_TREE)?,
            granted_orgs_tree: db.open_tree(GRANTED_ORGS_TREE)?,
            audit_tree: db.open_tree(AUDIT_LOG_TREE)?,
            rewards_tree: db.open_tree(REWARDS_TREE)?,
            reward_days_tree: db.open_tree(REWARD_DAYS_TREE)?,
            db,
            write_gate: Arc::new(Mutex::new(())),
            write_timeout,
        })
    }

    /// Opens the database described by `config`
    pub fn open(config: &VaultConfig) -> VaultResult<Self> {
        let db = if config.temporary {
            sled::Config::new()
                .path(&config.storage_path)
                .temporary(true)
                .open()
        } else {
            sled::open(&config.storage_path)
        }
        .map_err(ErrorUtils::from_sled_error("open"))?;

        Self::new(db, config.write_lock_timeout()).map_err(ErrorUtils::from_sled_error("open trees"))
    }

    /// Gets a reference to the underlying database
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Runs `f` as one atomic transaction across every vault tree.
    ///
    /// Returning an error from `f` (or from any storage call inside it) rolls
    /// back every write `f` made. `f` may be invoked more than once if sled
    /// detects a conflict, so it must not have side effects outside the
    /// transaction.
    pub fn write<T, F>(&self, operation: &str, f: F) -> VaultResult<T>
    where
        F: Fn(&TxnTrees<'_>) -> TxResult<T>,
    {
        self.write_prepared(operation, |_| Ok(()), |txn, _| f(txn))
    }

    /// Like [`DbOperations::write`], but first runs `prepare` with plain tree
    /// reads while holding the writer gate and hands its output to `f`.
    ///
    /// Range scans are not available inside a transaction; cascades use
    /// `prepare` to collect the keys they will touch. No other writer can run
    /// between `prepare` and the commit.
    pub fn write_prepared<P, T, R, F>(&self, operation: &str, prepare: R, f: F) -> VaultResult<T>
    where
        R: FnOnce(&DbOperations) -> VaultResult<P>,
        F: Fn(&TxnTrees<'_>, &P) -> TxResult<T>,
    {
        let _guard = self.write_gate.try_lock_for(self.write_timeout).ok_or_else(|| {
            VaultError::Busy(format!(
                "could not acquire write lock for '{}' within {:?}",
                operation, self.write_timeout
            ))
        })?;

        let prepared = prepare(self)?;

        let result = (
            &self.users_tree,
            &self.user_emails_tree,
            &self.datasets_tree,
            &self.dataset_heads_tree,
            &self.dataset_versions_tree,
            &self.permissions_tree,
            &self.granted_orgs_tree,
            &self.audit_tree,
            &self.rewards_tree,
            &self.reward_days_tree,
        )
            .transaction(
                |(
                    users,
                    user_emails,
                    datasets,
                    dataset_heads,
                    dataset_versions,
                    permissions,
                    granted_orgs,
                    audit,
                    rewards,
                    reward_days,
                )| {
                    let trees = TxnTrees {
                        users,
                        user_emails,
                        datasets,
                        dataset_heads,
                        dataset_versions,
                        permissions,
                        granted_orgs,
                        audit,
                        rewards,
                        reward_days,
                    };
                    f(&trees, &prepared)
                },
            );

        match result {
            Ok(value) => Ok(committed(operation, value, self.db.flush())),
            Err(e) => {
                let err = VaultError::from(e);
                error!("rolled back '{}': {}", operation, err);
                Err(err)
            }
        }
    }

    /// Generic function to retrieve any deserializable item from a specific tree
    pub fn get_from_tree<T: DeserializeOwned>(
        &self,
        tree: &sled::Tree,
        key: &[u8],
    ) -> VaultResult<Option<T>> {
        match tree.get(key).map_err(ErrorUtils::from_sled_error("get"))? {
            Some(bytes) => {
                let item = serde_json::from_slice(&bytes)
                    .map_err(ErrorUtils::from_deserialization_error("item"))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// List all values in a tree, in key order
    pub fn list_items_in_tree<T: DeserializeOwned>(
        &self,
        tree: &sled::Tree,
    ) -> VaultResult<Vec<T>> {
        let mut items = Vec::new();
        for result in tree.iter() {
            let (_, value) = result.map_err(ErrorUtils::from_sled_error("iterate"))?;
            items.push(
                serde_json::from_slice(&value)
                    .map_err(ErrorUtils::from_deserialization_error("item"))?,
            );
        }
        Ok(items)
    }

    /// List all key-value pairs whose key starts with `prefix`, in key order
    pub fn scan_prefix_in_tree<T: DeserializeOwned>(
        &self,
        tree: &sled::Tree,
        prefix: &[u8],
    ) -> VaultResult<Vec<(Vec<u8>, T)>> {
        let mut items = Vec::new();
        for result in tree.scan_prefix(prefix) {
            let (key, value) = result.map_err(ErrorUtils::from_sled_error("scan prefix"))?;
            let item = serde_json::from_slice(&value)
                .map_err(ErrorUtils::from_deserialization_error("item"))?;
            items.push((key.to_vec(), item));
        }
        Ok(items)
    }

    /// Gets row counts per tree
    pub fn get_stats(&self) -> HashMap<String, u64> {
        let mut stats = HashMap::new();
        stats.insert("users".to_string(), self.users_tree.len() as u64);
        stats.insert("datasets".to_string(), self.datasets_tree.len() as u64);
        stats.insert("permissions".to_string(), self.permissions_tree.len() as u64);
        stats.insert("audit_log".to_string(), self.audit_tree.len() as u64);
        stats.insert("rewards".to_string(), self.rewards_tree.len() as u64);
        stats
    }
}

/// The transaction is durable in sled once it commits, so a failed flush is
/// reported but does not turn the commit into an error.
fn committed<T>(operation: &str, value: T, flushed: sled::Result<usize>) -> T {
    match flushed {
        Ok(_) => debug!("committed '{}'", operation),
        Err(e) => warn!("committed '{}' but flush failed: {}", operation, e),
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_operations::txn::tx_put;
    use crate::db_operations::keys::id_key;

    fn temp_db() -> DbOperations {
        let db = sled::Config::new().temporary(true).open().unwrap();
        DbOperations::new(db, Duration::from_millis(50)).unwrap()
    }

    #[test]
    fn aborted_write_leaves_no_trace() {
        let ops = temp_db();
        let result: VaultResult<()> = ops.write("failing op", |txn| {
            tx_put(txn.audit, &id_key(1), &serde_json::json!({"a": 1}), "audit")?;
            tx_put(txn.rewards, &id_key(1), &serde_json::json!({"b": 2}), "reward")?;
            Err(ErrorUtils::abort(VaultError::Validation("boom".into())))
        });
        assert!(matches!(result, Err(VaultError::Validation(_))));
        assert_eq!(ops.audit_tree.len(), 0);
        assert_eq!(ops.rewards_tree.len(), 0);
    }

    #[test]
    fn writer_gate_has_bounded_wait() {
        let ops = temp_db();
        let _held = ops.write_gate.lock();
        let result = ops.write("blocked op", |_| Ok(()));
        assert!(matches!(result, Err(VaultError::Busy(_))));
    }

    #[test]
    fn readers_do_not_take_the_writer_gate() {
        let ops = temp_db();
        ops.write("seed", |txn| {
            tx_put(txn.audit, &id_key(7), &serde_json::json!({"a": 1}), "audit")
        })
        .unwrap();

        let _held = ops.write_gate.lock();
        let row: Option<serde_json::Value> = ops.get_from_tree(&ops.audit_tree, &id_key(7)).unwrap();
        assert_eq!(row, Some(serde_json::json!({"a": 1})));
        assert!(ops.get_user(1).unwrap().is_none());
        assert_eq!(ops.list_items_in_tree::<serde_json::Value>(&ops.audit_tree).unwrap().len(), 1);
    }

    #[test]
    fn flush_failure_after_commit_keeps_the_result() {
        let flushed: sled::Result<usize> = Err(sled::Error::Unsupported("disk full".into()));
        assert_eq!(committed("grant", 42, flushed), 42);
        assert_eq!(committed("grant", "ok", Ok(0)), "ok");
    }
}
