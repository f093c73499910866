//! Dataset store: versioned uploads, metadata listings, visibility changes
//! and the policy-checked download path.
//!
//! Content is encrypted with the injected [`BlobCipher`] before it reaches
//! the database. Each upload of an existing (owner, name) pair creates a new
//! row with the next version number; visibility is the one field changed in
//! place.

use crate::audit::{AuditEvent, AuditLog};
use crate::clock::Clock;
use crate::constants::DEFAULT_MIME;
use crate::db_operations::{AbortOnError, DbOperations, ErrorUtils, TxResult, TxnTrees};
use crate::error::{VaultError, VaultResult};
use crate::permissions::permission_manager::load_owned;
use crate::permissions::AccessPolicy;
use crate::rewards::RewardLedger;
use crate::security::BlobCipher;
use crate::types::{
    AuditAction, DatasetHead, DatasetId, DatasetMeta, DatasetRecord, DownloadedDataset, NewDataset,
    Reason, UserId, Visibility,
};
use log::{info, warn};
use serde_json::json;
use std::sync::Arc;

/// Removes a dataset row, its permission rows, its grant index entry and its
/// version index entry, moving the head pointer to `new_head`.
pub(crate) fn purge_dataset(
    txn: &TxnTrees<'_>,
    meta: &DatasetMeta,
    org_ids: &[UserId],
    new_head: Option<DatasetHead>,
) -> TxResult<()> {
    for org_id in org_ids {
        txn.remove_permission(meta.id, *org_id)?;
    }
    txn.clear_granted_org_ids(meta.id)?;
    txn.remove_dataset(meta, new_head)
}

#[derive(Clone)]
pub struct DatasetStore {
    db: DbOperations,
    cipher: Arc<dyn BlobCipher>,
    audit: AuditLog,
    policy: AccessPolicy,
    rewards: RewardLedger,
    clock: Arc<dyn Clock>,
}

impl DatasetStore {
    pub fn new(
        db: DbOperations,
        cipher: Arc<dyn BlobCipher>,
        audit: AuditLog,
        policy: AccessPolicy,
        rewards: RewardLedger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            cipher,
            audit,
            policy,
            rewards,
            clock,
        }
    }

    /// Stores a new version of (owner, file name) and logs `upload`.
    pub fn save_dataset(&self, new: NewDataset) -> VaultResult<DatasetMeta> {
        let name = new.file_name.trim().to_string();
        if name.is_empty() {
            return Err(VaultError::Validation("Dataset name cannot be empty".to_string()));
        }
        if name.contains('\0') {
            return Err(VaultError::Validation(
                "Dataset name cannot contain NUL characters".to_string(),
            ));
        }
        let mime = new
            .mime
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MIME)
            .to_string();
        let content_enc = self.cipher.encrypt(&new.bytes)?;

        let meta = self.db.write("save dataset", |txn| {
            let owner = txn
                .get_user(new.owner_id)?
                .ok_or_else(|| ErrorUtils::not_found_error("User", new.owner_id))
                .or_abort()?;
            let version = txn
                .get_head(owner.id, &name)?
                .map_or(1, |head| head.issued + 1);

            let meta = DatasetMeta {
                id: txn.next_id()?,
                owner_id: owner.id,
                name: name.clone(),
                description: new.description.trim().to_string(),
                mime: mime.clone(),
                visibility: new.visibility,
                version,
                size: new.bytes.len() as u64,
                created_at: self.clock.now(),
                updated_at: None,
            };
            txn.put_dataset(&DatasetRecord {
                meta: meta.clone(),
                content_enc: content_enc.clone(),
            })?;
            txn.index_version(&meta)?;

            self.audit.record(
                txn,
                AuditEvent::new(AuditAction::Upload)
                    .dataset(meta.id)
                    .by(Some(&owner))
                    .metadata(json!({
                        "name": meta.name,
                        "mime": meta.mime,
                        "size": meta.size,
                        "version": meta.version,
                        "visibility": meta.visibility,
                    })),
            )?;
            Ok(meta)
        })?;

        info!(
            "Stored dataset {} '{}' v{} for owner {}",
            meta.id, meta.name, meta.version, meta.owner_id
        );
        Ok(meta)
    }

    pub fn get_dataset_meta(&self, dataset_id: DatasetId) -> VaultResult<Option<DatasetMeta>> {
        self.db.get_dataset_meta(dataset_id)
    }

    /// Returns metadata to an actor the policy allows, logging `view_meta`;
    /// a denial is logged as `denied` and returned as `PolicyDenial`.
    pub fn describe_dataset(
        &self,
        dataset_id: DatasetId,
        actor_id: Option<UserId>,
    ) -> VaultResult<DatasetMeta> {
        let outcome = self.db.write("describe dataset", |txn| {
            let evaluation = self.policy.evaluate(txn, dataset_id, actor_id)?;
            let actor_role = evaluation.actor.as_ref().map(|u| u.role);
            let decision = evaluation.decision;

            match evaluation.dataset {
                Some(meta) if decision.allowed => {
                    self.audit.record(
                        txn,
                        AuditEvent::new(AuditAction::ViewMeta)
                            .dataset(dataset_id)
                            .actor(actor_id, actor_role)
                            .metadata(json!({ "mode": decision.mode() })),
                    )?;
                    Ok(Ok(meta))
                }
                _ => {
                    self.audit.record(
                        txn,
                        AuditEvent::new(AuditAction::Denied)
                            .dataset(dataset_id)
                            .actor(actor_id, actor_role)
                            .metadata(json!({ "reason": decision.reason, "purpose": "view_meta" })),
                    )?;
                    Ok(Err(decision.reason))
                }
            }
        })?;
        outcome.map_err(|reason| VaultError::PolicyDenial { reason })
    }

    /// Latest version of every name owned by `owner_id`, newest first.
    pub fn list_my_latest(&self, owner_id: UserId, limit: usize) -> VaultResult<Vec<DatasetMeta>> {
        let mut latest = Vec::new();
        for id in self.db.list_heads(owner_id)?.into_iter().filter_map(|h| h.dataset_id) {
            if let Some(meta) = self.db.get_dataset_meta(id)? {
                latest.push(meta);
            }
        }
        latest.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        latest.truncate(limit);
        Ok(latest)
    }

    /// Every version of (owner, name), highest version first.
    pub fn list_versions(&self, owner_id: UserId, name: &str) -> VaultResult<Vec<DatasetMeta>> {
        let mut versions = Vec::new();
        for id in self.db.list_version_ids(owner_id, name.trim())? {
            if let Some(meta) = self.db.get_dataset_meta(id)? {
                versions.push(meta);
            }
        }
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }

    /// Sets the visibility of a dataset owned by `owner_id`.
    ///
    /// Returns `false` when the dataset does not exist or belongs to someone
    /// else, `true` otherwise. Only an actual change is written and logged as
    /// `permissions_update` with the old and new value.
    pub fn change_visibility(
        &self,
        owner_id: UserId,
        dataset_id: DatasetId,
        visibility: Visibility,
    ) -> VaultResult<bool> {
        let changed = self.db.write("change visibility", |txn| {
            let mut record = match txn.get_dataset(dataset_id)? {
                Some(record) if record.meta.owner_id == owner_id => record,
                _ => return Ok(None),
            };
            let old = record.meta.visibility;
            if old == visibility {
                return Ok(Some(false));
            }

            record.meta.visibility = visibility;
            record.meta.updated_at = Some(self.clock.now());
            txn.put_dataset(&record)?;

            let owner = txn.get_user(owner_id)?;
            self.audit.record(
                txn,
                AuditEvent::new(AuditAction::PermissionsUpdate)
                    .dataset(dataset_id)
                    .actor(Some(owner_id), owner.map(|u| u.role))
                    .metadata(json!({ "op": "set_visibility", "old": old, "new": visibility })),
            )?;
            Ok(Some(true))
        })?;

        match changed {
            None => {
                warn!(
                    "Visibility change on dataset {} by {} refused",
                    dataset_id, owner_id
                );
                Ok(false)
            }
            Some(true) => {
                info!("Dataset {} visibility set to {}", dataset_id, visibility);
                Ok(true)
            }
            Some(false) => Ok(true),
        }
    }

    /// Decrypted content without a policy check, for owner and admin tooling.
    pub fn get_dataset_bytes(&self, dataset_id: DatasetId) -> VaultResult<Vec<u8>> {
        let record = self
            .db
            .get_dataset(dataset_id)?
            .ok_or_else(|| ErrorUtils::not_found_error("Dataset", dataset_id))?;
        self.cipher.decrypt(&record.content_enc)
    }

    /// Policy-checked download.
    ///
    /// Runs as one transaction: decide, decrypt, log `download`, credit the
    /// owner. A failure in any step rolls back all of them. A denial is
    /// logged as `denied`, committed, and then returned as `PolicyDenial`.
    pub fn get_dataset_for_download(
        &self,
        dataset_id: DatasetId,
        actor_id: Option<UserId>,
        purpose: &str,
    ) -> VaultResult<DownloadedDataset> {
        let outcome = self.db.write("download dataset", |txn| {
            let evaluation = self.policy.evaluate(txn, dataset_id, actor_id)?;
            let actor_role = evaluation.actor.as_ref().map(|u| u.role);
            let decision = evaluation.decision;

            let grant = match decision.grant {
                Some(grant) if decision.allowed => grant,
                _ => {
                    self.audit.record(
                        txn,
                        AuditEvent::new(AuditAction::Denied)
                            .dataset(dataset_id)
                            .actor(actor_id, actor_role)
                            .metadata(json!({ "reason": decision.reason, "purpose": purpose })),
                    )?;
                    return Ok(Err(decision.reason));
                }
            };

            let record = txn
                .get_dataset(dataset_id)?
                .ok_or_else(|| ErrorUtils::not_found_error("Dataset", dataset_id))
                .or_abort()?;
            let bytes = self.cipher.decrypt(&record.content_enc).or_abort()?;

            self.audit.record(
                txn,
                AuditEvent::new(AuditAction::Download)
                    .dataset(dataset_id)
                    .actor(actor_id, actor_role)
                    .metadata(json!({
                        "purpose": purpose,
                        "mode": grant.mode,
                        "scope": grant.scope,
                        "expires_at": grant.expires_at,
                    })),
            )?;
            self.rewards.maybe_credit(
                txn,
                &record.meta,
                evaluation.actor.as_ref(),
                &grant,
                purpose,
            )?;

            Ok(Ok(DownloadedDataset {
                bytes,
                file_name: record.meta.name,
                mime: record.meta.mime,
                grant,
            }))
        })?;

        outcome.map_err(|reason: Reason| {
            warn!(
                "Download of dataset {} by {:?} denied: {}",
                dataset_id, actor_id, reason
            );
            VaultError::PolicyDenial { reason }
        })
    }

    /// Deletes one dataset version owned by `owner_id` with its permission
    /// rows. If it was the latest version the head moves to the highest
    /// remaining one. Its version number is not issued again, so audit
    /// entries (which are kept) stay unambiguous.
    pub fn delete_dataset(&self, owner_id: UserId, dataset_id: DatasetId) -> VaultResult<()> {
        let deleted = self.db.write_prepared(
            "delete dataset",
            |db| {
                let org_ids: Vec<UserId> = db
                    .permissions_for_dataset(dataset_id)?
                    .iter()
                    .map(|p| p.org_id)
                    .collect();
                let siblings = match db.get_dataset_meta(dataset_id)? {
                    Some(meta) => db.list_version_ids(meta.owner_id, &meta.name)?,
                    None => Vec::new(),
                };
                Ok((org_ids, siblings))
            },
            |txn, (org_ids, siblings)| {
                let (meta, owner) = load_owned(txn, dataset_id, owner_id)?;

                let head = txn.get_head(meta.owner_id, &meta.name)?;
                let issued = head.map_or(meta.version, |h| h.issued.max(meta.version));
                let new_head = match head {
                    Some(head) if head.dataset_id != Some(meta.id) => head,
                    _ => {
                        let mut previous = DatasetHead {
                            dataset_id: None,
                            version: 0,
                            issued,
                        };
                        for id in siblings.iter().rev().filter(|id| **id != meta.id) {
                            if let Some(sibling) = txn.get_dataset_meta(*id)? {
                                previous = DatasetHead {
                                    dataset_id: Some(sibling.id),
                                    version: sibling.version,
                                    issued,
                                };
                                break;
                            }
                        }
                        previous
                    }
                };

                purge_dataset(txn, &meta, org_ids, Some(new_head))?;
                self.audit.record(
                    txn,
                    AuditEvent::new(AuditAction::PermissionsUpdate)
                        .dataset(dataset_id)
                        .by(Some(&owner))
                        .metadata(json!({
                            "op": "delete_dataset",
                            "name": meta.name,
                            "version": meta.version,
                        })),
                )?;
                Ok(meta)
            },
        )?;
        info!(
            "Deleted dataset {} '{}' v{} of owner {}",
            deleted.id, deleted.name, deleted.version, owner_id
        );
        Ok(())
    }
}
