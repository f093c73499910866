use crate::audit::{AuditEvent, AuditLog};
use crate::clock::Clock;
use crate::db_operations::{AbortOnError, DbOperations, ErrorUtils, TxResult, TxnTrees};
use crate::error::{VaultError, VaultResult};
use crate::types::{
    AuditAction, DatasetId, DatasetMeta, Permission, PermissionStatus, Role, User, UserId,
};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Result of a bulk reconciliation: organisations granted and revoked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedOrgsDiff {
    pub added: Vec<UserId>,
    pub removed: Vec<UserId>,
}

impl TrustedOrgsDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A permission row of a dataset joined with the organisation it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedOrgEntry {
    pub org_id: UserId,
    pub name: String,
    pub email: String,
    pub allow: bool,
    pub status: PermissionStatus,
    pub scope: Option<String>,
    pub expires_at: Option<NaiveDate>,
}

/// An organisation's view of one of its requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgRequest {
    pub dataset_id: DatasetId,
    pub dataset_name: String,
    pub owner_id: UserId,
    pub status: PermissionStatus,
    pub last_changed: DateTime<Utc>,
}

/// An owner's view of a request waiting for a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub dataset_id: DatasetId,
    pub dataset_name: String,
    pub org_id: UserId,
    pub org_name: String,
    pub requested_at: DateTime<Utc>,
}

/// The state change one transition applies to a (dataset, org) row.
struct Transition<'a> {
    op: &'static str,
    status: PermissionStatus,
    scope: Option<String>,
    expires_at: Option<NaiveDate>,
    action: AuditAction,
    action_meta: Value,
    actor: &'a User,
}

/// Manages the permission state of (dataset, organisation) pairs.
///
/// Every row moves through `pending`, `granted` and `revoked`. Each status
/// change is one upsert of the row plus two audit entries (the specific
/// action and a generic `permissions_update`), all inside one transaction.
///
/// Owner-initiated operations re-check that `owner_id` really owns the
/// dataset and fail with [`VaultError::NotOwner`] otherwise. Target
/// organisations must exist and have the organisation role.
#[derive(Clone)]
pub struct PermissionManager {
    db: DbOperations,
    audit: AuditLog,
    clock: Arc<dyn Clock>,
}

impl PermissionManager {
    pub fn new(db: DbOperations, audit: AuditLog, clock: Arc<dyn Clock>) -> Self {
        Self { db, audit, clock }
    }

    /// An organisation asks for access. Any prior state (or none) becomes
    /// `pending`, so re-requesting is idempotent.
    pub fn request_access(
        &self,
        dataset_id: DatasetId,
        org_id: UserId,
        message: Option<&str>,
    ) -> VaultResult<Permission> {
        let message = message.map(str::trim).unwrap_or_default().to_string();
        let permission = self.db.write("request access", |txn| {
            load_dataset(txn, dataset_id)?;
            let org = load_org(txn, org_id)?;
            self.apply(
                txn,
                dataset_id,
                org_id,
                Transition {
                    op: "request_access",
                    status: PermissionStatus::Pending,
                    scope: None,
                    expires_at: None,
                    action: AuditAction::RequestAccess,
                    action_meta: json!({ "message": message }),
                    actor: &org,
                },
            )
        })?;
        info!("Org {} requested access to dataset {}", org_id, dataset_id);
        Ok(permission)
    }

    /// The owner approves a pending request.
    pub fn approve_request(
        &self,
        dataset_id: DatasetId,
        owner_id: UserId,
        org_id: UserId,
        scope: Option<&str>,
        expires_at: Option<NaiveDate>,
    ) -> VaultResult<Permission> {
        let scope = sanitize_scope(scope);
        let permission = self.db.write("approve request", |txn| {
            let (_, owner) = load_owned(txn, dataset_id, owner_id)?;
            load_org(txn, org_id)?;
            require_status(txn, dataset_id, org_id, "approve", PermissionStatus::Pending)?;
            self.apply(
                txn,
                dataset_id,
                org_id,
                Transition {
                    op: "approve_request",
                    status: PermissionStatus::Granted,
                    scope: scope.clone(),
                    expires_at,
                    action: AuditAction::Grant,
                    action_meta: json!({ "org_id": org_id, "scope": scope, "expires_at": expires_at }),
                    actor: &owner,
                },
            )
        })?;
        info!("Owner {} approved org {} on dataset {}", owner_id, org_id, dataset_id);
        Ok(permission)
    }

    /// The owner turns down a pending request.
    pub fn deny_request(
        &self,
        dataset_id: DatasetId,
        owner_id: UserId,
        org_id: UserId,
        reason: Option<&str>,
    ) -> VaultResult<Permission> {
        let reason = reason.map(str::trim).unwrap_or_default().to_string();
        let permission = self.db.write("deny request", |txn| {
            let (_, owner) = load_owned(txn, dataset_id, owner_id)?;
            load_org(txn, org_id)?;
            require_status(txn, dataset_id, org_id, "deny", PermissionStatus::Pending)?;
            self.apply(
                txn,
                dataset_id,
                org_id,
                Transition {
                    op: "deny_request",
                    status: PermissionStatus::Revoked,
                    scope: None,
                    expires_at: None,
                    action: AuditAction::Denied,
                    action_meta: json!({ "org_id": org_id, "reason": reason }),
                    actor: &owner,
                },
            )
        })?;
        info!("Owner {} denied org {} on dataset {}", owner_id, org_id, dataset_id);
        Ok(permission)
    }

    /// Grants directly, whatever the current state.
    pub fn grant_access(
        &self,
        dataset_id: DatasetId,
        owner_id: UserId,
        org_id: UserId,
        scope: Option<&str>,
        expires_at: Option<NaiveDate>,
    ) -> VaultResult<Permission> {
        let scope = sanitize_scope(scope);
        let permission = self.db.write("grant access", |txn| {
            let (_, owner) = load_owned(txn, dataset_id, owner_id)?;
            load_org(txn, org_id)?;
            self.grant_in(txn, dataset_id, &owner, org_id, scope.clone(), expires_at)
        })?;
        info!("Owner {} granted org {} on dataset {}", owner_id, org_id, dataset_id);
        Ok(permission)
    }

    /// Revokes directly, whatever the current state.
    pub fn revoke_access(
        &self,
        dataset_id: DatasetId,
        owner_id: UserId,
        org_id: UserId,
    ) -> VaultResult<Permission> {
        let permission = self.db.write("revoke access", |txn| {
            let (_, owner) = load_owned(txn, dataset_id, owner_id)?;
            load_org(txn, org_id)?;
            self.revoke_in(txn, dataset_id, &owner, org_id)
        })?;
        info!("Owner {} revoked org {} on dataset {}", owner_id, org_id, dataset_id);
        Ok(permission)
    }

    /// Changes scope and expiry of an active grant. Status and `allow` are
    /// left as they are; only a `permissions_update` entry is written.
    pub fn update_permission_details(
        &self,
        dataset_id: DatasetId,
        owner_id: UserId,
        org_id: UserId,
        scope: Option<&str>,
        expires_at: Option<NaiveDate>,
    ) -> VaultResult<Permission> {
        let scope = sanitize_scope(scope);
        self.db.write("update permission details", |txn| {
            let (_, owner) = load_owned(txn, dataset_id, owner_id)?;
            let mut permission =
                require_status(txn, dataset_id, org_id, "update", PermissionStatus::Granted)?;
            permission.scope = scope.clone();
            permission.expires_at = expires_at;
            permission.updated_at = Some(self.clock.now());
            txn.put_permission(&permission)?;
            self.audit.record(
                txn,
                AuditEvent::new(AuditAction::PermissionsUpdate)
                    .dataset(dataset_id)
                    .by(Some(&owner))
                    .metadata(json!({
                        "op": "update_details",
                        "org_id": org_id,
                        "scope": scope,
                        "expires_at": expires_at,
                    })),
            )?;
            Ok(permission)
        })
    }

    /// Reconciles the granted set of a dataset with `desired_org_ids`.
    ///
    /// Organisations in the desired set that are not currently granted are
    /// granted with the default scope and expiry; granted organisations
    /// missing from it are revoked. Runs as one transaction and returns the
    /// sorted ids of both groups. Calling it again with the same set is a
    /// no-op with an empty diff.
    pub fn set_trusted_orgs(
        &self,
        dataset_id: DatasetId,
        owner_id: UserId,
        desired_org_ids: &[UserId],
        default_scope: Option<&str>,
        default_expires_at: Option<NaiveDate>,
    ) -> VaultResult<TrustedOrgsDiff> {
        let default_scope = sanitize_scope(default_scope);
        let desired: BTreeSet<UserId> = desired_org_ids.iter().copied().collect();

        let diff = self.db.write("set trusted orgs", |txn| {
            let (_, owner) = load_owned(txn, dataset_id, owner_id)?;
            let current = txn.granted_org_ids(dataset_id)?;

            let added: Vec<UserId> = desired.difference(&current).copied().collect();
            let removed: Vec<UserId> = current.difference(&desired).copied().collect();

            for org_id in &added {
                load_org(txn, *org_id)?;
                self.grant_in(
                    txn,
                    dataset_id,
                    &owner,
                    *org_id,
                    default_scope.clone(),
                    default_expires_at,
                )?;
            }
            for org_id in &removed {
                self.revoke_in(txn, dataset_id, &owner, *org_id)?;
            }
            Ok(TrustedOrgsDiff { added, removed })
        })?;

        if !diff.is_empty() {
            info!(
                "Dataset {} trusted orgs: +{:?} -{:?}",
                dataset_id, diff.added, diff.removed
            );
        }
        Ok(diff)
    }

    pub fn get_permission(&self, dataset_id: DatasetId, org_id: UserId) -> VaultResult<Option<Permission>> {
        self.db.get_permission(dataset_id, org_id)
    }

    /// Organisations holding an active grant on `dataset_id`, ascending.
    pub fn list_trusted_org_ids(&self, dataset_id: DatasetId) -> VaultResult<Vec<UserId>> {
        Ok(self.db.granted_org_ids(dataset_id)?.into_iter().collect())
    }

    /// Every permission row of `dataset_id` with the organisation's name and
    /// email, ordered by name (case-insensitive).
    pub fn list_trusted_orgs(&self, dataset_id: DatasetId) -> VaultResult<Vec<TrustedOrgEntry>> {
        let mut entries = Vec::new();
        for permission in self.db.permissions_for_dataset(dataset_id)? {
            if let Some(org) = self.db.get_user(permission.org_id)? {
                entries.push(TrustedOrgEntry {
                    org_id: org.id,
                    name: org.name,
                    email: org.email,
                    allow: permission.allow,
                    status: permission.status,
                    scope: permission.scope,
                    expires_at: permission.expires_at,
                });
            }
        }
        entries.sort_by_key(|e| (e.name.to_lowercase(), e.org_id));
        Ok(entries)
    }

    /// Every request an organisation has made, most recently changed first.
    pub fn list_my_requests(&self, org_id: UserId) -> VaultResult<Vec<OrgRequest>> {
        let mut requests = Vec::new();
        for permission in self.db.list_permissions()? {
            if permission.org_id != org_id {
                continue;
            }
            if let Some(meta) = self.db.get_dataset_meta(permission.dataset_id)? {
                requests.push(OrgRequest {
                    dataset_id: meta.id,
                    dataset_name: meta.name,
                    owner_id: meta.owner_id,
                    status: permission.status,
                    last_changed: permission.last_changed(),
                });
            }
        }
        requests.sort_by(|a, b| {
            b.last_changed
                .cmp(&a.last_changed)
                .then(b.dataset_id.cmp(&a.dataset_id))
        });
        Ok(requests)
    }

    /// Pending requests on datasets owned by `owner_id`, newest first.
    pub fn list_pending_requests_for_owner(&self, owner_id: UserId) -> VaultResult<Vec<PendingRequest>> {
        let mut pending = Vec::new();
        for meta in self.db.list_datasets_owned_by(owner_id)? {
            for permission in self.db.permissions_for_dataset(meta.id)? {
                if permission.status != PermissionStatus::Pending {
                    continue;
                }
                if let Some(org) = self.db.get_user(permission.org_id)? {
                    pending.push(PendingRequest {
                        dataset_id: meta.id,
                        dataset_name: meta.name.clone(),
                        org_id: org.id,
                        org_name: org.name,
                        requested_at: permission.created_at,
                    });
                }
            }
        }
        pending.sort_by(|a, b| {
            b.requested_at
                .cmp(&a.requested_at)
                .then(b.dataset_id.cmp(&a.dataset_id))
                .then(b.org_id.cmp(&a.org_id))
        });
        Ok(pending)
    }

    fn grant_in(
        &self,
        txn: &TxnTrees<'_>,
        dataset_id: DatasetId,
        owner: &User,
        org_id: UserId,
        scope: Option<String>,
        expires_at: Option<NaiveDate>,
    ) -> TxResult<Permission> {
        self.apply(
            txn,
            dataset_id,
            org_id,
            Transition {
                op: "grant",
                status: PermissionStatus::Granted,
                action_meta: json!({ "org_id": org_id, "scope": scope, "expires_at": expires_at }),
                scope,
                expires_at,
                action: AuditAction::Grant,
                actor: owner,
            },
        )
    }

    fn revoke_in(
        &self,
        txn: &TxnTrees<'_>,
        dataset_id: DatasetId,
        owner: &User,
        org_id: UserId,
    ) -> TxResult<Permission> {
        self.apply(
            txn,
            dataset_id,
            org_id,
            Transition {
                op: "revoke",
                status: PermissionStatus::Revoked,
                scope: None,
                expires_at: None,
                action: AuditAction::Revoke,
                action_meta: json!({ "org_id": org_id }),
                actor: owner,
            },
        )
    }

    /// Upserts the row for (dataset, org) and writes the paired audit entries.
    fn apply(
        &self,
        txn: &TxnTrees<'_>,
        dataset_id: DatasetId,
        org_id: UserId,
        transition: Transition<'_>,
    ) -> TxResult<Permission> {
        let now = self.clock.now();
        let created_at = txn
            .get_permission(dataset_id, org_id)?
            .map_or(now, |existing| existing.created_at);

        let permission = Permission {
            dataset_id,
            org_id,
            allow: transition.status.allows(),
            status: transition.status,
            scope: transition.scope,
            expires_at: transition.expires_at,
            created_at,
            updated_at: Some(now),
        };
        txn.put_permission(&permission)?;

        self.audit.record(
            txn,
            AuditEvent::new(transition.action)
                .dataset(dataset_id)
                .by(Some(transition.actor))
                .metadata(transition.action_meta),
        )?;
        self.audit.record(
            txn,
            AuditEvent::new(AuditAction::PermissionsUpdate)
                .dataset(dataset_id)
                .by(Some(transition.actor))
                .metadata(json!({ "op": transition.op, "org_id": org_id })),
        )?;
        Ok(permission)
    }
}

fn sanitize_scope(scope: Option<&str>) -> Option<String> {
    scope
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn load_dataset(txn: &TxnTrees<'_>, dataset_id: DatasetId) -> TxResult<DatasetMeta> {
    txn.get_dataset_meta(dataset_id)?
        .ok_or_else(|| ErrorUtils::not_found_error("Dataset", dataset_id))
        .or_abort()
}

/// Loads a dataset and its owner, failing unless `owner_id` owns it.
pub(crate) fn load_owned(
    txn: &TxnTrees<'_>,
    dataset_id: DatasetId,
    owner_id: UserId,
) -> TxResult<(DatasetMeta, User)> {
    let dataset = load_dataset(txn, dataset_id)?;
    if dataset.owner_id != owner_id {
        return Err(ErrorUtils::abort(VaultError::NotOwner {
            dataset_id,
            actor_id: owner_id,
        }));
    }
    let owner = txn
        .get_user(owner_id)?
        .ok_or_else(|| ErrorUtils::not_found_error("User", owner_id))
        .or_abort()?;
    Ok((dataset, owner))
}

fn load_org(txn: &TxnTrees<'_>, org_id: UserId) -> TxResult<User> {
    let org = txn
        .get_user(org_id)?
        .ok_or_else(|| ErrorUtils::not_found_error("Organisation", org_id))
        .or_abort()?;
    if org.role != Role::Organisation {
        return Err(ErrorUtils::abort(VaultError::Validation(format!(
            "User {} is not an organisation",
            org_id
        ))));
    }
    Ok(org)
}

fn require_status(
    txn: &TxnTrees<'_>,
    dataset_id: DatasetId,
    org_id: UserId,
    operation: &'static str,
    expected: PermissionStatus,
) -> TxResult<Permission> {
    let permission = txn
        .get_permission(dataset_id, org_id)?
        .ok_or_else(|| {
            ErrorUtils::not_found_error("Permission", format!("{}/{}", dataset_id, org_id))
        })
        .or_abort()?;
    if permission.status != expected {
        return Err(ErrorUtils::abort(VaultError::InvalidTransition {
            operation,
            status: permission.status,
        }));
    }
    Ok(permission)
}
