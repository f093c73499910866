//! # Audit log
//!
//! Append-only record of every permission change, access decision and reward.
//! Entries are written through [`AuditLog::record`] inside the transaction of
//! the operation they describe, so an entry commits exactly when its action
//! does. There is no update or delete path.

use crate::clock::Clock;
use crate::db_operations::{DbOperations, TxResult, TxnTrees};
use crate::error::{VaultError, VaultResult};
use crate::types::{AuditAction, AuditLogEntry, DatasetId, Role, User, UserId};
use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// An audit entry that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub dataset_id: Option<DatasetId>,
    pub actor_id: Option<UserId>,
    pub actor_role: Option<Role>,
    pub action: AuditAction,
    pub metadata: Value,
}

impl AuditEvent {
    pub fn new(action: AuditAction) -> Self {
        Self {
            dataset_id: None,
            actor_id: None,
            actor_role: None,
            action,
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn dataset(mut self, dataset_id: DatasetId) -> Self {
        self.dataset_id = Some(dataset_id);
        self
    }

    /// Attributes the event to `user`, or to an anonymous actor for `None`.
    pub fn by(mut self, user: Option<&User>) -> Self {
        self.actor_id = user.map(|u| u.id);
        self.actor_role = user.map(|u| u.role);
        self
    }

    pub fn actor(mut self, actor_id: Option<UserId>, actor_role: Option<Role>) -> Self {
        self.actor_id = actor_id;
        self.actor_role = actor_role;
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Filter for reading the log back. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub dataset_id: Option<DatasetId>,
    pub actor_id: Option<UserId>,
    pub actor_role: Option<Role>,
    pub action: Option<AuditAction>,
    /// Inclusive lower bound
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn for_dataset(dataset_id: DatasetId) -> Self {
        Self {
            dataset_id: Some(dataset_id),
            ..Default::default()
        }
    }

    pub fn with_action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        (self.dataset_id.is_none() || entry.dataset_id == self.dataset_id)
            && (self.actor_id.is_none() || entry.actor_id == self.actor_id)
            && (self.actor_role.is_none() || entry.actor_role == self.actor_role)
            && self.action.map_or(true, |a| entry.action == a)
            && self.from.map_or(true, |from| entry.at >= from)
            && self.to.map_or(true, |to| entry.at <= to)
    }
}

#[derive(Clone)]
pub struct AuditLog {
    db: DbOperations,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    pub fn new(db: DbOperations, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Appends `event` as part of the enclosing transaction and returns the
    /// new entry id.
    pub fn record(&self, txn: &TxnTrees<'_>, event: AuditEvent) -> TxResult<u64> {
        let entry = AuditLogEntry {
            id: txn.next_id()?,
            dataset_id: event.dataset_id,
            actor_id: event.actor_id,
            actor_role: event.actor_role,
            action: event.action,
            metadata: event.metadata,
            at: self.clock.now(),
        };
        txn.append_audit(&entry)?;
        debug!(
            "audit {} dataset={:?} actor={:?}",
            entry.action, entry.dataset_id, entry.actor_id
        );
        Ok(entry.id)
    }

    /// Appends a single event in its own transaction.
    pub fn append(&self, event: AuditEvent) -> VaultResult<u64> {
        self.db.write("audit append", |txn| self.record(txn, event.clone()))
    }

    /// Appends an event whose action, role and metadata arrive as text.
    ///
    /// Every field is parsed before anything is written: an unknown action,
    /// an unknown role or metadata that is not valid JSON is rejected with
    /// `Validation` and leaves the log untouched.
    pub fn record_named(
        &self,
        dataset_id: Option<DatasetId>,
        actor_id: Option<UserId>,
        actor_role: Option<&str>,
        action: &str,
        metadata: &str,
    ) -> VaultResult<u64> {
        let action: AuditAction = action.parse()?;
        let actor_role = actor_role.map(str::parse::<Role>).transpose()?;
        let metadata: Value = if metadata.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(metadata)
                .map_err(|e| VaultError::Validation(format!("Invalid audit metadata: {}", e)))?
        };

        let mut event = AuditEvent::new(action)
            .actor(actor_id, actor_role)
            .metadata(metadata);
        event.dataset_id = dataset_id;
        self.append(event)
    }

    /// Entries matching `query`, newest first.
    pub fn query(&self, query: &AuditQuery) -> VaultResult<Vec<AuditLogEntry>> {
        let mut entries: Vec<AuditLogEntry> = self
            .db
            .list_audit_entries()?
            .into_iter()
            .rev()
            .filter(|entry| query.matches(entry))
            .collect();
        if let Some(limit) = query.limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    pub fn entries_for_dataset(&self, dataset_id: DatasetId) -> VaultResult<Vec<AuditLogEntry>> {
        self.query(&AuditQuery::for_dataset(dataset_id))
    }

    /// Consent log of an owner: every entry about a dataset they own, newest
    /// first.
    pub fn consent_log_for_owner(
        &self,
        owner_id: UserId,
        limit: Option<usize>,
    ) -> VaultResult<Vec<AuditLogEntry>> {
        let owned: HashSet<DatasetId> = self
            .db
            .list_datasets_owned_by(owner_id)?
            .into_iter()
            .map(|meta| meta.id)
            .collect();

        let mut entries: Vec<AuditLogEntry> = self
            .db
            .list_audit_entries()?
            .into_iter()
            .rev()
            .filter(|entry| entry.dataset_id.map_or(false, |id| owned.contains(&id)))
            .collect();
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        self.db.audit_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
