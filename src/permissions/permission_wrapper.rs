use super::policy::{AccessPolicy, Evaluation};
use crate::audit::{AuditEvent, AuditLog};
use crate::db_operations::{DbOperations, TxResult, TxnTrees};
use crate::error::{VaultError, VaultResult};
use crate::types::{AuditAction, DatasetId, GrantInfo, UserId};
use log::{info, warn};
use serde_json::json;

/// Enforcing front of the access policy.
///
/// Every check writes exactly one `data_access_allowed` or
/// `data_access_denied` entry carrying the reason, purpose and grant context.
/// A denial is committed to the log before it is returned as
/// [`VaultError::PolicyDenial`].
#[derive(Clone)]
pub struct PermissionWrapper {
    db: DbOperations,
    policy: AccessPolicy,
    audit: AuditLog,
}

impl PermissionWrapper {
    pub fn new(db: DbOperations, policy: AccessPolicy, audit: AuditLog) -> Self {
        Self { db, policy, audit }
    }

    /// Evaluates and logs the outcome inside `txn`, for callers that go on to
    /// read the dataset in the same transaction.
    pub fn check_and_log(
        &self,
        txn: &TxnTrees<'_>,
        dataset_id: DatasetId,
        actor_id: Option<UserId>,
        purpose: &str,
    ) -> TxResult<Evaluation> {
        let evaluation = self.policy.evaluate(txn, dataset_id, actor_id)?;
        let decision = &evaluation.decision;
        let action = if decision.allowed {
            AuditAction::DataAccessAllowed
        } else {
            AuditAction::DataAccessDenied
        };
        let grant = decision.grant.as_ref();

        self.audit.record(
            txn,
            AuditEvent::new(action)
                .dataset(dataset_id)
                .actor(actor_id, evaluation.actor.as_ref().map(|u| u.role))
                .metadata(json!({
                    "reason": decision.reason,
                    "purpose": purpose,
                    "mode": grant.map(|g| g.mode),
                    "scope": grant.and_then(|g| g.scope.clone()),
                    "expires_at": grant.and_then(|g| g.expires_at),
                })),
        )?;
        Ok(evaluation)
    }

    /// Asserts that `actor_id` may access `dataset_id`, returning the grant
    /// it was allowed under.
    pub fn assert_can_access(
        &self,
        dataset_id: DatasetId,
        actor_id: Option<UserId>,
        purpose: &str,
    ) -> VaultResult<GrantInfo> {
        let evaluation = self.db.write("assert access", |txn| {
            self.check_and_log(txn, dataset_id, actor_id, purpose)
        })?;

        let decision = evaluation.decision;
        match decision.grant {
            Some(grant) if decision.allowed => {
                info!(
                    "Access to dataset {} allowed for {:?} ({})",
                    dataset_id, actor_id, grant.mode
                );
                Ok(grant)
            }
            _ => {
                warn!(
                    "Access to dataset {} denied for {:?}: {}",
                    dataset_id, actor_id, decision.reason
                );
                Err(VaultError::PolicyDenial {
                    reason: decision.reason,
                })
            }
        }
    }
}
