use super::reward_config::RewardConfig;
use crate::audit::{AuditEvent, AuditLog};
use crate::clock::Clock;
use crate::db_operations::{AbortOnError, DbOperations, ErrorUtils, TxResult, TxnTrees};
use crate::error::VaultResult;
use crate::types::{AuditAction, DatasetMeta, GrantInfo, RewardEvent, User, UserId};
use chrono::NaiveDate;
use log::{debug, info};
use serde_json::json;
use std::sync::Arc;

/// Credits dataset owners for organisation accesses.
///
/// A credit is written only for organisations accessing under a rewarded
/// mode (`trusted` or `public`), and at most once per dataset, organisation
/// and calendar day. The reward row and its `reward_credited` audit entry are
/// written in the caller's transaction.
#[derive(Clone)]
pub struct RewardLedger {
    db: DbOperations,
    audit: AuditLog,
    clock: Arc<dyn Clock>,
    config: RewardConfig,
}

impl RewardLedger {
    pub fn new(db: DbOperations, audit: AuditLog, clock: Arc<dyn Clock>, config: RewardConfig) -> Self {
        Self {
            db,
            audit,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Credits the owner of `dataset` if `actor`'s access qualifies.
    ///
    /// Returns the new reward row, or `None` when the access is not rewarded
    /// or a credit for the same (dataset, organisation) already exists today.
    pub fn maybe_credit(
        &self,
        txn: &TxnTrees<'_>,
        dataset: &DatasetMeta,
        actor: Option<&User>,
        grant: &GrantInfo,
        purpose: &str,
    ) -> TxResult<Option<RewardEvent>> {
        let org = match actor {
            Some(user) if user.is_organisation() => user,
            _ => return Ok(None),
        };
        if !grant.mode.is_rewarded() {
            return Ok(None);
        }

        let today = self.clock.today();
        if txn.reward_exists_on(dataset.id, org.id, today)? {
            debug!(
                "Reward for dataset {} org {} already credited on {}",
                dataset.id, org.id, today
            );
            return Ok(None);
        }

        let owner = txn
            .get_user(dataset.owner_id)?
            .ok_or_else(|| ErrorUtils::not_found_error("User", dataset.owner_id))
            .or_abort()?;

        let reason = format!("org_access:{}", grant.mode);
        let event = RewardEvent {
            id: txn.next_id()?,
            dataset_id: dataset.id,
            owner_id: owner.id,
            org_id: org.id,
            amount: self.config.unit_amount,
            unit: self.config.unit.clone(),
            reason: reason.clone(),
            metadata: json!({ "purpose": purpose, "mode": grant.mode }),
            at: self.clock.now(),
            day: today,
        };
        txn.insert_reward(&event)?;

        self.audit.record(
            txn,
            AuditEvent::new(AuditAction::RewardCredited)
                .dataset(dataset.id)
                .by(Some(&owner))
                .metadata(json!({
                    "org_id": org.id,
                    "amount": event.amount,
                    "unit": event.unit,
                    "reason": reason,
                    "purpose": purpose,
                    "mode": grant.mode,
                })),
        )?;

        info!(
            "Credited owner {} {} {} for org {} on dataset {}",
            owner.id, event.amount, event.unit, org.id, dataset.id
        );
        Ok(Some(event))
    }

    /// Every reward row, oldest first.
    pub fn list_rewards(&self) -> VaultResult<Vec<RewardEvent>> {
        self.db.list_rewards()
    }

    /// Rewards credited to `owner_id` between `from` and `to` (inclusive
    /// calendar days), newest first.
    pub fn rewards_for_owner(
        &self,
        owner_id: UserId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> VaultResult<Vec<RewardEvent>> {
        Ok(self
            .db
            .list_rewards()?
            .into_iter()
            .rev()
            .filter(|event| event.owner_id == owner_id)
            .filter(|event| {
                from.map_or(true, |f| event.day >= f) && to.map_or(true, |t| event.day <= t)
            })
            .collect())
    }

    /// Sum of credits for `owner_id` in the range.
    pub fn total_credits(
        &self,
        owner_id: UserId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> VaultResult<u64> {
        Ok(self
            .rewards_for_owner(owner_id, from, to)?
            .iter()
            .map(|event| event.amount)
            .sum())
    }

    pub(crate) fn db(&self) -> &DbOperations {
        &self.db
    }
}
