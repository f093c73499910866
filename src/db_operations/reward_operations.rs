use super::core::DbOperations;
use super::keys::{id_key, reward_day_key};
use super::txn::{tx_put, TxResult, TxnTrees};
use crate::error::VaultResult;
use crate::types::{DatasetId, RewardEvent, UserId};
use chrono::NaiveDate;

impl TxnTrees<'_> {
    pub fn reward_exists_on(&self, dataset_id: DatasetId, org_id: UserId, day: NaiveDate) -> TxResult<bool> {
        Ok(self
            .reward_days
            .get(reward_day_key(dataset_id, org_id, day))?
            .is_some())
    }

    /// Inserts a reward row together with its (dataset, org, day) dedup key.
    pub fn insert_reward(&self, event: &RewardEvent) -> TxResult<()> {
        tx_put(self.rewards, &id_key(event.id), event, "reward")?;
        tx_put(
            self.reward_days,
            &reward_day_key(event.dataset_id, event.org_id, event.day),
            &event.id,
            "reward day",
        )
    }
}

impl DbOperations {
    pub fn list_rewards(&self) -> VaultResult<Vec<RewardEvent>> {
        self.list_items_in_tree(&self.rewards_tree)
    }
}
