//! Per-dataset and per-organisation rollups of an owner's rewards.

use super::reward_ledger::RewardLedger;
use crate::error::VaultResult;
use crate::types::{DatasetId, RewardEvent, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTotals {
    pub credits: u64,
    pub events: u64,
    pub first_at: DateTime<Utc>,
    pub last_at: DateTime<Utc>,
}

impl RewardTotals {
    fn start(event: &RewardEvent) -> Self {
        Self {
            credits: event.amount,
            events: 1,
            first_at: event.at,
            last_at: event.at,
        }
    }

    fn add(&mut self, event: &RewardEvent) {
        self.credits += event.amount;
        self.events += 1;
        self.first_at = self.first_at.min(event.at);
        self.last_at = self.last_at.max(event.at);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRewardSummary {
    pub dataset_id: DatasetId,
    /// Empty when the dataset has since been deleted
    pub dataset_name: String,
    pub totals: RewardTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgRewardSummary {
    pub org_id: UserId,
    /// Empty when the organisation has since been deleted
    pub org_name: String,
    pub totals: RewardTotals,
}

fn group_by<K: Ord + Copy>(
    events: &[RewardEvent],
    key: impl Fn(&RewardEvent) -> K,
) -> BTreeMap<K, RewardTotals> {
    let mut groups: BTreeMap<K, RewardTotals> = BTreeMap::new();
    for event in events {
        groups
            .entry(key(event))
            .and_modify(|totals| totals.add(event))
            .or_insert_with(|| RewardTotals::start(event));
    }
    groups
}

impl RewardLedger {
    /// Rewards of `owner_id` grouped by dataset, most credits first.
    pub fn summary_by_dataset(
        &self,
        owner_id: UserId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> VaultResult<Vec<DatasetRewardSummary>> {
        let events = self.rewards_for_owner(owner_id, from, to)?;
        let mut summaries = Vec::new();
        for (dataset_id, totals) in group_by(&events, |e| e.dataset_id) {
            let dataset_name = self
                .db()
                .get_dataset_meta(dataset_id)?
                .map(|meta| meta.name)
                .unwrap_or_default();
            summaries.push(DatasetRewardSummary {
                dataset_id,
                dataset_name,
                totals,
            });
        }
        summaries.sort_by(|a, b| {
            b.totals
                .credits
                .cmp(&a.totals.credits)
                .then(a.dataset_id.cmp(&b.dataset_id))
        });
        Ok(summaries)
    }

    /// Rewards of `owner_id` grouped by the organisation that triggered them,
    /// most credits first.
    pub fn summary_by_org(
        &self,
        owner_id: UserId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> VaultResult<Vec<OrgRewardSummary>> {
        let events = self.rewards_for_owner(owner_id, from, to)?;
        let mut summaries = Vec::new();
        for (org_id, totals) in group_by(&events, |e| e.org_id) {
            let org_name = self
                .db()
                .get_user(org_id)?
                .map(|user| user.name)
                .unwrap_or_default();
            summaries.push(OrgRewardSummary {
                org_id,
                org_name,
                totals,
            });
        }
        summaries.sort_by(|a, b| {
            b.totals
                .credits
                .cmp(&a.totals.credits)
                .then(a.org_id.cmp(&b.org_id))
        });
        Ok(summaries)
    }
}
