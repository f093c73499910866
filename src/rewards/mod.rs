pub mod reward_config;
pub mod reward_ledger;
pub mod reward_summary;

pub use reward_config::RewardConfig;
pub use reward_ledger::RewardLedger;
pub use reward_summary::{DatasetRewardSummary, OrgRewardSummary, RewardTotals};
