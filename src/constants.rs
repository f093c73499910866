/// Common constants used across the vault.
///
/// These defaults are used for configuration when explicit values are not
/// provided.
pub const DEFAULT_STORAGE_PATH: &str = "data/vault";
pub const DEFAULT_WRITE_LOCK_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MIME: &str = "application/octet-stream";

pub const DEFAULT_REWARD_UNIT_AMOUNT: u64 = 1;
pub const DEFAULT_REWARD_UNIT: &str = "credit";
pub const DEFAULT_CREDIT_VALUE_CENTS: u64 = 10;

// sled tree names
pub const USERS_TREE: &str = "users";
pub const USER_EMAILS_TREE: &str = "user_emails";
pub const DATASETS_TREE: &str = "datasets";
pub const DATASET_HEADS_TREE: &str = "dataset_heads";
pub const DATASET_VERSIONS_TREE: &str = "dataset_versions";
pub const PERMISSIONS_TREE: &str = "permissions";
pub const GRANTED_ORGS_TREE: &str = "granted_orgs";
pub const AUDIT_LOG_TREE: &str = "audit_log";
pub const REWARDS_TREE: &str = "rewards";
pub const REWARD_DAYS_TREE: &str = "reward_days";
