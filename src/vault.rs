use crate::audit::AuditLog;
use crate::clock::{Clock, SystemClock};
use crate::config::VaultConfig;
use crate::db_operations::DbOperations;
use crate::error::VaultResult;
use crate::permissions::{AccessPolicy, PermissionManager, PermissionWrapper};
use crate::rewards::RewardLedger;
use crate::security::BlobCipher;
use crate::storage::DatasetStore;
use crate::types::{AccessDecision, DatasetId, GrantInfo, UserId};
use crate::users::UserDirectory;
use log::info;
use std::sync::Arc;

/// The vault coordinator that wires the access core together.
///
/// Vault owns one [`DbOperations`] and hands clones of it to each component:
/// - [`UserDirectory`] for identities, roles and logins
/// - [`DatasetStore`] for versioned uploads, visibility and downloads
/// - [`PermissionManager`] for the request/grant workflow
/// - [`RewardLedger`] for owner credits
/// - [`AuditLog`] for the compliance record
///
/// Every component reads "now" from the same injected [`Clock`], and every
/// logical operation commits as a single transaction.
#[derive(Clone)]
pub struct Vault {
    db: DbOperations,
    config: VaultConfig,
    audit: AuditLog,
    policy: AccessPolicy,
    users: UserDirectory,
    permissions: PermissionManager,
    wrapper: PermissionWrapper,
    rewards: RewardLedger,
    datasets: DatasetStore,
}

impl Vault {
    /// Opens the vault described by `config`.
    ///
    /// # Arguments
    ///
    /// * `config` - Storage location, writer timeout and reward settings
    /// * `cipher` - Transform applied to dataset content at rest
    /// * `clock` - Time source for expiry checks and reward days
    pub fn open(
        config: VaultConfig,
        cipher: Arc<dyn BlobCipher>,
        clock: Arc<dyn Clock>,
    ) -> VaultResult<Self> {
        config.validate()?;
        let db = DbOperations::open(&config)?;
        info!("Opened vault at {}", config.storage_path.display());
        Ok(Self::with_db(db, config, cipher, clock))
    }

    /// Opens the vault on the system clock.
    pub fn open_with_system_clock(config: VaultConfig, cipher: Arc<dyn BlobCipher>) -> VaultResult<Self> {
        Self::open(config, cipher, Arc::new(SystemClock))
    }

    /// Builds the components over an already opened database.
    pub fn with_db(
        db: DbOperations,
        config: VaultConfig,
        cipher: Arc<dyn BlobCipher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let audit = AuditLog::new(db.clone(), clock.clone());
        let policy = AccessPolicy::new(clock.clone());
        let users = UserDirectory::new(db.clone(), audit.clone(), clock.clone());
        let permissions = PermissionManager::new(db.clone(), audit.clone(), clock.clone());
        let wrapper = PermissionWrapper::new(db.clone(), policy.clone(), audit.clone());
        let rewards = RewardLedger::new(
            db.clone(),
            audit.clone(),
            clock.clone(),
            config.rewards.clone(),
        );
        let datasets = DatasetStore::new(
            db.clone(),
            cipher,
            audit.clone(),
            policy.clone(),
            rewards.clone(),
            clock,
        );

        Self {
            db,
            config,
            audit,
            policy,
            users,
            permissions,
            wrapper,
            rewards,
            datasets,
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn db(&self) -> &DbOperations {
        &self.db
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn permissions(&self) -> &PermissionManager {
        &self.permissions
    }

    pub fn rewards(&self) -> &RewardLedger {
        &self.rewards
    }

    pub fn datasets(&self) -> &DatasetStore {
        &self.datasets
    }

    /// Side-effect free access decision for `actor_id` (anonymous for `None`).
    pub fn decide(&self, dataset_id: DatasetId, actor_id: Option<UserId>) -> VaultResult<AccessDecision> {
        Ok(self.policy.evaluate(&self.db, dataset_id, actor_id)?.decision)
    }

    /// Enforcing check: logs `data_access_allowed` or `data_access_denied`
    /// and fails with `PolicyDenial` on denial.
    pub fn assert_can_access(
        &self,
        dataset_id: DatasetId,
        actor_id: Option<UserId>,
        purpose: &str,
    ) -> VaultResult<GrantInfo> {
        self.wrapper.assert_can_access(dataset_id, actor_id, purpose)
    }
}
