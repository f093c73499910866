//! Common test utilities and fixtures for the vault integration tests
//!
//! Every fixture opens its own temporary sled database, pins the clock to a
//! known day and generates a fresh AES key.
#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use datavault::{
    AesGcmBlobCipher, AuditAction, AuditLogEntry, AuditQuery, BlobCipher, Clock, DatasetId,
    DatasetMeta, FixedClock, NewDataset, NewUser, Role, User, Vault, VaultConfig, Visibility,
};
use std::sync::Arc;
use tempfile::TempDir;

/// Common test fixture that can be used across integration tests
pub struct VaultFixture {
    pub vault: Vault,
    pub clock: Arc<FixedClock>,
    pub _temp_dir: TempDir,
}

impl VaultFixture {
    /// Create a new fixture with the clock at 09:00 UTC on 2024-06-10
    pub fn new() -> Self {
        let cipher = AesGcmBlobCipher::new(&AesGcmBlobCipher::generate_key());
        Self::with_cipher(Arc::new(cipher))
    }

    pub fn with_cipher(cipher: Arc<dyn BlobCipher>) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let config = VaultConfig::temporary(temp_dir.path().join("vault"));

        let clock = Arc::new(FixedClock::on(start_day()));
        clock.advance(Duration::hours(9));

        let vault = Vault::open(config, cipher, clock.clone()).expect("Failed to open vault");
        Self {
            vault,
            clock,
            _temp_dir: temp_dir,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn individual(&self, name: &str) -> User {
        self.user(name, Role::Individual, true)
    }

    pub fn org(&self, name: &str) -> User {
        self.user(name, Role::Organisation, true)
    }

    pub fn unverified_org(&self, name: &str) -> User {
        self.user(name, Role::Organisation, false)
    }

    pub fn admin(&self, name: &str) -> User {
        self.user(name, Role::Admin, true)
    }

    fn user(&self, name: &str, role: Role, verified: bool) -> User {
        let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
        let mut new_user = NewUser::new(name, &email, role);
        if !verified {
            new_user = new_user.unverified();
        }
        self.vault
            .users()
            .create_user(new_user)
            .expect("Failed to create user")
    }

    pub fn upload(&self, owner: &User, name: &str, visibility: Visibility) -> DatasetMeta {
        self.vault
            .datasets()
            .save_dataset(
                NewDataset::new(owner.id, name, format!("col\n{}\n", name))
                    .with_mime("text/csv")
                    .with_visibility(visibility),
            )
            .expect("Failed to save dataset")
    }

    /// Audit entries of one dataset, oldest first
    pub fn audit_trail(&self, dataset_id: DatasetId) -> Vec<AuditLogEntry> {
        let mut entries = self
            .vault
            .audit()
            .entries_for_dataset(dataset_id)
            .expect("Failed to read audit log");
        entries.reverse();
        entries
    }

    /// Actions of one dataset's audit entries, oldest first
    pub fn audit_actions(&self, dataset_id: DatasetId) -> Vec<AuditAction> {
        self.audit_trail(dataset_id)
            .into_iter()
            .map(|entry| entry.action)
            .collect()
    }

    pub fn count_action(&self, action: AuditAction) -> usize {
        self.vault
            .audit()
            .query(&AuditQuery {
                action: Some(action),
                ..Default::default()
            })
            .expect("Failed to query audit log")
            .len()
    }
}

pub fn start_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).expect("valid date")
}
