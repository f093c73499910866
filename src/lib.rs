//! # Datavault
//!
//! Access-control and reward core of a personal-data vault. Individuals
//! store versioned, encrypted datasets and tag each one Private, Trusted or
//! Public. Verified organisations request access, owners grant or revoke it,
//! and every decision, state change and reward is appended to an audit log
//! in the same transaction as the change itself.
//!
//! ## Core Components
//!
//! * `permissions` - Access policy, enforcing wrapper and request workflow
//! * `storage` - Versioned datasets and the policy-checked download path
//! * `rewards` - Daily-deduplicated owner credits and their summaries
//! * `audit` - Append-only compliance log
//! * `users` - User directory
//! * `db_operations` - sled trees and the shared write transaction
//!
//! The [`Vault`] type wires these together over one database.

pub mod audit;
pub mod clock;
pub mod config;
pub mod constants;
pub mod db_operations;
pub mod error;
pub mod logging;
pub mod permissions;
pub mod rewards;
pub mod security;
pub mod storage;
pub mod types;
pub mod users;
pub mod vault;

pub use audit::{AuditEvent, AuditLog, AuditQuery};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{load_vault_config, VaultConfig};
pub use error::{VaultError, VaultResult};
pub use permissions::{AccessPolicy, PermissionManager, PermissionWrapper, TrustedOrgsDiff};
pub use rewards::{RewardConfig, RewardLedger};
pub use security::{AesGcmBlobCipher, BlobCipher};
pub use storage::DatasetStore;
pub use types::*;
pub use users::UserDirectory;
pub use vault::Vault;
