//! User directory: registration, role and verification changes, login
//! bookkeeping and the organisation directory.

use crate::audit::{AuditEvent, AuditLog};
use crate::clock::Clock;
use crate::db_operations::{AbortOnError, DbOperations, ErrorUtils, TxResult, TxnTrees};
use crate::error::{VaultError, VaultResult};
use crate::storage::purge_dataset;
use crate::types::{AuditAction, DatasetId, NewUser, Role, User, UserId};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Trims and lower-cases an email address, rejecting malformed ones.
pub fn normalize_email(email: &str) -> VaultResult<String> {
    let email = email.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(VaultError::Validation(format!("Invalid email '{}'", email)));
    }
    Ok(email)
}

#[derive(Clone)]
pub struct UserDirectory {
    db: DbOperations,
    audit: AuditLog,
    clock: Arc<dyn Clock>,
}

impl UserDirectory {
    pub fn new(db: DbOperations, audit: AuditLog, clock: Arc<dyn Clock>) -> Self {
        Self { db, audit, clock }
    }

    /// Registers a user. Emails are unique after normalization.
    pub fn create_user(&self, new_user: NewUser) -> VaultResult<User> {
        let name = new_user.name.trim().to_string();
        if name.is_empty() {
            return Err(VaultError::Validation("User name cannot be empty".to_string()));
        }
        let email = normalize_email(&new_user.email)?;

        let user = self.db.write("create user", |txn| {
            if txn.user_id_by_email(&email)?.is_some() {
                return Err(ErrorUtils::abort(VaultError::Validation(format!(
                    "Email '{}' is already registered",
                    email
                ))));
            }
            let user = User {
                id: txn.next_id()?,
                name: name.clone(),
                email: email.clone(),
                role: new_user.role,
                verified: new_user.verified,
                created_at: self.clock.now(),
                last_login: None,
            };
            txn.put_user(&user)?;
            Ok(user)
        })?;
        info!("Created {} user {} ({})", user.role, user.id, user.email);
        Ok(user)
    }

    pub fn get_user(&self, user_id: UserId) -> VaultResult<Option<User>> {
        self.db.get_user(user_id)
    }

    pub fn find_user_by_email(&self, email: &str) -> VaultResult<Option<User>> {
        self.db.find_user_by_email(&email.trim().to_lowercase())
    }

    pub fn set_role(&self, user_id: UserId, role: Role) -> VaultResult<User> {
        self.update_user("set role", user_id, |user| user.role = role)
    }

    pub fn set_verified(&self, user_id: UserId, verified: bool) -> VaultResult<User> {
        self.update_user("set verified", user_id, |user| user.verified = verified)
    }

    /// Gives the user registered under `email` the admin role.
    pub fn promote_to_admin(&self, email: &str) -> VaultResult<User> {
        let user = self
            .find_user_by_email(email)?
            .ok_or_else(|| ErrorUtils::not_found_error("User with email", email.trim()))?;
        let user = self.set_role(user.id, Role::Admin)?;
        info!("{} is now an admin", user.email);
        Ok(user)
    }

    /// Verified organisations, ordered by name (case-insensitive).
    pub fn list_org_directory(&self) -> VaultResult<Vec<User>> {
        let mut orgs: Vec<User> = self
            .db
            .list_users()?
            .into_iter()
            .filter(|u| u.is_organisation() && u.verified)
            .collect();
        orgs.sort_by_key(|u| (u.name.to_lowercase(), u.id));
        Ok(orgs)
    }

    /// Stamps `last_login` and writes `login_succeeded`.
    pub fn record_login_succeeded(&self, user_id: UserId) -> VaultResult<User> {
        self.db.write("login succeeded", |txn| {
            let mut user = require_user(txn, user_id)?;
            user.last_login = Some(self.clock.now());
            txn.put_user(&user)?;
            self.audit.record(
                txn,
                AuditEvent::new(AuditAction::LoginSucceeded)
                    .by(Some(&user))
                    .metadata(json!({ "email": user.email })),
            )?;
            Ok(user)
        })
    }

    /// Writes `login_failed`, attributed to the account when the email is
    /// known and to an anonymous actor otherwise.
    pub fn record_login_failed(&self, email: &str) -> VaultResult<()> {
        let email = email.trim().to_lowercase();
        self.db.write("login failed", |txn| {
            let user = match txn.user_id_by_email(&email)? {
                Some(id) => txn.get_user(id)?,
                None => None,
            };
            self.audit.record(
                txn,
                AuditEvent::new(AuditAction::LoginFailed)
                    .by(user.as_ref())
                    .metadata(json!({ "email": email })),
            )?;
            Ok(())
        })?;
        warn!("Failed login for {}", email);
        Ok(())
    }

    /// Deletes a user together with the datasets they own and every
    /// permission row naming them as the organisation. Audit entries stay.
    pub fn delete_user(&self, user_id: UserId) -> VaultResult<()> {
        let removed = self.db.write_prepared(
            "delete user",
            |db| {
                let mut owned = Vec::new();
                for meta in db.list_datasets_owned_by(user_id)? {
                    let org_ids: Vec<UserId> = db
                        .permissions_for_dataset(meta.id)?
                        .iter()
                        .map(|p| p.org_id)
                        .collect();
                    owned.push((meta, org_ids));
                }
                let requested: Vec<DatasetId> = db
                    .list_permissions()?
                    .into_iter()
                    .filter(|p| p.org_id == user_id)
                    .map(|p| p.dataset_id)
                    .collect();
                Ok((owned, requested))
            },
            |txn, (owned, requested)| {
                let user = require_user(txn, user_id)?;

                for (meta, org_ids) in owned {
                    purge_dataset(txn, meta, org_ids, None)?;
                    self.audit.record(
                        txn,
                        AuditEvent::new(AuditAction::PermissionsUpdate)
                            .dataset(meta.id)
                            .by(Some(&user))
                            .metadata(json!({
                                "op": "delete_dataset",
                                "name": meta.name,
                                "version": meta.version,
                                "cascade": "delete_user",
                            })),
                    )?;
                }
                for dataset_id in requested {
                    txn.remove_permission(*dataset_id, user_id)?;
                }

                txn.remove_user(&user)?;
                Ok(owned.len())
            },
        )?;
        info!("Deleted user {} and {} dataset(s)", user_id, removed);
        Ok(())
    }

    fn update_user<F>(&self, operation: &str, user_id: UserId, change: F) -> VaultResult<User>
    where
        F: Fn(&mut User),
    {
        self.db.write(operation, |txn| {
            let mut user = require_user(txn, user_id)?;
            change(&mut user);
            txn.put_user(&user)?;
            Ok(user)
        })
    }
}

fn require_user(txn: &TxnTrees<'_>, user_id: UserId) -> TxResult<User> {
    txn.get_user(user_id)?
        .ok_or_else(|| ErrorUtils::not_found_error("User", user_id))
        .or_abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_emails() {
        assert_eq!(normalize_email("  Alice@Example.COM ").unwrap(), "alice@example.com");
        assert!(normalize_email("alice").is_err());
        assert!(normalize_email("alice@localhost").is_err());
        assert!(normalize_email("a b@example.com").is_err());
    }
}
