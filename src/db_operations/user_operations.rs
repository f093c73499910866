use super::core::DbOperations;
use super::keys::{email_key, id_key};
use super::txn::{tx_get, tx_put, tx_remove, TxResult, TxnTrees};
use crate::error::VaultResult;
use crate::types::{User, UserId};

impl TxnTrees<'_> {
    pub fn get_user(&self, id: UserId) -> TxResult<Option<User>> {
        tx_get(self.users, &id_key(id), "user")
    }

    pub fn put_user(&self, user: &User) -> TxResult<()> {
        tx_put(self.users, &id_key(user.id), user, "user")?;
        tx_put(self.user_emails, &email_key(&user.email), &user.id, "user email")
    }

    pub fn user_id_by_email(&self, email: &str) -> TxResult<Option<UserId>> {
        tx_get(self.user_emails, &email_key(email), "user email")
    }

    pub fn remove_user(&self, user: &User) -> TxResult<()> {
        tx_remove(self.users, &id_key(user.id))?;
        tx_remove(self.user_emails, &email_key(&user.email))?;
        Ok(())
    }
}

impl DbOperations {
    pub fn get_user(&self, id: UserId) -> VaultResult<Option<User>> {
        self.get_from_tree(&self.users_tree, &id_key(id))
    }

    pub fn find_user_by_email(&self, email: &str) -> VaultResult<Option<User>> {
        match self.get_from_tree::<UserId>(&self.user_emails_tree, &email_key(email))? {
            Some(id) => self.get_user(id),
            None => Ok(None),
        }
    }

    pub fn list_users(&self) -> VaultResult<Vec<User>> {
        self.list_items_in_tree(&self.users_tree)
    }
}
