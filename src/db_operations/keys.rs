//! Key layouts for the sled trees.
//!
//! Integer ids are encoded big-endian so that prefix scans and full-tree
//! iteration return rows in id order.

use chrono::NaiveDate;

pub fn id_key(id: u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// `dataset_id | org_id`
pub fn permission_key(dataset_id: u64, org_id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&dataset_id.to_be_bytes());
    key.extend_from_slice(&org_id.to_be_bytes());
    key
}

/// `owner_id | name`
pub fn head_key(owner_id: u64, name: &str) -> Vec<u8> {
    let mut key = id_key(owner_id);
    key.extend_from_slice(name.as_bytes());
    key
}

/// `owner_id | name | 0x00`, the prefix of every version key of a name
pub fn version_prefix(owner_id: u64, name: &str) -> Vec<u8> {
    let mut key = head_key(owner_id, name);
    key.push(0);
    key
}

pub fn version_key(owner_id: u64, name: &str, version: u32) -> Vec<u8> {
    let mut key = version_prefix(owner_id, name);
    key.extend_from_slice(&version.to_be_bytes());
    key
}

/// `dataset_id | org_id | YYYY-MM-DD`
pub fn reward_day_key(dataset_id: u64, org_id: u64, day: NaiveDate) -> Vec<u8> {
    let mut key = permission_key(dataset_id, org_id);
    key.extend_from_slice(day.format("%Y-%m-%d").to_string().as_bytes());
    key
}

pub fn email_key(email: &str) -> Vec<u8> {
    email.as_bytes().to_vec()
}
