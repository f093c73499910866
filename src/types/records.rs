use super::enums::{AuditAction, GrantMode, PermissionStatus, Reason, Role, Visibility};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type DatasetId = u64;

/// A registered identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Gates organisation participation in Trusted access
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_organisation(&self) -> bool {
        self.role == Role::Organisation
    }
}

/// Input for registering a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub verified: bool,
}

impl NewUser {
    pub fn new(name: &str, email: &str, role: Role) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            role,
            verified: true,
        }
    }

    pub fn unverified(mut self) -> Self {
        self.verified = false;
        self
    }
}

/// Dataset attributes without the encrypted content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub id: DatasetId,
    pub owner_id: UserId,
    pub name: String,
    pub description: String,
    pub mime: String,
    pub visibility: Visibility,
    pub version: u32,
    /// Size of the plaintext in bytes
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Stored dataset row: metadata plus the encrypted content blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub meta: DatasetMeta,
    #[serde(with = "blob_base64")]
    pub content_enc: Vec<u8>,
}

/// Input for storing a new dataset version.
#[derive(Debug, Clone)]
pub struct NewDataset {
    pub owner_id: UserId,
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
    pub description: String,
    pub visibility: Visibility,
}

impl NewDataset {
    pub fn new(owner_id: UserId, file_name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            owner_id,
            file_name: file_name.to_string(),
            mime: None,
            bytes: bytes.into(),
            description: String::new(),
            visibility: Visibility::Private,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_mime(mut self, mime: &str) -> Self {
        self.mime = Some(mime.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// Version pointer for an (owner, name) pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DatasetHead {
    /// Latest surviving version, `None` once every version is deleted
    pub dataset_id: Option<DatasetId>,
    pub version: u32,
    /// Highest version number ever issued for the name
    pub issued: u32,
}

/// Plaintext returned by a policy-checked download.
#[derive(Debug, Clone)]
pub struct DownloadedDataset {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: String,
    pub grant: GrantInfo,
}

/// Grant state of one organisation on one dataset.
///
/// `allow` is never set independently of `status`: every constructor and
/// transition derives it from the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub dataset_id: DatasetId,
    pub org_id: UserId,
    pub allow: bool,
    pub status: PermissionStatus,
    pub scope: Option<String>,
    pub expires_at: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Permission {
    pub fn is_active_grant(&self) -> bool {
        self.allow && self.status == PermissionStatus::Granted
    }

    /// Timestamp of the last state change.
    pub fn last_changed(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// Context describing how an access was (or would have been) granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantInfo {
    pub mode: GrantMode,
    pub scope: Option<String>,
    pub expires_at: Option<NaiveDate>,
}

impl GrantInfo {
    pub fn mode(mode: GrantMode) -> Self {
        Self {
            mode,
            scope: None,
            expires_at: None,
        }
    }
}

/// Outcome of the access policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: Reason,
    pub grant: Option<GrantInfo>,
}

impl AccessDecision {
    pub fn allow(grant: GrantInfo) -> Self {
        Self {
            allowed: true,
            reason: Reason::Ok,
            grant: Some(grant),
        }
    }

    pub fn deny(reason: Reason) -> Self {
        Self {
            allowed: false,
            reason,
            grant: None,
        }
    }

    /// Denial that still carries the grant it was evaluated against.
    pub fn deny_with(reason: Reason, grant: GrantInfo) -> Self {
        Self {
            allowed: false,
            reason,
            grant: Some(grant),
        }
    }

    pub fn mode(&self) -> Option<GrantMode> {
        self.grant.as_ref().map(|g| g.mode)
    }
}

/// Append-only audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: u64,
    /// None for events not tied to a dataset (logins)
    pub dataset_id: Option<DatasetId>,
    /// None for anonymous actors
    pub actor_id: Option<UserId>,
    pub actor_role: Option<Role>,
    pub action: AuditAction,
    pub metadata: serde_json::Value,
    pub at: DateTime<Utc>,
}

/// A credited reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardEvent {
    pub id: u64,
    pub dataset_id: DatasetId,
    pub owner_id: UserId,
    pub org_id: UserId,
    pub amount: u64,
    pub unit: String,
    pub reason: String,
    pub metadata: serde_json::Value,
    pub at: DateTime<Utc>,
    /// Calendar day the credit counts against for dedup and date filters.
    pub day: NaiveDate,
}

mod blob_base64 {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
