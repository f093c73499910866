//! Domain types shared by every component.

pub mod enums;
pub mod records;

pub use enums::{AuditAction, GrantMode, PermissionStatus, Reason, Role, Visibility};
pub use records::{
    AccessDecision, AuditLogEntry, DatasetHead, DatasetId, DatasetMeta, DatasetRecord,
    DownloadedDataset, GrantInfo, NewDataset, NewUser, Permission, RewardEvent, User, UserId,
};
