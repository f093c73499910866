//! Closed enumerations for roles, visibility tiers, permission states, audit
//! actions, policy reasons and grant modes.
//!
//! Each enum has a fixed wire spelling used both for storage and for parsing
//! values that arrive as strings at the edges (CLI, imported records).

use crate::error::VaultError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every value of the enumeration, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire spelling of the value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            fn from_exact(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }

            fn allowed() -> String {
                Self::ALL
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_enum! {
    /// Role of an actor. Only verified organisations take part in the
    /// request/grant workflow.
    Role {
        Individual => "individual",
        Organisation => "organisation",
        Admin => "admin",
    }
}

closed_enum! {
    /// Visibility tier of a dataset.
    Visibility {
        Private => "Private",
        Trusted => "Trusted",
        Public => "Public",
    }
}

closed_enum! {
    /// State of a (dataset, organisation) permission row.
    PermissionStatus {
        Pending => "pending",
        Granted => "granted",
        Revoked => "revoked",
    }
}

closed_enum! {
    /// Audit log actions. Extending this set is a design change.
    AuditAction {
        Upload => "upload",
        PermissionsUpdate => "permissions_update",
        RequestAccess => "request_access",
        Grant => "grant",
        Revoke => "revoke",
        ViewMeta => "view_meta",
        Download => "download",
        Denied => "denied",
        LoginFailed => "login_failed",
        LoginSucceeded => "login_succeeded",
        RewardCredited => "reward_credited",
        DataAccessAllowed => "data_access_allowed",
        DataAccessDenied => "data_access_denied",
    }
}

closed_enum! {
    /// Reason code returned with every access decision.
    Reason {
        Ok => "ok",
        NotFound => "not_found",
        Private => "private",
        TrustedOnly => "trusted_only",
        NotTrusted => "not_trusted",
        Expired => "expired",
        UnverifiedOrg => "unverified_org",
        Forbidden => "forbidden",
    }
}

closed_enum! {
    /// How an allowed access was granted.
    GrantMode {
        Owner => "owner",
        Admin => "admin",
        Public => "public",
        Trusted => "trusted",
    }
}

impl PermissionStatus {
    /// The `allow` flag that always accompanies this status.
    pub fn allows(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

impl GrantMode {
    /// Whether an organisation access under this mode accrues a reward.
    pub fn is_rewarded(&self) -> bool {
        matches!(self, GrantMode::Trusted | GrantMode::Public)
    }
}

impl FromStr for Role {
    type Err = VaultError;

    /// Accepts the canonical spellings plus the legacy `user`/`org` aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        match value.as_str() {
            "user" => Ok(Role::Individual),
            "org" => Ok(Role::Organisation),
            other => Self::from_exact(other).ok_or_else(|| {
                VaultError::Validation(format!(
                    "Invalid actor_role '{}'. Allowed: {}",
                    s,
                    Self::allowed()
                ))
            }),
        }
    }
}

impl FromStr for Visibility {
    type Err = VaultError;

    /// Title-cases the input and accepts exactly `Private`, `Trusted` or `Public`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let titled = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        };
        Self::from_exact(&titled).ok_or_else(|| {
            VaultError::Validation(format!(
                "Invalid visibility '{}'. Allowed: {}",
                s,
                Self::allowed()
            ))
        })
    }
}

impl FromStr for AuditAction {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_exact(s.trim()).ok_or_else(|| {
            VaultError::Validation(format!(
                "Invalid action '{}'. Allowed: {}",
                s,
                Self::allowed()
            ))
        })
    }
}

impl FromStr for PermissionStatus {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_exact(s.trim()).ok_or_else(|| {
            VaultError::Validation(format!(
                "Invalid permission status '{}'. Allowed: {}",
                s,
                Self::allowed()
            ))
        })
    }
}

impl FromStr for Reason {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_exact(s.trim()).ok_or_else(|| {
            VaultError::Validation(format!(
                "Invalid reason code '{}'. Allowed: {}",
                s,
                Self::allowed()
            ))
        })
    }
}

impl FromStr for GrantMode {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_exact(s.trim()).ok_or_else(|| {
            VaultError::Validation(format!(
                "Invalid grant mode '{}'. Allowed: {}",
                s,
                Self::allowed()
            ))
        })
    }
}
