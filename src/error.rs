use crate::types::{DatasetId, PermissionStatus, Reason, UserId};
use sled::transaction::TransactionError;
use thiserror::Error;

/// Unified error type for the vault.
///
/// The variants follow the error taxonomy of the access core:
/// - `PolicyDenial` is an expected, user-facing outcome that has already been
///   written to the audit log when it is returned.
/// - `NotFound` covers missing datasets, users and permission rows.
/// - `Validation` rejects bad input before anything is written.
/// - `Busy`, `Database` and `Serialization` are storage failures; the
///   transaction that produced them has been rolled back in full.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The access policy denied the request
    #[error("Access denied: {reason}")]
    PolicyDenial { reason: Reason },

    /// A referenced dataset, user or permission does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input (bad enum value, malformed email, empty name, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The acting user is not the owner of the dataset being mutated
    #[error("User {actor_id} does not own dataset {dataset_id}")]
    NotOwner {
        dataset_id: DatasetId,
        actor_id: UserId,
    },

    /// The permission row is not in a state that allows the operation
    #[error("Cannot {operation} a permission in state '{status}'")]
    InvalidTransition {
        operation: &'static str,
        status: PermissionStatus,
    },

    /// The writer gate could not be acquired within the configured wait
    #[error("Store busy: {0}")]
    Busy(String),

    /// Errors raised by the storage engine
    #[error("Database error: {0}")]
    Database(String),

    /// Errors related to serialization/deserialization of records
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Errors raised by the blob cipher
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Errors related to configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    /// Returns the policy reason when this error is a denial.
    pub fn denial_reason(&self) -> Option<Reason> {
        match self {
            Self::PolicyDenial { reason } => Some(*reason),
            _ => None,
        }
    }
}

impl From<sled::Error> for VaultError {
    fn from(error: sled::Error) -> Self {
        VaultError::Database(error.to_string())
    }
}

impl From<TransactionError<VaultError>> for VaultError {
    fn from(error: TransactionError<VaultError>) -> Self {
        match error {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(e) => VaultError::Database(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(error: serde_json::Error) -> Self {
        VaultError::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for VaultError {
    fn from(error: toml::de::Error) -> Self {
        VaultError::Config(error.to_string())
    }
}

/// Result type alias for operations that can result in a VaultError
pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_abort_unwraps_inner_error() {
        let err: VaultError =
            TransactionError::Abort(VaultError::NotFound("dataset 7".to_string())).into();
        assert!(matches!(err, VaultError::NotFound(msg) if msg == "dataset 7"));
    }

    #[test]
    fn denial_reason_is_exposed() {
        let err = VaultError::PolicyDenial {
            reason: Reason::NotTrusted,
        };
        assert_eq!(err.denial_reason(), Some(Reason::NotTrusted));
        assert_eq!(err.to_string(), "Access denied: not_trusted");
        assert_eq!(VaultError::Busy("x".into()).denial_reason(), None);
    }
}
