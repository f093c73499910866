//! Error handling utilities for database operations
//!
//! This module provides common error handling patterns to reduce code duplication
//! and ensure consistent error messages across the database layer.

use crate::error::VaultError;
use sled::transaction::ConflictableTransactionError;

/// Utility functions for common error handling patterns in database operations
pub struct ErrorUtils;

impl ErrorUtils {
    /// Creates a serialization error with consistent formatting
    pub fn serialization_error(context: &str, error: serde_json::Error) -> VaultError {
        VaultError::Serialization(format!("Serialization failed for {}: {}", context, error))
    }

    /// Creates a deserialization error with consistent formatting
    pub fn deserialization_error(context: &str, error: serde_json::Error) -> VaultError {
        VaultError::Serialization(format!("Deserialization failed for {}: {}", context, error))
    }

    /// Creates a database operation error with consistent formatting
    pub fn database_error(operation: &str, error: sled::Error) -> VaultError {
        VaultError::Database(format!("Database {} failed: {}", operation, error))
    }

    /// Creates a not found error with consistent formatting
    pub fn not_found_error(resource_type: &str, identifier: impl std::fmt::Display) -> VaultError {
        VaultError::NotFound(format!("{} '{}' not found", resource_type, identifier))
    }

    /// Helper for converting sled errors in database operations
    pub fn from_sled_error(operation: &str) -> impl Fn(sled::Error) -> VaultError + '_ {
        move |e| Self::database_error(operation, e)
    }

    /// Helper for converting deserialization errors
    pub fn from_deserialization_error(
        context: &str,
    ) -> impl Fn(serde_json::Error) -> VaultError + '_ {
        move |e| Self::deserialization_error(context, e)
    }

    /// Wraps an error so it aborts (and rolls back) the enclosing transaction
    pub fn abort(error: VaultError) -> ConflictableTransactionError<VaultError> {
        ConflictableTransactionError::Abort(error)
    }
}
