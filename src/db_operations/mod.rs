// Core database operations
mod audit_operations;
pub mod core;
mod dataset_operations;
pub mod error_utils;
pub mod keys;
mod permission_operations;
mod reward_operations;
pub mod txn;
mod user_operations;

// Re-export the main DbOperations struct and error utilities
pub use core::DbOperations;
pub use error_utils::ErrorUtils;
pub use txn::{AbortOnError, TxResult, TxnTrees};
