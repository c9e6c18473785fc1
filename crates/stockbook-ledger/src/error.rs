//! # Ledger Error Types
//!
//! The error surface of the ledger service.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Ledger Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Caller input   │  │  Ledger rules   │  │     Storage             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  Core           │  │  Database               │ │
//! │  │  InvalidConfig  │  │  (insufficient  │  │  Conflict (retryable)   │ │
//! │  │                 │  │   stock, ...)   │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use stockbook_core::{CoreError, ValidationError};
use stockbook_db::DbError;
use thiserror::Error;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger service error.
#[derive(Debug, Error)]
pub enum LedgerError {
    // =========================================================================
    // Input
    // =========================================================================
    /// The request was rejected before anything was touched.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Ledger Rules
    // =========================================================================
    /// A ledger rule refused the movement (e.g. insufficient stock).
    #[error(transparent)]
    Core(CoreError),

    // =========================================================================
    // Storage
    // =========================================================================
    /// Another writer changed a document between our read and our write.
    ///
    /// ## When This Occurs
    /// Two processes (or two services without a shared lock) write the same
    /// product at once. Safe to retry: nothing was committed.
    #[error("Concurrent update on {key} (gave up after {attempts} retries)")]
    Conflict { key: String, attempts: u32 },

    #[error("Database error: {0}")]
    Database(DbError),

    // =========================================================================
    // Configuration
    // =========================================================================
    #[error("Invalid ledger configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

impl LedgerError {
    /// Whether retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Conflict { .. } | LedgerError::Database(DbError::PoolExhausted)
        )
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => LedgerError::Validation(v),
            other => LedgerError::Core(other),
        }
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict { key, .. } => LedgerError::Conflict { key, attempts: 0 },
            other => LedgerError::Database(other),
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for LedgerError {
    fn from(err: toml::ser::Error) -> Self {
        LedgerError::ConfigSaveFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_conflict_becomes_retryable() {
        let err: LedgerError = DbError::conflict("monthly_ledger", "v1/p1/2025-01", 3).into();
        assert!(err.is_retryable());
        assert!(matches!(err, LedgerError::Conflict { ref key, .. } if key == "v1/p1/2025-01"));
    }

    #[test]
    fn test_core_validation_is_lifted() {
        let core = CoreError::Validation(ValidationError::Required {
            field: "batch_number".to_string(),
        });
        let err: LedgerError = core.into();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rule_failures_are_not_retryable() {
        let err: LedgerError = CoreError::BatchNotFound("B9".to_string()).into();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("B9"));
    }
}
