//! # Error Types
//!
//! Domain-specific error types for stockbook-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockbook-core errors (this file)                                     │
//! │  ├── CoreError        - Ledger rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stockbook-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  stockbook-ledger errors (service crate)                               │
//! │  └── LedgerError      - What callers see (retryable or not)            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Ledger rule errors.
///
/// Raised before any document is mutated, so a failed operation never leaves
/// a half-applied entry behind.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Outstanding batches cannot cover a deduction.
    ///
    /// ## When This Occurs
    /// - A sale larger than the unexpired batch stock (with the reject policy)
    /// - An expiry, damage or negative adjustment larger than batch stock
    ///
    /// ## User Workflow
    /// ```text
    /// record_sale(qty: 12)
    ///      │
    ///      ▼
    /// FIFO plan: batches hold 9
    ///      │
    ///      ▼
    /// InsufficientStock { requested: 12, available: 9 }
    ///      │
    ///      ▼
    /// Caller shows: "Only 9 units available"
    /// ```
    #[error("Insufficient stock for {product_id} at {venue_id}: available {available}, requested {requested}")]
    InsufficientStock {
        venue_id: String,
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// A named batch does not exist for this venue and product.
    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    /// A named batch exists but has less remaining than requested.
    #[error("Batch {batch_number} has {remaining} remaining, requested {requested}")]
    BatchExhausted {
        batch_number: String,
        remaining: i64,
        requested: i64,
    },

    /// An entry id did not resolve inside its document.
    #[error("Entry {entry_id} not found in {period}")]
    EntryNotFound { entry_id: String, period: String },

    /// Year or month out of range.
    #[error("Invalid period {year}-{month}")]
    InvalidPeriod { year: i32, month: u32 },

    /// A document failed its balance check after finalization.
    #[error("Invariant violated for {key}: {detail}")]
    InvariantViolated { key: String, detail: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before any ledger logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustBeNonZero { field: String },

    /// Invalid format (e.g., bad characters, bad date ordering).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., batch number reused for a product).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            venue_id: "arena-1".to_string(),
            product_id: "cola-330".to_string(),
            available: 9,
            requested: 12,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for cola-330 at arena-1: available 9, requested 12"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "batch_number".to_string(),
        };
        assert_eq!(err.to_string(), "batch_number is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "venue_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
