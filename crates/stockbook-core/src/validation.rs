//! # Validation Module
//!
//! Input validation for ledger requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (field rules)                                    │
//! │  ├── ids, quantities, batch numbers, costs                             │
//! │  └── Runs before any document is loaded                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: LedgerBook (ledger rules)                                    │
//! │  ├── duplicate batch numbers                                           │
//! │  └── stock availability                                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE (venue_id, product_id, year, month)                        │
//! │  └── version check on update                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use stockbook_core::validation::{validate_batch_number, validate_quantity};
//!
//! validate_batch_number("B-2025-001").unwrap();
//! validate_quantity(24).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{
    MAX_ACTOR_LENGTH, MAX_BATCH_NUMBER_LENGTH, MAX_ENTRY_QUANTITY, MAX_ID_LENGTH, MAX_NOTE_LENGTH,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a venue or product identifier.
///
/// ## Rules
/// - Must not be empty
/// - At most MAX_ID_LENGTH (64) characters
/// - No whitespace or control characters
///
/// ## Example
/// ```rust
/// use stockbook_core::validation::validate_id;
///
/// assert!(validate_id("venue_id", "arena-1").is_ok());
/// assert!(validate_id("venue_id", "").is_err());
/// assert!(validate_id("venue_id", "has space").is_err());
/// ```
pub fn validate_id(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LENGTH,
        });
    }

    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates a batch number.
///
/// ## Rules
/// - Must not be empty
/// - At most MAX_BATCH_NUMBER_LENGTH (50) characters
/// - Letters, numbers, hyphens, underscores and dots only
pub fn validate_batch_number(batch_number: &str) -> ValidationResult<()> {
    let batch_number = batch_number.trim();

    if batch_number.is_empty() {
        return Err(ValidationError::Required {
            field: "batch_number".to_string(),
        });
    }

    if batch_number.len() > MAX_BATCH_NUMBER_LENGTH {
        return Err(ValidationError::TooLong {
            field: "batch_number".to_string(),
            max: MAX_BATCH_NUMBER_LENGTH,
        });
    }

    if !batch_number
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "batch_number".to_string(),
            reason: "must contain only letters, numbers, hyphens, underscores, and dots"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates a free-text note.
pub fn validate_note(note: &str) -> ValidationResult<()> {
    if note.len() > MAX_NOTE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: MAX_NOTE_LENGTH,
        });
    }

    Ok(())
}

/// Validates an actor name for the audit trail.
///
/// Actors are display names ("Jane Doe", "till-1"), so any text is
/// accepted as long as it is not blank.
pub fn validate_actor(field: &str, actor: &str) -> ValidationResult<()> {
    if actor.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if actor.len() > MAX_ACTOR_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ACTOR_LENGTH,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an unsigned movement quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ENTRY_QUANTITY
///
/// ## User Workflow
/// ```text
/// record_sale(qty: 0)
///      │
///      ▼
/// validate_quantity(0) ← THIS FUNCTION
///      │
///      ├── qty <= 0?        → Error: "quantity must be positive"
///      ├── qty > max?       → Error: "quantity must be between 1 and max"
///      └── OK               → FIFO allocation
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ENTRY_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ENTRY_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a signed adjustment quantity.
///
/// ## Rules
/// - Must not be zero
/// - Magnitude must not exceed MAX_ENTRY_QUANTITY
pub fn validate_adjustment_quantity(qty: i64) -> ValidationResult<()> {
    if qty == 0 {
        return Err(ValidationError::MustBeNonZero {
            field: "quantity".to_string(),
        });
    }

    if qty.abs() > MAX_ENTRY_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: -MAX_ENTRY_QUANTITY,
            max: MAX_ENTRY_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit cost in cents.
///
/// ## Example
/// ```rust
/// use stockbook_core::validation::validate_unit_cost_cents;
///
/// assert!(validate_unit_cost_cents(250).is_ok());
/// assert!(validate_unit_cost_cents(0).is_ok());     // Free stock
/// assert!(validate_unit_cost_cents(-1).is_err());
/// ```
pub fn validate_unit_cost_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "unit_cost".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("venue_id", "arena-1").is_ok());
        assert!(validate_id("product_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());

        assert!(validate_id("venue_id", "").is_err());
        assert!(validate_id("venue_id", "   ").is_err());
        assert!(validate_id("venue_id", "tab\there").is_err());
        assert!(validate_id("venue_id", &"v".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_batch_number() {
        assert!(validate_batch_number("B-2025-001").is_ok());
        assert!(validate_batch_number("LOT_7.2").is_ok());

        assert!(validate_batch_number("").is_err());
        assert!(validate_batch_number("has space").is_err());
        assert!(validate_batch_number(&"B".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ENTRY_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-4).is_err());
        assert!(validate_quantity(MAX_ENTRY_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_adjustment_quantity() {
        assert!(validate_adjustment_quantity(-3).is_ok());
        assert!(validate_adjustment_quantity(3).is_ok());
        assert!(matches!(
            validate_adjustment_quantity(0),
            Err(ValidationError::MustBeNonZero { .. })
        ));
        assert!(validate_adjustment_quantity(-(MAX_ENTRY_QUANTITY + 1)).is_err());
    }

    #[test]
    fn test_validate_actor() {
        assert!(validate_actor("actor", "Jane Doe").is_ok());
        assert!(validate_actor("actor", "till-1").is_ok());

        assert!(matches!(
            validate_actor("resolved_by", "  "),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_actor("resolved_by", &"a".repeat(MAX_ACTOR_LENGTH + 1)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_note() {
        assert!(validate_note("stock take").is_ok());
        assert!(validate_note(&"n".repeat(MAX_NOTE_LENGTH + 1)).is_err());
    }
}
