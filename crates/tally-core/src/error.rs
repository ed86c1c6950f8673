//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Malformed input, session misuse                │
//! │  └── ValidationError  - Boundary input validation failures             │
//! │                                                                         │
//! │  tally-session errors (separate crate)                                 │
//! │  └── SessionError     - Collaborator load failures                     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SessionError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## What is NOT an error
//! Business-rule violations inside an allocation session (over-applied
//! lines, zero payment without credits, credit above its ceiling) are
//! represented as per-line/per-session boolean flags, never as `Err`.
//! Only malformed input - an unknown currency, a non-finite amount, a
//! broken rate record - is worth raising.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Malformed-input and session-misuse errors.
///
/// ## Design Principles
/// 1. Use `thiserror` for derive macros (not manual impl)
/// 2. Include context in error messages (currency code, field name)
/// 3. Errors are enum variants, never String
#[derive(Debug, Error)]
pub enum CoreError {
    /// Currency code is not in the configured currency table.
    ///
    /// ## When This Occurs
    /// - A document or payment carries a code the exponent table does
    ///   not know. This is fatal at the boundary: silently defaulting
    ///   the exponent would mis-scale every amount on the document.
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// A decimal amount at the boundary was NaN or infinite.
    #[error("Non-finite amount for {field}")]
    NonFiniteAmount { field: String },

    /// Minor-unit arithmetic would overflow i64.
    #[error("Amount overflow while computing {context}")]
    AmountOverflow { context: String },

    /// An operation was attempted on a serialized (terminal) session.
    #[error("Allocation session {session_id} is already serialized")]
    SessionClosed { session_id: String },

    /// A line index passed to an allocation session does not exist.
    #[error("Allocation line index {index} out of bounds (len {len})")]
    LineOutOfBounds { index: usize, len: usize },

    /// A credit source index passed to an allocation session does not exist.
    #[error("Credit source index {index} out of bounds (len {len})")]
    CreditOutOfBounds { index: usize, len: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Boundary input validation errors.
///
/// These occur when a record handed to an engine doesn't meet shape
/// requirements. Used for early validation before calculation runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., bad currency code, bad separator config).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
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
        let err = CoreError::UnknownCurrency("XXX".to_string());
        assert_eq!(err.to_string(), "Unknown currency code: XXX");

        let err = CoreError::NonFiniteAmount {
            field: "amount_paid".to_string(),
        };
        assert_eq!(err.to_string(), "Non-finite amount for amount_paid");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "currency".to_string(),
        };
        assert_eq!(err.to_string(), "currency is required");

        let err = ValidationError::OutOfRange {
            field: "rate".to_string(),
            min: 0,
            max: 10000,
        };
        assert_eq!(err.to_string(), "rate must be between 0 and 10000");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "currency".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
