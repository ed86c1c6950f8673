//! # Validation Module
//!
//! Boundary input validation for the engines.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend (billing SPA)                                       │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - record shape validation                        │
//! │  ├── Currency codes, separator configs, rate records                   │
//! │  └── Hard errors: calculation never runs on malformed input            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Allocation flags                                             │
//! │  ├── Over-applied lines, bad amounts, credit ceilings                  │
//! │  └── Soft flags: rendered by the UI, block submission, never throw     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::NumberFormat;
use crate::rates::Rate;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Currency
// =============================================================================

/// Validates the shape of a currency code before table lookup.
///
/// ## Rules
/// - Must not be empty
/// - Must be exactly three ASCII letters (ISO 4217)
///
/// Whether the code is *known* is the currency table's call
/// ([`crate::money::Currency::from_code`]); this check only rejects
/// records that could never be a code.
pub fn validate_currency_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "currency".to_string(),
        });
    }

    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a three-letter ISO 4217 code".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Number Format
// =============================================================================

/// Validates a separator configuration.
///
/// ## Rules
/// - Decimal and thousands separators must differ
/// - Neither may be a digit or a sign character
pub fn validate_number_format(format: &NumberFormat) -> ValidationResult<()> {
    if format.decimal_separator == format.thousands_separator {
        return Err(ValidationError::InvalidFormat {
            field: "number_format".to_string(),
            reason: "decimal and thousands separators must differ".to_string(),
        });
    }

    for sep in [format.decimal_separator, format.thousands_separator] {
        if sep.is_ascii_digit() || sep == '-' || sep == '+' {
            return Err(ValidationError::InvalidFormat {
                field: "number_format".to_string(),
                reason: format!("'{sep}' cannot be used as a separator"),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Rate Records
// =============================================================================

/// Validates a rate record before it drives any arithmetic.
///
/// ## Rules
/// - Value must be finite
/// - Percent rates must be between 0% and 100%
/// - Only tax rates may be inclusive
pub fn validate_rate(rate: &Rate) -> ValidationResult<()> {
    if !rate.value.is_finite() {
        return Err(ValidationError::InvalidFormat {
            field: "rate.value".to_string(),
            reason: "must be finite".to_string(),
        });
    }

    if rate.is_percent && !(0.0..=100.0).contains(&rate.value) {
        return Err(ValidationError::OutOfRange {
            field: "rate.value".to_string(),
            min: 0,
            max: 100,
        });
    }

    if rate.inclusive && rate.kind != crate::rates::RateKind::Tax {
        return Err(ValidationError::InvalidFormat {
            field: "rate.inclusive".to_string(),
            reason: "only tax rates can be inclusive".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
