//! # tally-core: Pure Business Logic for Tally
//!
//! This crate is the **heart** of Tally. It contains the invoice
//! calculation engine and the payment allocation engine as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Tally Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Billing SPA (frontend)                         │   │
//! │  │    Invoice Editor ──► Payment Form ──► Submission               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ REST                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                tally-session (loading boundary)                 │   │
//! │  │    open items, credit balances, payment matches (coalesced)     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌────────────┐  │   │
//! │  │   │   money   │  │   rates   │  │   calc    │  │ allocation │  │   │
//! │  │   │  Currency │  │   Rate    │  │ compute() │  │  waterfall │  │   │
//! │  │   │   Money   │  │ Aggregate │  │  totals   │  │  sessions  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Currency table, minor-unit Money type, rounding rules
//! - [`rates`] - Rate definitions, applied rates, aggregate rollups
//! - [`document`] - Invoice/estimate/credit-note records (raw and computed)
//! - [`calc`] - The invoice calculation engine
//! - [`allocation`] - Payment allocation sessions and serialization
//! - [`validation`] - Boundary input validation
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every calculation is deterministic over a snapshot
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All arithmetic happens in minor units (i64); decimal
//!    display values exist only at the input/output boundary
//! 4. **Explicit Errors**: Malformed input is a typed error; business-rule
//!    violations (over-applied lines, bad amounts) are flags, never errors
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::{Currency, Money};
//!
//! let usd = Currency::from_code("USD").unwrap();
//!
//! // $10.99 normalized to minor units (cents)
//! let minor = usd.normalize(10.99).unwrap();
//! assert_eq!(minor, 1099);
//!
//! // 8.25% applied in integer math, half-up
//! let tax = Money::from_minor(minor).apply_bps(825);
//! assert_eq!(tax.minor(), 91);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod calc;
pub mod document;
pub mod error;
pub mod money;
pub mod rates;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::Money` instead of
// `use tally_core::money::Money`

pub use allocation::{
    AllocationLine, AllocationSession, AppliedEntry, CreditSource, DocumentMatch, LineTarget,
    OpenDocument, SessionState,
};
pub use calc::{compute, CalcOptions};
pub use document::{ComputedDocument, Document, DocumentKind, LineItem};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Currency, Money, NumberFormat};
pub use rates::{AggregateRate, AppliedRate, Rate, RateKind};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum computed amount for a single line item, in minor units
/// (1,000,000,000 cents = $10M for a 2-exponent currency).
///
/// ## Business Reason
/// Interactive editing feeds arbitrary keystrokes through the calculator;
/// a fat-fingered quantity must coerce down instead of overflowing the
/// document total.
pub const MAX_LINE_AMOUNT_MINOR: i64 = 1_000_000_000;

/// Fractional digits carried for line-item quantities.
///
/// Quantities are not monetary: they are parsed into fixed-point micros
/// (2.5 hours → 2_500_000) so that `quantity × unit_cost` stays in
/// integer arithmetic.
pub const QUANTITY_PRECISION: u32 = 6;

/// Basis-point scale used for every percent rate (825 = 8.25%).
pub const BPS_SCALE: i64 = 10_000;
