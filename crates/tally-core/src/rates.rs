//! # Rate Model
//!
//! Reusable pricing rules (discounts, taxes, shipping), their applied
//! instances, and the document-wide aggregate rollup.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Rate Types                                     │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Rate       │   │  AppliedRate    │   │  AggregateRate  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  tenant config, │──►│  one attachment │──►│  document-wide  │       │
//! │  │  never mutated  │   │  to a line or   │   │  rollup per     │       │
//! │  │  by the engine  │   │  the subtotal   │   │  distinct rate  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Discount, tax and shipping rules share one shape; the differences
//! (inclusive flag, expiry) are kind-specific fields on a tagged
//! variant rather than an inheritance tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Rate Kind
// =============================================================================

/// The three families of pricing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    /// Reduces the base it applies to. May carry an expiry.
    Discount,
    /// Adds on top (exclusive) or is carried inside the price (inclusive).
    Tax,
    /// Document-level only, always additive, always applied last.
    Shipping,
}

// =============================================================================
// Rate
// =============================================================================

/// A reusable pricing rule configured by the tenant.
///
/// Referenced, never mutated, by the calculation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate {
    /// Configuration identifier.
    pub id: i64,

    /// Display name ("VAT 19%", "Loyalty discount").
    pub name: String,

    /// Which family this rule belongs to.
    pub kind: RateKind,

    /// Percent rule (value is a percentage) vs flat rule (value is a
    /// decimal display amount in the document currency).
    pub is_percent: bool,

    /// Percentage (5.0 = 5%) or flat decimal amount, depending on
    /// `is_percent`. Decimal here because rates arrive from tenant
    /// configuration at the I/O boundary; the engine converts to basis
    /// points / minor units before any arithmetic.
    pub value: f64,

    /// Tax only: the rate is carried inside the price and back-solved
    /// instead of added on top.
    #[serde(default)]
    pub inclusive: bool,

    /// Discount only: the rule lapses after this instant.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub expires: Option<DateTime<Utc>>,
}

impl Rate {
    /// The percent value as integer basis points (5.0% → 500).
    #[inline]
    pub fn bps(&self) -> i64 {
        (self.value * 100.0).round() as i64
    }

    /// Whether a discount rule has lapsed as of `as_of`.
    ///
    /// Non-discount kinds never expire.
    pub fn is_expired(&self, as_of: DateTime<Utc>) -> bool {
        self.kind == RateKind::Discount && self.expires.is_some_and(|exp| exp < as_of)
    }
}

// =============================================================================
// Applied Rate
// =============================================================================

/// One attachment of a rate (or a one-off custom amount) to a line
/// item or to the document subtotal.
///
/// ## Invariant
/// An applied rate with no `rate` reference carries an explicit custom
/// `amount`. When a rate is referenced the amount is recomputed from
/// the rule on every calculation pass, unless `amount_override` is
/// present - that field preserves a user-typed amount during
/// interactive editing without reformatting mid-keystroke.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedRate {
    /// The configured rule, if any.
    pub rate: Option<Rate>,

    /// Custom one-off decimal amount (required when `rate` is None).
    #[serde(default)]
    pub amount: Option<f64>,

    /// User-typed decimal amount that wins over the rule while editing.
    #[serde(default, rename = "_amount")]
    pub amount_override: Option<f64>,
}

impl AppliedRate {
    /// Wraps a bare rate reference, as the prepare step does when the
    /// caller supplies unexpanded rules.
    pub fn from_rate(rate: Rate) -> Self {
        AppliedRate {
            rate: Some(rate),
            amount: None,
            amount_override: None,
        }
    }

    /// A one-off amount with no backing rule.
    pub fn custom(amount: f64) -> Self {
        AppliedRate {
            rate: None,
            amount: Some(amount),
            amount_override: None,
        }
    }

    /// Whether the tax rule behind this application is inclusive.
    /// Custom amounts are always exclusive.
    #[inline]
    pub fn is_inclusive(&self) -> bool {
        self.rate.as_ref().is_some_and(|r| r.inclusive)
    }
}

// =============================================================================
// Computed Rate
// =============================================================================

/// The computed outcome of one applied rate, in decimal display units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ComputedRate {
    /// Backing rule id, if any.
    pub rate_id: Option<i64>,
    /// Display name (rule name, or empty for custom amounts).
    pub name: String,
    /// Computed amount for this application.
    pub amount: f64,
    /// Tax only: carried inside the price rather than added on top.
    pub inclusive: bool,
}

// =============================================================================
// Aggregate Rate
// =============================================================================

/// Document-wide rollup of every applied rate referencing the same
/// rule (or the synthetic "no rule" bucket per kind).
///
/// Rebuilt from scratch on every calculation pass; ephemeral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AggregateRate {
    /// Backing rule id; None for the custom bucket.
    pub rate_id: Option<i64>,
    /// Display name of the rule (empty for the custom bucket).
    pub name: String,
    /// Which family the bucket belongs to.
    pub kind: RateKind,
    /// Accumulated decimal total across all applications.
    pub total: f64,
    /// Seen at line-item scope.
    pub in_items: bool,
    /// Seen at subtotal scope.
    pub in_subtotal: bool,
}

impl AggregateRate {
    /// Scope priority for display ordering: item-only entries sort
    /// before subtotal-or-mixed entries.
    #[inline]
    pub fn scope_priority(&self) -> i8 {
        self.in_subtotal as i8 - self.in_items as i8
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
