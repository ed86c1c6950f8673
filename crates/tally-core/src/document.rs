//! # Document Model
//!
//! Raw (caller-supplied) and computed (engine-produced) shapes for
//! invoices, estimates and credit notes.
//!
//! The raw shapes mirror what the billing UI holds while the user
//! types: quantities and unit costs are locale-formatted strings,
//! rate lists may contain bare rule references. The computed shapes
//! are what the calculator emits: every amount resolved, denormalized
//! to decimal display units, with the aggregate-rate breakdown
//! attached. The engine never mutates a raw document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::rates::{AggregateRate, AppliedRate, ComputedRate};

// =============================================================================
// Document Kind
// =============================================================================

/// The polymorphic document family sharing the capability set
/// {subtotal, discounts, taxes, shipping, total, balance}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    Estimate,
    CreditNote,
}

impl DocumentKind {
    /// The snake_case wire name, used as the dynamic key in serialized
    /// apply instructions (`{"invoice": 1}`).
    pub const fn wire_name(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::Estimate => "estimate",
            DocumentKind::CreditNote => "credit_note",
        }
    }
}

// =============================================================================
// Line Item (raw)
// =============================================================================

/// A raw line item as held by the editor.
///
/// A fully blank line (the trailing placeholder row the UI keeps for
/// user entry) naturally computes to a zero-amount line; the engine
/// does not special-case it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    /// Display name shown on the document.
    #[serde(default)]
    pub name: String,

    /// Optional free-text description.
    #[serde(default)]
    pub description: String,

    /// Quantity as a locale-formatted decimal string ("2,5").
    #[serde(default)]
    pub quantity: String,

    /// Unit cost as a locale-formatted decimal string ("1.234,56").
    #[serde(default)]
    pub unit_cost: String,

    /// Participates in the document-level discount base.
    #[serde(default = "default_true")]
    pub discountable: bool,

    /// Participates in the document-level tax base.
    #[serde(default = "default_true")]
    pub taxable: bool,

    /// Item-scope discounts, in application order.
    #[serde(default)]
    pub discounts: Vec<AppliedRate>,

    /// Item-scope taxes, in application order.
    #[serde(default)]
    pub taxes: Vec<AppliedRate>,
}

fn default_true() -> bool {
    true
}

impl Default for LineItem {
    /// A blank placeholder row: both participation flags on, matching
    /// the serde defaults.
    fn default() -> Self {
        LineItem {
            name: String::new(),
            description: String::new(),
            quantity: String::new(),
            unit_cost: String::new(),
            discountable: true,
            taxable: true,
            discounts: Vec::new(),
            taxes: Vec::new(),
        }
    }
}

// =============================================================================
// Document (raw)
// =============================================================================

/// A raw document handed to the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Document {
    /// Invoice, estimate or credit note.
    pub kind: DocumentKind,

    /// ISO currency code; must resolve against the currency table.
    pub currency: String,

    /// Document date (drives oldest-first allocation ordering).
    #[ts(as = "String")]
    pub date: DateTime<Utc>,

    /// Ordered line items.
    #[serde(default)]
    pub items: Vec<LineItem>,

    /// Subtotal-scope discounts, in application order.
    #[serde(default)]
    pub discounts: Vec<AppliedRate>,

    /// Subtotal-scope taxes, in application order.
    #[serde(default)]
    pub taxes: Vec<AppliedRate>,

    /// Subtotal-scope shipping charges, in application order.
    #[serde(default)]
    pub shipping: Vec<AppliedRate>,

    /// Decimal amount already paid, if any.
    #[serde(default)]
    pub amount_paid: Option<f64>,
}

impl Document {
    /// An empty document in the given currency; useful as an editor
    /// starting point and in tests.
    pub fn empty(kind: DocumentKind, currency: &str, date: DateTime<Utc>) -> Self {
        Document {
            kind,
            currency: currency.to_string(),
            date,
            items: Vec::new(),
            discounts: Vec::new(),
            taxes: Vec::new(),
            shipping: Vec::new(),
            amount_paid: None,
        }
    }
}

// =============================================================================
// Computed shapes
// =============================================================================

/// A fully computed line item, decimal display units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ComputedLineItem {
    pub name: String,

    /// `round(quantity × unit_cost)` less any inclusive tax carried
    /// inside the price, capped at the per-line maximum.
    pub amount: f64,

    /// Sum of item-scope discount amounts.
    pub discount_total: f64,

    /// Sum of item-scope tax amounts (inclusive and exclusive).
    pub tax_total: f64,

    /// Per-application discount breakdown.
    pub discounts: Vec<ComputedRate>,

    /// Per-application tax breakdown.
    pub taxes: Vec<ComputedRate>,
}

/// A fully computed document, decimal display units throughout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ComputedDocument {
    pub kind: DocumentKind,
    pub currency: String,

    /// Sum of raw line amounts, less inclusive taxes.
    pub subtotal: f64,

    /// `subtotal − discounts + taxes + shipping` per the calculation
    /// waterfall.
    pub total: f64,

    /// Normalized amount paid (None when the caller supplied none).
    pub amount_paid: Option<f64>,

    /// `total − amount_paid` (None when the caller supplied none).
    pub balance: Option<f64>,

    /// Per-line breakdown, in input order.
    pub items: Vec<ComputedLineItem>,

    /// Subtotal-scope discount applications.
    pub discounts: Vec<ComputedRate>,

    /// Subtotal-scope tax applications.
    pub taxes: Vec<ComputedRate>,

    /// Subtotal-scope shipping applications.
    pub shipping: Vec<ComputedRate>,

    /// Document-wide rollup per distinct discount rule, display order.
    pub aggregate_discounts: Vec<AggregateRate>,

    /// Document-wide rollup per distinct tax rule, display order.
    pub aggregate_taxes: Vec<AggregateRate>,

    /// Document-wide rollup per distinct shipping rule, display order.
    pub aggregate_shipping: Vec<AggregateRate>,
}

// =============================================================================
// Unit Tests
// =============================================================================
