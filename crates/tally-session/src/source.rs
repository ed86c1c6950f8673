//! Collaborator contract for allocation session data.
//!
//! The driver never talks to a backend directly; it goes through
//! [`OpenItemsSource`], an async trait the hosting application
//! implements on top of whatever transport it has (REST client, DB
//! pool, test fixture). Everything the allocation engine needs for one
//! customer comes through these three fetches.

use async_trait::async_trait;

use tally_core::{DocumentMatch, Money, OpenDocument};

use crate::error::LoadError;

// =============================================================================
// Fetched Records
// =============================================================================

/// One open item, tagged with its currency code. The driver filters
/// to the session currency; sources return everything they have.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenItem {
    pub currency: String,
    pub document: OpenDocument,
}

/// A customer's credit position in one currency.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditBalance {
    pub currency: String,
    /// Standing (unattached) credit balance.
    pub standing_credit: Money,
    /// Open credit notes as `(note id, remaining balance)`, in the
    /// order the source returns them.
    pub credit_notes: Vec<(i64, Money)>,
}

/// A candidate document suggested by the payment-matching subsystem,
/// tagged with the customer it belongs to. Matches for a different
/// customer than the session's are ignored by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestedMatch {
    pub customer_id: i64,
    pub matched: DocumentMatch,
}

// =============================================================================
// Source Trait
// =============================================================================

/// Async collaborator that loads allocation inputs for a customer.
///
/// Implementations must be cheap to call concurrently; the driver
/// coalesces duplicate in-flight fetches per customer, but distinct
/// customers load in parallel.
#[async_trait]
pub trait OpenItemsSource: Send + Sync {
    /// Open invoices, estimates with unpaid deposits, and open credit
    /// notes for the customer, oldest first.
    async fn open_items(&self, customer_id: i64) -> Result<Vec<OpenItem>, LoadError>;

    /// The customer's credit balances, one entry per currency.
    async fn credit_balances(&self, customer_id: i64) -> Result<Vec<CreditBalance>, LoadError>;

    /// Suggested payment matches, in match order. An empty list means
    /// the matching subsystem had nothing for this customer.
    async fn payment_matches(&self, customer_id: i64) -> Result<Vec<SuggestedMatch>, LoadError>;
}
