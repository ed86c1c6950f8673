//! Session driver: takes an allocation session from Idle to Ready.
//!
//! ```text
//! Idle ──► begin() ──► Loading (3 coalesced fetches, concurrent)
//!                          │
//!                 any Err  │  all Ok
//!            ┌─────────────┴─────────────┐
//!            ▼                           ▼
//!   SessionError::LoadFailed     AllocationSession (Ready)
//!   (never reaches Ready)        match-apply if the matcher
//!                                suggested documents for this
//!                                customer, else auto-apply
//! ```
//!
//! `Idle` and `Loading` are phases of this driver; the pure session
//! object only exists from `Ready` onward.

use tally_core::{
    AllocationSession, Currency, DocumentMatch, Money, OpenDocument, SessionState,
};
use tracing::{debug, info, warn};

use crate::coalesce::Coalescer;
use crate::error::SessionResult;
use crate::source::{CreditBalance, OpenItem, OpenItemsSource, SuggestedMatch};

// =============================================================================
// Session Driver
// =============================================================================

/// Loads allocation inputs for a customer and builds a `Ready`
/// session. One in-flight registry per fetch kind, keyed by customer
/// id, so duplicate loads (double-clicks, re-renders) share a fetch.
pub struct SessionDriver<S> {
    source: S,
    items: Coalescer<i64, Vec<OpenItem>>,
    balances: Coalescer<i64, Vec<CreditBalance>>,
    matches: Coalescer<i64, Vec<SuggestedMatch>>,
}

impl<S: OpenItemsSource> SessionDriver<S> {
    pub fn new(source: S) -> Self {
        SessionDriver {
            source,
            items: Coalescer::new(),
            balances: Coalescer::new(),
            matches: Coalescer::new(),
        }
    }

    /// Loads everything for `customer_id`, filters to the session
    /// currency, and returns a `Ready` session with the payment
    /// applied.
    ///
    /// `payment` is in decimal display units; it is normalized to
    /// minor units here, at the boundary.
    pub async fn begin(
        &self,
        customer_id: i64,
        currency_code: &str,
        payment: f64,
    ) -> SessionResult<AllocationSession> {
        let currency = Currency::from_code(currency_code)?;
        let payment = Money::from_minor(currency.normalize(payment)?);

        info!(
            customer_id,
            currency = currency.code(),
            phase = ?SessionState::Loading,
            "loading allocation session"
        );

        let (items, balances, matches) = tokio::try_join!(
            self.items
                .run(customer_id, || self.source.open_items(customer_id)),
            self.balances
                .run(customer_id, || self.source.credit_balances(customer_id)),
            self.matches
                .run(customer_id, || self.source.payment_matches(customer_id)),
        )?;

        let skipped = items.iter().filter(|i| i.currency != currency.code()).count();
        if skipped > 0 {
            debug!(customer_id, skipped, "dropped open items in other currencies");
        }
        let open: Vec<OpenDocument> = items
            .into_iter()
            .filter(|item| item.currency == currency.code())
            .map(|item| item.document)
            .collect();

        let (standing_credit, credit_notes) = balances
            .into_iter()
            .find(|balance| balance.currency == currency.code())
            .map(|balance| (balance.standing_credit, balance.credit_notes))
            .unwrap_or((Money::zero(), Vec::new()));

        let mut session =
            AllocationSession::new(currency, payment, open, standing_credit, credit_notes);

        // The matcher's suggestion wins only when its first candidate
        // is actually for this customer; stale suggestions fall back
        // to the plain waterfall.
        let use_matches = matches
            .first()
            .is_some_and(|m| m.customer_id == customer_id);
        if use_matches {
            let own: Vec<DocumentMatch> = matches
                .into_iter()
                .filter(|m| m.customer_id == customer_id)
                .map(|m| m.matched)
                .collect();
            debug!(session_id = %session.id, candidates = own.len(), "applying payment matches");
            session.apply_matches(&own)?;
        } else {
            session.auto_apply()?;
        }

        if !session.is_valid() {
            warn!(session_id = %session.id, "session loaded in an invalid state");
        }
        info!(
            session_id = %session.id,
            state = ?session.state(),
            lines = session.lines().len(),
            "allocation session ready"
        );
        debug_assert_eq!(session.state(), SessionState::Ready);

        Ok(session)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
