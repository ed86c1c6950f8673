//! # Payment Allocation Engine
//!
//! Distributes a payment amount (plus optional credit sources) across
//! a set of open documents, validates the result, and serializes
//! apply-instructions for the submission layer.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Allocation Session State Machine                           │
//! │                                                                         │
//! │   Idle ──► Loading ──► Ready ──► Editing ──► Serialized (terminal)     │
//! │              │           ▲          │  ▲                                │
//! │   (boundary  │           │          └──┘ re-validate on every change    │
//! │    crate)    └── load    └── auto-apply or match-apply executed         │
//! │        failure halts                                                    │
//! │                                                                         │
//! │  Idle/Loading live in the loading boundary (tally-session); this       │
//! │  object is constructed once the data is in hand and starts Ready.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Semantics
//! Validation never returns `Err`: bad amounts, over-applied lines and
//! over-ceiling credits become per-line flags plus an overall validity
//! boolean the caller must check before allowing submission. Only
//! session misuse (mutating a serialized session, bad index) raises.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::document::DocumentKind;
use crate::error::{CoreError, CoreResult};
use crate::money::{Currency, Money};

// =============================================================================
// Session State
// =============================================================================

/// Allocation session lifecycle states.
///
/// `Idle` and `Loading` are never held by this object: the loading
/// boundary constructs sessions directly in `Ready` and reports its
/// own phase to the frontend using these variants, so the full state
/// set stays in one exported type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No load requested yet (boundary-crate state).
    Idle,
    /// Open items / balances are being fetched (boundary-crate state).
    Loading,
    /// Items loaded, auto-apply or match-apply executed.
    Ready,
    /// Manual edits in progress; cycles until serialization.
    Editing,
    /// Apply-instructions produced. Terminal.
    Serialized,
}

// =============================================================================
// Session inputs
// =============================================================================

/// An open document eligible for allocation, balances in minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OpenDocument {
    pub kind: DocumentKind,
    pub id: i64,
    /// Drives the oldest-first waterfall order.
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    /// Outstanding balance.
    pub balance: Money,
}

/// A source of credit: the customer's standing balance or an open
/// credit note. `amount` is the user-selected portion to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreditSource {
    /// Credit note id; None for the standing credit balance.
    pub note_id: Option<i64>,
    /// Ceiling: the credit actually available.
    pub balance: Money,
    /// User-selected amount to apply (≤ balance).
    pub amount: Money,
    /// Set by validation when the selection breaks the ceiling.
    pub invalid: bool,
}

/// A candidate document suggested by the payment-matching subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DocumentMatch {
    pub kind: DocumentKind,
    pub document_id: i64,
    /// The match indicates an intentional short payment.
    pub short_pay: bool,
}

// =============================================================================
// Allocation lines
// =============================================================================

/// What an allocation line points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LineTarget {
    /// A specific open document.
    Document { kind: DocumentKind, id: i64 },
    /// Unapplied overpayment kept as customer credit.
    Credit,
}

/// One row of the allocation being edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AllocationLine {
    pub target: LineTarget,
    /// None/zero = not yet entered (valid but incomplete).
    pub amount: Option<Money>,
    /// When editing an existing payment: the amount this line already
    /// had applied, which extends the over-application ceiling.
    pub previously_applied: Money,
    /// Intentional short payment (propagated to the wire shape).
    pub short_pay: bool,
    /// Set by validation: negative or otherwise unusable amount.
    pub invalid: bool,
    /// Set by validation: amount exceeds the document's balance plus
    /// the previously-applied slack.
    pub over: bool,
}

// =============================================================================
// Serialized apply-instructions
// =============================================================================

/// Wire entry type for one apply-instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Invoice,
    Estimate,
    CreditNote,
    AppliedCredit,
    Credit,
}

impl EntryType {
    const fn wire_name(&self) -> &'static str {
        match self {
            EntryType::Invoice => "invoice",
            EntryType::Estimate => "estimate",
            EntryType::CreditNote => "credit_note",
            EntryType::AppliedCredit => "applied_credit",
            EntryType::Credit => "credit",
        }
    }

    const fn from_document(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Invoice => EntryType::Invoice,
            DocumentKind::Estimate => EntryType::Estimate,
            DocumentKind::CreditNote => EntryType::CreditNote,
        }
    }
}

/// One serialized apply-instruction.
///
/// The wire shape is the contract with the submission layer:
/// `{type, amount, <document_kind>: id, document_type?, short_pay?}`.
/// The funded document's id is keyed by its kind name, so this type
/// carries a hand-written `Serialize` impl instead of a derive.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedEntry {
    pub entry_type: EntryType,
    /// Decimal display units - this is the I/O boundary.
    pub amount: f64,
    /// The funded document (None for raw credit entries).
    pub target: Option<(DocumentKind, i64)>,
    /// The funding credit note, for `credit_note` entries.
    pub credit_note_id: Option<i64>,
    pub short_pay: bool,
}

impl Serialize for AppliedEntry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.entry_type.wire_name())?;
        map.serialize_entry("amount", &self.amount)?;
        if let Some((kind, id)) = self.target {
            map.serialize_entry(kind.wire_name(), &id)?;
            if self.entry_type == EntryType::CreditNote {
                if let Some(note_id) = self.credit_note_id {
                    map.serialize_entry("credit_note", &note_id)?;
                }
                if kind != DocumentKind::Invoice {
                    map.serialize_entry("document_type", kind.wire_name())?;
                }
            }
        }
        if self.short_pay {
            map.serialize_entry("short_pay", &true)?;
        }
        map.end()
    }
}

// =============================================================================
// Allocation Session
// =============================================================================

/// One payment allocation in progress.
///
/// Synchronous, single-threaded, in-memory: all data is loaded by the
/// caller before construction, and every mutation re-validates.
#[derive(Debug, Clone)]
pub struct AllocationSession {
    pub id: Uuid,
    currency: Currency,
    payment: Money,
    open: Vec<OpenDocument>,
    lines: Vec<AllocationLine>,
    credits: Vec<CreditSource>,
    state: SessionState,
    valid: bool,
    payment_invalid: bool,
    remaining: Money,
    overpaid: bool,
    over_applied: bool,
}

impl AllocationSession {
    /// Builds a session from fully loaded data. Open documents are
    /// ordered oldest-first; credit sources are the standing balance
    /// first, then credit notes in list order.
    ///
    /// The caller (the loading boundary) has already filtered open
    /// documents and credit notes to the session currency.
    pub fn new(
        currency: Currency,
        payment: Money,
        mut open: Vec<OpenDocument>,
        standing_credit: Money,
        credit_notes: Vec<(i64, Money)>,
    ) -> Self {
        open.sort_by_key(|d| d.date);

        let mut credits = Vec::with_capacity(credit_notes.len() + 1);
        if standing_credit.is_positive() {
            credits.push(CreditSource {
                note_id: None,
                balance: standing_credit,
                amount: Money::zero(),
                invalid: false,
            });
        }
        for (note_id, balance) in credit_notes {
            credits.push(CreditSource {
                note_id: Some(note_id),
                balance,
                amount: Money::zero(),
                invalid: false,
            });
        }

        let mut session = AllocationSession {
            id: Uuid::new_v4(),
            currency,
            payment,
            open,
            lines: Vec::new(),
            credits,
            state: SessionState::Ready,
            valid: false,
            payment_invalid: false,
            remaining: Money::zero(),
            overpaid: false,
            over_applied: false,
        };
        session.validate();
        session
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn currency(&self) -> Currency {
        self.currency
    }

    #[inline]
    pub fn payment(&self) -> Money {
        self.payment
    }

    #[inline]
    pub fn lines(&self) -> &[AllocationLine] {
        &self.lines
    }

    #[inline]
    pub fn credits(&self) -> &[CreditSource] {
        &self.credits
    }

    #[inline]
    pub fn open_documents(&self) -> &[OpenDocument] {
        &self.open
    }

    /// Overall validity after the last mutation; the caller must block
    /// submission while this is false.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// `payment − total_applied + total_credits_selected`.
    #[inline]
    pub fn remaining(&self) -> Money {
        self.remaining
    }

    /// Alert: part of the payment is not yet applied anywhere.
    #[inline]
    pub fn overpaid(&self) -> bool {
        self.overpaid
    }

    /// Alert: more is applied than payment plus credits cover.
    #[inline]
    pub fn over_applied(&self) -> bool {
        self.over_applied
    }

    /// Sum of user-selected credit amounts.
    pub fn total_credits_selected(&self) -> Money {
        self.credits
            .iter()
            .fold(Money::zero(), |acc, c| acc + c.amount)
    }

    /// Sum of entered line amounts, excluding lines that pay off a
    /// credit note (those don't consume the payment).
    pub fn total_applied(&self) -> Money {
        self.lines
            .iter()
            .filter(|line| {
                !matches!(
                    line.target,
                    LineTarget::Document {
                        kind: DocumentKind::CreditNote,
                        ..
                    }
                )
            })
            .fold(Money::zero(), |acc, line| {
                acc + line.amount.unwrap_or(Money::zero())
            })
    }

    // -------------------------------------------------------------------------
    // Waterfall application
    // -------------------------------------------------------------------------

    /// Greedy oldest-first waterfall: for each open document, apply
    /// `min(remaining, balance)` until the amount (payment + selected
    /// credits) is exhausted. Replaces any existing lines.
    ///
    /// Deterministic by construction - no reordering by amount, no
    /// heuristic matching.
    pub fn auto_apply(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        self.lines.clear();
        let mut remaining = self.payment + self.total_credits_selected();
        for doc in &self.open {
            if !remaining.is_positive() {
                break;
            }
            let take = remaining.min(doc.balance);
            if take.is_positive() {
                self.lines.push(AllocationLine {
                    target: LineTarget::Document {
                        kind: doc.kind,
                        id: doc.id,
                    },
                    amount: Some(take),
                    previously_applied: Money::zero(),
                    short_pay: false,
                    invalid: false,
                    over: false,
                });
                remaining -= take;
            }
        }
        self.state = SessionState::Ready;
        self.validate();
        Ok(())
    }

    /// Waterfall constrained to matched documents, used when the
    /// payment-matching subsystem suggested candidates for the
    /// selected customer. Lines are marked `short_pay` when the match
    /// indicates a short payment and the applied amount is less than
    /// the document's balance.
    pub fn apply_matches(&mut self, matches: &[DocumentMatch]) -> CoreResult<()> {
        self.ensure_open()?;
        self.lines.clear();
        let mut remaining = self.payment + self.total_credits_selected();
        for doc in &self.open {
            if !remaining.is_positive() {
                break;
            }
            let Some(matched) = matches
                .iter()
                .find(|m| m.kind == doc.kind && m.document_id == doc.id)
            else {
                continue;
            };
            let take = remaining.min(doc.balance);
            if take.is_positive() {
                self.lines.push(AllocationLine {
                    target: LineTarget::Document {
                        kind: doc.kind,
                        id: doc.id,
                    },
                    amount: Some(take),
                    previously_applied: Money::zero(),
                    short_pay: matched.short_pay && take < doc.balance,
                    invalid: false,
                    over: false,
                });
                remaining -= take;
            }
        }
        self.state = SessionState::Ready;
        self.validate();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Manual line management
    // -------------------------------------------------------------------------

    /// Adds a document line. With `amount: None` the default is
    /// auto-computed as `min(remaining, balance)`. Never reorders
    /// other lines.
    pub fn add_line(
        &mut self,
        kind: DocumentKind,
        id: i64,
        amount: Option<Money>,
        previously_applied: Money,
    ) -> CoreResult<()> {
        self.ensure_open()?;
        let amount = amount.or_else(|| {
            let balance = self.document_balance(kind, id);
            let headroom = self.remaining.max(Money::zero());
            Some(headroom.min(balance))
        });
        self.lines.push(AllocationLine {
            target: LineTarget::Document { kind, id },
            amount,
            previously_applied,
            short_pay: false,
            invalid: false,
            over: false,
        });
        self.state = SessionState::Editing;
        self.validate();
        Ok(())
    }

    /// Adds a raw credit line holding the current remaining amount as
    /// unapplied overpayment.
    pub fn add_credit_line(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        let amount = self.remaining.max(Money::zero());
        self.lines.push(AllocationLine {
            target: LineTarget::Credit,
            amount: Some(amount),
            previously_applied: Money::zero(),
            short_pay: false,
            invalid: false,
            over: false,
        });
        self.state = SessionState::Editing;
        self.validate();
        Ok(())
    }

    /// Deletes a line by index; other lines keep their order.
    pub fn remove_line(&mut self, index: usize) -> CoreResult<()> {
        self.ensure_open()?;
        if index >= self.lines.len() {
            return Err(CoreError::LineOutOfBounds {
                index,
                len: self.lines.len(),
            });
        }
        self.lines.remove(index);
        self.state = SessionState::Editing;
        self.validate();
        Ok(())
    }

    /// Updates a line's amount (`None` = cleared, not yet entered).
    pub fn set_line_amount(&mut self, index: usize, amount: Option<Money>) -> CoreResult<()> {
        self.ensure_open()?;
        let len = self.lines.len();
        let line = self
            .lines
            .get_mut(index)
            .ok_or(CoreError::LineOutOfBounds { index, len })?;
        line.amount = amount;
        self.state = SessionState::Editing;
        self.validate();
        Ok(())
    }

    /// Updates how much of a credit source is selected for application.
    pub fn set_credit_amount(&mut self, index: usize, amount: Money) -> CoreResult<()> {
        self.ensure_open()?;
        let len = self.credits.len();
        let credit = self
            .credits
            .get_mut(index)
            .ok_or(CoreError::CreditOutOfBounds { index, len })?;
        credit.amount = amount;
        self.state = SessionState::Editing;
        self.validate();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Validation (flags, never errors)
    // -------------------------------------------------------------------------

    /// Re-derives every validity flag and the remaining/alert totals.
    /// Runs after every mutation; returns overall validity.
    pub fn validate(&mut self) -> bool {
        let credits_total = self.total_credits_selected();

        for credit in &mut self.credits {
            credit.invalid = credit.amount.is_negative() || credit.amount > credit.balance;
        }

        // A payment must be positive, or exactly zero with credits
        // selected; negative is always invalid.
        self.payment_invalid = !(self.payment.is_positive()
            || (self.payment.is_zero() && credits_total.is_positive()));

        let mut any_line_invalid = false;
        let open = &self.open;
        for line in &mut self.lines {
            line.invalid = false;
            line.over = false;
            let Some(amount) = line.amount else {
                continue; // not yet entered
            };
            if amount.is_negative() {
                line.invalid = true;
                any_line_invalid = true;
                continue;
            }
            if amount.is_zero() {
                continue; // valid but incomplete
            }
            if let LineTarget::Document { kind, id } = line.target {
                let balance = open
                    .iter()
                    .find(|d| d.kind == kind && d.id == id)
                    .map(|d| d.balance)
                    .unwrap_or(Money::zero());
                let ceiling = balance + line.previously_applied;
                if amount > ceiling {
                    line.over = true;
                    any_line_invalid = true;
                }
            }
        }

        self.remaining = self.payment - self.total_applied() + credits_total;
        self.overpaid = self.remaining.is_positive();
        self.over_applied = self.remaining.is_negative();

        let any_credit_invalid = self.credits.iter().any(|c| c.invalid);
        self.valid = !self.payment_invalid && !any_line_invalid && !any_credit_invalid;
        self.valid
    }

    // -------------------------------------------------------------------------
    // Serialization (terminal)
    // -------------------------------------------------------------------------

    /// Produces the apply-instruction list and closes the session.
    ///
    /// Credits are consumed against document lines in the order the
    /// lines currently appear: the standing balance first, then each
    /// credit note in list order, each consuming
    /// `min(credit_remaining, line_remaining)`. Whatever a line has
    /// left after credits is billed as a plain payment entry.
    pub fn serialize_applied_to(&mut self) -> CoreResult<Vec<AppliedEntry>> {
        self.ensure_open()?;

        let mut credit_pool: Vec<(Option<i64>, Money)> = self
            .credits
            .iter()
            .filter(|c| c.amount.is_positive())
            .map(|c| (c.note_id, c.amount))
            .collect();

        let mut entries = Vec::new();
        for line in &self.lines {
            match line.target {
                LineTarget::Credit => {
                    let amount = line.amount.unwrap_or(Money::zero());
                    if amount.is_positive() {
                        entries.push(AppliedEntry {
                            entry_type: EntryType::Credit,
                            amount: self.currency.denormalize(amount.minor()),
                            target: None,
                            credit_note_id: None,
                            short_pay: false,
                        });
                    }
                }
                LineTarget::Document { kind, id } => {
                    let mut line_remaining = line.amount.unwrap_or(Money::zero());
                    if !line_remaining.is_positive() {
                        continue;
                    }
                    for (note_id, credit_remaining) in credit_pool.iter_mut() {
                        if !line_remaining.is_positive() {
                            break;
                        }
                        if !credit_remaining.is_positive() {
                            continue;
                        }
                        let take = (*credit_remaining).min(line_remaining);
                        entries.push(AppliedEntry {
                            entry_type: match note_id {
                                Some(_) => EntryType::CreditNote,
                                None => EntryType::AppliedCredit,
                            },
                            amount: self.currency.denormalize(take.minor()),
                            target: Some((kind, id)),
                            credit_note_id: *note_id,
                            short_pay: false,
                        });
                        *credit_remaining -= take;
                        line_remaining -= take;
                    }
                    if line_remaining.is_positive() {
                        entries.push(AppliedEntry {
                            entry_type: EntryType::from_document(kind),
                            amount: self.currency.denormalize(line_remaining.minor()),
                            target: Some((kind, id)),
                            credit_note_id: None,
                            short_pay: line.short_pay,
                        });
                    }
                }
            }
        }

        self.state = SessionState::Serialized;
        Ok(entries)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn ensure_open(&self) -> CoreResult<()> {
        if self.state == SessionState::Serialized {
            return Err(CoreError::SessionClosed {
                session_id: self.id.to_string(),
            });
        }
        Ok(())
    }

    fn document_balance(&self, kind: DocumentKind, id: i64) -> Money {
        self.open
            .iter()
            .find(|d| d.kind == kind && d.id == id)
            .map(|d| d.balance)
            .unwrap_or(Money::zero())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn usd() -> Currency {
        Currency::from_code("USD").unwrap()
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn invoice(id: i64, d: u32, balance_minor: i64) -> OpenDocument {
        OpenDocument {
            kind: DocumentKind::Invoice,
            id,
            date: day(d),
            balance: Money::from_minor(balance_minor),
        }
    }

    fn session(payment_minor: i64, open: Vec<OpenDocument>) -> AllocationSession {
        AllocationSession::new(
            usd(),
            Money::from_minor(payment_minor),
            open,
            Money::zero(),
            Vec::new(),
        )
    }

    #[test]
    fn test_waterfall_oldest_first() {
        // Inserted out of order; the session sorts by date
        let mut s = session(15_000, vec![invoice(2, 20, 5_000), invoice(1, 10, 10_000)]);
        s.auto_apply().unwrap();

        assert_eq!(s.lines().len(), 2);
        assert_eq!(
            s.lines()[0].target,
            LineTarget::Document {
                kind: DocumentKind::Invoice,
                id: 1
            }
        );
        assert_eq!(s.lines()[0].amount, Some(Money::from_minor(10_000)));
        assert_eq!(s.lines()[1].amount, Some(Money::from_minor(5_000)));
        assert_eq!(s.remaining(), Money::zero());
        assert!(s.is_valid());
        assert!(!s.overpaid() && !s.over_applied());
    }

    #[test]
    fn test_waterfall_partial_and_exhaustion() {
        let mut s = session(12_000, vec![invoice(1, 10, 10_000), invoice(2, 20, 5_000)]);
        s.auto_apply().unwrap();

        assert_eq!(s.lines()[0].amount, Some(Money::from_minor(10_000)));
        assert_eq!(s.lines()[1].amount, Some(Money::from_minor(2_000)));

        // Sum of assigned amounts never exceeds the payment
        let assigned: i64 = s
            .lines()
            .iter()
            .map(|l| l.amount.unwrap_or(Money::zero()).minor())
            .sum();
        assert_eq!(assigned, 12_000);
    }

    #[test]
    fn test_waterfall_overpayment_leaves_remaining() {
        let mut s = session(20_000, vec![invoice(1, 10, 10_000)]);
        s.auto_apply().unwrap();
        assert_eq!(s.remaining(), Money::from_minor(10_000));
        assert!(s.overpaid());

        // A raw credit line absorbs the remainder
        s.add_credit_line().unwrap();
        assert_eq!(s.remaining(), Money::zero());
        assert!(!s.overpaid());
        assert_eq!(s.lines()[1].target, LineTarget::Credit);
    }

    #[test]
    fn test_serialize_plain_invoices() {
        let mut s = session(15_000, vec![invoice(1, 10, 10_000), invoice(2, 20, 5_000)]);
        s.auto_apply().unwrap();
        let entries = s.serialize_applied_to().unwrap();

        assert_eq!(
            serde_json::to_value(&entries).unwrap(),
            json!([
                {"type": "invoice", "amount": 100.0, "invoice": 1},
                {"type": "invoice", "amount": 50.0, "invoice": 2},
            ])
        );
        assert_eq!(s.state(), SessionState::Serialized);
    }

    #[test]
    fn test_zero_payment_with_credits_consumes_standing_credit_first() {
        // $0 payment, $125 standing credit and a $60 credit note
        // against invoices of $100 and $50
        let mut s = AllocationSession::new(
            usd(),
            Money::zero(),
            vec![invoice(1, 10, 10_000), invoice(2, 20, 5_000)],
            Money::from_minor(12_500),
            vec![(7, Money::from_minor(6_000))],
        );
        s.set_credit_amount(0, Money::from_minor(12_500)).unwrap();
        s.set_credit_amount(1, Money::from_minor(6_000)).unwrap();
        s.auto_apply().unwrap();
        assert!(s.is_valid());

        let entries = s.serialize_applied_to().unwrap();
        assert_eq!(
            serde_json::to_value(&entries).unwrap(),
            json!([
                // First invoice fully covered by standing credit: no
                // leftover plain-invoice entry
                {"type": "applied_credit", "amount": 100.0, "invoice": 1},
                // Second invoice split: standing credit remainder,
                // then the credit note
                {"type": "applied_credit", "amount": 25.0, "invoice": 2},
                {"type": "credit_note", "amount": 25.0, "invoice": 2, "credit_note": 7},
            ])
        );
    }

    #[test]
    fn test_credit_then_residual_payment_entry() {
        // $40 payment plus a $30 credit note against one $70 invoice
        let mut s = AllocationSession::new(
            usd(),
            Money::from_minor(4_000),
            vec![invoice(1, 10, 7_000)],
            Money::zero(),
            vec![(9, Money::from_minor(3_000))],
        );
        s.set_credit_amount(0, Money::from_minor(3_000)).unwrap();
        s.auto_apply().unwrap();
        let entries = s.serialize_applied_to().unwrap();

        assert_eq!(
            serde_json::to_value(&entries).unwrap(),
            json!([
                {"type": "credit_note", "amount": 30.0, "invoice": 1, "credit_note": 9},
                {"type": "invoice", "amount": 40.0, "invoice": 1},
            ])
        );
    }

    #[test]
    fn test_estimate_entry_carries_document_type_for_credit_note() {
        let open = vec![OpenDocument {
            kind: DocumentKind::Estimate,
            id: 3,
            date: day(5),
            balance: Money::from_minor(2_000),
        }];
        let mut s = AllocationSession::new(
            usd(),
            Money::zero(),
            open,
            Money::zero(),
            vec![(4, Money::from_minor(2_000))],
        );
        s.set_credit_amount(0, Money::from_minor(2_000)).unwrap();
        s.auto_apply().unwrap();
        let entries = s.serialize_applied_to().unwrap();

        assert_eq!(
            serde_json::to_value(&entries).unwrap(),
            json!([
                {"type": "credit_note", "amount": 20.0, "estimate": 3,
                 "credit_note": 4, "document_type": "estimate"},
            ])
        );
    }

    #[test]
    fn test_match_apply_constrains_and_marks_short_pay() {
        let open = vec![
            invoice(1, 10, 10_000),
            invoice(2, 20, 5_000),
            invoice(3, 30, 8_000),
        ];
        let mut s = session(6_000, open);
        // Matching suggested invoices 2 and 3 only; invoice 1 must be skipped
        s.apply_matches(&[
            DocumentMatch {
                kind: DocumentKind::Invoice,
                document_id: 2,
                short_pay: false,
            },
            DocumentMatch {
                kind: DocumentKind::Invoice,
                document_id: 3,
                short_pay: true,
            },
        ])
        .unwrap();

        assert_eq!(s.lines().len(), 2);
        assert_eq!(
            s.lines()[0].target,
            LineTarget::Document {
                kind: DocumentKind::Invoice,
                id: 2
            }
        );
        assert!(!s.lines()[0].short_pay); // fully covered
        assert_eq!(s.lines()[1].amount, Some(Money::from_minor(1_000)));
        assert!(s.lines()[1].short_pay); // partial and flagged by the match
    }

    #[test]
    fn test_validation_negative_payment_always_invalid() {
        let s = session(-1_000, vec![invoice(1, 10, 10_000)]);
        assert!(!s.is_valid());
    }

    #[test]
    fn test_validation_zero_payment_needs_credits() {
        let mut s = AllocationSession::new(
            usd(),
            Money::zero(),
            vec![invoice(1, 10, 10_000)],
            Money::from_minor(5_000),
            Vec::new(),
        );
        assert!(!s.is_valid()); // zero payment, no credits selected yet

        s.set_credit_amount(0, Money::from_minor(5_000)).unwrap();
        assert!(s.is_valid());
    }

    #[test]
    fn test_validation_over_applied_line_flagged() {
        let mut s = session(20_000, vec![invoice(1, 10, 10_000)]);
        s.add_line(
            DocumentKind::Invoice,
            1,
            Some(Money::from_minor(12_000)),
            Money::zero(),
        )
        .unwrap();
        assert!(!s.is_valid());
        assert!(s.lines()[0].over);

        // The previously-applied slack extends the ceiling when editing
        s.remove_line(0).unwrap();
        s.add_line(
            DocumentKind::Invoice,
            1,
            Some(Money::from_minor(12_000)),
            Money::from_minor(2_000),
        )
        .unwrap();
        assert!(s.is_valid());
        assert!(!s.lines()[0].over);
    }

    #[test]
    fn test_validation_blank_and_zero_lines_are_incomplete_not_invalid() {
        let mut s = session(10_000, vec![invoice(1, 10, 10_000)]);
        s.add_line(DocumentKind::Invoice, 1, Some(Money::zero()), Money::zero())
            .unwrap();
        s.set_line_amount(0, None).unwrap();
        assert!(s.is_valid());
        assert!(!s.lines()[0].invalid);

        s.set_line_amount(0, Some(Money::from_minor(-100))).unwrap();
        assert!(!s.is_valid());
        assert!(s.lines()[0].invalid);
    }

    #[test]
    fn test_validation_credit_over_ceiling_flagged() {
        let mut s = AllocationSession::new(
            usd(),
            Money::from_minor(1_000),
            vec![invoice(1, 10, 10_000)],
            Money::from_minor(2_000),
            Vec::new(),
        );
        s.set_credit_amount(0, Money::from_minor(3_000)).unwrap();
        assert!(!s.is_valid());
        assert!(s.credits()[0].invalid);
    }

    #[test]
    fn test_default_line_amount_is_min_of_remaining_and_balance() {
        let mut s = session(4_000, vec![invoice(1, 10, 10_000)]);
        s.add_line(DocumentKind::Invoice, 1, None, Money::zero())
            .unwrap();
        assert_eq!(s.lines()[0].amount, Some(Money::from_minor(4_000)));
    }

    #[test]
    fn test_manual_ops_never_reorder_lines() {
        let mut s = session(
            30_000,
            vec![
                invoice(1, 10, 10_000),
                invoice(2, 20, 10_000),
                invoice(3, 30, 10_000),
            ],
        );
        s.auto_apply().unwrap();
        s.remove_line(1).unwrap();
        assert_eq!(s.lines().len(), 2);
        assert_eq!(
            s.lines()[0].target,
            LineTarget::Document {
                kind: DocumentKind::Invoice,
                id: 1
            }
        );
        assert_eq!(
            s.lines()[1].target,
            LineTarget::Document {
                kind: DocumentKind::Invoice,
                id: 3
            }
        );
    }

    #[test]
    fn test_serialized_session_is_terminal() {
        let mut s = session(10_000, vec![invoice(1, 10, 10_000)]);
        s.auto_apply().unwrap();
        s.serialize_applied_to().unwrap();

        assert!(matches!(
            s.auto_apply(),
            Err(CoreError::SessionClosed { .. })
        ));
        assert!(matches!(
            s.serialize_applied_to(),
            Err(CoreError::SessionClosed { .. })
        ));
    }

    #[test]
    fn test_editing_transitions() {
        let mut s = session(10_000, vec![invoice(1, 10, 10_000)]);
        s.auto_apply().unwrap();
        assert_eq!(s.state(), SessionState::Ready);

        s.set_line_amount(0, Some(Money::from_minor(5_000))).unwrap();
        assert_eq!(s.state(), SessionState::Editing);
    }
}
