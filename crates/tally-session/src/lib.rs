//! # tally-session: Loading Boundary for Tally
//!
//! This crate owns the async edge of the payment allocation workflow.
//! The allocation session itself is a pure in-memory object living in
//! `tally-core`; everything that has to touch a collaborator to bring
//! that object to life lives here.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Session Loading Pipeline                          │
//! │                                                                         │
//! │   begin(customer, currency, payment)                                    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌─────────────┐     ┌──────────────┐     ┌────────────────────────┐   │
//! │  │SessionDriver│ ──► │  Coalescer   │ ──► │   OpenItemsSource      │   │
//! │  │             │     │              │     │   (async trait)        │   │
//! │  │ Idle        │     │ One in-flight│     │                        │   │
//! │  │  ─► Loading │     │ fetch per    │     │ open_items()           │   │
//! │  │  ─► Ready   │     │ customer and │     │ credit_balances()      │   │
//! │  │             │     │ fetch kind   │     │ payment_matches()      │   │
//! │  └─────────────┘     └──────────────┘     └────────────────────────┘   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   tally_core::AllocationSession (Ready, auto- or match-applied)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Semantics
//! Any collaborator failure aborts the load: the session never reaches
//! `Ready` and the caller gets a [`SessionError::LoadFailed`]. Coalesced
//! callers all observe the same outcome, success or failure; there are
//! no retries at this layer.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod coalesce;
pub mod error;
pub mod session;
pub mod source;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use coalesce::Coalescer;
pub use error::{LoadError, SessionError, SessionResult};
pub use session::SessionDriver;
pub use source::{CreditBalance, OpenItem, OpenItemsSource, SuggestedMatch};
