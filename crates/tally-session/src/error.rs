//! Error types for the loading boundary.
//!
//! [`LoadError`] is deliberately `Clone`: a coalesced fetch stores one
//! outcome and every waiting caller receives a copy of it.

use thiserror::Error;

// =============================================================================
// Load Errors (cloneable, shared across coalesced callers)
// =============================================================================

/// A collaborator fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The upstream fetch itself failed (network, backend, decode).
    #[error("collaborator fetch failed: {0}")]
    Fetch(String),

    /// The customer does not exist upstream.
    #[error("unknown customer: {0}")]
    UnknownCustomer(i64),
}

// =============================================================================
// Session Errors
// =============================================================================

/// Errors surfaced by the session driver.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A required load failed; the session never reached `Ready`.
    #[error("session load failed: {0}")]
    LoadFailed(#[from] LoadError),

    /// The core engine rejected the inputs (unknown currency, bad
    /// payment amount, session misuse).
    #[error(transparent)]
    Core(#[from] tally_core::CoreError),
}

pub type SessionResult<T> = Result<T, SessionError>;

// =============================================================================
// Unit Tests
// =============================================================================
