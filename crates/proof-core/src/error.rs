//! Domain error types.

use thiserror::Error;

use crate::attribution::AttributionStatus;
use crate::widget::ValidationErrors;

/// Errors raised by domain operations.
#[derive(Error, Debug)]
pub enum ProofError {
    /// Widget failed save-time validation.
    #[error("Invalid widget: {0}")]
    InvalidWidget(#[from] ValidationErrors),

    /// Attributed amount must be strictly positive.
    #[error("Attributed amount must be positive, got {0} cents")]
    NonPositiveAmount(i64),

    /// Candidate already left the pending state.
    #[error("Attribution candidate {id} is {status}, not pending")]
    CandidateNotPending { id: String, status: AttributionStatus },

    /// Candidate, widget and purchase do not belong together.
    #[error("Attribution mismatch: {0}")]
    AttributionMismatch(String),

    /// Unrecognised event name.
    #[error("Unknown widget event: {0}")]
    UnknownEvent(String),

    /// Malformed attribution cookie.
    #[error("Invalid attribution cookie: {0}")]
    InvalidCookie(String),
}

pub type Result<T> = std::result::Result<T, ProofError>;
