//! Store error types.

use thiserror::Error;

/// Errors that can occur when reading or writing the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record not found.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A candidate already exists for this purchase.
    #[error("Purchase {0} already has an attribution candidate")]
    DuplicatePurchase(String),

    /// A record with this id already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    /// A writer panicked while holding the lock.
    #[error("Store lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// Backend unavailable or the operation failed.
    #[error("Store operation failed: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// `NotFound` for a record of `kind`.
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
