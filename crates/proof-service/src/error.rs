//! Service error types.

use proof_core::analytics::WidgetEvent;
use proof_core::ProofError;
use proof_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the services.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Domain rule violated.
    #[error(transparent)]
    Domain(#[from] ProofError),

    /// Storage failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Widget missing or deleted.
    #[error("Widget not found: {0}")]
    WidgetNotFound(String),

    /// Widget changed by another writer between read and write.
    #[error("Widget changed concurrently: {0}")]
    WidgetConflict(String),

    /// Product not known to the commerce side.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Purchase not known to the commerce side.
    #[error("Purchase not found: {0}")]
    PurchaseNotFound(String),

    /// Attribution candidate missing.
    #[error("Attribution candidate not found: {0}")]
    CandidateNotFound(String),

    /// Counter write still failing after every retry.
    #[error("Failed to record {event} for widget {widget_id} after {attempts} attempts: {source}")]
    CounterWriteFailed {
        widget_id: String,
        event: WidgetEvent,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// Configuration rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
