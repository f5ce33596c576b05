//! Purchase attribution pipeline.
//!
//! Two steps, usually far apart in time:
//!
//! 1. [`AttributionPipeline::record_purchase`] runs at checkout with the
//!    [`AttributionContext`] recovered from the visitor's cookies and creates
//!    a pending candidate.
//! 2. [`AttributionPipeline::validate`] runs once the purchase is terminal and
//!    moves the candidate to confirmed or rejected.
//!
//! Evaluation failures never reject a candidate. They are logged and the
//! candidate stays pending for the next run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use proof_core::attribution::{AttributionCandidate, AttributionStatus, AttributionValidator};
use proof_core::commerce::Purchase;
use proof_core::cookie::AttributionContext;
use proof_core::ids::{CandidateId, PurchaseId};
use proof_core::ProofError;
use proof_store::{AttributionStore, PurchaseSource, WidgetStore};
use serde::Serialize;

use crate::error::{ServiceError, ServiceResult};

/// Counts from a batch validation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub confirmed: usize,
    pub rejected: usize,
    /// Purchase not terminal yet.
    pub deferred: usize,
    /// Evaluation failed; left pending.
    pub failed: usize,
}

/// Records purchases against clicked widgets and settles them once the
/// purchase reaches a final state.
pub struct AttributionPipeline<S, P> {
    store: Arc<S>,
    purchases: Arc<P>,
    validator: AttributionValidator,
}

impl<S, P> AttributionPipeline<S, P>
where
    S: WidgetStore + AttributionStore,
    P: PurchaseSource,
{
    /// Pipeline with the default ten day window.
    pub fn new(store: Arc<S>, purchases: Arc<P>) -> Self {
        Self {
            store,
            purchases,
            validator: AttributionValidator::default(),
        }
    }

    /// Use a validator with another window.
    pub fn with_validator(mut self, validator: AttributionValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Create a pending candidate crediting `purchase` to the clicked widget.
    ///
    /// Returns `None` when there is nothing to attribute: no click context,
    /// an unknown widget or a free purchase. A second candidate for the same
    /// purchase fails with [`proof_store::StoreError::DuplicatePurchase`].
    pub async fn record_purchase(
        &self,
        context: Option<&AttributionContext>,
        purchase: &Purchase,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<AttributionCandidate>> {
        let Some(context) = context else {
            return Ok(None);
        };

        if self.store.get_widget(&context.widget_id).await?.is_none() {
            tracing::warn!(
                widget_id = %context.widget_id,
                purchase_id = %purchase.id,
                "attribution cookie names an unknown widget"
            );
            return Ok(None);
        }

        let candidate = match AttributionCandidate::from_context(context, purchase, now) {
            Ok(candidate) => candidate,
            Err(ProofError::NonPositiveAmount(cents)) => {
                tracing::debug!(purchase_id = %purchase.id, cents, "skipping attribution for free purchase");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        self.store.insert_candidate(candidate.clone()).await?;
        tracing::info!(
            candidate_id = %candidate.id,
            widget_id = %candidate.widget_id,
            purchase_id = %candidate.purchase_id,
            amount = %candidate.attributed_amount,
            "created attribution candidate"
        );
        Ok(Some(candidate))
    }

    /// Validate one candidate, surfacing any error.
    ///
    /// The candidate is left pending when this returns an error.
    pub async fn try_validate(
        &self,
        candidate_id: &CandidateId,
        now: DateTime<Utc>,
    ) -> ServiceResult<AttributionStatus> {
        let mut candidate = self
            .store
            .get_candidate(candidate_id)
            .await?
            .ok_or_else(|| ServiceError::CandidateNotFound(candidate_id.to_string()))?;
        if !candidate.is_pending() {
            return Ok(candidate.status);
        }

        let widget = self
            .store
            .get_widget(&candidate.widget_id)
            .await?
            .ok_or_else(|| ServiceError::WidgetNotFound(candidate.widget_id.to_string()))?;
        let purchase = self
            .purchases
            .purchase(&candidate.purchase_id)
            .await?
            .ok_or_else(|| ServiceError::PurchaseNotFound(candidate.purchase_id.to_string()))?;

        let status = self.validator.apply(&mut candidate, &widget, &purchase, now)?;
        if !status.is_terminal() {
            return Ok(status);
        }

        if !self.store.finalize_candidate(&candidate).await? {
            let stored = self
                .store
                .get_candidate(candidate_id)
                .await?
                .ok_or_else(|| ServiceError::CandidateNotFound(candidate_id.to_string()))?;
            tracing::debug!(candidate_id = %candidate_id, status = %stored.status, "candidate already finalized");
            return Ok(stored.status);
        }

        match candidate.rejection_reason {
            Some(reason) => tracing::info!(
                candidate_id = %candidate.id,
                widget_id = %candidate.widget_id,
                purchase_id = %candidate.purchase_id,
                reason = %reason,
                "rejected attribution"
            ),
            None => tracing::info!(
                candidate_id = %candidate.id,
                widget_id = %candidate.widget_id,
                purchase_id = %candidate.purchase_id,
                amount = %candidate.attributed_amount,
                "confirmed attribution"
            ),
        }
        Ok(status)
    }

    /// Validate one candidate. Errors are logged and read as pending.
    pub async fn validate(&self, candidate_id: &CandidateId, now: DateTime<Utc>) -> AttributionStatus {
        match self.try_validate(candidate_id, now).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(candidate_id = %candidate_id, error = %e, "attribution validation failed");
                AttributionStatus::Pending
            }
        }
    }

    /// Validate the candidate for `purchase_id`, if any.
    pub async fn on_purchase_terminal(
        &self,
        purchase_id: &PurchaseId,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<AttributionStatus>> {
        match self.store.candidate_for_purchase(purchase_id).await? {
            Some(candidate) => Ok(Some(self.validate(&candidate.id, now).await)),
            None => Ok(None),
        }
    }

    /// Validate every pending candidate concurrently.
    pub async fn validate_pending(&self, now: DateTime<Utc>) -> ServiceResult<ValidationReport> {
        let pending = self.store.pending_candidates().await?;
        let outcomes = join_all(pending.iter().map(|c| self.try_validate(&c.id, now))).await;

        let mut report = ValidationReport::default();
        for (candidate, outcome) in pending.iter().zip(outcomes) {
            match outcome {
                Ok(AttributionStatus::Confirmed) => report.confirmed += 1,
                Ok(AttributionStatus::Rejected) => report.rejected += 1,
                Ok(AttributionStatus::Pending) => report.deferred += 1,
                Err(e) => {
                    tracing::error!(candidate_id = %candidate.id, error = %e, "attribution validation failed");
                    report.failed += 1;
                }
            }
        }
        tracing::info!(
            confirmed = report.confirmed,
            rejected = report.rejected,
            deferred = report.deferred,
            failed = report.failed,
            "validated pending attributions"
        );
        Ok(report)
    }
}
