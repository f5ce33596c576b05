//! Click-to-purchase attribution.
//!
//! A candidate is created pending when a purchase arrives carrying an
//! [`AttributionContext`]. Once the purchase is terminal the validator moves
//! it to confirmed or rejected, and that status never changes again.
//!
//! The checks run in a fixed priority order and the first one that fails
//! names the rejection reason:
//!
//! 1. purchase successful (`purchase_failed`)
//! 2. purchase within the window after the click (`attribution_window_expired`)
//! 3. widget universal or linked to the purchased product (`product_mismatch`)
//! 4. widget owner is the purchase seller (`seller_mismatch`)

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::commerce::Purchase;
use crate::cookie::AttributionContext;
use crate::error::{ProofError, Result};
use crate::ids::{CandidateId, PurchaseId, WidgetId};
use crate::money::Money;
use crate::widget::Widget;

/// Longest time a purchase may follow the click and still be credited.
pub const ATTRIBUTION_WINDOW_DAYS: i64 = 10;

/// Candidate lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttributionStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
}

impl AttributionStatus {
    /// Lowercase status name used in logs and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionStatus::Pending => "pending",
            AttributionStatus::Confirmed => "confirmed",
            AttributionStatus::Rejected => "rejected",
        }
    }

    /// Confirmed and rejected never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttributionStatus::Pending)
    }
}

impl fmt::Display for AttributionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    PurchaseFailed,
    AttributionWindowExpired,
    ProductMismatch,
    SellerMismatch,
}

impl RejectionReason {
    /// Snake case reason code.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::PurchaseFailed => "purchase_failed",
            RejectionReason::AttributionWindowExpired => "attribution_window_expired",
            RejectionReason::ProductMismatch => "product_mismatch",
            RejectionReason::SellerMismatch => "seller_mismatch",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchase that may be credited to a widget click.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionCandidate {
    pub id: CandidateId,
    pub widget_id: WidgetId,
    /// Unique across candidates: one widget at most per purchase.
    pub purchase_id: PurchaseId,
    pub attributed_amount: Money,
    /// When the visitor clicked the widget.
    pub cookie_set_at: DateTime<Utc>,
    pub status: AttributionStatus,
    /// Set only when `status` is rejected.
    pub rejection_reason: Option<RejectionReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttributionCandidate {
    /// Create a pending candidate. The amount must be strictly positive.
    pub fn new(
        widget_id: WidgetId,
        purchase_id: PurchaseId,
        attributed_amount: Money,
        cookie_set_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if !attributed_amount.is_positive() {
            return Err(ProofError::NonPositiveAmount(attributed_amount.amount_cents));
        }
        Ok(Self {
            id: CandidateId::generate(),
            widget_id,
            purchase_id,
            attributed_amount,
            cookie_set_at,
            status: AttributionStatus::Pending,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Candidate crediting `purchase` to the click in `context`.
    pub fn from_context(
        context: &AttributionContext,
        purchase: &Purchase,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        Self::new(
            context.widget_id.clone(),
            purchase.id.clone(),
            purchase.amount,
            context.clicked_at,
            now,
        )
    }

    /// Still waiting for a verdict.
    pub fn is_pending(&self) -> bool {
        self.status == AttributionStatus::Pending
    }

    /// Credited to the widget.
    pub fn is_confirmed(&self) -> bool {
        self.status == AttributionStatus::Confirmed
    }

    /// Rejected; `rejection_reason` says why.
    pub fn is_rejected(&self) -> bool {
        self.status == AttributionStatus::Rejected
    }

    /// Move a pending candidate to confirmed.
    ///
    /// Fails with [`ProofError::CandidateNotPending`] if it already has a verdict.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        self.status = AttributionStatus::Confirmed;
        self.updated_at = now;
        Ok(())
    }

    /// Move a pending candidate to rejected, recording `reason`.
    ///
    /// Fails with [`ProofError::CandidateNotPending`] if it already has a verdict.
    pub fn reject(&mut self, reason: RejectionReason, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        self.status = AttributionStatus::Rejected;
        self.rejection_reason = Some(reason);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(ProofError::CandidateNotPending {
                id: self.id.to_string(),
                status: self.status,
            })
        }
    }
}

/// Outcome of evaluating a pending candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Confirm,
    Reject(RejectionReason),
    /// Purchase not terminal yet; stay pending.
    Defer,
}

/// Decides pending candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributionValidator {
    window: Duration,
}

impl Default for AttributionValidator {
    fn default() -> Self {
        Self::with_window_days(ATTRIBUTION_WINDOW_DAYS)
    }
}

impl AttributionValidator {
    /// Validator with a custom attribution window.
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Validator with a window of `days` whole days.
    pub fn with_window_days(days: i64) -> Self {
        Self::new(Duration::days(days))
    }

    /// Longest accepted gap between click and purchase.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// `purchase.created_at - cookie_set_at <= window`.
    ///
    /// A purchase stamped before the click passes as well.
    pub fn within_window(&self, candidate: &AttributionCandidate, purchase: &Purchase) -> bool {
        purchase.created_at - candidate.cookie_set_at <= self.window
    }

    /// Evaluate without mutating anything.
    ///
    /// Errors mean the inputs do not describe one candidate (wrong widget or
    /// purchase, or a candidate that is already terminal); they never turn
    /// into a rejection.
    pub fn evaluate(
        &self,
        candidate: &AttributionCandidate,
        widget: &Widget,
        purchase: &Purchase,
    ) -> Result<Verdict> {
        candidate.ensure_pending()?;
        if candidate.widget_id != widget.id {
            return Err(ProofError::AttributionMismatch(format!(
                "candidate {} references widget {}, got {}",
                candidate.id, candidate.widget_id, widget.id
            )));
        }
        if candidate.purchase_id != purchase.id {
            return Err(ProofError::AttributionMismatch(format!(
                "candidate {} references purchase {}, got {}",
                candidate.id, candidate.purchase_id, purchase.id
            )));
        }

        if !purchase.state.is_terminal() {
            return Ok(Verdict::Defer);
        }
        if !purchase.is_successful() {
            return Ok(Verdict::Reject(RejectionReason::PurchaseFailed));
        }
        if !self.within_window(candidate, purchase) {
            return Ok(Verdict::Reject(RejectionReason::AttributionWindowExpired));
        }
        if !widget.scope.is_universal() && !widget.scope.links(&purchase.product_id) {
            return Ok(Verdict::Reject(RejectionReason::ProductMismatch));
        }
        if widget.seller_id != purchase.seller_id {
            return Ok(Verdict::Reject(RejectionReason::SellerMismatch));
        }
        Ok(Verdict::Confirm)
    }

    /// Evaluate and apply the verdict to `candidate`.
    ///
    /// A terminal candidate is returned untouched. Returns the status after
    /// the call.
    pub fn apply(
        &self,
        candidate: &mut AttributionCandidate,
        widget: &Widget,
        purchase: &Purchase,
        now: DateTime<Utc>,
    ) -> Result<AttributionStatus> {
        if !candidate.is_pending() {
            return Ok(candidate.status);
        }
        match self.evaluate(candidate, widget, purchase)? {
            Verdict::Confirm => candidate.confirm(now)?,
            Verdict::Reject(reason) => candidate.reject(reason, now)?,
            Verdict::Defer => {}
        }
        Ok(candidate.status)
    }
}
