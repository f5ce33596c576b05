//! Storage contracts consumed by the services.

use async_trait::async_trait;
use proof_core::analytics::{AnalyticsSnapshot, WidgetEvent};
use proof_core::attribution::AttributionCandidate;
use proof_core::commerce::{Product, Purchase};
use proof_core::ids::{CandidateId, ProductId, PurchaseId, SellerId, WidgetId};
use proof_core::widget::Widget;

use crate::StoreResult;

/// Widget persistence.
#[async_trait]
pub trait WidgetStore: Send + Sync {
    /// Insert a new widget. Fails if the id is taken.
    async fn insert_widget(&self, widget: Widget) -> StoreResult<()>;

    async fn get_widget(&self, id: &WidgetId) -> StoreResult<Option<Widget>>;

    /// Replace `current` with `next` if the stored copy still equals `current`.
    ///
    /// Returns `false` when another writer changed the widget first.
    async fn update_widget(&self, current: &Widget, next: Widget) -> StoreResult<bool>;

    /// All widgets owned by `seller`, deleted ones included.
    async fn widgets_for_seller(&self, seller: &SellerId) -> StoreResult<Vec<Widget>>;

    /// Remove a widget together with its candidates and counters.
    ///
    /// Returns `false` if there was nothing to remove.
    async fn remove_widget(&self, id: &WidgetId) -> StoreResult<bool>;
}

/// Attribution candidate persistence.
#[async_trait]
pub trait AttributionStore: Send + Sync {
    /// Insert a candidate, enforcing one candidate per purchase.
    async fn insert_candidate(&self, candidate: AttributionCandidate) -> StoreResult<()>;

    async fn get_candidate(&self, id: &CandidateId) -> StoreResult<Option<AttributionCandidate>>;

    async fn candidate_for_purchase(
        &self,
        purchase_id: &PurchaseId,
    ) -> StoreResult<Option<AttributionCandidate>>;

    async fn candidates_for_widget(&self, widget_id: &WidgetId)
        -> StoreResult<Vec<AttributionCandidate>>;

    async fn pending_candidates(&self) -> StoreResult<Vec<AttributionCandidate>>;

    /// Persist a decided candidate only if the stored copy is still pending.
    ///
    /// Returns `false` when another writer already finalized it; the stored
    /// status is left as it was.
    async fn finalize_candidate(&self, candidate: &AttributionCandidate) -> StoreResult<bool>;
}

/// Per-widget engagement counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically add one to the counter for `event`, returning the new value.
    ///
    /// Fails with `NotFound` once the widget has been removed.
    async fn increment(&self, widget_id: &WidgetId, event: WidgetEvent) -> StoreResult<u64>;

    /// Current counts. A widget that never saw an event reads as zeros.
    async fn snapshot(&self, widget_id: &WidgetId) -> StoreResult<AnalyticsSnapshot>;
}

/// Read-only access to products and purchases owned by the commerce side.
#[async_trait]
pub trait PurchaseSource: Send + Sync {
    async fn purchase(&self, id: &PurchaseId) -> StoreResult<Option<Purchase>>;

    async fn product(&self, id: &ProductId) -> StoreResult<Option<Product>>;

    /// Purchases of `product`, any state.
    async fn sales_for_product(&self, product: &ProductId) -> StoreResult<Vec<Purchase>>;
}
