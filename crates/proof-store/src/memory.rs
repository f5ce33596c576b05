//! In-memory backend.
//!
//! Tables sit behind `std::sync::RwLock`s that are never held across an
//! `.await`. Counters are the exception to table-level locking: each widget
//! owns a cell of atomics, and the map lock is only taken to find or create
//! the cell, so concurrent events for one widget never lose an update.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use proof_core::analytics::{AnalyticsSnapshot, WidgetEvent};
use proof_core::attribution::AttributionCandidate;
use proof_core::commerce::{Product, Purchase};
use proof_core::ids::{CandidateId, ProductId, PurchaseId, SellerId, WidgetId};
use proof_core::widget::Widget;

use crate::traits::{AttributionStore, CounterStore, PurchaseSource, WidgetStore};
use crate::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct CounterCell {
    impressions: AtomicU64,
    clicks: AtomicU64,
    closes: AtomicU64,
}

impl CounterCell {
    fn counter(&self, event: WidgetEvent) -> &AtomicU64 {
        match event {
            WidgetEvent::Impression => &self.impressions,
            WidgetEvent::Click => &self.clicks,
            WidgetEvent::Close => &self.closes,
        }
    }

    fn snapshot(&self) -> AnalyticsSnapshot {
        AnalyticsSnapshot {
            impressions: self.impressions.load(Ordering::Acquire),
            clicks: self.clicks.load(Ordering::Acquire),
            closes: self.closes.load(Ordering::Acquire),
        }
    }
}

#[derive(Debug, Default)]
struct CandidateTable {
    by_id: HashMap<CandidateId, AttributionCandidate>,
    by_purchase: HashMap<PurchaseId, CandidateId>,
}

/// Thread-safe store keeping everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    widgets: RwLock<HashMap<WidgetId, Widget>>,
    candidates: RwLock<CandidateTable>,
    counters: RwLock<HashMap<WidgetId, Arc<CounterCell>>>,
    products: RwLock<HashMap<ProductId, Product>>,
    purchases: RwLock<HashMap<PurchaseId, Purchase>>,
}

fn read<'a, T>(lock: &'a RwLock<T>, table: &'static str) -> StoreResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| StoreError::LockPoisoned(table))
}

fn write<'a, T>(lock: &'a RwLock<T>, table: &'static str) -> StoreResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| StoreError::LockPoisoned(table))
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a product, replacing any previous copy.
    pub fn put_product(&self, product: Product) -> StoreResult<()> {
        write(&self.products, "products")?.insert(product.id.clone(), product);
        Ok(())
    }

    /// Seed a purchase, replacing any previous copy. Used to move a purchase
    /// to its terminal state as well.
    pub fn put_purchase(&self, purchase: Purchase) -> StoreResult<()> {
        write(&self.purchases, "purchases")?.insert(purchase.id.clone(), purchase);
        Ok(())
    }

    /// Find or create the counter cell of a stored widget.
    ///
    /// The widgets read lock is held until the cell exists, so a concurrent
    /// `remove_widget` either sees the cell and drops it or runs first and
    /// makes this fail.
    fn counter_cell(&self, widget_id: &WidgetId) -> StoreResult<Arc<CounterCell>> {
        let widgets = read(&self.widgets, "widgets")?;
        if !widgets.contains_key(widget_id) {
            return Err(StoreError::not_found("widget", widget_id));
        }
        if let Some(cell) = read(&self.counters, "counters")?.get(widget_id) {
            return Ok(Arc::clone(cell));
        }
        let mut counters = write(&self.counters, "counters")?;
        Ok(Arc::clone(counters.entry(widget_id.clone()).or_default()))
    }
}

#[async_trait]
impl WidgetStore for MemoryStore {
    async fn insert_widget(&self, widget: Widget) -> StoreResult<()> {
        let mut widgets = write(&self.widgets, "widgets")?;
        if widgets.contains_key(&widget.id) {
            return Err(StoreError::AlreadyExists {
                kind: "widget",
                id: widget.id.to_string(),
            });
        }
        widgets.insert(widget.id.clone(), widget);
        Ok(())
    }

    async fn get_widget(&self, id: &WidgetId) -> StoreResult<Option<Widget>> {
        Ok(read(&self.widgets, "widgets")?.get(id).cloned())
    }

    async fn update_widget(&self, current: &Widget, next: Widget) -> StoreResult<bool> {
        let mut widgets = write(&self.widgets, "widgets")?;
        let slot = widgets
            .get_mut(&current.id)
            .ok_or_else(|| StoreError::not_found("widget", &current.id))?;
        if slot != current {
            return Ok(false);
        }
        *slot = next;
        Ok(true)
    }

    async fn widgets_for_seller(&self, seller: &SellerId) -> StoreResult<Vec<Widget>> {
        let widgets = read(&self.widgets, "widgets")?;
        Ok(widgets
            .values()
            .filter(|w| &w.seller_id == seller)
            .cloned()
            .collect())
    }

    async fn remove_widget(&self, id: &WidgetId) -> StoreResult<bool> {
        if write(&self.widgets, "widgets")?.remove(id).is_none() {
            return Ok(false);
        }

        let removed = {
            let mut table = write(&self.candidates, "candidates")?;
            let doomed: Vec<CandidateId> = table
                .by_id
                .values()
                .filter(|c| &c.widget_id == id)
                .map(|c| c.id.clone())
                .collect();
            for candidate_id in &doomed {
                if let Some(candidate) = table.by_id.remove(candidate_id) {
                    table.by_purchase.remove(&candidate.purchase_id);
                }
            }
            doomed.len()
        };
        write(&self.counters, "counters")?.remove(id);

        tracing::debug!(widget_id = %id, candidates = removed, "removed widget");
        Ok(true)
    }
}

#[async_trait]
impl AttributionStore for MemoryStore {
    async fn insert_candidate(&self, candidate: AttributionCandidate) -> StoreResult<()> {
        let mut table = write(&self.candidates, "candidates")?;
        if table.by_purchase.contains_key(&candidate.purchase_id) {
            return Err(StoreError::DuplicatePurchase(candidate.purchase_id.to_string()));
        }
        if table.by_id.contains_key(&candidate.id) {
            return Err(StoreError::AlreadyExists {
                kind: "attribution candidate",
                id: candidate.id.to_string(),
            });
        }
        table
            .by_purchase
            .insert(candidate.purchase_id.clone(), candidate.id.clone());
        table.by_id.insert(candidate.id.clone(), candidate);
        Ok(())
    }

    async fn get_candidate(&self, id: &CandidateId) -> StoreResult<Option<AttributionCandidate>> {
        Ok(read(&self.candidates, "candidates")?.by_id.get(id).cloned())
    }

    async fn candidate_for_purchase(
        &self,
        purchase_id: &PurchaseId,
    ) -> StoreResult<Option<AttributionCandidate>> {
        let table = read(&self.candidates, "candidates")?;
        Ok(table
            .by_purchase
            .get(purchase_id)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn candidates_for_widget(
        &self,
        widget_id: &WidgetId,
    ) -> StoreResult<Vec<AttributionCandidate>> {
        let table = read(&self.candidates, "candidates")?;
        Ok(table
            .by_id
            .values()
            .filter(|c| &c.widget_id == widget_id)
            .cloned()
            .collect())
    }

    async fn pending_candidates(&self) -> StoreResult<Vec<AttributionCandidate>> {
        let table = read(&self.candidates, "candidates")?;
        let mut pending: Vec<AttributionCandidate> = table
            .by_id
            .values()
            .filter(|c| c.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(pending)
    }

    async fn finalize_candidate(&self, candidate: &AttributionCandidate) -> StoreResult<bool> {
        let mut table = write(&self.candidates, "candidates")?;
        let stored = table
            .by_id
            .get_mut(&candidate.id)
            .ok_or_else(|| StoreError::not_found("attribution candidate", &candidate.id))?;
        if !stored.is_pending() {
            return Ok(false);
        }
        stored.status = candidate.status;
        stored.rejection_reason = candidate.rejection_reason;
        stored.updated_at = candidate.updated_at;
        Ok(true)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, widget_id: &WidgetId, event: WidgetEvent) -> StoreResult<u64> {
        let cell = self.counter_cell(widget_id)?;
        Ok(cell.counter(event).fetch_add(1, Ordering::AcqRel) + 1)
    }

    async fn snapshot(&self, widget_id: &WidgetId) -> StoreResult<AnalyticsSnapshot> {
        Ok(read(&self.counters, "counters")?
            .get(widget_id)
            .map(|cell| cell.snapshot())
            .unwrap_or_default())
    }
}

#[async_trait]
impl PurchaseSource for MemoryStore {
    async fn purchase(&self, id: &PurchaseId) -> StoreResult<Option<Purchase>> {
        Ok(read(&self.purchases, "purchases")?.get(id).cloned())
    }

    async fn product(&self, id: &ProductId) -> StoreResult<Option<Product>> {
        Ok(read(&self.products, "products")?.get(id).cloned())
    }

    async fn sales_for_product(&self, product: &ProductId) -> StoreResult<Vec<Purchase>> {
        let purchases = read(&self.purchases, "purchases")?;
        Ok(purchases
            .values()
            .filter(|p| &p.product_id == product)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proof_core::attribution::RejectionReason;
    use proof_core::money::{Currency, Money};
    use proof_core::widget::{apply_defaults, NewWidget};

    fn widget(seller: &str) -> Widget {
        apply_defaults(
            NewWidget {
                seller_id: SellerId::new(seller),
                name: "Recent buyers".to_string(),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    fn candidate(widget_id: &WidgetId, purchase: &str) -> AttributionCandidate {
        AttributionCandidate::new(
            widget_id.clone(),
            PurchaseId::new(purchase),
            Money::new(1000, Currency::USD),
            Utc::now(),
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_clicks_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let w = widget("s1");
        store.insert_widget(w.clone()).await.unwrap();
        let widget_id = w.id;

        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let store = Arc::clone(&store);
                let widget_id = widget_id.clone();
                tokio::spawn(async move { store.increment(&widget_id, WidgetEvent::Click).await })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let snapshot = store.snapshot(&widget_id).await.unwrap();
        assert_eq!(snapshot.clicks, 100);
        assert_eq!(snapshot.impressions, 0);
    }

    #[tokio::test]
    async fn test_increment_returns_new_value() {
        let store = MemoryStore::new();
        let w = widget("s1");
        store.insert_widget(w.clone()).await.unwrap();
        let id = w.id;
        assert_eq!(store.increment(&id, WidgetEvent::Impression).await.unwrap(), 1);
        assert_eq!(store.increment(&id, WidgetEvent::Impression).await.unwrap(), 2);
        assert_eq!(store.increment(&id, WidgetEvent::Close).await.unwrap(), 1);

        let snapshot = store.snapshot(&id).await.unwrap();
        assert_eq!(snapshot.impressions, 2);
        assert_eq!(snapshot.closes, 1);
    }

    #[tokio::test]
    async fn test_unknown_widget_snapshot_is_zero() {
        let store = MemoryStore::new();
        let snapshot = store.snapshot(&WidgetId::new("nope")).await.unwrap();
        assert_eq!(snapshot, AnalyticsSnapshot::default());
    }

    #[tokio::test]
    async fn test_increment_after_remove_leaves_no_counter() {
        let store = MemoryStore::new();
        let w = widget("s1");
        store.insert_widget(w.clone()).await.unwrap();
        store.increment(&w.id, WidgetEvent::Click).await.unwrap();
        assert!(store.remove_widget(&w.id).await.unwrap());

        assert!(matches!(
            store.increment(&w.id, WidgetEvent::Click).await,
            Err(StoreError::NotFound { kind: "widget", .. })
        ));
        assert!(!read(&store.counters, "counters").unwrap().contains_key(&w.id));
        assert_eq!(store.snapshot(&w.id).await.unwrap(), AnalyticsSnapshot::default());
    }

    #[tokio::test]
    async fn test_one_candidate_per_purchase() {
        let store = MemoryStore::new();
        let w1 = WidgetId::new("w1");
        let w2 = WidgetId::new("w2");
        store.insert_candidate(candidate(&w1, "pur1")).await.unwrap();

        let err = store.insert_candidate(candidate(&w2, "pur1")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePurchase(ref p) if p == "pur1"));

        let stored = store
            .candidate_for_purchase(&PurchaseId::new("pur1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.widget_id, w1);
    }

    #[tokio::test]
    async fn test_finalize_only_from_pending() {
        let store = MemoryStore::new();
        let mut c = candidate(&WidgetId::new("w1"), "pur1");
        store.insert_candidate(c.clone()).await.unwrap();

        let mut rejected = c.clone();
        rejected
            .reject(RejectionReason::SellerMismatch, Utc::now())
            .unwrap();
        assert!(store.finalize_candidate(&rejected).await.unwrap());

        c.confirm(Utc::now()).unwrap();
        assert!(!store.finalize_candidate(&c).await.unwrap());

        let stored = store.get_candidate(&c.id).await.unwrap().unwrap();
        assert!(stored.is_rejected());
        assert_eq!(stored.rejection_reason, Some(RejectionReason::SellerMismatch));
        assert!(store.pending_candidates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_widget_cascades() {
        let store = MemoryStore::new();
        let keep = widget("s1");
        let doomed = widget("s1");
        store.insert_widget(keep.clone()).await.unwrap();
        store.insert_widget(doomed.clone()).await.unwrap();
        store.insert_candidate(candidate(&doomed.id, "pur1")).await.unwrap();
        store.insert_candidate(candidate(&keep.id, "pur2")).await.unwrap();
        store.increment(&doomed.id, WidgetEvent::Click).await.unwrap();

        assert!(store.remove_widget(&doomed.id).await.unwrap());
        assert!(!store.remove_widget(&doomed.id).await.unwrap());

        assert!(store.get_widget(&doomed.id).await.unwrap().is_none());
        assert!(store.candidates_for_widget(&doomed.id).await.unwrap().is_empty());
        assert_eq!(store.snapshot(&doomed.id).await.unwrap().clicks, 0);
        // The purchase is free to be attributed again.
        store.insert_candidate(candidate(&keep.id, "pur1")).await.unwrap();
        assert_eq!(store.widgets_for_seller(&SellerId::new("s1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_widget_crud() {
        let store = MemoryStore::new();
        let w = widget("s1");
        store.insert_widget(w.clone()).await.unwrap();
        assert!(matches!(
            store.insert_widget(w.clone()).await,
            Err(StoreError::AlreadyExists { .. })
        ));

        let mut renamed = w.clone();
        renamed.name = "Renamed".to_string();
        assert!(store.update_widget(&w, renamed.clone()).await.unwrap());
        assert_eq!(store.get_widget(&w.id).await.unwrap().unwrap().name, "Renamed");

        let missing = widget("s1");
        assert!(matches!(
            store.update_widget(&missing, missing.clone()).await,
            Err(StoreError::NotFound { kind: "widget", .. })
        ));
        assert!(store.widgets_for_seller(&SellerId::new("s2")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_widget_update_is_refused() {
        let store = MemoryStore::new();
        let original = widget("s1");
        store.insert_widget(original.clone()).await.unwrap();

        let mut edited = original.clone();
        edited.title = Some("{{product_name}}".to_string());
        assert!(store.update_widget(&original, edited.clone()).await.unwrap());

        // A writer that read before the edit must not overwrite it.
        let mut published = original.clone();
        published.published = true;
        assert!(!store.update_widget(&original, published).await.unwrap());

        let stored = store.get_widget(&original.id).await.unwrap().unwrap();
        assert_eq!(stored, edited);
        assert!(!stored.published);
    }
}
