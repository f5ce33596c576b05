//! Counter writes under concurrency and failure.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use proof_core::analytics::{AnalyticsSnapshot, EventRequest, WidgetEvent};
use proof_core::ids::{SellerId, WidgetId};
use proof_core::widget::{apply_defaults, NewWidget, Widget};
use proof_service::{BackoffStrategy, EventTracker, RetryPolicy, ServiceError};
use proof_store::{CounterStore, MemoryStore, StoreError, StoreResult, WidgetStore};

fn widget() -> Widget {
    apply_defaults(
        NewWidget {
            seller_id: SellerId::new("s1"),
            name: "Buyers".to_string(),
            ..Default::default()
        },
        Utc::now(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_hundred_concurrent_clicks() {
    let store = Arc::new(MemoryStore::new());
    let w = widget();
    store.insert_widget(w.clone()).await.unwrap();
    let tracker = Arc::new(EventTracker::new(Arc::clone(&store)));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let tracker = Arc::clone(&tracker);
            let request = EventRequest {
                widget_id: w.id.clone(),
                event_kind: WidgetEvent::Click,
            };
            tokio::spawn(async move { tracker.handle(&request).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().success);
    }

    let snapshot = store.snapshot(&w.id).await.unwrap();
    assert_eq!(snapshot.clicks, 100);
    assert_eq!(snapshot.impressions, 0);
    assert_eq!(snapshot.closes, 0);
}

/// Counter backend that fails the first `failures` increments.
struct FlakyStore {
    inner: MemoryStore,
    failures: AtomicU32,
}

impl FlakyStore {
    fn new(failures: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl WidgetStore for FlakyStore {
    async fn insert_widget(&self, widget: Widget) -> StoreResult<()> {
        self.inner.insert_widget(widget).await
    }

    async fn get_widget(&self, id: &WidgetId) -> StoreResult<Option<Widget>> {
        self.inner.get_widget(id).await
    }

    async fn update_widget(&self, current: &Widget, next: Widget) -> StoreResult<bool> {
        self.inner.update_widget(current, next).await
    }

    async fn widgets_for_seller(&self, seller: &SellerId) -> StoreResult<Vec<Widget>> {
        self.inner.widgets_for_seller(seller).await
    }

    async fn remove_widget(&self, id: &WidgetId) -> StoreResult<bool> {
        self.inner.remove_widget(id).await
    }
}

#[async_trait]
impl CounterStore for FlakyStore {
    async fn increment(&self, widget_id: &WidgetId, event: WidgetEvent) -> StoreResult<u64> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("counter shard busy".to_string()));
        }
        self.inner.increment(widget_id, event).await
    }

    async fn snapshot(&self, widget_id: &WidgetId) -> StoreResult<AnalyticsSnapshot> {
        self.inner.snapshot(widget_id).await
    }
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts).with_backoff(BackoffStrategy::None)
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let store = Arc::new(FlakyStore::new(2));
    let w = widget();
    store.insert_widget(w.clone()).await.unwrap();

    let tracker = EventTracker::new(Arc::clone(&store)).with_retry(fast_retry(3));
    assert_eq!(tracker.track(&w.id, WidgetEvent::Impression).await.unwrap(), 1);
    assert_eq!(store.snapshot(&w.id).await.unwrap().impressions, 1);
}

#[tokio::test]
async fn test_exhausted_retries_are_surfaced() {
    let store = Arc::new(FlakyStore::new(5));
    let w = widget();
    store.insert_widget(w.clone()).await.unwrap();

    let tracker = EventTracker::new(Arc::clone(&store)).with_retry(fast_retry(3));
    match tracker.track(&w.id, WidgetEvent::Click).await {
        Err(ServiceError::CounterWriteFailed {
            attempts, event, ..
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(event, WidgetEvent::Click);
        }
        other => panic!("expected counter write failure, got {:?}", other),
    }

    let request = EventRequest {
        widget_id: w.id.clone(),
        event_kind: WidgetEvent::Click,
    };
    assert!(!tracker.handle(&request).await.success);
    assert_eq!(store.snapshot(&w.id).await.unwrap().clicks, 0);
}
