//! Impression, click and close events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use proof_core::analytics::{EventRequest, EventResponse, WidgetEvent};
use proof_core::cookie::{AttributionContext, AttributionCookie};
use proof_core::ids::WidgetId;
use proof_store::{CounterStore, StoreError, WidgetStore};

use crate::config::AttributionConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::retry::RetryPolicy;

/// Records widget events against the counter store.
///
/// Counter writes are retried per the configured policy. A write that still
/// fails is logged at error level and returned; it is never dropped quietly.
pub struct EventTracker<S> {
    store: Arc<S>,
    retry: RetryPolicy,
    attribution: AttributionConfig,
}

impl<S> EventTracker<S>
where
    S: WidgetStore + CounterStore,
{
    /// Tracker with the default retry policy and attribution settings.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            attribution: AttributionConfig::default(),
        }
    }

    /// Replace the counter retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Cookie prefix and lifetime for issued click cookies.
    pub fn with_attribution(mut self, attribution: AttributionConfig) -> Self {
        self.attribution = attribution;
        self
    }

    /// Count one event for a live widget. Returns the counter's new value.
    pub async fn track(&self, widget_id: &WidgetId, event: WidgetEvent) -> ServiceResult<u64> {
        match self.store.get_widget(widget_id).await? {
            Some(widget) if !widget.is_deleted() => {}
            _ => return Err(ServiceError::WidgetNotFound(widget_id.to_string())),
        }

        let store = &self.store;
        match self
            .retry
            .run(move || async move { store.increment(widget_id, event).await })
            .await
        {
            Ok(count) => {
                tracing::debug!(widget_id = %widget_id, event = %event, count, "recorded widget event");
                Ok(count)
            }
            // Purged between the check above and the write.
            Err(exhausted) if matches!(exhausted.error, StoreError::NotFound { .. }) => {
                Err(ServiceError::WidgetNotFound(widget_id.to_string()))
            }
            Err(exhausted) => {
                tracing::error!(
                    widget_id = %widget_id,
                    event = %event,
                    attempts = exhausted.attempts,
                    error = %exhausted.error,
                    "failed to record widget event"
                );
                Err(ServiceError::CounterWriteFailed {
                    widget_id: widget_id.to_string(),
                    event,
                    attempts: exhausted.attempts,
                    source: exhausted.error,
                })
            }
        }
    }

    /// Endpoint form: acknowledge with success or failure only.
    pub async fn handle(&self, request: &EventRequest) -> EventResponse {
        let success = match self.track(&request.widget_id, request.event_kind).await {
            Ok(_) => true,
            Err(ServiceError::WidgetNotFound(_)) => {
                tracing::warn!(widget_id = %request.widget_id, event = %request.event_kind, "event for unknown widget");
                false
            }
            Err(_) => false,
        };
        EventResponse { success }
    }

    /// Count a click and issue the attribution cookie for it.
    pub async fn click(
        &self,
        widget_id: &WidgetId,
        now: DateTime<Utc>,
    ) -> ServiceResult<AttributionCookie> {
        self.track(widget_id, WidgetEvent::Click).await?;
        let context = AttributionContext::at_click(widget_id.clone(), now);
        Ok(AttributionCookie::for_click(
            &context,
            &self.attribution.cookie_prefix,
            self.attribution.cookie_lifetime(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proof_core::ids::SellerId;
    use proof_core::widget::{apply_defaults, NewWidget, Widget};
    use proof_store::MemoryStore;

    async fn store_with_widget() -> (Arc<MemoryStore>, Widget) {
        let store = Arc::new(MemoryStore::new());
        let widget = apply_defaults(
            NewWidget {
                seller_id: SellerId::new("s1"),
                name: "Buyers".to_string(),
                ..Default::default()
            },
            Utc::now(),
        );
        store.insert_widget(widget.clone()).await.unwrap();
        (store, widget)
    }

    #[tokio::test]
    async fn test_track_counts_events() {
        let (store, widget) = store_with_widget().await;
        let tracker = EventTracker::new(Arc::clone(&store));

        tracker.track(&widget.id, WidgetEvent::Impression).await.unwrap();
        tracker.track(&widget.id, WidgetEvent::Impression).await.unwrap();
        assert_eq!(tracker.track(&widget.id, WidgetEvent::Close).await.unwrap(), 1);

        let snapshot = store.snapshot(&widget.id).await.unwrap();
        assert_eq!(snapshot.impressions, 2);
        assert_eq!(snapshot.closes, 1);
    }

    #[tokio::test]
    async fn test_unknown_widget_is_not_counted() {
        let (store, _) = store_with_widget().await;
        let tracker = EventTracker::new(Arc::clone(&store));
        let request = EventRequest {
            widget_id: WidgetId::new("ghost"),
            event_kind: WidgetEvent::Click,
        };

        assert_eq!(tracker.handle(&request).await, EventResponse { success: false });
        assert_eq!(store.snapshot(&request.widget_id).await.unwrap().clicks, 0);
    }

    #[tokio::test]
    async fn test_deleted_widget_is_not_counted() {
        let (store, widget) = store_with_widget().await;
        let mut deleted = widget.clone();
        deleted.mark_deleted(Utc::now());
        assert!(store.update_widget(&widget, deleted).await.unwrap());

        let tracker = EventTracker::new(store);
        assert!(matches!(
            tracker.track(&widget.id, WidgetEvent::Impression).await,
            Err(ServiceError::WidgetNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_purged_widget_is_not_recreated_by_increment() {
        let (store, widget) = store_with_widget().await;
        let tracker = EventTracker::new(Arc::clone(&store));
        tracker.track(&widget.id, WidgetEvent::Click).await.unwrap();

        // Same order as a purge landing between the live check and the write.
        assert!(store.remove_widget(&widget.id).await.unwrap());
        assert!(matches!(
            store.increment(&widget.id, WidgetEvent::Click).await,
            Err(StoreError::NotFound { kind: "widget", .. })
        ));
        assert!(matches!(
            tracker.track(&widget.id, WidgetEvent::Click).await,
            Err(ServiceError::WidgetNotFound(_))
        ));
        assert_eq!(store.snapshot(&widget.id).await.unwrap().clicks, 0);
    }

    #[tokio::test]
    async fn test_click_issues_cookie() {
        let (store, widget) = store_with_widget().await;
        let tracker = EventTracker::new(Arc::clone(&store));
        let now = Utc::now();

        let cookie = tracker.click(&widget.id, now).await.unwrap();
        assert_eq!(cookie.name, format!("_social_proof_{}", widget.id));
        assert_eq!(cookie.value, now.timestamp().to_string());
        assert_eq!(cookie.max_age_secs, 30 * 24 * 60 * 60);
        assert_eq!(store.snapshot(&widget.id).await.unwrap().clicks, 1);
    }
}
