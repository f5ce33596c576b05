//! Per-widget analytics for the seller dashboard.

use std::sync::Arc;

use futures::future::try_join_all;
use proof_core::analytics::{RevenueSummary, WidgetAnalytics};
use proof_core::ids::{SellerId, WidgetId};
use proof_core::money::Currency;
use proof_store::{AttributionStore, CounterStore, PurchaseSource, WidgetStore};

use crate::error::{ServiceError, ServiceResult};

/// Builds dashboard analytics from counters and confirmed attributions.
///
/// Revenue only counts confirmed candidates whose purchase is still
/// successful, so a refund after confirmation drops out of the totals.
pub struct AnalyticsReporter<S, P> {
    store: Arc<S>,
    purchases: Arc<P>,
    currency: Currency,
}

impl<S, P> AnalyticsReporter<S, P>
where
    S: WidgetStore + AttributionStore + CounterStore,
    P: PurchaseSource,
{
    /// Reporter in USD.
    pub fn new(store: Arc<S>, purchases: Arc<P>) -> Self {
        Self {
            store,
            purchases,
            currency: Currency::USD,
        }
    }

    /// Currency revenue is reported in. Confirmed revenue in any other
    /// currency is left out of the totals.
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Counters and revenue for one widget, deleted or not.
    pub async fn widget_analytics(&self, widget_id: &WidgetId) -> ServiceResult<WidgetAnalytics> {
        if self.store.get_widget(widget_id).await?.is_none() {
            return Err(ServiceError::WidgetNotFound(widget_id.to_string()));
        }
        let snapshot = self.store.snapshot(widget_id).await?;
        let candidates = self.store.candidates_for_widget(widget_id).await?;

        let mut earning = Vec::with_capacity(candidates.len());
        for candidate in candidates.into_iter().filter(|c| c.is_confirmed()) {
            match self.purchases.purchase(&candidate.purchase_id).await? {
                Some(purchase) if purchase.is_successful() => earning.push(candidate),
                _ => tracing::debug!(
                    candidate_id = %candidate.id,
                    purchase_id = %candidate.purchase_id,
                    "confirmed purchase no longer successful, excluded from revenue"
                ),
            }
        }

        let revenue = RevenueSummary::from_candidates(&earning, self.currency);
        Ok(WidgetAnalytics::compute(widget_id.clone(), snapshot, revenue))
    }

    /// Analytics for every non-deleted widget of `seller`, newest first.
    pub async fn seller_analytics(&self, seller: &SellerId) -> ServiceResult<Vec<WidgetAnalytics>> {
        let mut widgets = self.store.widgets_for_seller(seller).await?;
        widgets.retain(|w| !w.is_deleted());
        widgets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        try_join_all(widgets.iter().map(|w| self.widget_analytics(&w.id))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proof_core::analytics::WidgetEvent;
    use proof_core::attribution::AttributionCandidate;
    use proof_core::commerce::{Purchase, PurchaseState};
    use proof_core::ids::{ProductId, PurchaseId};
    use proof_core::money::Money;
    use proof_core::widget::{apply_defaults, NewWidget, Widget};
    use proof_store::MemoryStore;

    fn purchase(id: &str, cents: i64, state: PurchaseState) -> Purchase {
        Purchase {
            id: PurchaseId::new(id),
            product_id: ProductId::new("p1"),
            seller_id: SellerId::new("s1"),
            state,
            amount: Money::new(cents, Currency::USD),
            created_at: Utc::now(),
            buyer_name: None,
            country: None,
        }
    }

    async fn widget_in(store: &MemoryStore) -> Widget {
        let widget = apply_defaults(
            NewWidget {
                seller_id: SellerId::new("s1"),
                name: "Buyers".to_string(),
                ..Default::default()
            },
            Utc::now(),
        );
        store.insert_widget(widget.clone()).await.unwrap();
        widget
    }

    async fn confirmed_candidate(store: &MemoryStore, widget: &Widget, purchase: &Purchase) {
        let mut candidate = AttributionCandidate::new(
            widget.id.clone(),
            purchase.id.clone(),
            purchase.amount,
            Utc::now(),
            Utc::now(),
        )
        .unwrap();
        candidate.confirm(Utc::now()).unwrap();
        store.insert_candidate(candidate).await.unwrap();
    }

    #[tokio::test]
    async fn test_widget_analytics() {
        let store = Arc::new(MemoryStore::new());
        let widget = widget_in(&store).await;
        for _ in 0..4 {
            store.increment(&widget.id, WidgetEvent::Impression).await.unwrap();
        }
        store.increment(&widget.id, WidgetEvent::Click).await.unwrap();

        let sold = purchase("pur1", 3000, PurchaseState::Successful);
        store.put_purchase(sold.clone()).unwrap();
        confirmed_candidate(&store, &widget, &sold).await;
        let pending = AttributionCandidate::new(
            widget.id.clone(),
            PurchaseId::new("pur2"),
            Money::new(9000, Currency::USD),
            Utc::now(),
            Utc::now(),
        )
        .unwrap();
        store.insert_candidate(pending).await.unwrap();

        let reporter = AnalyticsReporter::new(Arc::clone(&store), Arc::clone(&store));
        let analytics = reporter.widget_analytics(&widget.id).await.unwrap();
        assert_eq!(analytics.impressions, 4);
        assert_eq!(analytics.clicks, 1);
        assert_eq!(analytics.conversion_rate, 0.25);
        assert_eq!(analytics.confirmed_revenue, Money::new(3000, Currency::USD));
        assert_eq!(analytics.revenue_per_impression.amount_cents, 750);
        assert_eq!(analytics.revenue_per_click.amount_cents, 3000);

        let all = reporter.seller_analytics(&SellerId::new("s1")).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_refunded_purchase_drops_out_of_revenue() {
        let store = Arc::new(MemoryStore::new());
        let widget = widget_in(&store).await;
        let sold = purchase("pur1", 5000, PurchaseState::Successful);
        store.put_purchase(sold.clone()).unwrap();
        confirmed_candidate(&store, &widget, &sold).await;

        let reporter = AnalyticsReporter::new(Arc::clone(&store), Arc::clone(&store));
        let before = reporter.widget_analytics(&widget.id).await.unwrap();
        assert_eq!(before.confirmed_revenue, Money::new(5000, Currency::USD));
        assert_eq!(before.attributed_purchases, 1);

        let mut refunded = sold;
        refunded.state = PurchaseState::Refunded;
        store.put_purchase(refunded).unwrap();

        let after = reporter.widget_analytics(&widget.id).await.unwrap();
        assert!(after.confirmed_revenue.is_zero());
        assert_eq!(after.attributed_purchases, 0);
    }

    #[tokio::test]
    async fn test_missing_widget() {
        let store = Arc::new(MemoryStore::new());
        let reporter = AnalyticsReporter::new(Arc::clone(&store), store);
        assert!(matches!(
            reporter.widget_analytics(&WidgetId::new("nope")).await,
            Err(ServiceError::WidgetNotFound(_))
        ));
    }
}
