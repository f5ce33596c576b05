//! Product page rendering.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use proof_core::context::{context_for_product, count_recent_sales};
use proof_core::ids::{ProductId, WidgetId};
use proof_core::payload::WidgetRenderPayload;
use proof_core::selector;
use proof_core::widget::{ProductStats, WidgetData};
use proof_store::{PurchaseSource, WidgetStore};

use crate::config::ContextConfig;
use crate::error::{ServiceError, ServiceResult};

/// Builds the widgets shown on a product page.
pub struct WidgetRenderer<S, P> {
    store: Arc<S>,
    purchases: Arc<P>,
    context: ContextConfig,
}

impl<S, P> WidgetRenderer<S, P>
where
    S: WidgetStore,
    P: PurchaseSource,
{
    pub fn new(store: Arc<S>, purchases: Arc<P>) -> Self {
        Self {
            store,
            purchases,
            context: ContextConfig::default(),
        }
    }

    /// Override sale lookback and recent sales window.
    pub fn with_context(mut self, context: ContextConfig) -> Self {
        self.context = context;
        self
    }

    /// Payloads for every widget selected on `product_id`'s page.
    pub async fn render_for_product(
        &self,
        product_id: &ProductId,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<WidgetRenderPayload>> {
        let product = self
            .purchases
            .product(product_id)
            .await?
            .ok_or_else(|| ServiceError::ProductNotFound(product_id.to_string()))?;
        let widgets = self.store.widgets_for_seller(&product.seller_id).await?;

        let selected = selector::select(&product, &widgets);
        if selected.is_empty() {
            return Ok(Vec::new());
        }

        let sales = self.purchases.sales_for_product(product_id).await?;
        let context = context_for_product(&product, &sales, now, self.context.lookback());
        Ok(selected
            .into_iter()
            .map(|widget| WidgetRenderPayload::render(widget, &context))
            .collect())
    }

    /// Like [`Self::render_for_product`], but a failure renders nothing.
    ///
    /// A product page must never break because of a widget.
    pub async fn render_or_empty(
        &self,
        product_id: &ProductId,
        now: DateTime<Utc>,
    ) -> Vec<WidgetRenderPayload> {
        match self.render_for_product(product_id, now).await {
            Ok(payloads) => payloads,
            Err(e) => {
                tracing::warn!(product_id = %product_id, error = %e, "rendering no widgets");
                Vec::new()
            }
        }
    }

    /// Kind-specific headline number for a widget on a product.
    pub async fn widget_data(
        &self,
        widget_id: &WidgetId,
        product_id: &ProductId,
        now: DateTime<Utc>,
    ) -> ServiceResult<WidgetData> {
        let widget = self
            .store
            .get_widget(widget_id)
            .await?
            .filter(|w| !w.is_deleted())
            .ok_or_else(|| ServiceError::WidgetNotFound(widget_id.to_string()))?;
        let product = self
            .purchases
            .product(product_id)
            .await?
            .ok_or_else(|| ServiceError::ProductNotFound(product_id.to_string()))?;
        let sales = self.purchases.sales_for_product(product_id).await?;

        let stats = ProductStats {
            purchases_last_24h: count_recent_sales(&product, &sales, now, self.context.sales_window()),
            active_memberships: product.active_memberships,
        };
        Ok(widget.widget_data(&stats))
    }
}
