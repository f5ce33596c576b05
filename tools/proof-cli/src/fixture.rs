//! JSON fixtures describing a seller's widgets and commerce history.
//!
//! ```json
//! {
//!   "products": [{ "id": "p1", "seller_id": "s1", "name": "Course",
//!                  "price": { "amount_cents": 4999, "currency": "USD" } }],
//!   "widgets": [{ "id": "w1", "seller_id": "s1", "name": "Buyers",
//!                 "published": true }],
//!   "purchases": [...],
//!   "clicks": [{ "widget_id": "w1", "purchase_id": "pur1",
//!                "clicked_at": "2025-07-01T12:00:00Z" }]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use proof_core::commerce::{Product, Purchase};
use proof_core::cookie::AttributionContext;
use proof_core::ids::{PurchaseId, WidgetId};
use proof_core::widget::{apply_defaults, NewWidget, Widget};
use proof_store::{MemoryStore, WidgetStore};
use serde::Deserialize;

/// Offline data set for `proof select` and `proof attribute`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub products: Vec<Product>,
    pub widgets: Vec<WidgetFixture>,
    pub purchases: Vec<Purchase>,
    pub clicks: Vec<ClickFixture>,
}

/// A widget draft with a fixed id so clicks can refer to it.
#[derive(Debug, Deserialize)]
pub struct WidgetFixture {
    pub id: WidgetId,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(flatten)]
    pub draft: NewWidget,
}

/// The click cookie a buyer carried when completing a purchase.
#[derive(Debug, Deserialize)]
pub struct ClickFixture {
    pub widget_id: WidgetId,
    pub purchase_id: PurchaseId,
    pub clicked_at: DateTime<Utc>,
}

impl ClickFixture {
    pub fn context(&self) -> AttributionContext {
        AttributionContext::new(self.widget_id.clone(), self.clicked_at)
    }
}

impl WidgetFixture {
    /// Build the widget through the normal defaults and validation.
    pub fn build(&self, now: DateTime<Utc>) -> Result<Widget> {
        let created_at = self.created_at.unwrap_or(now);
        let mut widget = apply_defaults(self.draft.clone(), created_at);
        widget.id = self.id.clone();
        widget
            .validate()
            .with_context(|| format!("Invalid widget {}", self.id))?;
        if self.deleted {
            widget.mark_deleted(created_at);
        }
        Ok(widget)
    }
}

impl Fixture {
    /// Read a JSON fixture file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse fixture: {}", path.display()))
    }

    pub fn build_widgets(&self, now: DateTime<Utc>) -> Result<Vec<Widget>> {
        self.widgets.iter().map(|w| w.build(now)).collect()
    }

    /// Purchase with `id`, if the fixture has one.
    pub fn purchase(&self, id: &PurchaseId) -> Option<&Purchase> {
        self.purchases.iter().find(|p| &p.id == id)
    }

    /// Load everything into a fresh in-memory store.
    pub async fn seed(&self, now: DateTime<Utc>) -> Result<MemoryStore> {
        let store = MemoryStore::new();
        for product in &self.products {
            store.put_product(product.clone())?;
        }
        for purchase in &self.purchases {
            store.put_purchase(purchase.clone())?;
        }
        for widget in self.build_widgets(now)? {
            store.insert_widget(widget).await?;
        }
        Ok(store)
    }
}

/// One seller, one product, a live and a deleted widget, and a click that
/// led to a successful purchase two days later.
#[cfg(test)]
pub(crate) const SAMPLE: &str = r#"{
    "products": [
        { "id": "p1", "seller_id": "s1", "name": "Rust Course",
          "price": { "amount_cents": 4999, "currency": "USD" },
          "successful_sales_count": 1247 }
    ],
    "widgets": [
        { "id": "w1", "seller_id": "s1", "name": "Buyers", "published": true,
          "title": "{{customer_name}} bought {{product_name}}" },
        { "id": "w2", "seller_id": "s1", "name": "Old", "published": true, "deleted": true }
    ],
    "purchases": [
        { "id": "pur1", "product_id": "p1", "seller_id": "s1", "state": "successful",
          "amount": { "amount_cents": 4999, "currency": "USD" },
          "created_at": "2025-07-03T12:00:00Z", "buyer_name": "Sarah Miller" }
    ],
    "clicks": [
        { "widget_id": "w1", "purchase_id": "pur1", "clicked_at": "2025-07-01T12:00:00Z" }
    ]
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample() {
        let fixture: Fixture = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(fixture.products.len(), 1);
        assert_eq!(fixture.clicks[0].context().widget_id, WidgetId::new("w1"));
        assert!(fixture.purchase(&PurchaseId::new("pur1")).is_some());

        let widgets = fixture.build_widgets(Utc::now()).unwrap();
        assert_eq!(widgets[0].id, WidgetId::new("w1"));
        assert!(widgets[1].is_deleted());
    }

    #[test]
    fn test_invalid_widget_is_reported() {
        let fixture: Fixture = serde_json::from_str(
            r#"{ "widgets": [{ "id": "bad", "seller_id": "s1", "name": "X", "title": "{{nope}}" }] }"#,
        )
        .unwrap();
        let err = fixture.build_widgets(Utc::now()).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid widget bad"));
    }

    #[tokio::test]
    async fn test_seed_store() {
        let fixture: Fixture = serde_json::from_str(SAMPLE).unwrap();
        let store = fixture.seed(Utc::now()).await.unwrap();
        assert!(store.get_widget(&WidgetId::new("w2")).await.unwrap().is_some());
    }
}
