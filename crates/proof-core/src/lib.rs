//! Social proof widget domain types and decision logic.
//!
//! This crate holds everything that does not touch storage:
//!
//! - **Widgets**: the widget model, its defaults, validation and unpublish rule
//! - **Selection**: which widgets render on a product page
//! - **Templates**: `{{variable}}` validation, rendering and context derivation
//! - **Analytics**: event names, conversion rate and attributed revenue
//! - **Attribution**: the pending/confirmed/rejected candidate state machine
//!   and the click cookie that feeds it
//!
//! # Example
//!
//! ```rust,ignore
//! use proof_core::prelude::*;
//!
//! let widgets = store.list_for_seller(&product.seller_id).await?;
//! let context = context_for_product(&product, &recent_sales, now, Duration::hours(48));
//! let payloads: Vec<WidgetRenderPayload> = select(&product, &widgets)
//!     .into_iter()
//!     .map(|w| WidgetRenderPayload::render(w, &context))
//!     .collect();
//! ```

pub mod error;
pub mod ids;
pub mod money;

pub mod analytics;
pub mod attribution;
pub mod commerce;
pub mod context;
pub mod cookie;
pub mod payload;
pub mod selector;
pub mod template;
pub mod widget;

pub use error::ProofError;
pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::ProofError;
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    // Widgets
    pub use crate::widget::{
        apply_defaults, should_unpublish, CtaKind, FieldError, ImageConfig, NewWidget,
        ProductStats, ValidationErrors, Widget, WidgetData, WidgetKind, WidgetScope,
        WidgetUpdate,
    };

    // Commerce read models
    pub use crate::commerce::{Product, Purchase, PurchaseState};

    // Selection and rendering
    pub use crate::context::{build_context, context_for_product, product_stats};
    pub use crate::payload::WidgetRenderPayload;
    pub use crate::selector::select;
    pub use crate::template::{TemplateContext, TemplateError, TemplateVariable};

    // Analytics
    pub use crate::analytics::{
        AnalyticsSnapshot, EventRequest, EventResponse, RevenueSummary, WidgetAnalytics,
        WidgetEvent,
    };

    // Attribution
    pub use crate::attribution::{
        AttributionCandidate, AttributionStatus, AttributionValidator, RejectionReason, Verdict,
    };
    pub use crate::cookie::{AttributionContext, AttributionCookie};
}
