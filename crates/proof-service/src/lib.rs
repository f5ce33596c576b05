//! Request-driven services over the social proof domain.
//!
//! - [`WidgetService`]: create, edit, publish, duplicate and delete widgets
//! - [`WidgetRenderer`]: select and render widgets for a product page
//! - [`EventTracker`]: count impressions, clicks and closes; issue click cookies
//! - [`AttributionPipeline`]: create and validate attribution candidates
//! - [`AnalyticsReporter`]: per-widget engagement and attributed revenue
//!
//! Services are generic over the store traits in `proof-store` and share one
//! store through an `Arc`.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod renderer;
pub mod reporter;
pub mod retry;
pub mod tracker;
pub mod widgets;

pub use config::{AttributionConfig, ContextConfig, CounterConfig, ProofConfig};
pub use error::{ServiceError, ServiceResult};
pub use pipeline::{AttributionPipeline, ValidationReport};
pub use renderer::WidgetRenderer;
pub use reporter::AnalyticsReporter;
pub use retry::{BackoffStrategy, RetryPolicy};
pub use tracker::EventTracker;
pub use widgets::WidgetService;
