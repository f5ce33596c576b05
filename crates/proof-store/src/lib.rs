//! Persistence seam for social proof widgets.
//!
//! Services depend on the traits in [`traits`]; [`MemoryStore`] implements
//! all of them in process memory and is what the CLI and tests run against.
//!
//! Two guarantees every backend must provide:
//!
//! - counter increments are atomic per widget and event
//! - at most one attribution candidate exists per purchase

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use traits::{AttributionStore, CounterStore, PurchaseSource, WidgetStore};
