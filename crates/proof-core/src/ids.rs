//! Newtype identifiers for widgets and the commerce records they reference.
//!
//! Widgets, sellers, products and purchases are all keyed by opaque strings.
//! Wrapping each in its own type keeps a `ProductId` from being passed where
//! a `WidgetId` is expected, which matters most in attribution checks where
//! several ids are compared side by side.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing id.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a new unique id.
            pub fn generate() -> Self {
                Self(generate_id())
            }

            /// Borrow the raw id.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Take the raw id out.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Widget identifier. Doubles as the external id embedded in attribution cookies.
    WidgetId
);
define_id!(
    /// The merchant that owns widgets and sells products.
    SellerId
);
define_id!(ProductId);
define_id!(PurchaseId);
define_id!(CandidateId);

/// Timestamp nanos mixed with a process-wide counter.
fn generate_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let counter = COUNTER.fetch_add(1, Ordering::SeqCst);

    format!("{:x}{:04x}", timestamp, counter & 0xffff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: std::collections::HashSet<WidgetId> =
            (0..1000).map(|_| WidgetId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_id_display_and_conversion() {
        let id: PurchaseId = "pur-42".into();
        assert_eq!(id.as_str(), "pur-42");
        assert_eq!(format!("{}", id), "pur-42");
        assert_eq!(id.into_inner(), "pur-42");
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = ProductId::new("prod-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"prod-1\"");
    }
}
