//! Read models of the commerce records widgets refer to.
//!
//! Products and purchases are owned elsewhere; widgets only read them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ProductId, PurchaseId, SellerId};
use crate::money::Money;

/// Purchase processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseState {
    /// Charge not finished yet.
    #[default]
    InProgress,
    /// Charged successfully.
    Successful,
    /// Preorder card authorization succeeded; counts as a sale.
    PreorderAuthorized,
    /// Charge failed.
    Failed,
    /// Charged, then refunded in full.
    Refunded,
}

impl PurchaseState {
    /// Snake case state name, as the commerce side reports it.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseState::InProgress => "in_progress",
            PurchaseState::Successful => "successful",
            PurchaseState::PreorderAuthorized => "preorder_authorized",
            PurchaseState::Failed => "failed",
            PurchaseState::Refunded => "refunded",
        }
    }

    /// Every state except in progress is final.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PurchaseState::InProgress)
    }

    /// Successful and authorized preorders count as sales; refunds do not.
    pub fn is_successful(&self) -> bool {
        matches!(
            self,
            PurchaseState::Successful | PurchaseState::PreorderAuthorized
        )
    }
}

/// A purchase as the commerce subsystem reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub product_id: ProductId,
    pub seller_id: SellerId,
    pub state: PurchaseState,
    /// Amount charged, in the purchase currency.
    pub amount: Money,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub buyer_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Purchase {
    /// Whether the purchase currently counts as a sale.
    pub fn is_successful(&self) -> bool {
        self.state.is_successful()
    }
}

/// A product as shown on its page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: SellerId,
    pub name: String,
    /// Price in the owner's currency.
    pub price: Money,
    /// All-time successful sale count.
    #[serde(default)]
    pub successful_sales_count: u64,
    #[serde(default)]
    pub active_memberships: u64,
}
