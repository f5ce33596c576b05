//! Engagement counters and derived metrics.
//!
//! Counts themselves live in a store with an atomic increment; this module
//! only names the events and computes ratios from a snapshot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attribution::AttributionCandidate;
use crate::error::ProofError;
use crate::ids::WidgetId;
use crate::money::{Currency, Money};

/// Visitor interaction reported by a rendered widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetEvent {
    Impression,
    Click,
    Close,
}

impl WidgetEvent {
    /// Every event kind, in counter order.
    pub const ALL: [WidgetEvent; 3] = [WidgetEvent::Impression, WidgetEvent::Click, WidgetEvent::Close];

    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetEvent::Impression => "impression",
            WidgetEvent::Click => "click",
            WidgetEvent::Close => "close",
        }
    }
}

impl fmt::Display for WidgetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WidgetEvent {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "impression" => Ok(WidgetEvent::Impression),
            "click" => Ok(WidgetEvent::Click),
            "close" => Ok(WidgetEvent::Close),
            other => Err(ProofError::UnknownEvent(other.to_string())),
        }
    }
}

/// Inbound event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRequest {
    pub widget_id: WidgetId,
    pub event_kind: WidgetEvent,
}

/// Event endpoints acknowledge only; they never return business data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    pub success: bool,
}

/// Raw counters for one widget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub impressions: u64,
    pub clicks: u64,
    pub closes: u64,
}

impl AnalyticsSnapshot {
    /// Current count for one event kind.
    pub fn count(&self, event: WidgetEvent) -> u64 {
        match event {
            WidgetEvent::Impression => self.impressions,
            WidgetEvent::Click => self.clicks,
            WidgetEvent::Close => self.closes,
        }
    }

    /// Clicks per impression, rounded to two places. Zero without impressions.
    pub fn conversion_rate(&self) -> f64 {
        if self.impressions == 0 {
            return 0.0;
        }
        round2(self.clicks as f64 / self.impressions as f64)
    }

    /// The same ratio as a percentage, as dashboards display it.
    pub fn conversion_rate_percent(&self) -> f64 {
        if self.impressions == 0 {
            return 0.0;
        }
        round2(self.clicks as f64 / self.impressions as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Revenue credited to a widget through confirmed attributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSummary {
    pub confirmed_revenue: Money,
    pub attributed_purchases: u64,
}

impl RevenueSummary {
    /// No confirmed revenue yet.
    pub fn empty(currency: Currency) -> Self {
        Self {
            confirmed_revenue: Money::zero(currency),
            attributed_purchases: 0,
        }
    }

    /// Sum confirmed candidates in `currency`.
    ///
    /// Pending and rejected candidates never count. Candidates in another
    /// currency are skipped and logged, since there is no conversion here.
    pub fn from_candidates<'a, I>(candidates: I, currency: Currency) -> Self
    where
        I: IntoIterator<Item = &'a AttributionCandidate>,
    {
        let mut summary = Self::empty(currency);
        for candidate in candidates.into_iter().filter(|c| c.is_confirmed()) {
            match summary.confirmed_revenue.checked_add(&candidate.attributed_amount) {
                Some(total) => {
                    summary.confirmed_revenue = total;
                    summary.attributed_purchases += 1;
                }
                None => tracing::warn!(
                    candidate_id = %candidate.id,
                    widget_id = %candidate.widget_id,
                    currency = %candidate.attributed_amount.currency,
                    expected = %currency,
                    "skipping attributed revenue in foreign currency"
                ),
            }
        }
        summary
    }
}

/// Everything the analytics dashboard shows for one widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetAnalytics {
    pub widget_id: WidgetId,
    pub impressions: u64,
    pub clicks: u64,
    pub closes: u64,
    pub conversion_rate: f64,
    pub confirmed_revenue: Money,
    pub attributed_purchases: u64,
    pub revenue_per_impression: Money,
    pub revenue_per_click: Money,
}

impl WidgetAnalytics {
    /// Combine counters and confirmed revenue into one report.
    ///
    /// Rates and per-unit revenue are zero when their denominator is zero.
    pub fn compute(widget_id: WidgetId, snapshot: AnalyticsSnapshot, revenue: RevenueSummary) -> Self {
        Self {
            widget_id,
            impressions: snapshot.impressions,
            clicks: snapshot.clicks,
            closes: snapshot.closes,
            conversion_rate: snapshot.conversion_rate(),
            confirmed_revenue: revenue.confirmed_revenue,
            attributed_purchases: revenue.attributed_purchases,
            revenue_per_impression: revenue.confirmed_revenue.per_unit(snapshot.impressions),
            revenue_per_click: revenue.confirmed_revenue.per_unit(snapshot.clicks),
        }
    }
}
