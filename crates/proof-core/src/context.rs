//! Template context derivation for a product page.
//!
//! Everything here is a pure function of the product, its recent sales and
//! the current time, so the same inputs always render the same copy.

use chrono::{DateTime, Duration, Utc};
use num_format::{Locale, ToFormattedString};

use crate::commerce::{Product, Purchase};
use crate::template::{TemplateContext, TemplateVariable};
use crate::widget::ProductStats;

/// How far back a sale may be and still feed the "recent customer" variables.
pub const RECENT_SALE_LOOKBACK_HOURS: i64 = 48;

/// Window behind the "purchases in the last 24 hours" number.
pub const RECENT_SALES_WINDOW_HOURS: i64 = 24;

/// Shown when the buyer country is unknown.
pub const UNKNOWN_COUNTRY: &str = "Unknown";
/// Stand-in for a missing buyer name.
pub const ANONYMOUS_CUSTOMER: &str = "Someone";
/// `recent_sale_time` when nothing sold inside the lookback.
pub const NO_RECENT_SALE_TIME: &str = "recently";

/// The newest successful sale of `product` no older than `lookback`.
pub fn most_recent_sale<'a>(
    product: &Product,
    sales: &'a [Purchase],
    now: DateTime<Utc>,
    lookback: Duration,
) -> Option<&'a Purchase> {
    let cutoff = now - lookback;
    sales
        .iter()
        .filter(|p| p.product_id == product.id && p.is_successful())
        .filter(|p| p.created_at >= cutoff && p.created_at <= now)
        .max_by_key(|p| p.created_at)
}

/// Successful sales of `product` within `window` before `now`.
pub fn count_recent_sales(
    product: &Product,
    sales: &[Purchase],
    now: DateTime<Utc>,
    window: Duration,
) -> u64 {
    let cutoff = now - window;
    sales
        .iter()
        .filter(|p| p.product_id == product.id && p.is_successful())
        .filter(|p| p.created_at >= cutoff && p.created_at <= now)
        .count() as u64
}

/// Headline numbers for [`crate::widget::Widget::widget_data`].
pub fn product_stats(product: &Product, sales: &[Purchase], now: DateTime<Utc>) -> ProductStats {
    ProductStats {
        purchases_last_24h: count_recent_sales(
            product,
            sales,
            now,
            Duration::hours(RECENT_SALES_WINDOW_HOURS),
        ),
        active_memberships: product.active_memberships,
    }
}

/// Build the variables for a product and its most recent qualifying sale.
pub fn build_context(
    product: &Product,
    recent_sale: Option<&Purchase>,
    now: DateTime<Utc>,
) -> TemplateContext {
    let mut ctx = TemplateContext::new()
        .with(TemplateVariable::ProductName, product.name.clone())
        .with(TemplateVariable::Price, product.price.display())
        .with(
            TemplateVariable::TotalSales,
            format_count(product.successful_sales_count),
        );

    match recent_sale {
        Some(sale) => {
            let country = sale
                .country
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(UNKNOWN_COUNTRY);
            ctx.insert(TemplateVariable::Country, country);
            ctx.insert(
                TemplateVariable::CustomerName,
                anonymize_name(sale.buyer_name.as_deref()),
            );
            ctx.insert(
                TemplateVariable::RecentSaleTime,
                format!("{} ago", time_ago_in_words(sale.created_at, now)),
            );
        }
        None => {
            ctx.insert(TemplateVariable::Country, UNKNOWN_COUNTRY);
            ctx.insert(TemplateVariable::CustomerName, ANONYMOUS_CUSTOMER);
            ctx.insert(TemplateVariable::RecentSaleTime, NO_RECENT_SALE_TIME);
        }
    }

    ctx
}

/// Convenience wrapper: pick the recent sale with `lookback`, then build.
pub fn context_for_product(
    product: &Product,
    sales: &[Purchase],
    now: DateTime<Utc>,
    lookback: Duration,
) -> TemplateContext {
    build_context(product, most_recent_sale(product, sales, now, lookback), now)
}

/// "Sarah Miller" becomes "Sarah M."; blank names become "Someone".
pub fn anonymize_name(full_name: Option<&str>) -> String {
    let parts: Vec<&str> = full_name.unwrap_or("").split_whitespace().collect();
    match parts.as_slice() {
        [] => ANONYMOUS_CUSTOMER.to_string(),
        [first] => (*first).to_string(),
        [first, .., last] => match last.chars().next() {
            Some(initial) => format!("{} {}.", first, initial.to_uppercase()),
            None => (*first).to_string(),
        },
    }
}

/// Thousands-grouped count, e.g. 1247 -> "1,247".
pub fn format_count(count: u64) -> String {
    count.to_formatted_string(&Locale::en)
}

/// Approximate distance between two instants in words ("about 2 hours").
///
/// Buckets follow the familiar rounded-minutes scheme used by dashboards.
/// A `from` later than `to` counts as no time at all.
pub fn time_ago_in_words(from: DateTime<Utc>, to: DateTime<Utc>) -> String {
    let seconds = (to - from).num_seconds().max(0);
    let minutes = (seconds as f64 / 60.0).round() as i64;

    match minutes {
        0 => "less than a minute".to_string(),
        1 => "1 minute".to_string(),
        2..=44 => format!("{} minutes", minutes),
        45..=89 => "about 1 hour".to_string(),
        90..=1439 => format!("about {} hours", (minutes as f64 / 60.0).round() as i64),
        1440..=2519 => "1 day".to_string(),
        2520..=43199 => format!("{} days", (minutes as f64 / 1440.0).round() as i64),
        43200..=86399 => "about 1 month".to_string(),
        86400..=525599 => format!("{} months", (minutes as f64 / 43200.0).round() as i64),
        _ => {
            let years = minutes / 525600;
            if years <= 1 {
                "about 1 year".to_string()
            } else {
                format!("about {} years", years)
            }
        }
    }
}
