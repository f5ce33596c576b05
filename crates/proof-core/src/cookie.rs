//! Attribution cookie written on a widget click and read back at checkout.
//!
//! The browser carries one cookie per clicked widget, named
//! `<prefix><widget id>` with the click time in epoch seconds as its value.
//! At purchase time the jar is reduced to a single [`AttributionContext`]:
//! the most recent click wins.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::error::{ProofError, Result};
use crate::ids::WidgetId;

/// Default prefix of attribution cookie names.
pub const COOKIE_PREFIX: &str = "_social_proof_";

/// Cookie lifetime. Deliberately distinct from the attribution window.
pub const COOKIE_LIFETIME_DAYS: i64 = 30;

/// The click a purchase may be credited to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionContext {
    pub widget_id: WidgetId,
    pub clicked_at: DateTime<Utc>,
}

impl AttributionContext {
    /// Click on `widget_id` at `clicked_at`.
    pub fn new(widget_id: WidgetId, clicked_at: DateTime<Utc>) -> Self {
        Self {
            widget_id,
            clicked_at,
        }
    }

    /// Context for a click at `now`, truncated to whole seconds as the
    /// cookie stores it.
    pub fn at_click(widget_id: WidgetId, now: DateTime<Utc>) -> Self {
        let clicked_at = Utc.timestamp_opt(now.timestamp(), 0).single().unwrap_or(now);
        Self::new(widget_id, clicked_at)
    }

    /// Most recent widget click found in `cookies` under `prefix`.
    ///
    /// Names are percent-decoded before the prefix is stripped. Cookies with
    /// a non-numeric value are ignored. Equal timestamps resolve to the
    /// smallest widget id.
    pub fn from_cookies<'a, I>(prefix: &str, cookies: I) -> Option<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        cookies
            .into_iter()
            .filter_map(|(name, value)| {
                let decoded = decode_component(name);
                let widget_id = decoded.strip_prefix(prefix)?;
                if widget_id.is_empty() {
                    return None;
                }
                match parse_timestamp(value) {
                    Ok(clicked_at) => Some(Self::new(WidgetId::new(widget_id), clicked_at)),
                    Err(e) => {
                        tracing::debug!(cookie = %decoded, error = %e, "ignoring attribution cookie");
                        None
                    }
                }
            })
            .max_by(|a, b| {
                a.clicked_at
                    .cmp(&b.clicked_at)
                    .then_with(|| b.widget_id.cmp(&a.widget_id))
            })
    }

    /// Parse a raw `Cookie:` request header and pick the latest click.
    pub fn from_cookie_header(prefix: &str, header: &str) -> Option<Self> {
        let pairs = parse_cookie_header(header);
        Self::from_cookies(prefix, pairs.iter().map(|(n, v)| (*n, *v)))
    }
}

/// A `Set-Cookie` value recording a click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionCookie {
    pub name: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub max_age_secs: i64,
}

impl AttributionCookie {
    /// Cookie recording `context`, expiring `lifetime` after the click.
    pub fn for_click(context: &AttributionContext, prefix: &str, lifetime: Duration) -> Self {
        Self {
            name: cookie_name(prefix, &context.widget_id),
            value: context.clicked_at.timestamp().to_string(),
            expires_at: context.clicked_at + lifetime,
            max_age_secs: lifetime.num_seconds(),
        }
    }

    /// `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        format!(
            "{}={}; Path=/; Max-Age={}; Expires={}; HttpOnly; SameSite=Lax",
            self.name,
            self.value,
            self.max_age_secs,
            self.expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
        )
    }
}

/// `<prefix><widget id>` with the id percent-encoded.
pub fn cookie_name(prefix: &str, widget_id: &WidgetId) -> String {
    let encoded: String = form_urlencoded::byte_serialize(widget_id.as_str().as_bytes()).collect();
    format!("{}{}", prefix, encoded)
}

/// Split a `Cookie:` header into trimmed name/value pairs.
pub fn parse_cookie_header(header: &str) -> Vec<(&str, &str)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name, value.trim().trim_matches('"')))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    form_urlencoded::parse(raw.as_bytes())
        .map(|(key, value)| {
            if value.is_empty() {
                key.into_owned()
            } else {
                format!("{}={}", key, value)
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let secs: i64 = value
        .trim()
        .parse()
        .map_err(|_| ProofError::InvalidCookie(format!("not a timestamp: {:?}", value)))?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| ProofError::InvalidCookie(format!("timestamp out of range: {}", secs)))
}
