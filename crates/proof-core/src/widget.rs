//! Widget model and its write-path rules.
//!
//! Lifecycle rules that would otherwise hide in persistence callbacks are
//! plain functions here: [`apply_defaults`] runs when a draft becomes a
//! widget, and [`should_unpublish`] decides whether an edit takes a live
//! widget offline. [`Widget::apply_update`] is the only way content changes,
//! so every edit goes through both.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{ProductId, SellerId, WidgetId};
use crate::template::{self, TemplateError};

/// Icon tint used when an icon widget does not pick one.
pub const DEFAULT_ICON_COLOR: &str = "#059669";

/// Character limits checked by [`Widget::validate`].
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_TITLE_LEN: usize = 50;
pub const MAX_MESSAGE_SUFFIX_LEN: usize = 200;
pub const MAX_CTA_TEXT_LEN: usize = 255;

/// Which products a widget targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetScope {
    /// Every product of the owning seller.
    Universal,
    /// Only the linked products.
    ProductSpecific { products: BTreeSet<ProductId> },
}

impl WidgetScope {
    /// Scope limited to the given products.
    pub fn product_specific<I>(products: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ProductId>,
    {
        WidgetScope::ProductSpecific {
            products: products.into_iter().map(Into::into).collect(),
        }
    }

    /// True when every product page is targeted.
    pub fn is_universal(&self) -> bool {
        matches!(self, WidgetScope::Universal)
    }

    /// Whether a product is explicitly linked. Always false for universal scope.
    pub fn links(&self, product: &ProductId) -> bool {
        match self {
            WidgetScope::Universal => false,
            WidgetScope::ProductSpecific { products } => products.contains(product),
        }
    }
}

/// What number a widget advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    #[default]
    Purchases,
    Memberships,
}

impl WidgetKind {
    /// Snake case kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetKind::Purchases => "purchases",
            WidgetKind::Memberships => "memberships",
        }
    }
}

/// Call-to-action presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CtaKind {
    Button,
    Link,
    #[default]
    None,
}

impl CtaKind {
    /// Snake case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CtaKind::Button => "button",
            CtaKind::Link => "link",
            CtaKind::None => "none",
        }
    }

    /// False for `CtaKind::None`.
    pub fn has_cta(&self) -> bool {
        !matches!(self, CtaKind::None)
    }
}

fn default_icon_color() -> String {
    DEFAULT_ICON_COLOR.to_string()
}

/// Image shown next to the widget copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageConfig {
    ProductThumbnail,
    CustomImage {
        url: String,
    },
    Icon {
        name: String,
        #[serde(default = "default_icon_color")]
        color: String,
    },
    #[default]
    None,
}

impl ImageConfig {
    /// Icon with the default tint.
    pub fn icon(name: impl Into<String>) -> Self {
        ImageConfig::Icon {
            name: name.into(),
            color: default_icon_color(),
        }
    }
}

/// A social proof widget owned by a seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: WidgetId,
    pub seller_id: SellerId,
    pub name: String,
    pub scope: WidgetScope,
    pub kind: WidgetKind,
    pub title: Option<String>,
    pub message_suffix: Option<String>,
    pub cta_text: Option<String>,
    pub cta_kind: CtaKind,
    pub image: ImageConfig,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A widget as submitted for creation, before defaults are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewWidget {
    pub seller_id: SellerId,
    pub name: String,
    pub scope: Option<WidgetScope>,
    pub kind: Option<WidgetKind>,
    pub title: Option<String>,
    pub message_suffix: Option<String>,
    pub cta_text: Option<String>,
    pub cta_kind: Option<CtaKind>,
    pub image: Option<ImageConfig>,
    pub published: Option<bool>,
}

/// A partial edit. `published` is deliberately absent: publishing is its own act.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WidgetUpdate {
    pub name: Option<String>,
    pub scope: Option<WidgetScope>,
    pub kind: Option<WidgetKind>,
    pub title: Option<Option<String>>,
    pub message_suffix: Option<Option<String>>,
    pub cta_text: Option<Option<String>>,
    pub cta_kind: Option<CtaKind>,
    pub image: Option<ImageConfig>,
}

/// Turn a draft into a widget, filling unset fields.
///
/// Drafts start unpublished unless they explicitly say otherwise; kind
/// defaults to purchases, CTA and image to none, and an icon without a
/// color gets [`DEFAULT_ICON_COLOR`].
pub fn apply_defaults(draft: NewWidget, now: DateTime<Utc>) -> Widget {
    let image = match draft.image.unwrap_or_default() {
        ImageConfig::Icon { name, color } if color.trim().is_empty() => ImageConfig::Icon {
            name,
            color: default_icon_color(),
        },
        other => other,
    };

    Widget {
        id: WidgetId::generate(),
        seller_id: draft.seller_id,
        name: draft.name,
        scope: draft.scope.unwrap_or(WidgetScope::Universal),
        kind: draft.kind.unwrap_or_default(),
        title: draft.title,
        message_suffix: draft.message_suffix,
        cta_text: draft.cta_text,
        cta_kind: draft.cta_kind.unwrap_or_default(),
        image,
        published: draft.published.unwrap_or(false),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

/// Whether replacing `old` with `new` must take the widget offline.
///
/// Only a published widget can be unpublished, and only a change to copy,
/// presentation, kind or targeting (including the linked product set)
/// counts.
pub fn should_unpublish(old: &Widget, new: &Widget) -> bool {
    if !old.published {
        return false;
    }

    old.name != new.name
        || old.kind != new.kind
        || old.title != new.title
        || old.message_suffix != new.message_suffix
        || old.cta_text != new.cta_text
        || old.cta_kind != new.cta_kind
        || old.image != new.image
        || old.scope != new.scope
}

impl Widget {
    /// Soft deleted widgets are kept for reporting but never rendered.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Shorthand for `scope.is_universal()`.
    pub fn is_universal(&self) -> bool {
        self.scope.is_universal()
    }

    /// Apply an edit through the write path.
    pub fn apply_update(&self, update: WidgetUpdate, now: DateTime<Utc>) -> Widget {
        let mut next = self.clone();
        if let Some(name) = update.name {
            next.name = name;
        }
        if let Some(scope) = update.scope {
            next.scope = scope;
        }
        if let Some(kind) = update.kind {
            next.kind = kind;
        }
        if let Some(title) = update.title {
            next.title = title;
        }
        if let Some(message_suffix) = update.message_suffix {
            next.message_suffix = message_suffix;
        }
        if let Some(cta_text) = update.cta_text {
            next.cta_text = cta_text;
        }
        if let Some(cta_kind) = update.cta_kind {
            next.cta_kind = cta_kind;
        }
        if let Some(image) = update.image {
            next.image = image;
        }

        if should_unpublish(self, &next) {
            next.published = false;
        }
        if next != *self {
            next.updated_at = now;
        }
        next
    }

    /// Mark the widget published.
    ///
    /// `updated_at` only moves when the flag actually changes.
    pub fn publish(&mut self, now: DateTime<Utc>) {
        if !self.published {
            self.published = true;
            self.updated_at = now;
        }
    }

    /// Soft-delete. Deleted widgets are never selected.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(now);
            self.updated_at = now;
        }
    }

    /// An unpublished copy with a fresh id and the same targeting.
    pub fn duplicate(&self, now: DateTime<Utc>) -> Widget {
        Widget {
            id: WidgetId::generate(),
            name: format!("{} (copy)", self.name),
            published: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            ..self.clone()
        }
    }

    /// Save-time validation. All problems are collected.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(FieldError::Required { field: "name" });
        }
        check_length(&mut errors, "name", Some(&self.name), MAX_NAME_LEN);
        check_length(&mut errors, "title", self.title.as_deref(), MAX_TITLE_LEN);
        check_length(
            &mut errors,
            "message_suffix",
            self.message_suffix.as_deref(),
            MAX_MESSAGE_SUFFIX_LEN,
        );
        check_length(&mut errors, "cta_text", self.cta_text.as_deref(), MAX_CTA_TEXT_LEN);

        match &self.image {
            ImageConfig::CustomImage { url } if url.trim().is_empty() => {
                errors.push(FieldError::Required { field: "custom_image_url" });
            }
            ImageConfig::Icon { name, .. } if name.trim().is_empty() => {
                errors.push(FieldError::Required { field: "icon_name" });
            }
            _ => {}
        }

        for (field, value) in [
            ("title", &self.title),
            ("message_suffix", &self.message_suffix),
            ("cta_text", &self.cta_text),
        ] {
            if let Some(text) = value {
                let template_errors = template::validate(text);
                if !template_errors.is_empty() {
                    errors.push(FieldError::Template {
                        field,
                        errors: template_errors,
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// Kind-specific headline number for a product.
    pub fn widget_data(&self, stats: &ProductStats) -> WidgetData {
        let (number, number_text) = match self.kind {
            WidgetKind::Purchases => (stats.purchases_last_24h, "purchases in the last 24 hours"),
            WidgetKind::Memberships => (stats.active_memberships, "total members"),
        };
        WidgetData {
            title: self.title.clone(),
            message_suffix: self.message_suffix.clone(),
            cta_text: self.cta_text.clone(),
            number,
            number_text,
        }
    }
}

fn check_length(errors: &mut Vec<FieldError>, field: &'static str, value: Option<&str>, max: usize) {
    if let Some(value) = value {
        let actual = value.chars().count();
        if actual > max {
            errors.push(FieldError::TooLong { field, max, actual });
        }
    }
}

/// Counts the commerce side provides for [`Widget::widget_data`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStats {
    pub purchases_last_24h: u64,
    pub active_memberships: u64,
}

/// Dashboard preview of a widget: raw text fields plus its headline number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetData {
    pub title: Option<String>,
    pub message_suffix: Option<String>,
    pub cta_text: Option<String>,
    pub number: u64,
    pub number_text: &'static str,
}

/// A single save-time problem.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldError {
    #[error("{field} must be present")]
    Required { field: &'static str },

    #[error("{field} is too long ({actual} characters, maximum is {max})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("{field} has template errors: {}", join_template_errors(.errors))]
    Template {
        field: &'static str,
        errors: Vec<TemplateError>,
    },
}

fn join_template_errors(errors: &[TemplateError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Every problem found while validating a widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    /// Problems in the order they were found.
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Template errors reported for one field, if any.
    pub fn template_errors(&self, field: &str) -> Option<&[TemplateError]> {
        self.0.iter().find_map(|e| match e {
            FieldError::Template { field: f, errors } if *f == field => Some(errors.as_slice()),
            _ => None,
        })
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()
    }

    fn published_widget() -> Widget {
        let mut widget = apply_defaults(
            NewWidget {
                seller_id: SellerId::new("seller-1"),
                name: "Community".to_string(),
                title: Some("Join {{total_sales}} members today!".to_string()),
                ..Default::default()
            },
            now(),
        );
        widget.publish(now());
        widget
    }

    #[test]
    fn test_apply_defaults_fills_unset_fields() {
        let widget = apply_defaults(
            NewWidget {
                seller_id: SellerId::new("seller-1"),
                name: "Defaults".to_string(),
                image: Some(ImageConfig::Icon {
                    name: "solid-fire".to_string(),
                    color: String::new(),
                }),
                ..Default::default()
            },
            now(),
        );

        assert!(!widget.published);
        assert_eq!(widget.kind, WidgetKind::Purchases);
        assert_eq!(widget.cta_kind, CtaKind::None);
        assert!(widget.is_universal());
        assert_eq!(
            widget.image,
            ImageConfig::Icon {
                name: "solid-fire".to_string(),
                color: DEFAULT_ICON_COLOR.to_string()
            }
        );
    }

    #[test]
    fn test_apply_defaults_keeps_explicit_values() {
        let widget = apply_defaults(
            NewWidget {
                seller_id: SellerId::new("seller-1"),
                name: "Members".to_string(),
                kind: Some(WidgetKind::Memberships),
                cta_kind: Some(CtaKind::Button),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(widget.kind, WidgetKind::Memberships);
        assert_eq!(widget.cta_kind, CtaKind::Button);
    }

    #[test]
    fn test_content_edit_unpublishes() {
        let widget = published_widget();
        let edited = widget.apply_update(
            WidgetUpdate {
                title: Some(Some("New title".to_string())),
                ..Default::default()
            },
            now() + Duration::minutes(5),
        );
        assert!(!edited.published);
        assert_eq!(edited.updated_at, now() + Duration::minutes(5));
    }

    #[test]
    fn test_link_set_edit_unpublishes() {
        let mut widget = published_widget();
        widget.scope = WidgetScope::product_specific(["p1"]);

        let edited = widget.apply_update(
            WidgetUpdate {
                scope: Some(WidgetScope::product_specific(["p1", "p2"])),
                ..Default::default()
            },
            now(),
        );
        assert!(!edited.published);
    }

    #[test]
    fn test_noop_edit_keeps_widget_live() {
        let widget = published_widget();
        let edited = widget.apply_update(
            WidgetUpdate {
                name: Some("Community".to_string()),
                ..Default::default()
            },
            now() + Duration::minutes(5),
        );
        assert!(edited.published);
        assert_eq!(edited.updated_at, widget.updated_at);
    }

    #[test]
    fn test_unpublished_widget_stays_unpublished_without_flagging() {
        let mut widget = published_widget();
        widget.published = false;
        let edited = widget.apply_update(
            WidgetUpdate {
                kind: Some(WidgetKind::Memberships),
                ..Default::default()
            },
            now(),
        );
        assert!(!should_unpublish(&widget, &edited));
        assert!(!edited.published);
    }

    #[test]
    fn test_duplicate_is_unpublished_copy() {
        let mut widget = published_widget();
        widget.scope = WidgetScope::product_specific(["p1"]);
        let copy = widget.duplicate(now());

        assert_ne!(copy.id, widget.id);
        assert_eq!(copy.name, "Community (copy)");
        assert!(!copy.published);
        assert_eq!(copy.scope, widget.scope);
    }

    #[test]
    fn test_validate_rejects_unknown_template_variable() {
        let mut widget = published_widget();
        widget.title = Some("{{unknown_var}}".to_string());

        let errors = widget.validate().unwrap_err();
        assert_eq!(
            errors.template_errors("title"),
            Some(
                &[TemplateError::UnknownVariable {
                    names: vec!["unknown_var".to_string()]
                }][..]
            )
        );
    }

    #[test]
    fn test_validate_collects_field_errors() {
        let mut widget = published_widget();
        widget.name = "  ".to_string();
        widget.title = Some("x".repeat(51));
        widget.image = ImageConfig::CustomImage { url: String::new() };

        let errors = widget.validate().unwrap_err();
        assert!(errors.errors().contains(&FieldError::Required { field: "name" }));
        assert!(errors.errors().contains(&FieldError::TooLong {
            field: "title",
            max: 50,
            actual: 51
        }));
        assert!(errors
            .errors()
            .contains(&FieldError::Required { field: "custom_image_url" }));
    }

    #[test]
    fn test_widget_data_by_kind() {
        let mut widget = published_widget();
        let stats = ProductStats {
            purchases_last_24h: 7,
            active_memberships: 120,
        };
        assert_eq!(widget.widget_data(&stats).number, 7);

        widget.kind = WidgetKind::Memberships;
        let data = widget.widget_data(&stats);
        assert_eq!(data.number, 120);
        assert_eq!(data.number_text, "total members");
    }
}
