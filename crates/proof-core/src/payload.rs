//! What the storefront receives for each selected widget.

use serde::{Deserialize, Serialize};

use crate::ids::WidgetId;
use crate::template::{self, TemplateContext};
use crate::widget::{CtaKind, ImageConfig, Widget};

/// Render payload for one widget.
///
/// Template fields are rendered against the visitor's context; a field that
/// references a variable absent from the context keeps its placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetRenderPayload {
    pub id: WidgetId,
    pub title: Option<String>,
    pub rendered_message: Option<String>,
    pub cta_text: Option<String>,
    pub cta_kind: CtaKind,
    pub image_config: ImageConfig,
}

impl WidgetRenderPayload {
    /// Render every text field of `widget` against `context`.
    ///
    /// Fields the widget leaves unset stay `None`.
    pub fn render(widget: &Widget, context: &TemplateContext) -> Self {
        let render = |field: &Option<String>| {
            field
                .as_deref()
                .map(|text| template::render(text, context))
        };

        Self {
            id: widget.id.clone(),
            title: render(&widget.title),
            rendered_message: render(&widget.message_suffix),
            cta_text: if widget.cta_kind.has_cta() {
                render(&widget.cta_text)
            } else {
                None
            },
            cta_kind: widget.cta_kind,
            image_config: widget.image.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SellerId;
    use crate::template::TemplateVariable;
    use crate::widget::{apply_defaults, NewWidget};
    use chrono::Utc;

    fn widget(cta_kind: CtaKind) -> Widget {
        apply_defaults(
            NewWidget {
                seller_id: SellerId::new("s1"),
                name: "Buyers".to_string(),
                title: Some("{{customer_name}} from {{country}}".to_string()),
                message_suffix: Some("bought {{product_name}} {{recent_sale_time}}".to_string()),
                cta_text: Some("Get {{product_name}}".to_string()),
                cta_kind: Some(cta_kind),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_payload_renders_fields() {
        let ctx = TemplateContext::new()
            .with(TemplateVariable::CustomerName, "Sarah M.")
            .with(TemplateVariable::Country, "Canada")
            .with(TemplateVariable::ProductName, "Rust Course");
        let payload = WidgetRenderPayload::render(&widget(CtaKind::Button), &ctx);

        assert_eq!(payload.title.as_deref(), Some("Sarah M. from Canada"));
        assert_eq!(
            payload.rendered_message.as_deref(),
            Some("bought Rust Course {{recent_sale_time}}")
        );
        assert_eq!(payload.cta_text.as_deref(), Some("Get Rust Course"));
        assert_eq!(payload.cta_kind, CtaKind::Button);
    }

    #[test]
    fn test_payload_without_cta() {
        let payload = WidgetRenderPayload::render(&widget(CtaKind::None), &TemplateContext::new());
        assert_eq!(payload.cta_text, None);
        assert_eq!(payload.title.as_deref(), Some("{{customer_name}} from {{country}}"));
    }

    #[test]
    fn test_payload_serializes_image_config() {
        let payload = WidgetRenderPayload::render(&widget(CtaKind::Link), &TemplateContext::new());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["cta_kind"], "link");
        assert!(json.get("image_config").is_some());
    }
}
