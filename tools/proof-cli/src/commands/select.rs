//! Preview the widgets a product page would render.

use std::sync::Arc;

use anyhow::Result;
use proof_core::ids::ProductId;
use proof_core::payload::WidgetRenderPayload;
use proof_service::WidgetRenderer;

use super::{parse_now, SelectArgs};
use crate::context::Context;
use crate::fixture::Fixture;

/// Run the select command.
pub async fn run(args: SelectArgs, ctx: &Context) -> Result<()> {
    let now = parse_now(args.now.as_deref())?;
    let fixture = Fixture::load(&ctx.resolve_path(&args.fixture))?;
    let payloads = preview(&fixture, &ProductId::new(&args.product), now, ctx).await?;

    if ctx.output.is_json() {
        ctx.output.json(&payloads);
        return Ok(());
    }

    ctx.output.header(&format!("Widgets for product {}", args.product));
    if payloads.is_empty() {
        ctx.output.info("No widget would render on this page");
        return Ok(());
    }
    for payload in &payloads {
        ctx.output.info("");
        ctx.output.kv("id", payload.id.as_str());
        ctx.output.kv("title", payload.title.as_deref().unwrap_or("-"));
        ctx.output
            .kv("message", payload.rendered_message.as_deref().unwrap_or("-"));
        if let Some(cta) = &payload.cta_text {
            ctx.output.kv("cta", &format!("{} ({})", cta, payload.cta_kind.as_str()));
        }
    }
    Ok(())
}

async fn preview(
    fixture: &Fixture,
    product_id: &ProductId,
    now: chrono::DateTime<chrono::Utc>,
    ctx: &Context,
) -> Result<Vec<WidgetRenderPayload>> {
    let store = Arc::new(fixture.seed(now).await?);
    ctx.output.debug(&format!(
        "Loaded {} widget(s), {} product(s), {} purchase(s)",
        fixture.widgets.len(),
        fixture.products.len(),
        fixture.purchases.len()
    ));

    let renderer = WidgetRenderer::new(Arc::clone(&store), store)
        .with_context(ctx.config.context.clone());
    Ok(renderer.render_for_product(product_id, now).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::SAMPLE;
    use crate::output::Output;
    use chrono::{TimeZone, Utc};
    use proof_core::ids::WidgetId;
    use proof_service::ProofConfig;

    fn ctx() -> Context {
        Context {
            config: ProofConfig::default(),
            config_path: None,
            output: Output::new(false, true),
            cwd: std::env::temp_dir(),
        }
    }

    #[tokio::test]
    async fn test_preview_skips_deleted_widgets() {
        let fixture: Fixture = serde_json::from_str(SAMPLE).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 7, 3, 13, 0, 0).unwrap();

        let payloads = preview(&fixture, &ProductId::new("p1"), now, &ctx()).await.unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].id, WidgetId::new("w1"));
        assert_eq!(
            payloads[0].title.as_deref(),
            Some("Sarah M. bought Rust Course")
        );
    }

    #[tokio::test]
    async fn test_unknown_product_is_an_error() {
        let fixture: Fixture = serde_json::from_str(SAMPLE).unwrap();
        assert!(preview(&fixture, &ProductId::new("nope"), Utc::now(), &ctx())
            .await
            .is_err());
    }
}
