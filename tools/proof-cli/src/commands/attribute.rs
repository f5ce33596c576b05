//! Replay recorded clicks and purchases through attribution.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use proof_core::analytics::{WidgetAnalytics, WidgetEvent};
use proof_core::attribution::AttributionCandidate;
use proof_service::{AnalyticsReporter, AttributionPipeline, EventTracker, ValidationReport};
use proof_store::AttributionStore;
use serde::Serialize;

use super::{parse_now, AttributeArgs};
use crate::context::Context;
use crate::fixture::Fixture;
use crate::output::status_badge;

#[derive(Debug, Serialize)]
struct AttributionOutcome {
    report: ValidationReport,
    /// Clicks that named a purchase missing from the fixture.
    skipped: usize,
    candidates: Vec<AttributionCandidate>,
    widgets: Vec<WidgetAnalytics>,
}

/// Run the attribute command.
pub async fn run(args: AttributeArgs, ctx: &Context) -> Result<()> {
    let now = parse_now(args.now.as_deref())?;
    let fixture = Fixture::load(&ctx.resolve_path(&args.fixture))?;
    let outcome = replay(&fixture, now, ctx).await?;

    if ctx.output.is_json() {
        ctx.output.json(&outcome);
        return Ok(());
    }

    ctx.output.header("Attribution candidates");
    if outcome.candidates.is_empty() {
        ctx.output.info("No purchase could be attributed");
    } else {
        ctx.output
            .table_row(&["PURCHASE", "WIDGET", "AMOUNT", "STATUS", "REASON"], &WIDTHS);
        for candidate in &outcome.candidates {
            let amount = candidate.attributed_amount.to_string();
            let status = status_badge(candidate.status);
            let reason = candidate.rejection_reason.map(|r| r.as_str()).unwrap_or("");
            ctx.output.table_row(
                &[
                    candidate.purchase_id.as_str(),
                    candidate.widget_id.as_str(),
                    &amount,
                    &status,
                    reason,
                ],
                &WIDTHS,
            );
        }
    }

    ctx.output.header("Revenue by widget");
    for analytics in &outcome.widgets {
        ctx.output.kv(
            analytics.widget_id.as_str(),
            &format!(
                "{} from {} purchase(s), {} per click",
                analytics.confirmed_revenue,
                analytics.attributed_purchases,
                analytics.revenue_per_click
            ),
        );
    }

    let report = &outcome.report;
    ctx.output.info("");
    ctx.output.success(&format!(
        "{} confirmed, {} rejected, {} awaiting a final purchase state",
        report.confirmed, report.rejected, report.deferred
    ));
    if report.failed > 0 {
        ctx.output
            .warn(&format!("{} candidate(s) could not be evaluated", report.failed));
    }
    if outcome.skipped > 0 {
        ctx.output
            .warn(&format!("{} click(s) refer to unknown purchases", outcome.skipped));
    }
    Ok(())
}

const WIDTHS: [usize; 5] = [14, 14, 10, 10, 28];

/// Count every click and record a candidate for its purchase, then
/// validate them all at `now`.
async fn replay(fixture: &Fixture, now: DateTime<Utc>, ctx: &Context) -> Result<AttributionOutcome> {
    let store = Arc::new(fixture.seed(now).await?);
    let pipeline = AttributionPipeline::new(Arc::clone(&store), Arc::clone(&store))
        .with_validator(ctx.config.attribution.validator());
    let tracker =
        EventTracker::new(Arc::clone(&store)).with_retry(ctx.config.counters.retry_policy());

    let mut skipped = 0;
    let mut recorded = Vec::new();
    for click in &fixture.clicks {
        if let Err(e) = tracker.track(&click.widget_id, WidgetEvent::Click).await {
            ctx.output
                .warn(&format!("Click on {} not counted: {}", click.widget_id, e));
        }
        let Some(purchase) = fixture.purchase(&click.purchase_id) else {
            ctx.output
                .debug(&format!("No purchase {} in fixture", click.purchase_id));
            skipped += 1;
            continue;
        };
        match pipeline
            .record_purchase(Some(&click.context()), purchase, purchase.created_at)
            .await
        {
            Ok(Some(candidate)) => recorded.push(candidate.id),
            Ok(None) => ctx.output.debug(&format!(
                "Nothing to attribute for purchase {}",
                purchase.id
            )),
            Err(e) => ctx
                .output
                .warn(&format!("Purchase {} not attributed: {}", purchase.id, e)),
        }
    }

    let report = pipeline.validate_pending(now).await?;

    let mut candidates = Vec::with_capacity(recorded.len());
    for id in &recorded {
        if let Some(candidate) = store.get_candidate(id).await? {
            candidates.push(candidate);
        }
    }

    let reporter = AnalyticsReporter::new(Arc::clone(&store), Arc::clone(&store));
    let mut widgets = Vec::new();
    for widget in &fixture.widgets {
        if candidates.iter().any(|c| c.widget_id == widget.id) {
            widgets.push(reporter.widget_analytics(&widget.id).await?);
        }
    }

    Ok(AttributionOutcome {
        report,
        skipped,
        candidates,
        widgets,
    })
}
