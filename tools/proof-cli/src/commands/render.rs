//! Render a template with ad-hoc variables.

use std::collections::BTreeMap;

use anyhow::{bail, Context as _, Result};
use proof_core::template::{self, TemplateContext, TemplateVariable};

use super::RenderArgs;
use crate::context::Context;

/// Run the render command.
pub async fn run(args: RenderArgs, ctx: &Context) -> Result<()> {
    let errors = template::validate(&args.template);
    if let Some(first) = errors.first() {
        bail!("Template is invalid: {}", first);
    }

    let context = parse_context(&args.context)?;
    for variable in template::referenced_variables(&args.template) {
        if context.get(variable).is_none() {
            ctx.output
                .debug(&format!("{} has no value and is left as is", variable.placeholder()));
        }
    }

    let rendered = template::render(&args.template, &context);
    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "rendered": rendered }));
    } else {
        println!("{}", rendered);
    }
    Ok(())
}

/// Parse a JSON object of variable values. Non-string values are rendered
/// as their JSON text; unknown keys are reported and dropped.
fn parse_context(raw: &str) -> Result<TemplateContext> {
    let values: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(raw).context("--context must be a JSON object")?;

    let unknown: Vec<&str> = values
        .keys()
        .map(String::as_str)
        .filter(|k| TemplateVariable::from_key(k).is_none())
        .collect();
    if !unknown.is_empty() {
        tracing::warn!(keys = ?unknown, "ignoring unknown context keys");
    }

    Ok(TemplateContext::from_pairs(values.into_iter().map(|(k, v)| {
        let text = match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        (k, text)
    })))
}
