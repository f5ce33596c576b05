//! Template validation.

use anyhow::{bail, Result};
use proof_core::template::{self, TemplateError};
use serde::Serialize;

use super::ValidateArgs;
use crate::context::Context;

#[derive(Serialize)]
struct ValidationOutput<'a> {
    template: &'a str,
    valid: bool,
    errors: &'a [TemplateError],
    variables: Vec<&'static str>,
}

/// Run the validate command.
pub async fn run(args: ValidateArgs, ctx: &Context) -> Result<()> {
    let errors = template::validate(&args.template);
    let variables = template::referenced_variables(&args.template)
        .iter()
        .map(|v| v.key())
        .collect();

    if ctx.output.is_json() {
        ctx.output.json(&ValidationOutput {
            template: &args.template,
            valid: errors.is_empty(),
            errors: &errors,
            variables,
        });
    } else if errors.is_empty() {
        ctx.output.success("Template is valid");
        for variable in variables {
            ctx.output.list_item(variable);
        }
    } else {
        for error in &errors {
            ctx.output.error(&format!("{}: {}", error.code(), error));
        }
    }

    if !errors.is_empty() {
        bail!("Template has {} error(s)", errors.len());
    }
    Ok(())
}
