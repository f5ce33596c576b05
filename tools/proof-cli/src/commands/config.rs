//! Configuration commands.

use anyhow::{bail, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::{self, generate_default_config};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { force } => init_config(force, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("source", &path.display().to_string()),
        None => ctx.output.kv("source", "defaults"),
    }
    ctx.output.info("");
    println!("{}", config::render(&ctx.config, false)?);
    Ok(())
}

async fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let path = ctx.cwd.join("proof.toml");
    if path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    std::fs::write(&path, generate_default_config())?;
    ctx.output.success(&format!("Created: {}", path.display()));
    Ok(())
}

/// Loading already rejected invalid values; this reports the softer issues.
async fn validate_config(ctx: &Context) -> Result<()> {
    let attribution = &ctx.config.attribution;
    let mut warnings = Vec::new();

    if attribution.cookie_lifetime_days < attribution.window_days {
        warnings.push(format!(
            "attribution.cookie_lifetime_days ({}) is shorter than window_days ({}); late purchases lose their click",
            attribution.cookie_lifetime_days, attribution.window_days
        ));
    }
    if ctx.config.context.recent_sales_window_hours > ctx.config.context.recent_sale_lookback_hours {
        warnings.push(
            "context.recent_sales_window_hours exceeds recent_sale_lookback_hours".to_string(),
        );
    }
    if ctx.config.counters.backoff_base_ms > ctx.config.counters.backoff_max_ms {
        warnings.push("counters.backoff_base_ms exceeds backoff_max_ms".to_string());
    }

    if ctx.output.is_json() {
        ctx.output
            .json(&serde_json::json!({ "valid": true, "warnings": warnings }));
        return Ok(());
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }
    if warnings.is_empty() {
        ctx.output.success("Configuration is valid");
    } else {
        ctx.output.success("Configuration is valid (with warnings)");
    }
    Ok(())
}
