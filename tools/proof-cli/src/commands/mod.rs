//! CLI command implementations.

pub mod attribute;
pub mod config;
pub mod render;
pub mod select;
pub mod validate;

use clap::{Args, Subcommand};

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Template text, e.g. "{{customer_name}} just bought {{product_name}}".
    pub template: String,
}

/// Arguments for the render command.
#[derive(Args)]
pub struct RenderArgs {
    /// Template text.
    #[arg(short, long)]
    pub template: String,

    /// Variables as a JSON object, e.g. '{"price": "$49.99"}'.
    #[arg(short, long, default_value = "{}")]
    pub context: String,
}

/// Arguments for the select command.
#[derive(Args)]
pub struct SelectArgs {
    /// Fixture file with products, widgets and purchases.
    #[arg(short, long)]
    pub fixture: String,

    /// Product whose page is being rendered.
    #[arg(short, long)]
    pub product: String,

    /// Render time as RFC 3339 (default: now).
    #[arg(long)]
    pub now: Option<String>,
}

/// Arguments for the attribute command.
#[derive(Args)]
pub struct AttributeArgs {
    /// Fixture file with widgets, purchases and the clicks behind them.
    #[arg(short, long)]
    pub fixture: String,

    /// Validation time as RFC 3339 (default: now).
    #[arg(long)]
    pub now: Option<String>,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration.
    Show,
    /// Write a default proof.toml in the working directory.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}

/// Parse an optional `--now` override.
pub(crate) fn parse_now(now: Option<&str>) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    use anyhow::Context as _;

    match now {
        Some(raw) => Ok(chrono::DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("Invalid --now timestamp: {}", raw))?
            .with_timezone(&chrono::Utc)),
        None => Ok(chrono::Utc::now()),
    }
}
