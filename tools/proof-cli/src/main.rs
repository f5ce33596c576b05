//! Proof CLI - offline tooling for social proof widgets.
//!
//! Commands:
//! - `proof validate` - Check a widget template
//! - `proof render` - Render a template against a context
//! - `proof select` - Show which widgets a product page would render
//! - `proof attribute` - Replay clicks and purchases through attribution
//! - `proof config` - Inspect configuration

mod commands;
mod config;
mod context;
mod fixture;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use proof_observability::LogLevel;

use commands::{AttributeArgs, ConfigArgs, RenderArgs, SelectArgs, ValidateArgs};

/// Proof CLI - check templates and replay widget attribution offline
#[derive(Parser)]
#[command(name = "proof")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a widget template
    Validate(ValidateArgs),

    /// Render a template with the given variables
    Render(RenderArgs),

    /// List the widgets a product page would show
    Select(SelectArgs),

    /// Replay clicks and purchases from a fixture through attribution
    Attribute(AttributeArgs),

    /// Inspect configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose, cli.json);

    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    let mut logging = ctx.config.logging.clone();
    if cli.verbose {
        logging = logging.with_level(LogLevel::Debug);
    }
    if let Err(e) = proof_observability::init_tracing(&logging) {
        ctx.output.warn(&format!("Logging disabled: {}", e));
    }

    let result = match cli.command {
        Commands::Validate(args) => commands::validate::run(args, &ctx).await,
        Commands::Render(args) => commands::render::run(args, &ctx).await,
        Commands::Select(args) => commands::select::run(args, &ctx).await,
        Commands::Attribute(args) => commands::attribute::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
