//! CLI entry point for the asset codification pipeline.
//!
//! Provides one-shot classification against a prepared catalog index and a
//! command for inspecting the active configuration. All pipeline logic
//! lives in the library; this file only parses arguments and renders
//! results.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use codara::{ClassificationResult, Codifier, Settings};
use console::style;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Asset classification system
#[derive(Parser)]
#[command(
    name = "codara",
    version = env!("CARGO_PKG_VERSION"),
    about = "Classify asset descriptions against a supply catalog",
    long_about = "Classify free-text asset descriptions into catalog item codes \
                  using keyword extraction, vector retrieval, and arbitration.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Classify one asset description
    #[command(
        about = "Classify a free-text asset description",
        after_help = "Examples:\n  codara codify \"Boeing 737 aircraft engine turbine blade\"\n  codara codify --json \"hydraulic pump for excavator\" | jq .item_code"
    )]
    Codify {
        /// Free-text description of the asset
        description: String,

        /// Emit the raw JSON result instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings from .codara/settings.toml")]
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        Settings::load_from(config_path).unwrap_or_else(|e| {
            eprintln!(
                "Configuration error loading from {}: {}",
                config_path.display(),
                e
            );
            std::process::exit(1);
        })
    } else {
        Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            Settings::default()
        })
    };

    match cli.command {
        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            match toml::to_string_pretty(&config) {
                Ok(toml_str) => println!("{toml_str}"),
                Err(e) => eprintln!("Error displaying config: {e}"),
            }
        }

        Commands::Codify { description, json } => {
            let codifier = match Codifier::from_settings(config) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Error: {e}");
                    for suggestion in e.recovery_suggestions() {
                        eprintln!("  {suggestion}");
                    }
                    std::process::exit(1);
                }
            };

            let result = codifier.codify(&description).await;

            if json {
                match serde_json::to_string_pretty(&result) {
                    Ok(out) => println!("{out}"),
                    Err(e) => {
                        eprintln!("Error serializing result: {e}");
                        std::process::exit(1);
                    }
                }
            } else {
                render_result(&result);
            }

            if !result.success {
                std::process::exit(1);
            }
        }
    }
}

/// Renders a classification result for terminal reading.
fn render_result(result: &ClassificationResult) {
    println!("{}", style("Classification Result").cyan().bold());
    println!("{}", "=".repeat(50));
    println!("Query: {}", result.query);

    match &result.classification {
        Some(c) => {
            println!("Item code:    {}", style(c.item_code).green().bold());
            println!("Name:         {}", c.name);
            println!(
                "Supply class: {} (group {}, class {})",
                c.supply_class_display, c.supply_group, c.supply_class
            );
            println!("Confidence:   {}", styled_confidence(c.confidence));
            println!("Reasoning:    {}", c.reasoning);
            println!();
            println!("Definition:");
            println!("  {}", c.definition);
            if !c.definition_translated.is_empty() {
                println!("  {}", c.definition_translated);
            }
            if !c.reasoning_translated.is_empty() {
                println!();
                println!("Reasoning (translated):");
                println!("  {}", c.reasoning_translated);
            }
        }
        None => {
            let message = result.error.as_deref().unwrap_or("unknown error");
            println!("Status: {}", style("FAILED").red().bold());
            println!("Error:  {message}");
        }
    }
}

fn styled_confidence(confidence: f32) -> String {
    let text = format!("{confidence:.2}");
    if confidence >= 0.8 {
        style(text).green().to_string()
    } else if confidence >= 0.5 {
        style(text).yellow().to_string()
    } else {
        style(text).red().to_string()
    }
}
