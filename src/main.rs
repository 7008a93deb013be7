//! CLI entry point for liquid2-rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use liquid2_rs::commands::{self, check, render::RenderOptions};

#[derive(Parser)]
#[command(name = "liquid2-rs")]
#[command(version)]
#[command(about = "Render Liquid templates with JSONPath-style variable queries", long_about = None)]
struct Cli {
    /// Load environment config from a YAML or TOML file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template and print the result
    #[command(alias = "r")]
    Render {
        /// Template file to render
        template: PathBuf,

        /// JSON or YAML file with render data
        #[arg(short = 'D', long)]
        data: Option<PathBuf>,

        /// Directory searched for included and extended templates
        #[arg(short, long)]
        templates: Option<PathBuf>,

        /// Write output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail on undefined variables
        #[arg(short, long)]
        strict: bool,
    },

    /// Parse every template in a directory and report syntax errors
    Check {
        /// Directory to check
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Template file extensions
        #[arg(short, long, value_delimiter = ',')]
        ext: Vec<String>,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "liquid2_rs=debug,info"
    } else {
        "liquid2_rs=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Render {
            template,
            data,
            templates,
            output,
            strict,
        } => {
            let options = RenderOptions {
                template,
                data,
                templates,
                config: cli.config,
                strict,
                output,
            };
            let rendered = commands::render::run(&options).await?;
            if options.output.is_none() {
                print!("{}", rendered);
            }
        }

        Commands::Check { dir, ext } => {
            let extensions: Vec<&str> = if ext.is_empty() {
                check::TEMPLATE_EXTENSIONS.to_vec()
            } else {
                ext.iter().map(|e| e.trim_start_matches('.')).collect()
            };
            let report = check::run(&dir, &extensions, cli.config.as_deref())?;
            for (name, err) in &report.errors {
                eprintln!("{}: {}", name, err);
            }
            println!("{}", report.summary());
            if !report.is_ok() {
                std::process::exit(1);
            }
        }

        Commands::Version => {
            println!("liquid2-rs version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
