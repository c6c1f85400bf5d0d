//! # Datumkit CLI
//!
//! Command-line interface for validating input specs and stepping through
//! the datums they produce against a local directory store.
//!
//! ## Commands
//!
//! - `datumkit validate <spec>` - Check a spec without touching the store
//! - `datumkit mount <spec>` - Mount a spec and show the first datum
//! - `datumkit list <spec>` - Print every datum a spec produces
//! - `datumkit browse <spec>` - Step through datums interactively
//! - `datumkit config` - Show or initialize the configuration file
//!
//! ## Example Usage
//!
//! ```bash
//! # Store layout: <root>/<project>/<repo>/<branch>/...
//! datumkit --store ./repos list spec.json
//!
//! # Read the spec from stdin, emit JSON
//! echo '{"pfs": {"repo": "images", "glob": "/*"}}' | datumkit list - -o json
//! ```

mod app;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Datumkit - Datum specification and enumeration engine
#[derive(Parser)]
#[command(name = "datumkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store root directory (overrides the configuration)
    #[arg(short, long, global = true, env = "DATUMKIT_STORE")]
    store: Option<PathBuf>,

    /// Datums computed per page (overrides the configuration)
    #[arg(long, global = true)]
    page_size: Option<usize>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a spec for structural errors
    Validate {
        /// Spec file ("-" for stdin)
        spec: PathBuf,
    },

    /// Mount a spec and show the first datum
    Mount {
        /// Spec file ("-" for stdin)
        spec: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Print the datums a spec produces
    List {
        /// Spec file ("-" for stdin)
        spec: PathBuf,

        /// Maximum number of datums to print (0 = all)
        #[arg(short, long, default_value = "0")]
        limit: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Step through datums interactively
    #[command(alias = "b")]
    Browse {
        /// Spec file
        spec: PathBuf,
    },

    /// Show or initialize the configuration file
    Config {
        /// Write the default configuration if no file exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Default filter when RUST_LOG is unset: flags win over the configured level.
fn log_filter(verbose: u8, quiet: bool, configured: &str) -> String {
    if quiet {
        return "error".to_string();
    }
    match verbose {
        0 => configured.to_string(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => datumkit_core::Config::default_config_path()?,
    };
    let mut config = datumkit_core::Config::load_from(&config_path)?;

    // Setup logging
    let log_level = log_filter(cli.verbose, cli.quiet, &config.general.log_level);
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    if let Some(root) = cli.store {
        config.store.root = Some(root);
    }
    if let Some(page_size) = cli.page_size {
        anyhow::ensure!(page_size > 0, "--page-size must be at least 1");
        config.session.page_size = page_size;
    }

    // Execute command
    match cli.command {
        Commands::Validate { spec } => commands::validate::run(config, &spec),
        Commands::Mount { spec, output } => commands::mount::run(config, &spec, output),
        Commands::List {
            spec,
            limit,
            output,
        } => commands::list::run(config, &spec, limit, output),
        Commands::Browse { spec } => commands::browse::run(config, &spec),
        Commands::Config { init } => commands::config::run(config, &config_path, init),
    }
}
