//! Command line interface.

mod commands;
mod helpers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions, Settings};

#[derive(Parser)]
#[command(name = "proedge-export")]
#[command(about = "Export ProEdge sections through an authenticated Chromium session")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Export directory (overrides config and PROEDGE_EXPORT_DIR)
    #[arg(long, global = true)]
    export_dir: Option<PathBuf>,

    /// DevTools endpoint of the running browser (overrides PROEDGE_CDP_URL)
    #[arg(long, global = true)]
    cdp_url: Option<String>,

    /// Site root URL (overrides PROEDGE_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every configured section (default)
    Export,

    /// Regenerate csv/ from the data/*.json of an earlier export
    Csv,

    /// Print the resolved section list
    Sections,
}

impl Cli {
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(ref dir) = self.export_dir {
            settings.export_dir = dir.clone();
        }
        if let Some(ref url) = self.cdp_url {
            settings.cdp_url = url.clone();
        }
        if let Some(ref url) = self.base_url {
            settings.base_url = url.clone();
        }
    }
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config.clone(),
    };
    let (mut settings, _config) = load_settings_with_options(options)
        .await
        .map_err(anyhow::Error::msg)?;
    cli.apply_overrides(&mut settings);

    match cli.command.unwrap_or(Commands::Export) {
        Commands::Export => commands::export::cmd_export(settings).await,
        Commands::Csv => commands::csv_cmd::cmd_csv(&settings),
        Commands::Sections => commands::sections::cmd_sections(&settings),
    }
}
