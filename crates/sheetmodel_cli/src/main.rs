//! Command-line entry point.
//!
//! # Responsibility
//! - Convert model files between grid backends without a schema.
//! - Expose health probes for quick local sanity checks.

use clap::{Parser, Subcommand};
use log::{error, info};
use sheetmodel_core::workbook::{self, WorkbookStyle};
use sheetmodel_core::SheetModelConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sheetmodel")]
#[command(about = "Convert and inspect worksheet-backed object models")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for rotated log files; overrides the config
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy every worksheet of SOURCE to DESTINATION
    Convert {
        source: String,
        destination: String,

        /// Sheets to write first, in this order
        #[arg(long = "sheet")]
        sheets: Vec<String>,
    },

    /// Print `pong`
    Ping,

    /// Print the core version
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };
    if config.logging.log_dir.is_some() {
        if let Err(message) = sheetmodel_core::init_logging(&config.logging) {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    }

    match cli.command {
        Commands::Convert {
            source,
            destination,
            sheets,
        } => match workbook::convert(&source, &destination, &sheets, &WorkbookStyle::new()) {
            Ok(()) => {
                info!("event=cli_convert module=cli status=ok source={source} destination={destination}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!("event=cli_convert module=cli status=error error={err}");
                eprintln!("{err}");
                ExitCode::FAILURE
            }
        },
        Commands::Ping => {
            println!("{}", sheetmodel_core::ping());
            ExitCode::SUCCESS
        }
        Commands::Version => {
            println!("{}", sheetmodel_core::core_version());
            ExitCode::SUCCESS
        }
    }
}

fn load_config(cli: &Cli) -> Result<SheetModelConfig, String> {
    let mut config = match &cli.config {
        Some(path) => SheetModelConfig::from_path(path).map_err(|err| err.to_string())?,
        None => SheetModelConfig::default(),
    };
    if let Some(log_dir) = &cli.log_dir {
        let mut dir = PathBuf::from(log_dir);
        if dir.is_relative() {
            let cwd = std::env::current_dir().map_err(|err| err.to_string())?;
            dir = cwd.join(dir);
        }
        config.logging.log_dir = Some(dir.display().to_string());
        config.validate().map_err(|err| err.to_string())?;
    }
    Ok(config)
}
