//! `stage-tracker`: inspect, watch and regenerate per-file processing stages.
//!
//! Usage:
//!   stage-tracker status <file>
//!   stage-tracker watch <file> --stage graph
//!   stage-tracker regenerate <file> --stage vector
//!   stage-tracker init-config [path]

mod app;
mod config;
mod logging;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracker_core::{DisplayState, FileHandle, StageKind};
use tracker_logging::tracker_warn;

use crate::app::App;
use crate::config::{TrackerConfig, DEFAULT_CONFIG_FILENAME};

#[derive(Parser)]
#[command(
    name = "stage-tracker",
    version,
    about = "Track storage, vector and graph processing stages of uploaded files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to the RON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Backend base URL, overriding the config file
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Poll interval in milliseconds (clamped to 500..=3000)
    #[arg(long, global = true)]
    interval_ms: Option<u64>,
    /// Log level: error, warn, info, debug or trace
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every stage of a file once
    Status {
        /// File identifier as known to the backend
        file: String,
    },
    /// Poll one stage until it becomes available
    Watch {
        file: String,
        /// Stage to watch: storage, vector or graph
        #[arg(long, short)]
        stage: StageKind,
    },
    /// Request regeneration of one stage and follow the job
    Regenerate {
        file: String,
        #[arg(long, short)]
        stage: StageKind,
    },
    /// Write a config file with the default settings
    InitConfig {
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path, force } = &cli.command {
        let path = path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME));
        if path.exists() && !force {
            bail!("{} already exists; pass --force to overwrite", path.display());
        }
        TrackerConfig::default().save(&path)?;
        println!("wrote {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_config(&cli)?;
    logging::initialize(config.level_filter(), config.log_file.as_deref());
    if tracker_logging::parse_level(&config.log_level).is_none() {
        tracker_warn!("unknown log level {:?}, using info", config.log_level);
    }

    let mut app = App::new(&config)?;
    let outcome = match cli.command {
        Commands::Status { file } => {
            app.status(&FileHandle::new(file)).await?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Watch { file, stage } => app.watch(&FileHandle::new(file), stage).await?,
        Commands::Regenerate { file, stage } => {
            app.regenerate(&FileHandle::new(file), stage).await?
        }
        Commands::InitConfig { .. } => return Ok(ExitCode::SUCCESS),
    };
    Ok(exit_code(&outcome))
}

fn load_config(cli: &Cli) -> Result<TrackerConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME));
    let mut config = TrackerConfig::load(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.poll_interval_ms = interval_ms;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn exit_code(display: &DisplayState) -> ExitCode {
    match display {
        DisplayState::Failed(_) | DisplayState::TimedOut => ExitCode::from(2),
        _ => ExitCode::SUCCESS,
    }
}
