//! `ferry` entry point.

mod commands;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ferry_protocol::MediaKind;
use ferry_upload::UploadError;
use tracing_subscriber::EnvFilter;

use crate::commands::UploadArgs;
use crate::config::FerryConfig;

/// Exit status of a cancelled upload, as for SIGINT.
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "ferry", version, about = "Resumable chunked media uploads")]
struct Cli {
    /// Config file (default: <config dir>/ferry/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Control-plane endpoint (overrides the config file)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Session state directory (overrides the config file)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file, optionally resuming its persisted session
    Upload {
        file: PathBuf,

        /// Record id the session is persisted under
        #[arg(long)]
        id: String,

        /// photo or video
        #[arg(long)]
        kind: MediaKind,

        /// MIME type (default: inferred from the extension)
        #[arg(long)]
        content_type: Option<String>,

        /// File name reported to the control plane
        #[arg(long)]
        name: Option<String>,

        /// Continue the persisted session for this id, if any
        #[arg(long)]
        resume: bool,
    },
    /// List resumable uploads
    List,
    /// Show progress of one resumable upload
    Status {
        #[arg(long)]
        id: String,
    },
    /// Abort and forget a resumable upload
    Discard {
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (mut config, load_error) = match FerryConfig::load(cli.config.as_deref()) {
        Ok(c) => (c, None),
        Err(e) => (FerryConfig::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Some(e) = load_error {
        tracing::warn!(error = %e, "failed to load config, using defaults");
    }
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(dir) = cli.state_dir {
        config.state_dir = Some(dir);
    }

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(e.downcast_ref::<UploadError>(), Some(UploadError::Cancelled)) {
                tracing::info!("upload cancelled");
                return ExitCode::from(EXIT_CANCELLED);
            }
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &FerryConfig) -> anyhow::Result<()> {
    let orchestrator = commands::build_orchestrator(config)?;

    match command {
        Command::Upload {
            file,
            id,
            kind,
            content_type,
            name,
            resume,
        } => {
            if config.endpoint.is_empty() {
                anyhow::bail!("no control-plane endpoint configured; set `endpoint` or pass --endpoint");
            }
            let args = UploadArgs {
                file,
                id,
                kind,
                content_type,
                name,
                resume,
            };
            commands::upload(&orchestrator, args).await
        }
        Command::List => commands::list(&orchestrator).await,
        Command::Status { id } => commands::status(&orchestrator, &id).await,
        Command::Discard { id } => commands::discard(&orchestrator, &id).await,
    }
}
