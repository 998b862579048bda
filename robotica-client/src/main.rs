use std::path::PathBuf;

use clap::{Parser, Subcommand};
use robotica_client::{
    Config, DataAccessService, HistoryLoader, HttpTransport, LoadOutcome,
};
use robotica_core::{NormalizedAnalysis, TimeWindow, extract_preview, extract_title};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "robotica")]
#[command(about = "Sensor telemetry and AI analysis client")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "robotica.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the latest sensor readings
    Sensors {
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// Run a new AI analysis over the latest readings
    Analyze,
    /// List past analyses
    History {
        /// Defaults to `history.default_limit`
        #[arg(short, long)]
        limit: Option<usize>,
        /// recent, day, week or all; defaults to `history.window`
        #[arg(short, long)]
        window: Option<TimeWindow>,
    },
    /// Show one analysis
    Show { id: i64 },
    /// List the available analysis models
    Models,
    /// Switch the active analysis model
    UseModel {
        name: String,
        /// Ask the service to download the model first
        #[arg(long)]
        download: bool,
    },
}

#[derive(Serialize)]
struct HistoryEntry<'a> {
    title: String,
    preview: String,
    #[serde(flatten)]
    analysis: &'a NormalizedAnalysis,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "robotica_client=info,robotica_core=info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        Config::default()
    };

    let transport = HttpTransport::from_config(&config.api)?;
    let service = DataAccessService::with_policy(transport, config.service.degradation);

    match cli.command {
        Command::Sensors { limit } => {
            print_json(&service.fetch_sensor_readings(limit).await)?;
        }
        Command::Analyze => {
            info!("Requesting analysis, this can take up to a minute");
            print_json(&service.trigger_analysis().await)?;
        }
        Command::History { limit, window } => {
            let limit = limit.unwrap_or(config.history.default_limit);
            let window = window.unwrap_or(config.history.window);
            let loader = HistoryLoader::with_deadline(service.clone(), config.history.load_timeout());

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            match loader.load(limit, window, &cancel).await {
                LoadOutcome::Loaded { .. } => {
                    let view = loader.view().await;
                    let entries: Vec<_> = view
                        .items
                        .iter()
                        .map(|analysis| HistoryEntry {
                            title: extract_title(analysis),
                            preview: extract_preview(analysis),
                            analysis,
                        })
                        .collect();
                    print_json(&entries)?;
                }
                LoadOutcome::Cancelled => info!("History load cancelled"),
                outcome => {
                    let view = loader.view().await;
                    color_eyre::eyre::bail!(
                        "history unavailable: {}",
                        view.error.unwrap_or_else(|| format!("{outcome:?}"))
                    );
                }
            }
        }
        Command::Show { id } => {
            print_json(&service.fetch_analysis_by_id(id).await?)?;
        }
        Command::Models => {
            print_json(&service.list_models().await)?;
        }
        Command::UseModel { name, download } => {
            print_json(&service.select_model(&name, download).await?)?;
        }
    }

    if service.is_degraded() {
        warn!(base_url = %config.api.base_url, "Service unreachable, output is demo data");
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> color_eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
