use clap::{Parser, Subcommand};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod config;

use config::{Config, LoggingConfig, MetricsConfig};

#[derive(Parser)]
#[command(name = "pulse", about = "Commit activity timelines")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the timeline API
    TimelineApi {
        #[arg(long)]
        config_path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        CliCommand::TimelineApi { config_path } => run_timeline_api(config_path),
    };

    if let Err(e) = result {
        eprintln!("pulse: {e}");
        std::process::exit(1);
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("config has no timeline_api section")]
    MissingSection,
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    TimelineApi(#[from] timeline_api::errors::TimelineApiError),
}

fn run_timeline_api(config_path: &std::path::Path) -> Result<(), CliError> {
    let config = Config::from_file(config_path)?;
    let _sentry = init_logging(config.common.logging.as_ref());
    if let Some(metrics) = &config.common.metrics {
        init_metrics(metrics)?;
    }
    let timeline_api_config = config.timeline_api.ok_or(CliError::MissingSection)?;

    tracing::info!(config = %config_path.display(), "starting timeline api");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(timeline_api::run(timeline_api_config))?;
    Ok(())
}

/// Installs the global subscriber. The returned guard flushes Sentry on drop.
fn init_logging(logging: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let guard = logging.map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                environment: logging.environment.clone().map(Into::into),
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    guard
}

fn init_metrics(metrics: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(metrics.statsd_host.as_str(), metrics.statsd_port)
        .build(Some(metrics.prefix.as_str()))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    shared::metrics_defs::describe_all(timeline::metrics_defs::ALL_METRICS);
    shared::metrics_defs::describe_all(timeline_api::metrics_defs::ALL_METRICS);
    Ok(())
}
