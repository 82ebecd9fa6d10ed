use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use videoslim::catalog::file::JsonFileCatalog;
use videoslim::cli::{Cli, Command, OutputFormat};
use videoslim::commands::{self, CommandReport};
use videoslim::core::config::AppConfig;
use videoslim::observability::metrics as obs_metrics;
use videoslim::reduce::{Reducer, ReducerSettings};
use videoslim::storage::s3::S3ObjectStore;

/// Exit code when the run completed but at least one video failed.
const EXIT_VIDEO_FAILURES: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration (layered: default.toml → {env}.toml → env vars)
    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    info!(version = env!("CARGO_PKG_VERSION"), "videoslim starting");

    // Recorder must be installed before any metrics are recorded.
    let metrics_handle = if config.observability.metrics_enabled {
        match obs_metrics::install_prometheus_recorder() {
            Ok(handle) => {
                obs_metrics::describe_all_metrics();
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "failed to install metrics recorder, continuing without metrics");
                None
            }
        }
    } else {
        None
    };

    let result = run(&cli, &config).await;

    if let (Some(handle), Some(path)) = (&metrics_handle, &config.observability.metrics_textfile) {
        match obs_metrics::write_textfile(handle, path) {
            Ok(()) => info!(path = %path.display(), "metrics snapshot written"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to write metrics snapshot"),
        }
    }

    match result {
        Ok(report) => {
            if let Err(e) = emit(&report, cli.output) {
                error!(error = %e, "failed to print report");
                return ExitCode::FAILURE;
            }
            if report.has_failures() {
                warn!("run finished with failures");
                ExitCode::from(EXIT_VIDEO_FAILURES)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            let message = format!("{e:#}");
            error!(error = %message, "run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config: &AppConfig) -> anyhow::Result<CommandReport> {
    let store = S3ObjectStore::new(&config.storage);
    let catalog = JsonFileCatalog::open(&config.catalog.path).await?;
    let reducer = Reducer::new(store, catalog, ReducerSettings::from(&config.reduction));

    match &cli.command {
        Command::SlimUser(args) => commands::slim_user(&reducer, args, config).await,
        Command::SlimVideo(args) => commands::slim_video(&reducer, args, config).await,
        Command::RebuildPlaylists(args) => {
            commands::rebuild_playlists(&reducer, args, config).await
        }
    }
}

fn emit(report: &CommandReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Human => print!("{}", report.render_human()),
    }
    Ok(())
}

fn init_tracing(log_level: &str, log_format: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Logs go to stderr so `--output json` stays machine-readable on stdout.
    match log_format {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
