use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, WrapErr};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use pu_core::services::config_loader;
use pu_core::services::orchestrator::DeploymentOrchestrator;
use pu_core::services::shell::SystemShell;
use pu_core::services::supervisor::ForeverSupervisor;

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    debug: bool,
    settings: Option<PathBuf>,
    home: Option<PathBuf>,
    log_file: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> CliArgs {
    let value_of = |flag: &str| {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(PathBuf::from)
    };
    CliArgs {
        debug: args.iter().any(|a| a == "--debug"),
        settings: value_of("--settings"),
        home: value_of("--home"),
        log_file: value_of("--log-file"),
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args);
    let guard = setup_logging(cli.debug, cli.log_file.as_deref());

    let home = cli
        .home
        .or_else(dirs::home_dir)
        .ok_or_else(|| eyre!("could not determine home directory"))?;
    let settings = config_loader::load_settings(&home, cli.settings.as_deref())
        .wrap_err("failed to load deploy settings")?;
    tracing::debug!(?settings, "deploy settings");

    let supervisor = ForeverSupervisor::new(settings.supervisor.clone());
    let mut orchestrator = DeploymentOrchestrator::new(settings, SystemShell, supervisor);

    match orchestrator.run().await {
        Ok(report) => {
            let elapsed = report.finished_at - report.started_at;
            tracing::info!(
                drained = report.drained,
                started = report.started.len(),
                elapsed_ms = elapsed.num_milliseconds(),
                "deployment complete"
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            // Flush the file writer before exiting.
            drop(guard);
            std::process::exit(e.exit_code());
        }
    }
}

/// Log to stderr, and additionally to `log_file` when given.
/// Returns the guard that must be held alive for the duration of the program.
fn setup_logging(
    debug: bool,
    log_file: Option<&Path>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("post-update.log"));
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}
