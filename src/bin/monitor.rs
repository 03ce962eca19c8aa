use std::sync::Arc;

use clap::{Parser, ValueEnum};
use health_monitor::{
    config::load_config,
    orchestrator::Orchestrator,
    reporter::{ConsoleReporter, JsonReporter, Reporter},
    util::{DEFAULT_CONFIG_FILE, env_lookup},
};
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Console,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(about = "Periodically probes HTTP endpoints and reports availability and latency")]
struct Args {
    /// Config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    file: String,

    /// Report output format
    #[arg(long, value_enum, default_value_t = Format::Console)]
    format: Format,

    /// Enable trace logging
    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    dotenv::dotenv().ok();

    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("health_monitor", level),
        ("monitor", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = load_config(&args.file, env_lookup)?;

    let reporter: Arc<dyn Reporter> = match args.format {
        Format::Console => Arc::new(ConsoleReporter),
        Format::Json => Arc::new(JsonReporter),
    };

    let orchestrator = Orchestrator::new(config, reporter)?;
    orchestrator.run(shutdown_signal()).await;

    Ok(())
}

/// Completes on the first SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
