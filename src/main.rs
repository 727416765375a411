use std::path::PathBuf;

use clap::Parser;

use trivia_server::config::{self, ServerConfig};
use trivia_server::lifecycle::{signals, Application, Shutdown};
use trivia_server::observability::{logging, metrics};
use trivia_server::StartupError;

#[derive(Parser)]
#[command(name = "trivia-server")]
#[command(about = "HTTP API server for the trivia application", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            // The subscriber is not installed yet; fall back to stderr.
            eprintln!("trivia-server: {}", e);
            std::process::exit(1);
        }
    };

    logging::init(&config.observability.log_level);
    tracing::info!("trivia-server v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Fatal startup error");
        std::process::exit(1);
    }
    tracing::info!("Shutdown complete");
}

fn load(cli: &Cli) -> Result<ServerConfig, StartupError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::loader::finalize(ServerConfig::default(), |var| std::env::var(var).ok())?,
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    Ok(config)
}

async fn run(config: ServerConfig) -> Result<(), StartupError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        handlers = ?config.handlers.enabled,
        rate_limit = config.rate_limit.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address {
                field: "observability.metrics_address",
                value: config.observability.metrics_address.clone(),
            })?;
        metrics::init_metrics(addr);
    }

    let app = Application::build(&config).await?;
    if let Ok(addr) = app.local_addr() {
        tracing::info!(address = %addr, "Ready to accept connections");
    }

    let shutdown = Shutdown::new();
    tokio::spawn(signals::wait_for_signal(shutdown.clone()));
    app.run(&shutdown).await
}
