//! Stampede agent binary
//!
//! Loads configuration, initialises tracing, and serves the control surface
//! until interrupted. An active run is stopped cleanly on shutdown.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stampede_agent::{api, publishers};
use stampede_config::{AgentConfig, ConfigLoader, LogFormat, LoggingConfig};
use stampede_engine::LoadEngine;
use stampede_http::RequestExecutor;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Control surface bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Collector endpoint for window snapshots
    #[arg(long)]
    report_url: Option<String>,

    /// Log level filter
    #[arg(long)]
    log_level: Option<String>,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", serde_yaml::to_string(&AgentConfig::default())?);
        return Ok(());
    }

    let mut config = ConfigLoader::new().load(cli.config.as_ref())?;
    apply_cli_overrides(&mut config, &cli)?;
    config.validate_all()?;

    init_tracing(&config.logging)?;

    let executor = RequestExecutor::with_config(&config.http)?;
    let publisher = publishers::build_publisher(&config.report)?;
    let engine = LoadEngine::new(executor, publisher);

    let listener = tokio::net::TcpListener::bind(config.server.bind_address).await?;
    info!(
        bind = %config.server.bind_address,
        "stampede agent listening"
    );

    axum::serve(listener, api::router(engine.clone()))
        .with_graceful_shutdown(shutdown_signal(engine))
        .await?;

    Ok(())
}

/// CLI arguments win over the file and the environment
fn apply_cli_overrides(config: &mut AgentConfig, cli: &Cli) -> Result<()> {
    if let Some(ref bind) = cli.bind {
        config.server.bind_address = bind
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address '{}': {}", bind, e))?;
    }
    if let Some(ref report_url) = cli.report_url {
        config.report.endpoint = Some(report_url.clone());
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    Ok(())
}

fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    match config.format {
        LogFormat::Json => {
            tracing_subscriber::fmt().with_env_filter(filter).json().init();
        }
        LogFormat::Compact => {
            tracing_subscriber::fmt().with_env_filter(filter).compact().init();
        }
    }
    Ok(())
}

async fn shutdown_signal(engine: LoadEngine) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    info!("shutdown signal received");
    if engine.stop().await {
        info!("active load test stopped");
    }
}
