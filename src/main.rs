//! taxonomy-access decision service
//!
//! Serves the taxonomy-term access guards over HTTP.

use clap::Parser;
use std::sync::Arc;
use taxonomy_access::{
    config::{AppConfig, LogFormat, load_config},
    server::{DecisionService, HttpConfig, run_http},
    source::create_term_source,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Taxonomy-term access checks for routes, views and view arguments
#[derive(Parser, Debug)]
#[command(name = "taxonomy-access")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "TAXONOMY_ACCESS_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TAXONOMY_ACCESS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format
    #[arg(long, env = "TAXONOMY_ACCESS_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    /// HTTP server host
    #[arg(long, env = "TAXONOMY_ACCESS_HOST")]
    host: Option<String>,

    /// HTTP server port
    #[arg(long, env = "TAXONOMY_ACCESS_PORT")]
    port: Option<u16>,
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let loaded = load_config(args.config.as_deref());
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_logging(
        args.log_level.as_deref().unwrap_or(&logging.level),
        args.log_format.unwrap_or(logging.format),
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting taxonomy-access"
    );

    let config: AppConfig =
        loaded.inspect_err(|e| error!(error = %e, "Failed to load configuration"))?;

    let source = create_term_source(&config.store)
        .inspect_err(|e| error!(error = %e, "Failed to create term source"))?;

    let service = Arc::new(DecisionService::new(&config, source));

    let host = args.host.as_deref().unwrap_or(&config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    let http_config = HttpConfig::from_host_port(host, port)
        .inspect_err(|e| error!(error = %e, host, port, "Invalid bind address"))?;

    run_http(service, http_config).await
}
