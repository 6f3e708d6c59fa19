use anyhow::Result;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iptv_gateway::{
    config::Config,
    database::Database,
    services::{AdmissionController, BackgroundTasks},
    utils::system_clock,
    web::{AppState, WebServer},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "iptv-gateway")]
#[command(version)]
#[command(about = "Subscriber access gateway for IPTV catalogs")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    info!("Starting IPTV gateway v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config)?;
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    let database = Database::new(&config.database).await?;
    database.migrate().await?;

    let clock = system_clock();
    let shutdown = CancellationToken::new();

    let admission = AdmissionController::from_config(&config.limiter, clock.clone()).await?;
    let (background, worker) = BackgroundTasks::spawn(
        config.sessions.touch_queue_capacity,
        config.sessions.touch_timeout,
        shutdown.child_token(),
    );

    let sweep_interval = config.sessions.sweep_interval;
    let sweep_grace = config.sessions.sweep_grace;
    let state = AppState::new(config, database, admission, background, clock)?;
    let sweeper = state
        .sessions
        .spawn_sweeper(sweep_interval, sweep_grace, &shutdown);

    let server = WebServer::new(state)?;
    info!(host = %server.host(), port = server.port(), "Web server configured");

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_token.cancel();
    });

    let served = server.serve_with_cancellation(shutdown.clone()).await;

    shutdown.cancel();
    sweeper.shutdown().await;
    worker.join().await;
    info!("IPTV gateway stopped");

    served
}

fn init_tracing(level: &str, format: LogFormat) {
    let default_filter = if level == "trace" {
        format!("iptv_gateway={level},tower_http=trace")
    } else {
        format!("iptv_gateway={level},tower_http=warn")
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                    _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to install unix signal handlers, falling back to Ctrl+C: {}", e);
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down gracefully");
}
