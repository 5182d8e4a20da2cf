//! Main entry point for the Lobby Herald notification service
//!
//! Production entry point that loads configuration, initializes logging,
//! starts the reconciliation scheduler, and shuts down gracefully on
//! SIGINT/SIGTERM.

use anyhow::Result;
use clap::Parser;
use lobby_herald::config::AppConfig;
use lobby_herald::service::AppState;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};

/// Lobby Herald - lobby feed watcher and notification dispatcher
#[derive(Parser)]
#[command(
    name = "lobby-herald",
    version,
    about = "Watches game lobby feeds and dispatches subscription notifications",
    long_about = "Lobby Herald polls public game lobby feeds, reconciles each snapshot \
                  against previously observed state, matches lobbies against per-channel \
                  subscription rules, and posts and maintains chat notifications with \
                  per-channel rate limiting."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Chat token override
    #[arg(long, value_name = "TOKEN", help = "Override chat platform bot token")]
    chat_token: Option<String>,

    /// Scheduler fan-out override
    #[arg(
        long,
        value_name = "COUNT",
        help = "Override reconciliation triggers per minute"
    )]
    updates_per_minute: Option<u32>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config, run one cycle, and exit)
    #[arg(
        long,
        help = "Validate configuration, run a single reconciliation cycle, and exit"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup information
fn display_startup_banner(config: &AppConfig) {
    info!("Lobby Herald v{}", lobby_herald::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Primary feed: {}", config.feeds.primary_url);
    info!("   Secondary feed: {}", config.feeds.secondary_url);
    info!(
        "   Updates per minute: {}",
        config.scheduler.updates_per_minute
    );
    info!(
        "   Grace period: {}s",
        config.reconciler.grace_period_seconds
    );
}

/// Load and merge configuration from environment, file, and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(token) = &args.chat_token {
        config.chat.token = token.clone();
    }
    if let Some(updates) = args.updates_per_minute {
        config.scheduler.updates_per_minute = updates;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_startup_banner(&config);

    let mut app_state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if args.dry_run {
        info!("Configuration validation successful, running one cycle");
        let stats = app_state.run_cycle_once().await?;
        info!(?stats, "Dry run completed");
        return Ok(());
    }

    app_state.start();
    info!("Lobby Herald is running, press Ctrl+C to shut down");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, stopping scheduler...");
    app_state.shutdown().await;
    info!("Goodbye");

    Ok(())
}
