use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use videobroker::{config::BrokerConfig, App};

#[derive(Parser)]
#[command(name = "videobroker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-platform video discovery and streaming federation broker")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("videobroker={}", cli.log_level);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting videobroker v{}", env!("CARGO_PKG_VERSION"));

    let config = BrokerConfig::load(&cli.config)?;
    info!(config_file = %cli.config, "configuration loaded");

    let app = App::from_config(&config);
    info!(platforms = ?app.registry.platform_names(), deployment_env = ?app.deployment_env, "registry built");

    app.start().await?;
    info!("all platform adapters initialized");

    let cancellation_token = CancellationToken::new();
    let background = {
        let app = &app;
        let token = cancellation_token.clone();
        app.run_background_tasks(token)
    };

    tokio::select! {
        _ = background => {
            info!("background tasks stopped on their own");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            cancellation_token.cancel();
        }
    }

    app.shutdown().await;
    info!("videobroker stopped");
    Ok(())
}
