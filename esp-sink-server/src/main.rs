use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use esp_sink::{serve, SinkConfig, TelemetrySink};

/// Server CLI arguments
#[derive(Parser, Debug)]
#[command(name = "esp-sink-server")]
#[command(version)]
#[command(about = "In-memory telemetry sink for ESP BLE bridge devices")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long, env = "ESP_SINK_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long, env = "ESP_SINK_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Seconds an entry stays in the active set
    #[arg(long)]
    time_limit_secs: Option<u64>,

    /// Seconds between background sweeps
    #[arg(long)]
    sweep_interval_secs: Option<u64>,
}

impl Args {
    /// Priority: CLI/env > config file > defaults
    fn into_config(self) -> anyhow::Result<SinkConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let config = SinkConfig::load(path)
                    .with_context(|| format!("loading config from {}", path.display()))?;
                info!("Loaded configuration from: {}", path.display());
                config
            }
            None => SinkConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.time_limit_secs {
            config.time_limit_secs = secs;
        }
        if let Some(secs) = self.sweep_interval_secs {
            config.sweep_interval_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("esp_sink=info".parse()?)
                .add_directive("esp_sink_server=info".parse()?),
        )
        .with_ansi(false)
        .init();

    let config = Args::parse().into_config()?;
    let addr = config.resolve_bind_addr().await?;
    info!(
        "Starting ESP BLE sink on {} (window {}s, sweep every {}s)",
        addr, config.time_limit_secs, config.sweep_interval_secs
    );

    let sink = Arc::new(TelemetrySink::from_config(&config));
    let shutdown = CancellationToken::new();
    let sweeper = sink
        .sweeper(config.sweep_interval())
        .spawn(shutdown.clone());

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
        signal_token.cancel();
    });

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    let result = serve(listener, sink, shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!("Sweeper task ended abnormally: {}", e);
    }
    result?;
    info!("ESP BLE sink stopped");
    Ok(())
}
