//! Price Stream Binary
//!
//! Streams real-time prices for the configured symbols and prints every
//! event as a JSON line on stdout.
//!
//! # Usage
//!
//! ```bash
//! TWELVEDATA_API_KEY=... PRICE_STREAM_SYMBOLS=AAPL,MSFT cargo run --bin price-stream
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `TWELVEDATA_API_KEY`: Twelve Data API key
//!
//! ## Optional
//! - `PRICE_STREAM_HOST`: Stream host (default: ws.twelvedata.com)
//! - `PRICE_STREAM_SYMBOLS`: Comma-separated symbols (default: none)
//! - `PRICE_STREAM_MAX_QUEUE_SIZE`: Event queue capacity (default: 12000)
//! - `PRICE_STREAM_PING_INTERVAL_SECS`: Liveness ping interval (default: 15)
//! - `PRICE_STREAM_PING_TIMEOUT_SECS`: Liveness ping timeout (default: 10)
//! - `PRICE_STREAM_SELF_HEAL_MS`: Reconnect delay (default: 1000)
//! - `PRICE_STREAM_HEARTBEAT_SECS`: Heartbeat frame period (default: 10)
//! - `PRICE_STREAM_LOG_LEVEL`: debug | info | off (default: info)
//! - `PRICE_STREAM_METRICS_ADDR`: Prometheus listen address (default: disabled)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: price-stream)

use std::io::Write;

use anyhow::Context;
use price_stream::infrastructure::telemetry;
use price_stream::{PriceStreamClient, RuntimeSettings, StreamConfig, init_metrics};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let telemetry_guard = telemetry::init();

    tracing::info!(otlp = telemetry_guard.exporting(), "Starting price stream");

    let runtime = RuntimeSettings::from_env()?;
    if let Some(addr) = runtime.metrics_addr {
        let addr = init_metrics(addr).context("failed to start Prometheus exporter")?;
        tracing::info!(%addr, "Metrics listening");
    }

    let config = StreamConfig::from_env()?.with_on_event(|event| {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{event}")?;
        Ok(())
    });
    log_config(&config, &runtime);

    let client = PriceStreamClient::new(config)?;
    client.connect().await;

    let mut heartbeat = tokio::time::interval(runtime.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    heartbeat.tick().await;

    let shutdown = await_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = heartbeat.tick() => {
                if !client.heartbeat() {
                    tracing::debug!(state = %client.state(), "Heartbeat skipped");
                }
            }
        }
    }

    client.disconnect().await;
    tracing::info!("Price stream stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &StreamConfig, runtime: &RuntimeSettings) {
    tracing::info!(
        url = %config.redacted_url(),
        symbols = %price_stream::domain::symbol::join_symbols(&config.symbols),
        max_queue_size = config.max_queue_size,
        heartbeat_secs = runtime.heartbeat_interval.as_secs(),
        "Configuration loaded"
    );
    tracing::debug!(
        ping_interval_secs = config.websocket.ping_interval.as_secs(),
        ping_timeout_secs = config.websocket.ping_timeout.as_secs(),
        self_heal_ms = config.websocket.self_heal_time.as_secs_f64() * 1000.0,
        "WebSocket settings"
    );
}

/// Load the nearest `.env`, searching from the working directory upwards.
fn load_dotenv() {
    let Ok(cwd) = std::env::current_dir() else {
        return;
    };
    if let Some(path) = cwd
        .ancestors()
        .map(|dir| dir.join(".env"))
        .find(|path| path.is_file())
    {
        match dotenvy::from_path(&path) {
            Ok(()) => eprintln!("Loaded {}", path.display()),
            Err(e) => eprintln!("Ignoring {}: {e}", path.display()),
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM.
async fn await_shutdown() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Ctrl+C handler failed");
            }
            tracing::info!(signal = "SIGINT", "Shutting down");
        }
        () = terminate => tracing::info!(signal = "SIGTERM", "Shutting down"),
    }
}
