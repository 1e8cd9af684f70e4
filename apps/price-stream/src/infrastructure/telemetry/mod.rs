//! Logging and OpenTelemetry Tracing
//!
//! Installs the process-wide `tracing` subscriber: a fmt layer filtered by
//! the configured log level, plus an optional OTLP span exporter.
//!
//! # Environment Variables
//!
//! - `PRICE_STREAM_LOG_LEVEL`: `debug`, `info` or anything else for off (default: info)
//! - `OTEL_ENABLED`: Set to "true" to export spans (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: http://localhost:4317)
//! - `OTEL_SERVICE_NAME`: Service name for traces (default: price-stream)
//!
//! `RUST_LOG` directives still apply on top of the crate directive.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_SERVICE_NAME: &str = "price-stream";

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Log verbosity for this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Everything, including per-frame detail.
    Debug,
    /// Lifecycle events and warnings.
    #[default]
    Info,
    /// Nothing from this crate.
    Off,
}

impl LogLevel {
    /// Parse a level. Anything other than `debug` or `info` turns logging off.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "debug" => Self::Debug,
            "info" => Self::Info,
            _ => Self::Off,
        }
    }

    /// Level name as used in filter directives.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Off => "off",
        }
    }

    /// Filter directive for this crate's target.
    ///
    /// # Errors
    ///
    /// Returns an error if the directive cannot be parsed.
    pub fn directive(self) -> Result<Directive, tracing_subscriber::filter::ParseError> {
        format!("price_stream={}", self.as_str()).parse()
    }
}

/// Keeps the span exporter alive; flushes and stops it on drop.
#[must_use = "dropping the guard stops span export"]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Whether spans are being exported over OTLP.
    #[must_use]
    pub const fn exporting(&self) -> bool {
        self.provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let Some(provider) = self.provider.take() else {
            return;
        };
        if let Err(e) = provider.shutdown() {
            eprintln!("OpenTelemetry shutdown failed: {e}");
        }
    }
}

/// Subscriber and exporter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Whether spans are exported over OTLP.
    pub enabled: bool,
    /// OTLP exporter endpoint.
    pub otlp_endpoint: String,
    /// Service name for traces.
    pub service_name: String,
    /// Verbosity for this crate.
    pub log_level: LogLevel,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: LogLevel::default(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let enabled = std::env::var("OTEL_ENABLED")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_OTLP_ENDPOINT.to_string());

        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string());

        let log_level = std::env::var("PRICE_STREAM_LOG_LEVEL")
            .map(|v| LogLevel::from_str_case_insensitive(&v))
            .unwrap_or_default();

        Self {
            enabled,
            otlp_endpoint,
            service_name,
            log_level,
        }
    }
}

/// Install the global subscriber using [`TelemetryConfig::from_env`].
///
/// Keep the returned guard alive until shutdown.
pub fn init() -> TelemetryGuard {
    init_with_config(TelemetryConfig::from_env())
}

/// Install the global subscriber.
///
/// An OTLP exporter that cannot be built is reported on stderr and the
/// subscriber runs console-only.
pub fn init_with_config(config: TelemetryConfig) -> TelemetryGuard {
    let provider = if config.enabled {
        otlp_provider(&config)
    } else {
        None
    };
    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(env_filter(config.log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_file(false)
                .with_line_number(false),
        )
        .with(otel_layer)
        .init();

    TelemetryGuard { provider }
}

/// `RUST_LOG` plus the crate level; tungstenite is capped at warn.
#[allow(clippy::expect_used)]
fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::from_default_env()
        .add_directive(level.directive().expect("crate directive is valid"))
        .add_directive("tungstenite=warn".parse().expect("static directive is valid"))
}

fn otlp_provider(config: &TelemetryConfig) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()
        .inspect_err(|e| eprintln!("OTLP exporter unavailable, spans disabled: {e}"))
        .ok()?;

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(config.service_name.clone())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build(),
    )
}

// =============================================================================
// Tests
// =============================================================================
