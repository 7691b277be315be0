//! Structured logging setup
//!
//! Logs go to the terminal through a `fmt` layer. When a collector endpoint is
//! configured they are also bridged to an OTLP log exporter, tagged with the
//! same service resource as the spans.

use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::telemetry::{error::TracingError, resource::ServiceResource};

/// Keeps the exporter's own transport out of the exported logs.
const OTLP_BRIDGE_FILTER: &str = "info,h2=off,hyper=off,opentelemetry=off,reqwest=off,tonic=off,tower=off";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    pub otlp_endpoint: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), otlp_endpoint: None }
    }
}

/// Owns the log export pipeline, if any, until shutdown.
#[derive(Debug, Default)]
pub struct LoggingGuard {
    provider: Option<SdkLoggerProvider>,
}

impl LoggingGuard {
    pub fn shutdown(&self) -> Result<(), TracingError> {
        match &self.provider {
            Some(provider) => provider.shutdown().map_err(TracingError::Shutdown),
            None => Ok(()),
        }
    }
}

/// Installs the global subscriber.
///
/// This sets up a tracing subscriber with:
/// - Env filter from RUST_LOG (defaults to the configured level)
/// - Compact, target-annotated terminal output
/// - An OTLP log bridge when an endpoint is configured
pub fn init_logging(
    config: &LoggingConfig,
    resource: &ServiceResource,
) -> Result<LoggingGuard, TracingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let provider = match &config.otlp_endpoint {
        Some(endpoint) => {
            use opentelemetry_otlp::WithExportConfig;
            let exporter = opentelemetry_otlp::LogExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint.clone())
                .build()?;
            Some(
                SdkLoggerProvider::builder()
                    .with_resource(resource.to_otel())
                    .with_batch_exporter(exporter)
                    .build(),
            )
        }
        None => None,
    };
    let bridge = provider.as_ref().map(|provider| {
        OpenTelemetryTracingBridge::new(provider).with_filter(EnvFilter::new(OTLP_BRIDGE_FILTER))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).compact().with_target(true).with_thread_ids(false))
        .with(bridge)
        .try_init()?;

    tracing::info!(
        service = %resource.service_name(),
        version = %resource.service_version(),
        revision = resource.git_revision().unwrap_or_default(),
        "=== Service initialized ==="
    );
    Ok(LoggingGuard { provider })
}
