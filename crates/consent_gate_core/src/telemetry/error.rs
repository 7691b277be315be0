use opentelemetry_otlp::ExporterBuildError;
use opentelemetry_sdk::error::OTelSdkError;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("Tracing error, unable to initialize exporter: {0}")]
    ExporterInit(#[from] ExporterBuildError),

    #[error("Tracing error, failed to flush pending spans: {0}")]
    Flush(#[source] OTelSdkError),

    #[error("Tracing error, failed to shut down provider: {0}")]
    Shutdown(#[source] OTelSdkError),

    #[error("Tracing error, global subscriber already installed: {0}")]
    Subscriber(#[from] TryInitError),
}
