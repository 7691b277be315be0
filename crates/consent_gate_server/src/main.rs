use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use consent_gate_core::{
    consent::{http::router, init_consent_api},
    telemetry::{
        ServiceResource, Tracer, TracerHandle, TracingConfig,
        logging::{LoggingConfig, init_logging},
    },
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "consent-gate")]
#[command(about = "OAuth2 consent decision service")]
struct ConsentGateArgs {
    /// Server address to bind to
    #[arg(short, long, env = "CONSENT_GATE_ADDRESS", default_value = "0.0.0.0")]
    address: String,

    /// Server port to bind to
    #[arg(short, long, env = "CONSENT_GATE_PORT", default_value_t = 3000)]
    port: u16,

    /// Public API of the identity provider
    #[arg(long, env = "KRATOS_PUBLIC_URL", default_value = "http://127.0.0.1:4433")]
    kratos_public_url: String,

    /// Admin API of the consent provider
    #[arg(long, env = "HYDRA_ADMIN_URL", default_value = "http://127.0.0.1:4445")]
    hydra_admin_url: String,

    /// Timeout of each provider call, in milliseconds
    #[arg(long, env = "CONSENT_GATE_PROVIDER_TIMEOUT_MS", default_value_t = 5000)]
    provider_timeout_ms: u64,

    /// Enable span export
    #[arg(long, env = "CONSENT_GATE_TRACING", default_value_t = true, action = clap::ArgAction::Set)]
    tracing: bool,

    /// OTLP gRPC collector endpoint; spans are logged locally when unset
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Service name reported in telemetry, defaults to the binary name
    #[arg(long, env = "OTEL_SERVICE_NAME", default_value = "")]
    service_name: String,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, env = "CONSENT_GATE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("[server] unable to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("[server] unable to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("[server] Shutting down");
}

#[cfg(not(tarpaulin_include))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ConsentGateArgs::parse();

    let resource =
        ServiceResource::build(&args.service_name, Some(&consent_gate_core::build_info!()));
    let logging = init_logging(
        &LoggingConfig { level: args.log_level.clone(), otlp_endpoint: args.otlp_endpoint.clone() },
        &resource,
    )
    .context("failed to initialize logging")?;

    let tracing_config = TracingConfig {
        enabled: args.tracing,
        otlp_endpoint: args.otlp_endpoint.clone(),
    };
    let tracer = TracerHandle::new(Tracer::init(&tracing_config, resource));
    if !tracer.is_enabled() {
        warn!("[server] Serving without span export");
    }

    let api = init_consent_api(
        &args.kratos_public_url,
        &args.hydra_admin_url,
        Duration::from_millis(args.provider_timeout_ms),
        tracer.clone(),
    )
    .context("failed to initialize provider clients")?;

    let address = format!("{}:{}", args.address, args.port);
    let listener =
        TcpListener::bind(&address).await.with_context(|| format!("failed to bind {address}"))?;
    info!(
        address = %address,
        kratos = %args.kratos_public_url,
        hydra = %args.hydra_admin_url,
        "[server] Listening"
    );

    axum::serve(listener, router(api)).with_graceful_shutdown(shutdown_signal()).await?;

    if let Err(err) = tracer.shutdown() {
        warn!("[server] {err}");
    }
    logging.shutdown()?;
    Ok(())
}
