//! Telemetry for the consent service.
//!
//! - **Resource**: build provenance turned into the service resource
//! - **Tracer**: span creation, W3C trace context and baggage propagation,
//!   batched export to an OTLP collector or to the local logs
//! - **Logging**: `tracing` subscriber setup, optionally bridged to OTLP logs
//!
//! Everything here is built once at startup and injected into the components
//! that need it; nothing is installed as a process-global provider.

pub mod error;
pub mod exporter;
pub mod logging;
pub mod propagation;
pub mod resource;
pub mod tracer;

pub use error::TracingError;
pub use resource::{BuildInfo, ServiceResource};
pub use tracer::{SpanOptions, Tracer, TracerHandle, TracingConfig};
