//! Span creation, context propagation and export pipeline.
use std::{borrow::Cow, sync::Arc};

use axum::http::HeaderMap;
use opentelemetry::{
    Context, KeyValue,
    propagation::{TextMapCompositePropagator, TextMapPropagator},
    trace::{SpanContext, SpanKind, TraceContextExt, Tracer as _, TracerProvider as _},
};
use opentelemetry_sdk::{
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{Sampler, SdkTracer, SdkTracerProvider, SpanExporter},
};
use tracing::{error, info};

use crate::telemetry::{
    error::TracingError,
    exporter::LogSpanExporter,
    propagation::{HeaderExtractor, HeaderInjector},
    resource::ServiceResource,
};

/// Instrumentation scope of every span created by this crate.
pub const INSTRUMENTATION_SCOPE: &str = env!("CARGO_PKG_NAME");

#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// When disabled, no tracer is built and tracing degrades to no-op.
    pub enabled: bool,
    /// OTLP gRPC collector endpoint; spans go to the local log exporter when unset.
    pub otlp_endpoint: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self { enabled: true, otlp_endpoint: None }
    }
}

impl TracingConfig {
    pub fn with_otlp_endpoint(self, endpoint: impl Into<String>) -> Self {
        Self { otlp_endpoint: Some(endpoint.into()), ..self }
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        Self { enabled, ..self }
    }
}

/// Optional attributes of a new span.
#[derive(Debug, Clone, Default)]
pub struct SpanOptions {
    kind: Option<SpanKind>,
    attributes: Vec<KeyValue>,
}

impl SpanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(self, kind: SpanKind) -> Self {
        Self { kind: Some(kind), ..self }
    }

    pub fn with_attribute(mut self, attribute: KeyValue) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Tracer bound to the service resource.
///
/// Spans are always sampled and exported in batches off the request path. The
/// propagator handles W3C trace context and baggage.
#[derive(Debug)]
pub struct Tracer {
    provider: SdkTracerProvider,
    tracer: SdkTracer,
    propagator: TextMapCompositePropagator,
    resource: ServiceResource,
}

impl Tracer {
    /// Builds a tracer exporting to the configured collector, or to the logs.
    pub fn new(config: &TracingConfig, resource: ServiceResource) -> Result<Self, TracingError> {
        match &config.otlp_endpoint {
            Some(endpoint) => {
                use opentelemetry_otlp::WithExportConfig;
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_tonic()
                    .with_endpoint(endpoint.clone())
                    .build()?;
                Ok(Self::with_exporter(exporter, resource))
            }
            None => Ok(Self::with_exporter(LogSpanExporter::default(), resource)),
        }
    }

    /// Like [`Tracer::new`], but logs the failure and returns `None` instead.
    pub fn init(config: &TracingConfig, resource: ServiceResource) -> Option<Self> {
        if !config.enabled {
            info!("[tracing] Tracing disabled");
            return None;
        }
        match Self::new(config, resource) {
            Ok(tracer) => {
                info!(
                    service = %tracer.resource.service_name(),
                    endpoint = config.otlp_endpoint.as_deref().unwrap_or("local"),
                    "[tracing] Tracer initialized"
                );
                Some(tracer)
            }
            Err(err) => {
                error!("[tracing] unable to initialize tracing exporter due: {err}");
                None
            }
        }
    }

    /// Builds a tracer around an arbitrary exporter.
    pub fn with_exporter<E>(exporter: E, resource: ServiceResource) -> Self
    where
        E: SpanExporter + 'static,
    {
        let provider = SdkTracerProvider::builder()
            .with_sampler(Sampler::AlwaysOn)
            .with_batch_exporter(exporter)
            .with_resource(resource.to_otel())
            .build();
        let tracer = provider.tracer(INSTRUMENTATION_SCOPE);
        let propagators: Vec<Box<dyn TextMapPropagator + Send + Sync>> =
            vec![Box::new(TraceContextPropagator::new()), Box::new(BaggagePropagator::new())];
        let propagator = TextMapCompositePropagator::new(propagators);
        Self { provider, tracer, propagator, resource }
    }

    pub fn resource(&self) -> &ServiceResource {
        &self.resource
    }

    /// Starts a span as child of `parent` and returns the context owning it.
    ///
    /// The span ends when `cx.span().end()` is called or the last clone of the
    /// returned context is dropped.
    pub fn start(
        &self,
        parent: &Context,
        name: impl Into<Cow<'static, str>>,
        options: SpanOptions,
    ) -> Context {
        let mut builder = self.tracer.span_builder(name).with_attributes(options.attributes);
        if let Some(kind) = options.kind {
            builder = builder.with_kind(kind);
        }
        let span = builder.start_with_context(&self.tracer, parent);
        parent.with_span(span)
    }

    /// Reads the remote trace context and baggage carried by `headers`.
    pub fn extract(&self, headers: &HeaderMap) -> Context {
        self.propagator.extract_with_context(&Context::new(), &HeaderExtractor(headers))
    }

    /// Writes the trace context and baggage of `cx` into `headers`.
    pub fn inject(&self, cx: &Context, headers: &mut HeaderMap) {
        self.propagator.inject_context(cx, &mut HeaderInjector(headers));
    }

    pub fn force_flush(&self) -> Result<(), TracingError> {
        self.provider.force_flush().map_err(TracingError::Flush)
    }

    /// Flushes pending spans and stops the export pipeline.
    pub fn shutdown(&self) -> Result<(), TracingError> {
        self.provider.shutdown().map_err(TracingError::Shutdown)
    }
}

/// Shared, possibly absent tracer.
///
/// Components take this handle instead of a [`Tracer`] so that a failed or
/// disabled tracer initialization degrades every call to a no-op.
#[derive(Debug, Clone, Default)]
pub struct TracerHandle(Option<Arc<Tracer>>);

impl TracerHandle {
    pub fn new(tracer: Option<Tracer>) -> Self {
        Self(tracer.map(Arc::new))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    pub fn tracer(&self) -> Option<&Tracer> {
        self.0.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// Without a tracer, the returned context holds a non-recording span, so
    /// ending it or setting its status leaves the parent span untouched.
    pub fn start(
        &self,
        parent: &Context,
        name: impl Into<Cow<'static, str>>,
        options: SpanOptions,
    ) -> Context {
        match self.tracer() {
            Some(tracer) => tracer.start(parent, name, options),
            None => parent.with_remote_span_context(SpanContext::empty_context()),
        }
    }

    pub fn extract(&self, headers: &HeaderMap) -> Context {
        self.tracer().map(|tracer| tracer.extract(headers)).unwrap_or_default()
    }

    pub fn inject(&self, cx: &Context, headers: &mut HeaderMap) {
        if let Some(tracer) = self.tracer() {
            tracer.inject(cx, headers);
        }
    }

    pub fn shutdown(&self) -> Result<(), TracingError> {
        self.tracer().map_or(Ok(()), Tracer::shutdown)
    }
}

impl From<Tracer> for TracerHandle {
    fn from(tracer: Tracer) -> Self {
        Self(Some(Arc::new(tracer)))
    }
}
