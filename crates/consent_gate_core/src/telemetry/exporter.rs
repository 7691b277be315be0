//! Local diagnostic span exporter.
//!
//! Used when no collector endpoint is configured: completed spans are rendered
//! as human-readable log records through the regular logging pipeline.
use std::time::Duration;

use opentelemetry::trace::Status;
use opentelemetry_sdk::{
    Resource,
    error::OTelSdkResult,
    trace::{SpanData, SpanExporter},
};
use tracing::info;

use crate::telemetry::resource::{NOT_AVAILABLE, SERVICE_NAME_KEY};

#[derive(Debug, Default)]
pub struct LogSpanExporter {
    service_name: Option<String>,
}

impl LogSpanExporter {
    fn render_attributes(span: &SpanData) -> String {
        span.attributes
            .iter()
            .map(|attribute| format!("{}={}", attribute.key, attribute.value))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn render_status(status: &Status) -> String {
        match status {
            Status::Unset => "unset".to_string(),
            Status::Ok => "ok".to_string(),
            Status::Error { description } => format!("error: {description}"),
        }
    }
}

impl SpanExporter for LogSpanExporter {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        let service = self.service_name.as_deref().unwrap_or(NOT_AVAILABLE);
        for span in batch {
            let duration =
                span.end_time.duration_since(span.start_time).unwrap_or(Duration::ZERO);
            info!(
                target: "consent_gate::spans",
                service = %service,
                trace_id = %span.span_context.trace_id(),
                span_id = %span.span_context.span_id(),
                parent_span_id = %span.parent_span_id,
                kind = ?span.span_kind,
                duration_us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX),
                status = %Self::render_status(&span.status),
                attributes = %Self::render_attributes(&span),
                "span {}",
                span.name
            );
        }
        Ok(())
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.service_name = resource
            .iter()
            .find(|(key, _)| key.as_str() == SERVICE_NAME_KEY)
            .map(|(_, value)| value.to_string());
    }
}
