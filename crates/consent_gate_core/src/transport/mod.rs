//! Transport module.
//!
//! HTTP adapters implementing the provider services of the consent pipeline.
//! Each outbound call carries the trace context of the step issuing it as
//! `traceparent`/`baggage` headers.
pub mod hydra;
pub mod kratos;

/// Strips trailing slashes so paths can be appended verbatim.
pub(crate) fn base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
