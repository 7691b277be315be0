//! Consent decision service.
//!
//! Turns an inbound OAuth2/OIDC consent callback into an accept decision by
//! chaining an identity provider (session check) and a consent provider
//! (consent lookup and acceptance). Every run is traced end to end and tagged
//! with the build provenance of the running binary.
//!
//! - [`consent`]: data model, pipeline steps, orchestrator and HTTP surface
//! - [`telemetry`]: service resource, tracer, span export and logging setup
//! - [`transport`]: HTTP adapters for the identity and consent providers

pub mod consent;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod tests;
