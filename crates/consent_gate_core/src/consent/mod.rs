//! Consent module.
//!
//! Turns an OAuth2 consent callback into an accept decision.
//!
//! ## Pipeline
//!
//! A consent callback is handled by three strictly ordered steps, each one
//! consuming the output of the previous:
//!
//! 1. **Session**: the request cookies are resolved to a session and its
//!    identity by the identity provider
//! 2. **Challenge**: the `consent_challenge` query parameter is resolved to the
//!    pending consent request by the consent provider
//! 3. **Decision**: the consent request is accepted for the identity, which
//!    yields the redirect target
//!
//! The first failing step ends the run. Whatever the step, the caller gets a
//! bare `403 Forbidden` and the failure is logged once with its step.
//!
//! ## Providers
//!
//! Both providers are `tower` services ([`api::IdentityRequest`] and
//! [`api::OAuth2Request`]); the HTTP adapters live in [`crate::transport`].
//!
//! ## Default Service Stack
//!
//! [`ConsentApiDefaultStack`] wires the orchestrator to the HTTP adapters, and
//! [`init_consent_api`] builds it from provider URLs.
use std::time::Duration;

pub mod api;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod services;

use crate::{
    telemetry::TracerHandle,
    transport::{hydra::HydraAdminClient, kratos::KratosPublicClient},
};

/// Consent API service talking to the providers over HTTP.
pub type ConsentApiDefaultStack = orchestrator::ConsentApiService<KratosPublicClient, HydraAdminClient>;

/// Initialize the consent API against the given provider endpoints.
///
/// # Arguments
/// * `kratos_public_url` - Base URL of the identity provider public API
/// * `hydra_admin_url` - Base URL of the consent provider admin API
/// * `timeout` - Upper bound for each provider call
/// * `tracer` - Tracer instrumenting runs and propagating context to providers
pub fn init_consent_api(
    kratos_public_url: &str,
    hydra_admin_url: &str,
    timeout: Duration,
    tracer: TracerHandle,
) -> Result<ConsentApiDefaultStack, error::ProviderError> {
    let identity = KratosPublicClient::new(kratos_public_url, timeout, tracer.clone())?;
    let oauth2 = HydraAdminClient::new(hydra_admin_url, timeout, tracer.clone())?;
    Ok(orchestrator::ConsentApiService::new(identity, oauth2).with_tracer(tracer))
}
