//! Consent API type definitions.
//!
//! Domain records exchanged along the consent pipeline, and the request and
//! response enums of the two provider services it depends on:
//!
//! ## Identity provider
//! Resolves the credentials attached to an inbound request into a [`Session`].
//!
//! ## Consent (OAuth2) provider
//! Looks up the [`ConsentRequest`] behind a consent challenge and accepts it,
//! producing the [`ConsentDecision`] the browser gets redirected with.

use std::collections::BTreeMap;

use axum::http::{HeaderMap, header::COOKIE};
use opentelemetry::Context;
use serde::{Deserialize, Serialize};

/// Name of the query parameter carrying the consent challenge.
pub const CONSENT_CHALLENGE_PARAM: &str = "consent_challenge";

/// A single request cookie.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// Session proof material attached to an inbound request.
///
/// May be empty, in which case the identity provider is expected to reject it.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Credentials {
    cookies: Vec<Cookie>,
}

impl Credentials {
    pub fn new(cookies: Vec<Cookie>) -> Self {
        Self { cookies }
    }

    /// Collects the cookies of every `Cookie` header, in header order.
    ///
    /// Malformed pairs (no `=`, empty name) and non UTF-8 headers are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let cookies = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some(Cookie::new(name, value.trim().trim_matches('"')))
            })
            .collect();
        Self { cookies }
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Renders the cookies back into a single `Cookie` header value.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|cookie| format!("{}={}", cookie.name, cookie.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Subject record resolved by the identity provider.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub schema_id: String,
    #[serde(default)]
    pub schema_url: String,
    #[serde(default)]
    pub traits: BTreeMap<String, String>,
}

/// Session resolved from the request credentials.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub expires_at: Option<String>,
    pub identity: Identity,
}

/// OAuth2 client on whose behalf consent is requested.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct OAuth2Client {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_name: String,
}

/// Consent request pending at the consent provider for one challenge.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConsentRequest {
    pub challenge: String,
    #[serde(default)]
    pub client: Option<OAuth2Client>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub requested_scope: Vec<String>,
    #[serde(default)]
    pub requested_access_token_audience: Vec<String>,
    #[serde(default)]
    pub skip: bool,
}

impl ConsentRequest {
    pub fn new(challenge: impl Into<String>) -> Self {
        Self { challenge: challenge.into(), ..Default::default() }
    }
}

/// Outcome of an accepted consent: where the user agent goes next.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConsentDecision {
    pub redirect_to: String,
}

impl ConsentDecision {
    pub fn new(redirect_to: impl Into<String>) -> Self {
        Self { redirect_to: redirect_to.into() }
    }
}

/// Identity provider request types.
///
/// Each request carries the trace context of the pipeline step issuing it, so
/// that provider adapters can propagate it on the wire.
#[derive(Debug, Clone)]
pub enum IdentityRequest {
    /// Resolve the session proven by the given credentials.
    CheckSession { cx: Context, credentials: Credentials },
}

/// Identity provider response types.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum IdentityResponse {
    Session(Session),
}

/// Consent provider request types.
#[derive(Debug, Clone)]
pub enum OAuth2Request {
    /// Fetch the consent request identified by a challenge.
    GetConsent { cx: Context, challenge: String },
    /// Accept a consent request on behalf of an identity.
    AcceptConsent { cx: Context, identity: Identity, consent: ConsentRequest },
}

/// Consent provider response types.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum OAuth2Response {
    /// Consent request returned for `GetConsent`.
    Consent(ConsentRequest),
    /// Redirect returned for `AcceptConsent`.
    Accepted(ConsentDecision),
}

/// Pipeline request built from an inbound consent callback.
#[derive(Debug, Clone, Default)]
pub struct ConsentApiRequest {
    /// Parent trace context, usually extracted from the inbound headers.
    pub cx: Context,
    pub credentials: Credentials,
    /// Value of the `consent_challenge` query parameter, if present.
    pub challenge: Option<String>,
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_credentials_from_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("ory_kratos_session=abc; csrf=\"x=y\""));
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; broken; =orphan"));

        let credentials = Credentials::from_headers(&headers);
        assert_eq!(
            credentials.cookies(),
            &[
                Cookie::new("ory_kratos_session", "abc"),
                Cookie::new("csrf", "x=y"),
                Cookie::new("theme", "dark"),
            ]
        );
        assert_eq!(
            credentials.header_value().as_deref(),
            Some("ory_kratos_session=abc; csrf=x=y; theme=dark")
        );
    }

    #[test]
    fn test_credentials_empty() {
        let credentials = Credentials::from_headers(&HeaderMap::new());
        assert!(credentials.is_empty());
        assert_eq!(credentials.header_value(), None);
    }

    #[test]
    fn test_consent_decision_wire_format() {
        let decision = ConsentDecision::new("https://example.test/done");
        assert_eq!(
            serde_json::to_string(&decision).unwrap(),
            r#"{"redirect_to":"https://example.test/done"}"#
        );
    }
}
