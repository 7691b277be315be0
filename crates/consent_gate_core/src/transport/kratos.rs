//! Identity provider adapter for the Ory Kratos public API.
use std::{collections::BTreeMap, future::Future, pin::Pin, task::Poll, time::Duration};

use axum::http::{HeaderMap, HeaderValue, StatusCode, header::COOKIE};
use opentelemetry::Context;
use serde::Deserialize;
use serde_json::{Map, Value};
use tower::Service;
use tracing::debug;

use crate::{
    consent::{
        api::{Credentials, Identity, IdentityRequest, IdentityResponse, Session},
        error::ProviderError,
    },
    telemetry::TracerHandle,
    transport::base_url,
};

#[derive(Debug, Deserialize)]
struct WhoamiIdentity {
    id: String,
    #[serde(default)]
    schema_id: String,
    #[serde(default)]
    schema_url: String,
    #[serde(default)]
    traits: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct WhoamiSession {
    id: String,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    expires_at: Option<String>,
    identity: WhoamiIdentity,
}

/// Flattens identity traits to strings; non-string values keep their JSON form.
fn flatten_traits(traits: Map<String, Value>) -> BTreeMap<String, String> {
    traits
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(value) => (key, value),
            value => (key, value.to_string()),
        })
        .collect()
}

impl From<WhoamiSession> for Session {
    fn from(session: WhoamiSession) -> Self {
        Session {
            id: session.id,
            active: session.active.unwrap_or(false),
            expires_at: session.expires_at,
            identity: Identity {
                id: session.identity.id,
                schema_id: session.identity.schema_id,
                schema_url: session.identity.schema_url,
                traits: flatten_traits(session.identity.traits.unwrap_or_default()),
            },
        }
    }
}

/// Checks sessions against `GET {public_url}/sessions/whoami`.
#[derive(Debug, Clone)]
pub struct KratosPublicClient {
    http: reqwest::Client,
    public_url: String,
    tracer: TracerHandle,
}

impl KratosPublicClient {
    pub fn new(
        public_url: &str,
        timeout: Duration,
        tracer: TracerHandle,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, public_url: base_url(public_url), tracer })
    }

    async fn whoami(&self, cx: &Context, credentials: Credentials) -> Result<Session, ProviderError> {
        let mut headers = HeaderMap::new();
        self.tracer.inject(cx, &mut headers);
        if let Some(cookie) = credentials.header_value() {
            let cookie = HeaderValue::from_str(&cookie)
                .map_err(|err| ProviderError::Transport(err.to_string()))?;
            headers.insert(COOKIE, cookie);
        }
        let url = format!("{}/sessions/whoami", self.public_url);
        debug!(url = %url, "[kratos] whoami");
        let response = self.http.get(url).headers(headers).send().await?;
        match response.status() {
            status if status.is_success() => {
                Ok(response.json::<WhoamiSession>().await?.into())
            }
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Err(ProviderError::Unauthorized(status.as_u16()))
            }
            status => Err(ProviderError::Status(status.as_u16())),
        }
    }
}

impl Service<IdentityRequest> for KratosPublicClient {
    type Response = IdentityResponse;
    type Error = ProviderError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: IdentityRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            match request {
                IdentityRequest::CheckSession { cx, credentials } => {
                    this.whoami(&cx, credentials).await.map(IdentityResponse::Session)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whoami_session_conversion() {
        let raw = r#"{
            "id": "f3b4c1d2",
            "active": true,
            "expires_at": "2030-01-01T00:00:00Z",
            "authenticated_at": "2024-01-01T00:00:00Z",
            "identity": {
                "id": "9a8b7c6d",
                "schema_id": "default",
                "schema_url": "https://test.com/test.json",
                "state": "active",
                "traits": {"email": "jane@example.test", "name": {"first": "Jane"}, "age": 42}
            }
        }"#;
        let session: Session = serde_json::from_str::<WhoamiSession>(raw).unwrap().into();
        assert!(session.active);
        assert_eq!(session.identity.id, "9a8b7c6d");
        assert_eq!(session.identity.schema_id, "default");
        assert_eq!(session.identity.traits["email"], "jane@example.test");
        assert_eq!(session.identity.traits["name"], r#"{"first":"Jane"}"#);
        assert_eq!(session.identity.traits["age"], "42");
    }

    #[test]
    fn test_whoami_session_without_traits_is_inactive_by_default() {
        let raw = r#"{"id": "s", "identity": {"id": "i", "traits": null}}"#;
        let session: Session = serde_json::from_str::<WhoamiSession>(raw).unwrap().into();
        assert!(!session.active);
        assert!(session.identity.traits.is_empty());
    }
}
