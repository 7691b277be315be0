//! Consent provider adapter for the Ory Hydra admin API.
use std::{collections::BTreeMap, future::Future, pin::Pin, task::Poll, time::Duration};

use axum::http::{HeaderMap, StatusCode};
use opentelemetry::Context;
use serde::{Deserialize, Serialize};
use tower::Service;
use tracing::debug;

use crate::{
    consent::{
        api::{
            CONSENT_CHALLENGE_PARAM, ConsentDecision, ConsentRequest, Identity, OAuth2Client,
            OAuth2Request, OAuth2Response,
        },
        error::ProviderError,
    },
    telemetry::TracerHandle,
    transport::base_url,
};

const CONSENT_REQUEST_PATH: &str = "/admin/oauth2/auth/requests/consent";
const CONSENT_ACCEPT_PATH: &str = "/admin/oauth2/auth/requests/consent/accept";

#[derive(Debug, Deserialize)]
struct HydraClient {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HydraConsentRequest {
    challenge: String,
    #[serde(default)]
    client: Option<HydraClient>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    requested_scope: Option<Vec<String>>,
    #[serde(default)]
    requested_access_token_audience: Option<Vec<String>>,
    #[serde(default)]
    skip: Option<bool>,
}

impl From<HydraConsentRequest> for ConsentRequest {
    fn from(request: HydraConsentRequest) -> Self {
        ConsentRequest {
            challenge: request.challenge,
            client: request.client.map(|client| OAuth2Client {
                client_id: client.client_id.unwrap_or_default(),
                client_name: client.client_name.unwrap_or_default(),
            }),
            subject: request.subject,
            requested_scope: request.requested_scope.unwrap_or_default(),
            requested_access_token_audience: request
                .requested_access_token_audience
                .unwrap_or_default(),
            skip: request.skip.unwrap_or(false),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct AcceptSession {
    id_token: BTreeMap<String, String>,
}

/// Body of `PUT .../consent/accept`.
#[derive(Debug, Serialize, PartialEq)]
struct AcceptConsentBody {
    grant_scope: Vec<String>,
    grant_access_token_audience: Vec<String>,
    remember: bool,
    session: AcceptSession,
}

impl AcceptConsentBody {
    /// Grants everything requested and exposes the identity traits in the ID token.
    fn grant_all(identity: Identity, consent: &ConsentRequest) -> Self {
        Self {
            grant_scope: consent.requested_scope.clone(),
            grant_access_token_audience: consent.requested_access_token_audience.clone(),
            remember: false,
            session: AcceptSession { id_token: identity.traits },
        }
    }
}

fn check_status(status: StatusCode) -> Result<(), ProviderError> {
    match status {
        status if status.is_success() => Ok(()),
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(ProviderError::NotFound(status.as_u16())),
        status => Err(ProviderError::Status(status.as_u16())),
    }
}

/// Reads and accepts consent requests through the Hydra admin API.
#[derive(Debug, Clone)]
pub struct HydraAdminClient {
    http: reqwest::Client,
    admin_url: String,
    tracer: TracerHandle,
}

impl HydraAdminClient {
    pub fn new(
        admin_url: &str,
        timeout: Duration,
        tracer: TracerHandle,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, admin_url: base_url(admin_url), tracer })
    }

    fn trace_headers(&self, cx: &Context) -> HeaderMap {
        let mut headers = HeaderMap::new();
        self.tracer.inject(cx, &mut headers);
        headers
    }

    async fn get_consent(
        &self,
        cx: &Context,
        challenge: String,
    ) -> Result<ConsentRequest, ProviderError> {
        let url = format!("{}{CONSENT_REQUEST_PATH}", self.admin_url);
        debug!(url = %url, challenge = %challenge, "[hydra] GetConsent");
        let response = self
            .http
            .get(url)
            .headers(self.trace_headers(cx))
            .query(&[(CONSENT_CHALLENGE_PARAM, challenge.as_str())])
            .send()
            .await?;
        check_status(response.status())?;
        Ok(response.json::<HydraConsentRequest>().await?.into())
    }

    async fn accept_consent(
        &self,
        cx: &Context,
        identity: Identity,
        consent: ConsentRequest,
    ) -> Result<ConsentDecision, ProviderError> {
        let url = format!("{}{CONSENT_ACCEPT_PATH}", self.admin_url);
        debug!(url = %url, challenge = %consent.challenge, "[hydra] AcceptConsent");
        let response = self
            .http
            .put(url)
            .headers(self.trace_headers(cx))
            .query(&[(CONSENT_CHALLENGE_PARAM, consent.challenge.as_str())])
            .json(&AcceptConsentBody::grant_all(identity, &consent))
            .send()
            .await?;
        check_status(response.status())?;
        Ok(response.json::<ConsentDecision>().await?)
    }
}

impl Service<OAuth2Request> for HydraAdminClient {
    type Response = OAuth2Response;
    type Error = ProviderError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: OAuth2Request) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            match request {
                OAuth2Request::GetConsent { cx, challenge } => {
                    this.get_consent(&cx, challenge).await.map(OAuth2Response::Consent)
                }
                OAuth2Request::AcceptConsent { cx, identity, consent } => {
                    this.accept_consent(&cx, identity, consent).await.map(OAuth2Response::Accepted)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_request_with_null_lists() {
        let raw = r#"{
            "challenge": "7bb518c4eec2454dbb289f5fdb4c0ee2",
            "client": {"client_id": "app", "client_name": null, "redirect_uris": []},
            "subject": "9a8b7c6d",
            "requested_scope": ["openid", "email"],
            "requested_access_token_audience": null
        }"#;
        let consent: ConsentRequest =
            serde_json::from_str::<HydraConsentRequest>(raw).unwrap().into();
        assert_eq!(consent.challenge, "7bb518c4eec2454dbb289f5fdb4c0ee2");
        assert_eq!(
            consent.client,
            Some(OAuth2Client { client_id: "app".into(), client_name: String::new() })
        );
        assert_eq!(consent.requested_scope, vec!["openid", "email"]);
        assert!(consent.requested_access_token_audience.is_empty());
        assert!(!consent.skip);
    }

    #[test]
    fn test_accept_body_grants_requested_scopes() {
        let mut consent = ConsentRequest::new("challenge");
        consent.requested_scope = vec!["openid".into()];
        consent.requested_access_token_audience = vec!["api".into()];
        let identity = Identity {
            id: "id".into(),
            traits: BTreeMap::from([("email".to_string(), "jane@example.test".to_string())]),
            ..Default::default()
        };

        let body = serde_json::to_value(AcceptConsentBody::grant_all(identity, &consent)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "grant_scope": ["openid"],
                "grant_access_token_audience": ["api"],
                "remember": false,
                "session": {"id_token": {"email": "jane@example.test"}}
            })
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(check_status(StatusCode::OK), Ok(()));
        assert_eq!(check_status(StatusCode::NOT_FOUND), Err(ProviderError::NotFound(404)));
        assert_eq!(check_status(StatusCode::GONE), Err(ProviderError::NotFound(410)));
        assert_eq!(
            check_status(StatusCode::INTERNAL_SERVER_ERROR),
            Err(ProviderError::Status(500))
        );
    }
}
