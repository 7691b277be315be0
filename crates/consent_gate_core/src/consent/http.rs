//! HTTP surface of the consent API.
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use tower::Service;

use crate::consent::{
    api::{
        CONSENT_CHALLENGE_PARAM, ConsentApiRequest, ConsentDecision, Credentials, IdentityRequest,
        IdentityResponse, OAuth2Request, OAuth2Response,
    },
    error::{ConsentError, ProviderError},
    orchestrator::ConsentApiService,
};

pub const CONSENT_ROUTE: &str = "/api/consent";

/// HTTP outcome of a consent callback.
///
/// Failures are deliberately opaque: every failed run is a bare 403, whichever
/// provider or step caused it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConsentOutcome {
    Accepted(ConsentDecision),
    Forbidden,
}

impl ConsentOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Accepted(_) => StatusCode::OK,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    pub(crate) fn status_for<T>(result: &Result<T, ConsentError>) -> StatusCode {
        match result {
            Ok(_) => StatusCode::OK,
            Err(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ConsentOutcome {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted(decision) => (StatusCode::OK, Json(decision)).into_response(),
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

/// First non-empty `consent_challenge` value of the query string.
fn consent_challenge(uri: &Uri) -> Option<String> {
    url::form_urlencoded::parse(uri.query()?.as_bytes())
        .find(|(key, value)| key == CONSENT_CHALLENGE_PARAM && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Builds the consent API router around a consent API service.
pub fn router<I, O>(api: ConsentApiService<I, O>) -> Router
where
    I: Service<IdentityRequest, Response = IdentityResponse, Error = ProviderError>
        + Clone
        + Send
        + Sync
        + 'static,
    I::Future: Send,
    O: Service<OAuth2Request, Response = OAuth2Response, Error = ProviderError>
        + Clone
        + Send
        + Sync
        + 'static,
    O::Future: Send,
{
    Router::new().route(CONSENT_ROUTE, get(handle_consent::<I, O>)).with_state(api)
}

async fn handle_consent<I, O>(
    State(api): State<ConsentApiService<I, O>>,
    headers: HeaderMap,
    uri: Uri,
) -> ConsentOutcome
where
    I: Service<IdentityRequest, Response = IdentityResponse, Error = ProviderError>
        + Clone
        + Send
        + Sync
        + 'static,
    I::Future: Send,
    O: Service<OAuth2Request, Response = OAuth2Response, Error = ProviderError>
        + Clone
        + Send
        + Sync
        + 'static,
    O::Future: Send,
{
    let request = ConsentApiRequest {
        cx: api.tracer().extract(&headers),
        credentials: Credentials::from_headers(&headers),
        challenge: consent_challenge(&uri),
    };
    api.handle_consent(request).await
}
