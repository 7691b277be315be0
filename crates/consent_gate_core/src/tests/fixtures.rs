use std::{
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    task::Poll,
};

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use opentelemetry::{
    Context,
    trace::{SpanContext, TraceContextExt},
};
use tokio::net::TcpListener;
use tower::Service;
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context as LayerContext};

use crate::consent::{
    api::{
        ConsentDecision, ConsentRequest, Credentials, Identity, IdentityRequest, IdentityResponse,
        OAuth2Client, OAuth2Request, OAuth2Response, Session,
    },
    error::ProviderError,
};

pub(super) const CHALLENGE: &str = "7bb518c4eec2454dbb289f5fdb4c0ee2";
pub(super) const REDIRECT_TO: &str =
    "https://auth.example.test/oauth2/auth?client_id=app&consent_verifier=4f2c9a";
pub(super) const SESSION_COOKIE: &str = "ory_kratos_session=MTY5NzQ2NDI1MnxEdi1CQkFFQ";

/// Sends a GET request to the consent router, optionally with extra headers.
///
/// Expands to `(StatusCode, Bytes)`.
macro_rules! consent_call {
    ($app:expr, $uri:expr) => {
        consent_call!($app, $uri, [])
    };
    ($app:expr, $uri:expr, [$(($name:expr, $value:expr)),* $(,)?]) => {{
        use tower::ServiceExt;
        let request = axum::http::Request::builder()
            .uri($uri)
            $(.header($name, $value))*
            .body(axum::body::Body::empty())
            .unwrap();
        let response = $app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body)
    }};
}

pub(super) fn consent_uri(challenge: &str) -> String {
    format!("{}?consent_challenge={challenge}", crate::consent::http::CONSENT_ROUTE)
}

pub(super) fn active_session() -> Session {
    Session {
        id: "f3b4c1d2-5e6f-4a7b-8c9d-0e1f2a3b4c5d".to_string(),
        active: true,
        expires_at: Some("2030-01-01T00:00:00Z".to_string()),
        identity: Identity {
            id: "9a8b7c6d-5e4f-4a3b-2c1d-0e9f8a7b6c5d".to_string(),
            schema_id: "default".to_string(),
            schema_url: "https://test.com/test.json".to_string(),
            traits: BTreeMap::from([("email".to_string(), "jane@example.test".to_string())]),
        },
    }
}

pub(super) fn pending_consent() -> ConsentRequest {
    ConsentRequest {
        challenge: CHALLENGE.to_string(),
        client: Some(OAuth2Client {
            client_id: "app".to_string(),
            client_name: "Example App".to_string(),
        }),
        subject: Some(active_session().identity.id),
        requested_scope: vec!["openid".to_string(), "offline".to_string()],
        requested_access_token_audience: vec![],
        skip: false,
    }
}

type Recorded<T> = Arc<Mutex<Vec<T>>>;

fn record<T>(recorded: &Recorded<T>, item: T) {
    recorded.lock().unwrap().push(item);
}

fn recorded<T: Clone>(recorded: &Recorded<T>) -> Vec<T> {
    recorded.lock().unwrap().clone()
}

/// Identity provider answering every session check with the same outcome.
#[derive(Clone)]
pub(super) struct IdentityMock {
    session: Result<Session, ProviderError>,
    calls: Recorded<(Credentials, SpanContext)>,
}

impl IdentityMock {
    pub fn new(session: Result<Session, ProviderError>) -> Self {
        Self { session, calls: Arc::default() }
    }

    pub fn active() -> Self {
        Self::new(Ok(active_session()))
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn credentials(&self) -> Vec<Credentials> {
        recorded(&self.calls).into_iter().map(|(credentials, _)| credentials).collect()
    }

    /// Span contexts the provider was called with.
    pub fn contexts(&self) -> Vec<SpanContext> {
        recorded(&self.calls).into_iter().map(|(_, span_context)| span_context).collect()
    }
}

impl Service<IdentityRequest> for IdentityMock {
    type Response = IdentityResponse;
    type Error = ProviderError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: IdentityRequest) -> Self::Future {
        let IdentityRequest::CheckSession { cx, credentials } = request;
        record(&self.calls, (credentials, span_context(&cx)));
        let response = self.session.clone().map(IdentityResponse::Session);
        Box::pin(async move { response })
    }
}

/// Consent provider with fixed outcomes for lookups and acceptances.
#[derive(Clone)]
pub(super) struct OAuth2Mock {
    consent: Result<ConsentRequest, ProviderError>,
    decision: Result<ConsentDecision, ProviderError>,
    get_calls: Recorded<(String, SpanContext)>,
    accept_calls: Recorded<(Identity, ConsentRequest, SpanContext)>,
}

impl OAuth2Mock {
    pub fn new(
        consent: Result<ConsentRequest, ProviderError>,
        decision: Result<ConsentDecision, ProviderError>,
    ) -> Self {
        Self { consent, decision, get_calls: Arc::default(), accept_calls: Arc::default() }
    }

    pub fn accepting() -> Self {
        Self::new(Ok(pending_consent()), Ok(ConsentDecision::new(REDIRECT_TO)))
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.lock().unwrap().len()
    }

    pub fn accept_calls(&self) -> usize {
        self.accept_calls.lock().unwrap().len()
    }

    pub fn challenges(&self) -> Vec<String> {
        recorded(&self.get_calls).into_iter().map(|(challenge, _)| challenge).collect()
    }

    pub fn accepted(&self) -> Vec<(Identity, ConsentRequest)> {
        recorded(&self.accept_calls)
            .into_iter()
            .map(|(identity, consent, _)| (identity, consent))
            .collect()
    }

    pub fn get_contexts(&self) -> Vec<SpanContext> {
        recorded(&self.get_calls).into_iter().map(|(_, span_context)| span_context).collect()
    }

    pub fn accept_contexts(&self) -> Vec<SpanContext> {
        recorded(&self.accept_calls).into_iter().map(|(_, _, span_context)| span_context).collect()
    }
}

impl Service<OAuth2Request> for OAuth2Mock {
    type Response = OAuth2Response;
    type Error = ProviderError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: OAuth2Request) -> Self::Future {
        let response = match request {
            OAuth2Request::GetConsent { cx, challenge } => {
                record(&self.get_calls, (challenge, span_context(&cx)));
                self.consent.clone().map(OAuth2Response::Consent)
            }
            OAuth2Request::AcceptConsent { cx, identity, consent } => {
                record(&self.accept_calls, (identity, consent, span_context(&cx)));
                self.decision.clone().map(OAuth2Response::Accepted)
            }
        };
        Box::pin(async move { response })
    }
}

/// Request received by a [`ProviderStub`].
#[derive(Debug, Clone)]
pub(super) struct ReceivedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
}

/// Local HTTP provider answering every request with one canned JSON response.
#[derive(Clone)]
pub(super) struct ProviderStub {
    status: StatusCode,
    body: String,
    received: Recorded<ReceivedRequest>,
}

impl ProviderStub {
    /// Serves on an ephemeral loopback port and returns the base URL.
    pub async fn spawn(status: StatusCode, body: &str) -> (String, Self) {
        let stub = Self { status, body: body.to_string(), received: Arc::default() };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let app = Router::new().fallback(respond).with_state(stub.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (url, stub)
    }

    pub fn received(&self) -> Vec<ReceivedRequest> {
        recorded(&self.received)
    }
}

async fn respond(
    State(stub): State<ProviderStub>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    record(
        &stub.received,
        ReceivedRequest {
            method,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers,
            body,
        },
    );
    (stub.status, [(CONTENT_TYPE, "application/json")], stub.body).into_response()
}

/// Base URL nothing listens on.
pub(super) async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    format!("http://{}", listener.local_addr().unwrap())
}

fn span_context(cx: &Context) -> SpanContext {
    cx.span().span_context().clone()
}

/// Fields of a captured log event, `message` included.
pub(super) type EventFields = BTreeMap<String, String>;

#[derive(Default)]
struct FieldVisitor(EventFields);

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}

/// Layer capturing every event of one level.
#[derive(Clone)]
pub(super) struct LogEvents {
    level: Level,
    events: Recorded<EventFields>,
}

impl LogEvents {
    pub fn at(level: Level) -> Self {
        Self { level, events: Arc::default() }
    }

    pub fn errors() -> Self {
        Self::at(Level::ERROR)
    }

    pub fn events(&self) -> Vec<EventFields> {
        recorded(&self.events)
    }

    /// Installs the layer for the current thread until the guard is dropped.
    pub fn capture(&self) -> tracing::subscriber::DefaultGuard {
        use tracing_subscriber::prelude::*;
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }
}

impl<S: Subscriber> Layer<S> for LogEvents {
    fn on_event(&self, event: &Event<'_>, _: LayerContext<'_, S>) {
        if *event.metadata().level() == self.level {
            let mut visitor = FieldVisitor::default();
            event.record(&mut visitor);
            record(&self.events, visitor.0);
        }
    }
}
