use std::{future::Future, pin::Pin, task::Poll};

use opentelemetry::{
    Context, KeyValue,
    trace::{SpanKind, Status, TraceContextExt},
};
use tower::Service;
use tracing::{error, info};

use crate::{
    consent::{
        api::{
            ConsentApiRequest, ConsentDecision, Credentials, IdentityRequest, IdentityResponse,
            OAuth2Request, OAuth2Response,
        },
        error::{ConsentError, ConsentStep, ProviderError},
        http::{CONSENT_ROUTE, ConsentOutcome},
        services::{ConsentRetriever, DecisionMaker, SessionValidator},
    },
    telemetry::{SpanOptions, TracerHandle},
};

/// Name of the span wrapping a whole pipeline run.
pub const HANDLE_CONSENT_SPAN: &str = "consent.handle";

/// Consent API Service
///
/// Runs the consent pipeline: session check, consent lookup, then acceptance.
/// Each step only runs once the previous one succeeded, and the first failure
/// ends the run. The run and each executed step get their own span, all
/// within the trace of the inbound request.
#[derive(Debug, Clone)]
pub struct ConsentApiService<I, O> {
    /// Resolves request credentials into a session
    session: SessionValidator<I>,
    /// Resolves the consent challenge into a consent request
    retriever: ConsentRetriever<O>,
    /// Accepts the consent request
    decision: DecisionMaker<O>,
    tracer: TracerHandle,
}

impl<I, O: Clone> ConsentApiService<I, O> {
    /// Creates a new consent API service on top of the two provider services
    pub fn new(identity: I, oauth2: O) -> Self {
        Self {
            session: SessionValidator::new(identity),
            retriever: ConsentRetriever::new(oauth2.clone()),
            decision: DecisionMaker::new(oauth2),
            tracer: TracerHandle::noop(),
        }
    }

    /// Sets the tracer used to instrument pipeline runs
    pub fn with_tracer(self, tracer: TracerHandle) -> Self {
        Self { tracer, ..self }
    }
}

impl<I, O> ConsentApiService<I, O> {
    pub fn tracer(&self) -> &TracerHandle {
        &self.tracer
    }

    fn step_span(&self, parent: &Context, step: ConsentStep) -> Context {
        self.tracer.start(
            parent,
            format!("consent.{step}"),
            SpanOptions::new()
                .with_kind(SpanKind::Client)
                .with_attribute(KeyValue::new("consent.step", step.as_str())),
        )
    }
}

/// Records the step result on its span and ends it.
fn finish_step<T>(cx: &Context, result: Result<T, ConsentError>) -> Result<T, ConsentError> {
    let span = cx.span();
    match &result {
        Ok(_) => span.set_status(Status::Ok),
        Err(err) => {
            span.record_error(err);
            span.set_status(Status::error(err.to_string()));
        }
    }
    span.end();
    result
}

impl<I, O> ConsentApiService<I, O>
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
    async fn run(
        &self,
        cx: &Context,
        credentials: Credentials,
        challenge: Option<String>,
    ) -> Result<ConsentDecision, ConsentError> {
        // Start -> SessionResolved
        let step_cx = self.step_span(cx, ConsentStep::CheckSession);
        let session = finish_step(&step_cx, self.session.validate(&step_cx, credentials).await)?;

        // SessionResolved -> ConsentResolved
        let step_cx = self.step_span(cx, ConsentStep::GetConsent);
        let consent = finish_step(&step_cx, self.retriever.resolve(&step_cx, challenge).await)?;

        // ConsentResolved -> Decided
        let step_cx = self.step_span(cx, ConsentStep::AcceptConsent);
        finish_step(&step_cx, self.decision.accept(&step_cx, session.identity, consent).await)
    }

    /// Runs the pipeline inside the request span, without logging.
    async fn traced_run(&self, request: ConsentApiRequest) -> Result<ConsentDecision, ConsentError> {
        let cx = self.tracer.start(
            &request.cx,
            HANDLE_CONSENT_SPAN,
            SpanOptions::new()
                .with_kind(SpanKind::Server)
                .with_attribute(KeyValue::new("http.route", CONSENT_ROUTE)),
        );
        let result = self.run(&cx, request.credentials, request.challenge).await;
        let span = cx.span();
        if let Err(err) = &result {
            span.set_status(Status::error(err.to_string()));
        }
        span.set_attribute(KeyValue::new(
            "http.response.status_code",
            i64::from(ConsentOutcome::status_for(&result).as_u16()),
        ));
        span.end();
        result
    }

    /// Handles a consent callback and maps the run to its HTTP outcome.
    ///
    /// A failed run is logged here, once, with the step it failed at.
    pub async fn handle_consent(&self, request: ConsentApiRequest) -> ConsentOutcome {
        match self.traced_run(request).await {
            Ok(decision) => {
                info!(redirect_to = %decision.redirect_to, "[consent] Consent accepted");
                ConsentOutcome::Accepted(decision)
            }
            Err(err) => {
                error!(step = %err.step(), "[consent] {err}");
                ConsentOutcome::Forbidden
            }
        }
    }
}

impl<I, O> Service<ConsentApiRequest> for ConsentApiService<I, O>
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
    type Response = ConsentDecision;
    type Error = ConsentError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ConsentApiRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.traced_run(request).await })
    }
}
