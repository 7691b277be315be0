//! Session validation step: resolves request credentials into a session.
use opentelemetry::Context;
use tower::{Service, ServiceExt};
use tracing::debug;

use crate::consent::{
    api::{Credentials, IdentityRequest, IdentityResponse, Session},
    error::{ConsentError, ProviderError},
};

/// Resolves request credentials against the identity provider.
///
/// Every failure, whatever its cause, surfaces as [`ConsentError::SessionInvalid`].
#[derive(Debug, Clone)]
pub struct SessionValidator<I> {
    identity: I,
}

impl<I> SessionValidator<I> {
    pub fn new(identity: I) -> Self {
        Self { identity }
    }
}

impl<I> SessionValidator<I>
where
    I: Service<IdentityRequest, Response = IdentityResponse, Error = ProviderError> + Clone,
{
    pub async fn validate(
        &self,
        cx: &Context,
        credentials: Credentials,
    ) -> Result<Session, ConsentError> {
        debug!(cookies = credentials.cookies().len(), "[session] CheckSession");
        let mut identity = self.identity.clone();
        let IdentityResponse::Session(session) = identity
            .ready()
            .await
            .map_err(ConsentError::SessionInvalid)?
            .call(IdentityRequest::CheckSession { cx: cx.clone(), credentials })
            .await
            .map_err(ConsentError::SessionInvalid)?;
        if !session.active {
            return Err(ConsentError::SessionInvalid(ProviderError::InactiveSession(session.id)));
        }
        Ok(session)
    }
}
