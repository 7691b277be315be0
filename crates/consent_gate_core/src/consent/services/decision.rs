//! Consent decision step: accepts a consent request on behalf of an identity.
use opentelemetry::Context;
use tower::{Service, ServiceExt};
use tracing::debug;

use crate::consent::{
    api::{ConsentDecision, ConsentRequest, Identity, OAuth2Request, OAuth2Response},
    error::{ConsentError, ProviderError},
};

/// Accepts consent unconditionally once identity and consent request are known.
///
/// There is no scope negotiation: whatever the client requested is granted.
#[derive(Debug, Clone)]
pub struct DecisionMaker<O> {
    oauth2: O,
}

impl<O> DecisionMaker<O> {
    pub fn new(oauth2: O) -> Self {
        Self { oauth2 }
    }
}

impl<O> DecisionMaker<O>
where
    O: Service<OAuth2Request, Response = OAuth2Response, Error = ProviderError> + Clone,
{
    pub async fn accept(
        &self,
        cx: &Context,
        identity: Identity,
        consent: ConsentRequest,
    ) -> Result<ConsentDecision, ConsentError> {
        debug!(
            subject = %identity.id,
            challenge = %consent.challenge,
            scope = ?consent.requested_scope,
            "[decision] AcceptConsent"
        );
        let challenge = consent.challenge.clone();
        let rejected =
            |source| ConsentError::DecisionRejected { challenge: challenge.clone(), source };
        let mut oauth2 = self.oauth2.clone();
        match oauth2
            .ready()
            .await
            .map_err(rejected)?
            .call(OAuth2Request::AcceptConsent { cx: cx.clone(), identity, consent })
            .await
            .map_err(rejected)?
        {
            OAuth2Response::Accepted(decision) => Ok(decision),
            OAuth2Response::Consent(_) => Err(rejected(ProviderError::UnexpectedResponse)),
        }
    }
}
