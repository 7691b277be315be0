//! Consent retrieval step: resolves a consent challenge into its consent request.
use opentelemetry::Context;
use tower::{Service, ServiceExt};
use tracing::debug;

use crate::consent::{
    api::{ConsentRequest, OAuth2Request, OAuth2Response},
    error::{ConsentError, ProviderError},
};

#[derive(Debug, Clone)]
pub struct ConsentRetriever<O> {
    oauth2: O,
}

impl<O> ConsentRetriever<O> {
    pub fn new(oauth2: O) -> Self {
        Self { oauth2 }
    }
}

impl<O> ConsentRetriever<O>
where
    O: Service<OAuth2Request, Response = OAuth2Response, Error = ProviderError> + Clone,
{
    /// Fetches the consent request for `challenge`.
    ///
    /// An absent or empty challenge fails without contacting the provider.
    pub async fn resolve(
        &self,
        cx: &Context,
        challenge: Option<String>,
    ) -> Result<ConsentRequest, ConsentError> {
        let challenge = match challenge {
            Some(challenge) if !challenge.is_empty() => challenge,
            _ => return Err(ConsentError::MissingChallenge),
        };
        debug!(challenge = %challenge, "[consent] GetConsent");
        let not_found =
            |source| ConsentError::ConsentNotFound { challenge: challenge.clone(), source };
        let mut oauth2 = self.oauth2.clone();
        match oauth2
            .ready()
            .await
            .map_err(not_found)?
            .call(OAuth2Request::GetConsent { cx: cx.clone(), challenge: challenge.clone() })
            .await
            .map_err(not_found)?
        {
            OAuth2Response::Consent(consent) => Ok(consent),
            OAuth2Response::Accepted(_) => Err(not_found(ProviderError::UnexpectedResponse)),
        }
    }
}
