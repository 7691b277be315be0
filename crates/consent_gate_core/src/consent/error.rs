use std::fmt;

use thiserror::Error;

/// Failure reported by a provider adapter.
///
/// Never exposed to HTTP clients: pipeline steps fold it into a [`ConsentError`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("Provider error, transport failure: {0}")]
    Transport(String),

    #[error("Provider error, credentials rejected (status: {0})")]
    Unauthorized(u16),

    #[error("Provider error, resource not found (status: {0})")]
    NotFound(u16),

    #[error("Provider error, unexpected status (status: {0})")]
    Status(u16),

    #[error("Provider error, malformed response: {0}")]
    Decode(String),

    #[error("Provider error, session is not active (id: {0})")]
    InactiveSession(String),

    #[error("Provider error, response does not match the request")]
    UnexpectedResponse,
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else if let Some(status) = error.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Pipeline step a failure originates from.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ConsentStep {
    CheckSession,
    GetConsent,
    AcceptConsent,
}

impl ConsentStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckSession => "check_session",
            Self::GetConsent => "get_consent",
            Self::AcceptConsent => "accept_consent",
        }
    }
}

impl fmt::Display for ConsentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consent pipeline errors.
///
/// All variants map to the same HTTP outcome; the distinction only survives in
/// logs and spans.
#[derive(Debug, Error, PartialEq)]
pub enum ConsentError {
    #[error("Consent error, session invalid at check_session: {0}")]
    SessionInvalid(#[source] ProviderError),

    #[error("Consent error, consent not found at get_consent (challenge: {challenge}): {source}")]
    ConsentNotFound {
        challenge: String,
        #[source]
        source: ProviderError,
    },

    #[error("Consent error, consent not found at get_consent: missing consent_challenge")]
    MissingChallenge,

    #[error("Consent error, decision rejected at accept_consent (challenge: {challenge}): {source}")]
    DecisionRejected {
        challenge: String,
        #[source]
        source: ProviderError,
    },
}

impl ConsentError {
    /// Step that produced the error.
    pub fn step(&self) -> ConsentStep {
        match self {
            Self::SessionInvalid(_) => ConsentStep::CheckSession,
            Self::ConsentNotFound { .. } | Self::MissingChallenge => ConsentStep::GetConsent,
            Self::DecisionRejected { .. } => ConsentStep::AcceptConsent,
        }
    }
}
