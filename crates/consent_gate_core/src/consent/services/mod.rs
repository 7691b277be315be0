//! Pipeline steps of the consent orchestrator.
//!
//! - **Session**: credentials to session, via the identity provider
//! - **Challenge**: consent challenge to consent request, via the consent provider
//! - **Decision**: identity and consent request to redirect, via the consent provider

pub mod challenge;
pub mod decision;
pub mod session;

pub use challenge::ConsentRetriever;
pub use decision::DecisionMaker;
pub use session::SessionValidator;
