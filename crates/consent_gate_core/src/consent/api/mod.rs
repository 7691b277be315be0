//! Types exchanged by the consent pipeline and its provider services.

pub mod types;

pub use types::*;
