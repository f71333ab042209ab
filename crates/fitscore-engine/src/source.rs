//! Profile source contract.
//!
//! The engine never scrapes: a collaborator hands it a normalized
//! [`Profile`]. Failures here are fatal before the pipeline starts.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AnalysisDepth, Profile};

#[derive(Debug, Error)]
pub enum ProfileSourceError {
    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("profile is private or restricted: {0}")]
    PrivateOrRestricted(String),

    #[error("profile source error: {0}")]
    Source(String),
}

/// Supplies normalized profile records by subject id.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Fetch the profile for `subject_id`. `depth` lets sources tailor how
    /// much recent content they materialize.
    async fn fetch(
        &self,
        subject_id: &str,
        depth: AnalysisDepth,
    ) -> Result<Profile, ProfileSourceError>;
}
