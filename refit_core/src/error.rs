//! Error types.
//!
//! [`RefitError`] covers configuration and provider setup; these propagate as
//! `Result`s to the caller. [`RefitFailure`] explains why one track produced
//! no trajectory. It is never fatal: [`crate::Refitter::refit`] turns it into
//! an empty result.

use crate::direction::TrackEnd;
use crate::services::ProviderCategory;
use crate::types::DetId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefitError {
    #[error("Unknown refit direction: {0}")]
    UnknownRefitDirection(String),

    #[error("No {category} provider named '{name}'")]
    ProviderNotFound {
        category: ProviderCategory,
        name: String,
    },

    #[error("Services have not been set up")]
    ServicesNotSet,
}

/// Reason a single refit produced no trajectory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefitFailure {
    #[error("Too few hits for a refit: {0}")]
    TooFewHits(usize),

    #[error("Invalid starting state at the {0} end of the track")]
    InvalidStartingState(TrackEnd),

    #[error("Propagation to {0} failed")]
    PropagationFailed(DetId),

    #[error("No trajectory refitted in pass {0}")]
    FitFailed(usize),

    #[error("No trajectory smoothed in pass {0}")]
    SmoothFailed(usize),

    #[error("Services have not been set up")]
    ServicesNotSet,
}

impl RefitFailure {
    /// Short stable label, used as a metrics key.
    pub fn label(&self) -> &'static str {
        match self {
            RefitFailure::TooFewHits(_) => "too_few_hits",
            RefitFailure::InvalidStartingState(_) => "invalid_starting_state",
            RefitFailure::PropagationFailed(_) => "propagation_failed",
            RefitFailure::FitFailed(_) => "fit_failed",
            RefitFailure::SmoothFailed(_) => "smooth_failed",
            RefitFailure::ServicesNotSet => "services_not_set",
        }
    }
}
