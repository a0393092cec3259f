//! `refit_core`: Track refitting driver.
//!
//! # Module layout
//! - [`types`]: Detector ids, surfaces, states, hits, tracks
//! - [`direction`]: Refit direction policy and direction resolution
//! - [`trajectory`]: Seeds, measurements and fitted trajectories
//! - [`providers`]: Collaborator traits (geometry, field, propagator, fitter, ...)
//! - [`services`]: Version-stamped provider cache
//! - [`config`]: Refitter configuration
//! - [`hit_selection`]: Valid/subsystem filtering of track hits
//! - [`assembler`]: Seed construction and predictions-only trajectories
//! - [`refitter`]: Fit → smooth → reverse driver
//! - [`error`]: Setup errors and per-track refit failures
//! - [`metrics`]: Efficiency, χ²/ndof, pT resolution

pub mod assembler;
pub mod config;
pub mod direction;
pub mod error;
pub mod hit_selection;
pub mod metrics;
pub mod providers;
pub mod refitter;
pub mod services;
pub mod trajectory;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use config::RefitterConfig;
pub use direction::{GeometricalDirection, PropagationDirection, RefitDirection, TrackEnd};
pub use error::{RefitError, RefitFailure};
pub use metrics::RefitMetrics;
pub use refitter::{Refitter, REFIT_PASSES};
pub use services::{ProviderCategory, ServiceSource};
pub use trajectory::{Trajectory, TrajectoryMeasurement, TrajectorySeed};
pub use types::{DetId, FitHit, MuonSubsystem, RecHit, Subsystem, Surface, Track, TrajectoryState};
