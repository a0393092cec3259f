//! Refit driver: direction resolution, starting state and the
//! fit → smooth → reverse cycle.
//!
//! # Processing steps per track
//! 1. Give up if fewer than 2 hits are available
//! 2. Resolve hit order, momentum direction and fit direction; reverse hits
//! 3. Pick the starting boundary state (innermost or outermost)
//! 4. Propagate it onto the first hit's surface if it sits elsewhere
//! 5. Predictions-only mode: propagate through all hits and stop
//! 6. Otherwise fit + smooth [`REFIT_PASSES`] times, reversing the smoothed
//!    trajectory between passes; the last smoothing result is returned
//!
//! Any failure makes the track produce no trajectory at all.

use crate::assembler::{build_seed, collect_predictions};
use crate::config::RefitterConfig;
use crate::direction::{
    momentum_direction, order_by_radius, resolve, GeometricalDirection, TrackEnd,
};
use crate::error::{RefitError, RefitFailure};
use crate::hit_selection::{select_hits, MuonHitPolicy};
use crate::providers::{Geometry, TransientTrack};
use crate::services::{ProviderCategory, ReadyServices, ServiceSource, Services};
use crate::trajectory::Trajectory;
use crate::types::{FitHit, Track};
use tracing::{debug, trace};

/// Number of fit + smooth passes. The first pass is the directional fit; the
/// following two refit forward and backward so that the returned covariance
/// does not depend on the direction of the first pass.
pub const REFIT_PASSES: usize = 3;

/// Refits reconstructed tracks into trajectories.
pub struct Refitter {
    config: RefitterConfig,
    services: Services,
}

impl Refitter {
    pub fn new(config: RefitterConfig) -> Self {
        Self {
            config,
            services: Services::default(),
        }
    }

    pub fn config(&self) -> &RefitterConfig {
        &self.config
    }

    /// Refresh cached providers from `source`; call once per processing unit.
    pub fn set_services(
        &mut self,
        source: &dyn ServiceSource,
    ) -> Result<Vec<ProviderCategory>, RefitError> {
        self.services.refresh(source, &self.config)
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Fit-ready hits of `track`, in track order.
    pub fn select_hits(&self, track: &Track) -> Result<Vec<FitHit>, RefitError> {
        let services = self.services.ready().ok_or(RefitError::ServicesNotSet)?;
        Ok(select_hits(
            track,
            services.geometry,
            services.hit_builders,
            MuonHitPolicy::from(&self.config),
        ))
    }

    /// Refit `track` with its own selected hits. Empty on any failure.
    pub fn refit_track(&self, track: &Track) -> Vec<Trajectory> {
        match self.select_hits(track) {
            Ok(hits) => self.refit(track, &hits),
            Err(err) => {
                trace!(%err, "refit skipped");
                Vec::new()
            }
        }
    }

    /// Refit `track` with a given hit sequence. Returns at most one
    /// trajectory; empty on any failure.
    pub fn refit(&self, track: &Track, hits: &[FitHit]) -> Vec<Trajectory> {
        self.try_refit(track, hits).map(|t| vec![t]).unwrap_or_default()
    }

    /// Like [`Refitter::refit`], reporting why no trajectory was produced.
    pub fn try_refit(&self, track: &Track, hits: &[FitHit]) -> Result<Trajectory, RefitFailure> {
        if hits.len() < 2 {
            return Err(RefitFailure::TooFewHits(hits.len()));
        }
        let services = self.services.ready().ok_or(RefitFailure::ServicesNotSet)?;
        let result = self.run(&services, track, hits);
        if let Err(failure) = &result {
            trace!(%failure, "no trajectory");
        }
        result
    }

    fn run(
        &self,
        services: &ReadyServices<'_>,
        track: &Track,
        hits: &[FitHit],
    ) -> Result<Trajectory, RefitFailure> {
        let transient = TransientTrack::new(track, services.field, services.geometry);
        let policy = self.config.refit_direction;

        let rec_hits_order = check_rec_hits_ordering(hits, services.geometry);
        trace!(?rec_hits_order, "rec hit order");

        let momentum = match transient.innermost_state() {
            Some(s) => momentum_direction(&s.position, &s.momentum),
            None => {
                trace!("innermost state invalid, momentum direction undetermined");
                GeometricalDirection::Undetermined
            }
        };
        let decision = resolve(rec_hits_order, momentum, policy);
        trace!(
            ?momentum,
            fit_direction = ?decision.propagation_direction,
            reverse = decision.reverse_hits,
            start = %decision.start_from,
            "refit direction"
        );

        let mut hits = hits.to_vec();
        if decision.reverse_hits {
            hits.reverse();
        }

        let mut start = transient
            .boundary_state(decision.start_from)
            .ok_or(RefitFailure::InvalidStartingState(decision.start_from))?;
        if let (TrackEnd::Innermost, Some(b)) = (decision.start_from, transient.field_at_innermost()) {
            trace!(pt = start.transverse_momentum(), bz = b.z, "starting state");
        }

        let mut seed = build_seed(decision.propagation_direction);

        let first = &hits[0];
        if first.det_id() != transient.det_id(decision.start_from) {
            trace!(to = %first.det_id(), "propagating to first hit");
            start = services
                .propagator
                .propagate(&start, &first.surface)
                .ok_or(RefitFailure::PropagationFailed(first.det_id()))?;
        }

        if self.config.predictions_only {
            return Ok(collect_predictions(services.propagator, seed, start, &hits));
        }

        let mut pass = 1;
        loop {
            let fitted = services
                .fitter
                .fit(&seed, &hits, &start)
                .into_iter()
                .next()
                .ok_or(RefitFailure::FitFailed(pass))?;
            let mut smoothed = services
                .smoother
                .trajectories(&fitted)
                .into_iter()
                .next()
                .ok_or(RefitFailure::SmoothFailed(pass))?;
            trace!(pass, chi2 = smoothed.chi2(), hits = smoothed.len(), "pass done");

            if pass == REFIT_PASSES {
                return Ok(smoothed);
            }

            smoothed.reverse();
            seed = build_seed(smoothed.direction());
            hits = smoothed.rec_hits();
            start = smoothed
                .geometrical_innermost_state()
                .cloned()
                .ok_or(RefitFailure::SmoothFailed(pass))?;
            pass += 1;
        }
    }
}

/// Order of the hit sequence from the module positions of its ends.
fn check_rec_hits_ordering(hits: &[FitHit], geometry: &dyn Geometry) -> GeometricalDirection {
    let ends = hits
        .first()
        .zip(hits.last())
        .and_then(|(f, l)| Some((geometry.position(f.det_id())?, geometry.position(l.det_id())?)));
    let order = match ends {
        Some((first, last)) => order_by_radius(&first, &last),
        None => GeometricalDirection::Undetermined,
    };
    if order == GeometricalDirection::Undetermined {
        debug!("impossible to determine the rec hit order");
    }
    order
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
