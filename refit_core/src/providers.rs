//! Collaborator traits injected into the refitter.
//!
//! None of these are implemented here; `detector_models` carries reference
//! implementations. All of them are shared read-only between concurrent
//! refits, hence the `Send + Sync` bounds.

use crate::direction::TrackEnd;
use crate::trajectory::{Trajectory, TrajectorySeed};
use crate::types::{DetId, FitHit, GlobalVector, RecHit, Surface, Track, TrajectoryState};
use std::sync::Arc;

/// Detector surface lookup.
pub trait Geometry: Send + Sync {
    fn surface(&self, det_id: DetId) -> Option<Surface>;

    /// Global position of the module (its surface origin).
    fn position(&self, det_id: DetId) -> Option<GlobalVector> {
        self.surface(det_id).map(|s| s.origin)
    }
}

/// Magnetic field sampling, in tesla.
pub trait MagneticField: Send + Sync {
    fn field(&self, point: &GlobalVector) -> GlobalVector;
}

/// Extrapolates a state onto a surface. `None` signals failure.
pub trait Propagator: Send + Sync {
    fn propagate(&self, state: &TrajectoryState, surface: &Surface) -> Option<TrajectoryState>;
}

/// Hit-cloning strategy shared by the hit builder, fitter and smoother.
pub trait HitCloner: Send + Sync {
    /// Produce a fit-ready copy of `hit` bound to `surface`.
    fn clone_for_fit(&self, hit: &RecHit, surface: &Surface) -> FitHit;

    /// Re-clone a hit with knowledge of the predicted state on its surface.
    fn refine(&self, hit: &FitHit, _predicted: &TrajectoryState) -> FitHit {
        hit.clone()
    }
}

/// Builds fit-ready hits for one detector subsystem.
pub trait HitBuilder: Send + Sync {
    fn cloner(&self) -> Arc<dyn HitCloner>;

    /// Resolve the hit's surface and clone it for the fit.
    fn build(&self, hit: &RecHit, geometry: &dyn Geometry) -> Option<FitHit> {
        let surface = geometry.surface(hit.det_id)?;
        Some(self.cloner().clone_for_fit(hit, &surface))
    }
}

/// Directional least-squares fit. An empty result signals failure.
pub trait Fitter: Send + Sync {
    fn fit(&self, seed: &TrajectorySeed, hits: &[FitHit], start: &TrajectoryState) -> Vec<Trajectory>;

    fn set_hit_cloner(&mut self, cloner: Arc<dyn HitCloner>);

    fn box_clone(&self) -> Box<dyn Fitter>;
}

/// Backward refinement of a fitted trajectory. An empty result signals failure.
pub trait Smoother: Send + Sync {
    fn trajectories(&self, trajectory: &Trajectory) -> Vec<Trajectory>;

    fn set_hit_cloner(&mut self, cloner: Arc<dyn HitCloner>);

    fn box_clone(&self) -> Box<dyn Smoother>;
}

// ---------------------------------------------------------------------------
// TransientTrack
// ---------------------------------------------------------------------------

/// A [`Track`] bound to the geometry and field it is refitted in.
pub struct TransientTrack<'a> {
    track: &'a Track,
    field: &'a dyn MagneticField,
    geometry: &'a dyn Geometry,
}

impl<'a> TransientTrack<'a> {
    pub fn new(track: &'a Track, field: &'a dyn MagneticField, geometry: &'a dyn Geometry) -> Self {
        Self {
            track,
            field,
            geometry,
        }
    }

    pub fn track(&self) -> &Track {
        self.track
    }

    pub fn innermost_state(&self) -> Option<TrajectoryState> {
        self.boundary_state(TrackEnd::Innermost)
    }

    pub fn outermost_state(&self) -> Option<TrajectoryState> {
        self.boundary_state(TrackEnd::Outermost)
    }

    /// Detector id the given boundary state belongs to.
    pub fn det_id(&self, end: TrackEnd) -> DetId {
        match end {
            TrackEnd::Innermost => self.track.inner_det_id,
            TrackEnd::Outermost => self.track.outer_det_id,
        }
    }

    /// Boundary state, valid only if its surface is known to the geometry and
    /// the state and field sample are finite.
    pub fn boundary_state(&self, end: TrackEnd) -> Option<TrajectoryState> {
        let state = match end {
            TrackEnd::Innermost => self.track.innermost_state.as_ref()?,
            TrackEnd::Outermost => self.track.outermost_state.as_ref()?,
        };
        self.geometry.surface(state.det_id)?;
        let b = self.field.field(&state.position);
        if !state.is_finite() || !b.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(state.clone())
    }

    /// Field sampled at the innermost state position.
    pub fn field_at_innermost(&self) -> Option<GlobalVector> {
        self.track
            .innermost_state
            .as_ref()
            .map(|s| self.field.field(&s.position))
    }
}
