//! Kalman fitter and smoother over planar hits.
//!
//! # Fitter
//! The start state is rescaled by `initial_error_rescaling`, propagated to the
//! first hit with no direction constraint, then hit to hit in the seed
//! direction. Each hit is added with a Joseph-form update of the 2-D planar
//! measurement; χ² increments are rᵀ S⁻¹ r.
//!
//! # Smoother
//! A backward filter starts from the last forward-updated state (rescaled),
//! runs opposite to the fit direction, and its predictions are combined with
//! the forward states by a weighted mean
//!
//! x = xf + K (xb − xf),  C = (I − K) Cf,  K = Cf (Cf + Cb)⁺
//!
//! On-surface covariances are singular along the plane normal, hence the
//! pseudo-inverse.

use crate::hits::{HMatrix, PlanarMeasurement};
use crate::propagator::HelixPropagator;
use nalgebra::{Matrix2, Vector2};
use refit_core::direction::PropagationDirection;
use refit_core::providers::{Fitter, HitCloner, Propagator, Smoother};
use refit_core::trajectory::{Trajectory, TrajectoryMeasurement, TrajectorySeed};
use refit_core::types::{FitHit, StateCov, StateVec, TrajectoryState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// Configuration shared by the fitter and the smoother.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KfConfig {
    /// Factor applied to the starting covariance
    pub initial_error_rescaling: f64,
}

impl Default for KfConfig {
    fn default() -> Self {
        Self {
            initial_error_rescaling: 100.0,
        }
    }
}

/// Result of one measurement update.
#[derive(Clone, Debug)]
pub struct KfUpdateResult {
    pub state: TrajectoryState,
    /// Residual r = z − H·x
    pub residual: Vector2<f64>,
    /// Residual covariance S = H·C·Hᵀ + R
    pub residual_cov: Matrix2<f64>,
    pub chi2: f64,
}

/// Add `hit` to `predicted`. `None` if S is singular.
pub fn update(predicted: &TrajectoryState, hit: &FitHit) -> Option<KfUpdateResult> {
    let model = PlanarMeasurement::new(&hit.surface);
    let h: HMatrix = model.h_matrix();
    let r = model.r_matrix(&hit.error);
    let p = predicted.covariance;

    // Residual: r = z − H·x
    let residual = model.apply(&hit.position) - model.apply(&predicted.position);

    // S = H·P·Hᵀ + R
    let s = h * p * h.transpose() + r;
    let s_inv = s.try_inverse()?;

    // K = P·Hᵀ·S⁻¹
    let k = p * h.transpose() * s_inv;
    let x = predicted.state_vec() + k * residual;

    // Joseph form P' = (I−KH)·P·(I−KH)ᵀ + K·R·Kᵀ
    let i_kh = StateCov::identity() - k * h;
    let cov = i_kh * p * i_kh.transpose() + k * r * k.transpose();

    let chi2 = (residual.transpose() * s_inv * residual)[(0, 0)];
    let mut state = TrajectoryState::from_state_vec(hit.det_id(), &x, predicted.charge, cov);
    state.position = hit.surface.project(&state.position);
    if !state.is_finite() || !chi2.is_finite() {
        return None;
    }
    Some(KfUpdateResult {
        state,
        residual,
        residual_cov: s,
        chi2,
    })
}

/// Weighted mean of two independent estimates on the same surface.
pub fn combine(forward: &TrajectoryState, backward: &TrajectoryState) -> Option<TrajectoryState> {
    let cf = forward.covariance;
    let sum = cf + backward.covariance;
    let svd = sum.svd(true, true);
    let eps = 1e-10 * svd.singular_values.max();
    let sum_inv = svd.pseudo_inverse(eps).ok()?;
    let k = cf * sum_inv;

    let x: StateVec = forward.state_vec() + k * (backward.state_vec() - forward.state_vec());
    let cov = (StateCov::identity() - k) * cf;
    let cov = (cov + cov.transpose()) * 0.5;
    let state = TrajectoryState::from_state_vec(forward.det_id, &x, forward.charge, cov);
    state.is_finite().then_some(state)
}

// ---------------------------------------------------------------------------
// Fitter
// ---------------------------------------------------------------------------

/// Forward Kalman fitter.
#[derive(Clone)]
pub struct KfFitter {
    propagator: HelixPropagator,
    cloner: Option<Arc<dyn HitCloner>>,
    config: KfConfig,
}

impl KfFitter {
    pub fn new(propagator: HelixPropagator, config: KfConfig) -> Self {
        Self {
            propagator,
            cloner: None,
            config,
        }
    }

    pub fn has_hit_cloner(&self) -> bool {
        self.cloner.is_some()
    }

    fn refine(&self, hit: &FitHit, predicted: &TrajectoryState) -> FitHit {
        match &self.cloner {
            Some(cloner) => cloner.refine(hit, predicted),
            None => hit.clone(),
        }
    }
}

impl Fitter for KfFitter {
    fn fit(&self, seed: &TrajectorySeed, hits: &[FitHit], start: &TrajectoryState) -> Vec<Trajectory> {
        let Some(first) = hits.first() else {
            return Vec::new();
        };
        let to_first = self.propagator.with_direction(PropagationDirection::AnyDirection);
        let directed = self.propagator.with_direction(seed.direction());

        let mut trajectory = Trajectory::new(*seed, seed.direction());
        let mut current = start.rescaled(self.config.initial_error_rescaling);
        if current.det_id != first.det_id() {
            match to_first.propagate(&current, &first.surface) {
                Some(s) => current = s,
                None => {
                    debug!(to = %first.det_id(), "fit: cannot reach the first hit");
                    return Vec::new();
                }
            }
        }

        for (i, hit) in hits.iter().enumerate() {
            let predicted = if i == 0 {
                current.clone()
            } else {
                match directed.propagate(&current, &hit.surface) {
                    Some(s) => s,
                    None => {
                        debug!(to = %hit.det_id(), "fit: propagation failed");
                        return Vec::new();
                    }
                }
            };
            let hit = self.refine(hit, &predicted);
            let Some(updated) = update(&predicted, &hit) else {
                debug!(det = %hit.det_id(), "fit: singular residual covariance");
                return Vec::new();
            };
            trace!(det = %hit.det_id(), chi2 = updated.chi2, "fit: hit added");
            current = updated.state.clone();
            trajectory.push_with_chi2(TrajectoryMeasurement::new(updated.state, hit), updated.chi2);
        }
        vec![trajectory]
    }

    fn set_hit_cloner(&mut self, cloner: Arc<dyn HitCloner>) {
        self.cloner = Some(cloner);
    }

    fn box_clone(&self) -> Box<dyn Fitter> {
        Box::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Smoother
// ---------------------------------------------------------------------------

/// Two-filter smoother.
#[derive(Clone)]
pub struct KfSmoother {
    propagator: HelixPropagator,
    cloner: Option<Arc<dyn HitCloner>>,
    config: KfConfig,
}

impl KfSmoother {
    pub fn new(propagator: HelixPropagator, config: KfConfig) -> Self {
        Self {
            propagator,
            cloner: None,
            config,
        }
    }

    pub fn has_hit_cloner(&self) -> bool {
        self.cloner.is_some()
    }

    fn refine(&self, hit: &FitHit, predicted: &TrajectoryState) -> FitHit {
        match &self.cloner {
            Some(cloner) => cloner.refine(hit, predicted),
            None => hit.clone(),
        }
    }

    fn smooth(&self, trajectory: &Trajectory) -> Option<Trajectory> {
        let measurements = trajectory.measurements();
        let last = measurements.last()?;
        let backward = self.propagator.with_direction(trajectory.direction().opposite());

        // backward filter seeded from the last forward-updated state
        let start = last.state.rescaled(self.config.initial_error_rescaling);
        let mut filtered = update(&start, &self.refine(&last.hit, &start))?.state;

        let n = measurements.len();
        let mut smoothed = vec![last.clone()];
        for m in measurements[..n - 1].iter().rev() {
            let predicted = backward.propagate(&filtered, &m.hit.surface)?;
            let state = combine(&m.state, &predicted)?;
            let hit = self.refine(&m.hit, &predicted);
            filtered = update(&predicted, &hit)?.state;
            smoothed.push(TrajectoryMeasurement::new(state, m.hit.clone()));
        }
        smoothed.reverse();

        let mut out = Trajectory::new(*trajectory.seed(), trajectory.direction());
        for m in smoothed {
            out.push(m);
        }
        Some(out.with_chi2(trajectory.chi2()))
    }
}

impl Smoother for KfSmoother {
    fn trajectories(&self, trajectory: &Trajectory) -> Vec<Trajectory> {
        match self.smooth(trajectory) {
            Some(t) => vec![t],
            None => {
                debug!(hits = trajectory.len(), "smoothing failed");
                Vec::new()
            }
        }
    }

    fn set_hit_cloner(&mut self, cloner: Arc<dyn HitCloner>) {
        self.cloner = Some(cloner);
    }

    fn box_clone(&self) -> Box<dyn Smoother> {
        Box::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
