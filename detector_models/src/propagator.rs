//! Analytic helix propagator onto planar surfaces.
//!
//! # Model
//! The field is sampled once at the start point and taken along z. With the
//! unit tangent t = p/|p| and a = q·c·Bz/|p| (c = 0.299792458), the transverse
//! tangent rotates at rate a per unit path length s:
//!
//! tx(s) = tx₀ cos(as) + ty₀ sin(as)
//! ty(s) = −tx₀ sin(as) + ty₀ cos(as)
//!
//! and the position follows by integration (straight line when a ≈ 0).
//! The path length to a plane is found by Newton iteration starting from the
//! straight-line guess. The transport Jacobian of [x, y, z, px, py, pz] is
//! taken by central differences, re-solving the intersection each time, so
//! propagated covariances are confined to the target plane.

use refit_core::direction::PropagationDirection;
use refit_core::providers::{MagneticField, Propagator};
use refit_core::types::{GlobalVector, StateCov, StateVec, Surface, TrajectoryState};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// GeV/c per (T·m) for unit charge.
pub const C_LIGHT: f64 = 0.299792458;

/// Below this curvature (1/m) the track is treated as a straight line.
const STRAIGHT_LINE_CURVATURE: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagatorConfig {
    /// Allowed sign of the path length
    pub direction: PropagationDirection,
    /// Newton iterations before giving up
    pub max_iterations: usize,
    /// Convergence threshold on the path length step (m)
    pub tolerance: f64,
    /// Longest accepted |path length| (m)
    pub max_path_length: f64,
    /// Angular variance added per metre travelled (rad²/m)
    pub scattering_variance_per_meter: f64,
}

impl Default for PropagatorConfig {
    fn default() -> Self {
        Self {
            direction: PropagationDirection::AnyDirection,
            max_iterations: 20,
            tolerance: 1e-9,
            max_path_length: 50.0,
            scattering_variance_per_meter: 1e-8,
        }
    }
}

/// Helix propagator in a field sampled at the start point.
#[derive(Clone)]
pub struct HelixPropagator {
    field: Arc<dyn MagneticField>,
    config: PropagatorConfig,
}

impl HelixPropagator {
    pub fn new(field: Arc<dyn MagneticField>, config: PropagatorConfig) -> Self {
        Self { field, config }
    }

    /// Same propagator with another direction constraint.
    pub fn with_direction(&self, direction: PropagationDirection) -> Self {
        Self {
            field: self.field.clone(),
            config: PropagatorConfig {
                direction,
                ..self.config
            },
        }
    }

    pub fn direction(&self) -> PropagationDirection {
        self.config.direction
    }

    pub fn config(&self) -> &PropagatorConfig {
        &self.config
    }

    /// Signed path length from `state` to `surface`, or `None` when the
    /// solve does not converge or the sign violates the direction.
    pub fn path_length(&self, state: &TrajectoryState, surface: &Surface) -> Option<f64> {
        let v = state.state_vec();
        let a = self.curvature(&v, state.charge)?;
        let guess = straight_line_guess(&v, surface)?;
        let s = self.solve(&v, a, surface, guess)?;
        let tol = self.config.tolerance;
        let allowed = match self.config.direction {
            PropagationDirection::AlongMomentum => s >= -tol,
            PropagationDirection::OppositeToMomentum => s <= tol,
            PropagationDirection::AnyDirection => true,
        };
        if !allowed || s.abs() > self.config.max_path_length {
            trace!(s, direction = ?self.config.direction, "path length rejected");
            return None;
        }
        Some(s)
    }

    fn curvature(&self, v: &StateVec, charge: f64) -> Option<f64> {
        let p = momentum_of(v).norm();
        if p <= 0.0 || !p.is_finite() {
            return None;
        }
        let bz = self.field.field(&position_of(v)).z;
        let a = charge * C_LIGHT * bz / p;
        a.is_finite().then_some(a)
    }

    fn solve(&self, v: &StateVec, a: f64, surface: &Surface, guess: f64) -> Option<f64> {
        let mut s = guess;
        for _ in 0..self.config.max_iterations {
            let (pos, dir) = helix_at(v, a, s);
            let f = surface.signed_distance(&pos);
            let df = surface.normal.dot(&dir);
            if df.abs() < 1e-12 {
                return None;
            }
            let step = f / df;
            s -= step;
            if !s.is_finite() {
                return None;
            }
            if step.abs() < self.config.tolerance {
                return Some(s);
            }
        }
        None
    }

    /// Jacobian of the end state with respect to the start state.
    fn jacobian(&self, v: &StateVec, charge: f64, surface: &Surface, s: f64) -> Option<StateCov> {
        let mut jac = StateCov::zeros();
        for i in 0..6 {
            let h = 1e-6 * (1.0 + v[i].abs());
            let mut plus = *v;
            plus[i] += h;
            let mut minus = *v;
            minus[i] -= h;
            let end_plus = self.transport_to(&plus, charge, surface, s)?;
            let end_minus = self.transport_to(&minus, charge, surface, s)?;
            jac.set_column(i, &((end_plus - end_minus) / (2.0 * h)));
        }
        Some(jac)
    }

    fn transport_to(&self, v: &StateVec, charge: f64, surface: &Surface, guess: f64) -> Option<StateVec> {
        let a = self.curvature(v, charge)?;
        let s = self.solve(v, a, surface, guess)?;
        Some(transport(v, a, s))
    }

    /// Angular scattering noise on the momentum, transverse to the direction.
    fn process_noise(&self, end: &StateVec, s: f64) -> StateCov {
        let mut q = StateCov::zeros();
        let var = self.config.scattering_variance_per_meter * s.abs();
        if var > 0.0 {
            let p = momentum_of(end);
            let t = p.normalize();
            let block = (Matrix3::identity() - t * t.transpose()) * (var * p.norm_squared());
            q.fixed_view_mut::<3, 3>(3, 3).copy_from(&block);
        }
        q
    }
}

impl Propagator for HelixPropagator {
    fn propagate(&self, state: &TrajectoryState, surface: &Surface) -> Option<TrajectoryState> {
        let s = self.path_length(state, surface)?;
        let v = state.state_vec();
        let a = self.curvature(&v, state.charge)?;
        let end = transport(&v, a, s);
        let jac = self.jacobian(&v, state.charge, surface, s)?;
        let cov = jac * state.covariance * jac.transpose() + self.process_noise(&end, s);
        let cov = (cov + cov.transpose()) * 0.5;

        let mut out = TrajectoryState::from_state_vec(surface.det_id, &end, state.charge, cov);
        out.position = surface.project(&out.position);
        if !out.is_finite() {
            return None;
        }
        trace!(from = %state.det_id, to = %surface.det_id, s, "propagated");
        Some(out)
    }
}

fn position_of(v: &StateVec) -> GlobalVector {
    GlobalVector::new(v[0], v[1], v[2])
}

fn momentum_of(v: &StateVec) -> GlobalVector {
    GlobalVector::new(v[3], v[4], v[5])
}

fn straight_line_guess(v: &StateVec, surface: &Surface) -> Option<f64> {
    let t = momentum_of(v).normalize();
    let denom = surface.normal.dot(&t);
    if denom.abs() < 1e-12 {
        return None;
    }
    Some(-surface.signed_distance(&position_of(v)) / denom)
}

/// Position and unit tangent after a path length `s`.
fn helix_at(v: &StateVec, a: f64, s: f64) -> (GlobalVector, GlobalVector) {
    let x0 = position_of(v);
    let t0 = momentum_of(v).normalize();
    if a.abs() < STRAIGHT_LINE_CURVATURE {
        return (x0 + t0 * s, t0);
    }
    let (sin, cos) = (a * s).sin_cos();
    let dir = GlobalVector::new(
        t0.x * cos + t0.y * sin,
        -t0.x * sin + t0.y * cos,
        t0.z,
    );
    let pos = GlobalVector::new(
        x0.x + (t0.x * sin + t0.y * (1.0 - cos)) / a,
        x0.y + (t0.x * (cos - 1.0) + t0.y * sin) / a,
        x0.z + t0.z * s,
    );
    (pos, dir)
}

fn transport(v: &StateVec, a: f64, s: f64) -> StateVec {
    let (pos, dir) = helix_at(v, a, s);
    let p = dir * momentum_of(v).norm();
    StateVec::new(pos.x, pos.y, pos.z, p.x, p.y, p.z)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::UniformField;
    use approx::assert_abs_diff_eq;
    use refit_core::types::DetId;

    fn propagator(bz: f64, direction: PropagationDirection) -> HelixPropagator {
        HelixPropagator::new(
            Arc::new(UniformField::new(bz)),
            PropagatorConfig {
                direction,
                scattering_variance_per_meter: 0.0,
                ..Default::default()
            },
        )
    }

    fn plane_x(x: f64) -> Surface {
        Surface::new(DetId::tracker(1), GlobalVector::new(x, 0.0, 0.0), GlobalVector::x())
    }

    fn state(momentum: GlobalVector) -> TrajectoryState {
        TrajectoryState::new(
            DetId::tracker(0),
            GlobalVector::zeros(),
            momentum,
            1.0,
            StateCov::identity() * 1e-4,
        )
    }

    #[test]
    fn straight_line_without_field() {
        let p = propagator(0.0, PropagationDirection::AlongMomentum);
        let start = state(GlobalVector::new(1.0, 0.5, 0.2));
        let out = p.propagate(&start, &plane_x(0.5)).unwrap();
        assert_eq!(out.det_id, DetId::tracker(1));
        assert_abs_diff_eq!(out.position.x, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(out.position.y, 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(out.position.z, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(out.momentum, start.momentum, epsilon = 1e-12);
    }

    #[test]
    fn helix_bends_positive_charge_clockwise() {
        let p = propagator(3.8, PropagationDirection::AlongMomentum);
        let start = state(GlobalVector::new(1.0, 0.0, 0.0));
        let out = p.propagate(&start, &plane_x(0.3)).unwrap();

        let a = C_LIGHT * 3.8;
        let expected_y = ((1.0 - (0.3 * a).powi(2)).sqrt() - 1.0) / a;
        assert_abs_diff_eq!(out.position.x, 0.3, epsilon = 1e-9);
        assert_abs_diff_eq!(out.position.y, expected_y, epsilon = 1e-9);
        assert!(out.position.y < 0.0);
        assert_abs_diff_eq!(out.momentum.norm(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out.transverse_momentum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn direction_constraint_on_path_sign() {
        let start = state(GlobalVector::new(1.0, 0.0, 0.0));
        let behind = plane_x(-0.3);
        assert!(propagator(0.0, PropagationDirection::AlongMomentum)
            .propagate(&start, &behind)
            .is_none());
        let back = propagator(0.0, PropagationDirection::OppositeToMomentum)
            .propagate(&start, &behind)
            .unwrap();
        assert_abs_diff_eq!(back.position.x, -0.3, epsilon = 1e-12);
        assert!(propagator(0.0, PropagationDirection::AnyDirection)
            .propagate(&start, &behind)
            .is_some());
        assert!(propagator(0.0, PropagationDirection::OppositeToMomentum)
            .propagate(&start, &plane_x(0.3))
            .is_none());
    }

    #[test]
    fn parallel_plane_is_unreachable() {
        let p = propagator(0.0, PropagationDirection::AnyDirection);
        let start = state(GlobalVector::new(0.0, 1.0, 0.0));
        assert!(p.propagate(&start, &plane_x(0.3)).is_none());
    }

    #[test]
    fn covariance_is_transported_onto_the_plane() {
        let p = propagator(0.0, PropagationDirection::AlongMomentum);
        let start = state(GlobalVector::new(1.0, 0.0, 0.0));
        let out = p.propagate(&start, &plane_x(0.5)).unwrap();
        // no spread along the plane normal
        assert_abs_diff_eq!(out.covariance[(0, 0)], 0.0, epsilon = 1e-10);
        // y picks up the slope uncertainty: σ²(y0) + d²σ²(py)/px²
        assert_abs_diff_eq!(out.covariance[(1, 1)], 1.25e-4, epsilon = 1e-8);
        assert_abs_diff_eq!(out.covariance[(4, 4)], 1e-4, epsilon = 1e-8);
        // symmetric
        assert_abs_diff_eq!(out.covariance, out.covariance.transpose(), epsilon = 1e-15);
    }

    #[test]
    fn scattering_inflates_momentum_errors() {
        let field: Arc<dyn MagneticField> = Arc::new(UniformField::new(0.0));
        let noisy = HelixPropagator::new(
            field.clone(),
            PropagatorConfig {
                scattering_variance_per_meter: 1e-3,
                ..Default::default()
            },
        );
        let quiet = HelixPropagator::new(
            field,
            PropagatorConfig {
                scattering_variance_per_meter: 0.0,
                ..Default::default()
            },
        );
        let start = state(GlobalVector::new(2.0, 0.0, 0.0));
        let a = noisy.propagate(&start, &plane_x(1.0)).unwrap();
        let b = quiet.propagate(&start, &plane_x(1.0)).unwrap();
        // transverse momentum components only
        assert_abs_diff_eq!(a.covariance[(4, 4)] - b.covariance[(4, 4)], 4e-3, epsilon = 1e-9);
        assert_abs_diff_eq!(a.covariance[(3, 3)], b.covariance[(3, 3)], epsilon = 1e-12);
    }
}
