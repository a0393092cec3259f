//! Fundamental types used across the entire workspace.

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Scalar type: f64 throughout, positions in metres, momenta in GeV/c.
// ---------------------------------------------------------------------------

/// Global Cartesian point or vector [x, y, z]
pub type GlobalVector = Vector3<f64>;

/// 6-parameter Cartesian state: [x, y, z, px, py, pz]
pub type StateVec = Vector6<f64>;

/// 6×6 state covariance matrix
pub type StateCov = Matrix6<f64>;

/// 3×3 hit position error matrix
pub type HitCov = Matrix3<f64>;

// ---------------------------------------------------------------------------
// Detector identifiers
// ---------------------------------------------------------------------------

/// Sub-detector of the muon system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MuonSubsystem {
    /// Drift tubes
    Dt,
    /// Cathode strip chambers
    Csc,
    /// Resistive plate chambers
    Rpc,
    /// Gas electron multipliers
    Gem,
}

/// Top-level detector subsystem a measurement belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subsystem {
    Tracker,
    Muon(MuonSubsystem),
}

/// Identifier of one detector module (and therefore of one surface).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DetId {
    pub subsystem: Subsystem,
    pub index: u32,
}

impl DetId {
    pub fn tracker(index: u32) -> Self {
        Self {
            subsystem: Subsystem::Tracker,
            index,
        }
    }

    pub fn muon(sub: MuonSubsystem, index: u32) -> Self {
        Self {
            subsystem: Subsystem::Muon(sub),
            index,
        }
    }

    pub fn is_tracker(&self) -> bool {
        self.subsystem == Subsystem::Tracker
    }

    pub fn is_muon(&self) -> bool {
        matches!(self.subsystem, Subsystem::Muon(_))
    }
}

impl fmt::Display for DetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.subsystem {
            Subsystem::Tracker => "TK",
            Subsystem::Muon(MuonSubsystem::Dt) => "DT",
            Subsystem::Muon(MuonSubsystem::Csc) => "CSC",
            Subsystem::Muon(MuonSubsystem::Rpc) => "RPC",
            Subsystem::Muon(MuonSubsystem::Gem) => "GEM",
        };
        write!(f, "{tag}#{}", self.index)
    }
}

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

/// A planar detector surface: the module centre and its unit normal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub det_id: DetId,
    /// Module centre in global coordinates
    pub origin: GlobalVector,
    /// Unit normal of the module plane
    pub normal: GlobalVector,
}

impl Surface {
    /// Build a surface; the normal is normalised here.
    pub fn new(det_id: DetId, origin: GlobalVector, normal: GlobalVector) -> Self {
        Self {
            det_id,
            origin,
            normal: normal.normalize(),
        }
    }

    /// Signed distance of `point` from the plane (positive on the normal side).
    pub fn signed_distance(&self, point: &GlobalVector) -> f64 {
        (point - self.origin).dot(&self.normal)
    }

    /// Orthogonal projection of `point` onto the plane.
    pub fn project(&self, point: &GlobalVector) -> GlobalVector {
        point - self.normal * self.signed_distance(point)
    }
}

// ---------------------------------------------------------------------------
// Trajectory state
// ---------------------------------------------------------------------------

/// A (position, momentum, covariance) estimate on one detector surface.
///
/// Operations that can fail (propagation, boundary state lookup) return
/// `Option<TrajectoryState>`; `None` is the invalid state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryState {
    /// Surface the state sits on
    pub det_id: DetId,
    pub position: GlobalVector,
    pub momentum: GlobalVector,
    /// Electric charge in units of e (±1 for the tracks we handle)
    pub charge: f64,
    /// Covariance of [x, y, z, px, py, pz]
    pub covariance: StateCov,
}

impl TrajectoryState {
    pub fn new(
        det_id: DetId,
        position: GlobalVector,
        momentum: GlobalVector,
        charge: f64,
        covariance: StateCov,
    ) -> Self {
        Self {
            det_id,
            position,
            momentum,
            charge,
            covariance,
        }
    }

    /// Rebuild a state from a packed [x, y, z, px, py, pz] vector.
    pub fn from_state_vec(det_id: DetId, v: &StateVec, charge: f64, covariance: StateCov) -> Self {
        Self {
            det_id,
            position: GlobalVector::new(v[0], v[1], v[2]),
            momentum: GlobalVector::new(v[3], v[4], v[5]),
            charge,
            covariance,
        }
    }

    pub fn state_vec(&self) -> StateVec {
        StateVec::new(
            self.position.x,
            self.position.y,
            self.position.z,
            self.momentum.x,
            self.momentum.y,
            self.momentum.z,
        )
    }

    pub fn transverse_momentum(&self) -> f64 {
        self.momentum.xy().norm()
    }

    /// Distance from the detector centre.
    pub fn radius(&self) -> f64 {
        self.position.norm()
    }

    /// Copy of this state with the covariance multiplied by `factor`.
    pub fn rescaled(&self, factor: f64) -> Self {
        Self {
            covariance: self.covariance * factor,
            ..self.clone()
        }
    }

    /// Whether every component of the estimate is finite.
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.momentum.iter().all(|v| v.is_finite())
            && self.covariance.iter().all(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// Hits
// ---------------------------------------------------------------------------

/// A raw detector measurement as stored in a reconstructed track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecHit {
    pub det_id: DetId,
    /// Invalid hits mark crossed modules without a measurement
    pub valid: bool,
    /// Measured global position
    pub position: GlobalVector,
    /// Position error matrix
    pub error: HitCov,
}

impl RecHit {
    pub fn new(det_id: DetId, position: GlobalVector, error: HitCov) -> Self {
        Self {
            det_id,
            valid: true,
            position,
            error,
        }
    }

    /// A placeholder for a module crossed without a measurement.
    pub fn missing(det_id: DetId) -> Self {
        Self {
            det_id,
            valid: false,
            position: GlobalVector::zeros(),
            error: HitCov::identity(),
        }
    }
}

/// A fit-ready copy of a [`RecHit`] bound to its resolved detector surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitHit {
    pub surface: Surface,
    pub position: GlobalVector,
    pub error: HitCov,
}

impl FitHit {
    pub fn det_id(&self) -> DetId {
        self.surface.det_id
    }
}

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

/// A reconstructed track: ordered hits plus its boundary states.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub hits: Vec<RecHit>,
    /// State at the innermost measurement (None if unavailable)
    pub innermost_state: Option<TrajectoryState>,
    /// State at the outermost measurement (None if unavailable)
    pub outermost_state: Option<TrajectoryState>,
    pub inner_det_id: DetId,
    pub outer_det_id: DetId,
}

impl Track {
    pub fn valid_hit_count(&self) -> usize {
        self.hits.iter().filter(|h| h.valid).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn surface_distance_and_projection() {
        let s = Surface::new(
            DetId::tracker(1),
            GlobalVector::new(1.0, 0.0, 0.0),
            GlobalVector::new(2.0, 0.0, 0.0),
        );
        assert_abs_diff_eq!(s.normal.norm(), 1.0, epsilon = 1e-12);
        let p = GlobalVector::new(1.5, 0.3, -2.0);
        assert_abs_diff_eq!(s.signed_distance(&p), 0.5, epsilon = 1e-12);
        let q = s.project(&p);
        assert_abs_diff_eq!(s.signed_distance(&q), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(q.y, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn state_vec_roundtrip_keeps_components() {
        let st = TrajectoryState::new(
            DetId::tracker(3),
            GlobalVector::new(0.1, 0.2, 0.3),
            GlobalVector::new(1.0, -2.0, 0.5),
            -1.0,
            StateCov::identity(),
        );
        let back = TrajectoryState::from_state_vec(st.det_id, &st.state_vec(), -1.0, st.covariance);
        assert_eq!(back, st);
        assert_abs_diff_eq!(st.transverse_momentum(), 5.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn det_id_display_and_kind() {
        let rpc = DetId::muon(MuonSubsystem::Rpc, 7);
        assert_eq!(rpc.to_string(), "RPC#7");
        assert!(rpc.is_muon());
        assert!(DetId::tracker(0).is_tracker());
    }
}
