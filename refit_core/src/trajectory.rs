//! Trajectory: seed, ordered (state, hit) measurements, direction.

use crate::direction::PropagationDirection;
use crate::types::{FitHit, TrajectoryState};
use serde::{Deserialize, Serialize};

/// Seed of a refit: carries no persisted state and no hits, only the
/// propagation direction the fit was started with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectorySeed {
    direction: PropagationDirection,
}

impl TrajectorySeed {
    pub fn new(direction: PropagationDirection) -> Self {
        Self { direction }
    }

    pub fn direction(&self) -> PropagationDirection {
        self.direction
    }
}

/// One (state, hit) pair of a trajectory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryMeasurement {
    pub state: TrajectoryState,
    pub hit: FitHit,
}

impl TrajectoryMeasurement {
    pub fn new(state: TrajectoryState, hit: FitHit) -> Self {
        Self { state, hit }
    }
}

/// An ordered sequence of measurements produced by a fit, a smoothing pass or
/// plain propagation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    seed: TrajectorySeed,
    direction: PropagationDirection,
    measurements: Vec<TrajectoryMeasurement>,
    /// Accumulated χ² of the measurements
    chi2: f64,
}

impl Trajectory {
    pub fn new(seed: TrajectorySeed, direction: PropagationDirection) -> Self {
        Self {
            seed,
            direction,
            measurements: Vec::new(),
            chi2: 0.0,
        }
    }

    pub fn push(&mut self, measurement: TrajectoryMeasurement) {
        self.measurements.push(measurement);
    }

    /// Push a measurement and add its χ² increment.
    pub fn push_with_chi2(&mut self, measurement: TrajectoryMeasurement, chi2_increment: f64) {
        self.chi2 += chi2_increment;
        self.measurements.push(measurement);
    }

    pub fn with_chi2(mut self, chi2: f64) -> Self {
        self.chi2 = chi2;
        self
    }

    pub fn seed(&self) -> &TrajectorySeed {
        &self.seed
    }

    pub fn direction(&self) -> PropagationDirection {
        self.direction
    }

    pub fn measurements(&self) -> &[TrajectoryMeasurement] {
        &self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// A trajectory is meaningful only with at least two measurements.
    pub fn is_valid(&self) -> bool {
        self.measurements.len() >= 2
    }

    pub fn chi2(&self) -> f64 {
        self.chi2
    }

    /// Degrees of freedom: 2 per planar measurement minus the 5 track parameters.
    pub fn ndof(&self) -> i64 {
        2 * self.measurements.len() as i64 - 5
    }

    pub fn first_measurement(&self) -> Option<&TrajectoryMeasurement> {
        self.measurements.first()
    }

    pub fn last_measurement(&self) -> Option<&TrajectoryMeasurement> {
        self.measurements.last()
    }

    /// Hits in measurement order.
    pub fn rec_hits(&self) -> Vec<FitHit> {
        self.measurements.iter().map(|m| m.hit.clone()).collect()
    }

    /// State of whichever end measurement lies closer to the detector centre.
    pub fn geometrical_innermost_state(&self) -> Option<&TrajectoryState> {
        let first = &self.measurements.first()?.state;
        let last = &self.measurements.last()?.state;
        if last.radius() < first.radius() {
            Some(last)
        } else {
            Some(first)
        }
    }

    /// Flip the measurement order and the direction tag.
    pub fn reverse(&mut self) {
        self.direction = self.direction.opposite();
        self.measurements.reverse();
    }
}
