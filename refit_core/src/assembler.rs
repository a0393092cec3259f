//! Trajectory assembly: seeds and prediction-only trajectories.

use crate::direction::PropagationDirection;
use crate::providers::Propagator;
use crate::trajectory::{Trajectory, TrajectoryMeasurement, TrajectorySeed};
use crate::types::{FitHit, TrajectoryState};
use tracing::trace;

/// Seed for a refit in the resolved propagation direction.
pub fn build_seed(direction: PropagationDirection) -> TrajectorySeed {
    TrajectorySeed::new(direction)
}

/// Propagate `start` through every hit surface in order, pairing each valid
/// prediction with its hit. Hits whose surface cannot be reached are left
/// out and the next hit is predicted from the last valid state, so one
/// unreachable surface does not drop every hit after it.
pub fn collect_predictions(
    propagator: &dyn Propagator,
    seed: TrajectorySeed,
    start: TrajectoryState,
    hits: &[FitHit],
) -> Trajectory {
    let mut trajectory = Trajectory::new(seed, seed.direction());
    let mut current = start;
    for hit in hits {
        match propagator.propagate(&current, &hit.surface) {
            Some(predicted) => {
                trajectory.push(TrajectoryMeasurement::new(predicted.clone(), hit.clone()));
                current = predicted;
            }
            None => trace!(det = %hit.det_id(), "no prediction on hit surface"),
        }
    }
    trajectory
}
