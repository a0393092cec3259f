//! Layer crossing: find the module a particle traverses in each layer.

use crate::geometry::{BarrelGeometry, MODULE_STRIDE};
use crate::propagator::HelixPropagator;
use refit_core::providers::Propagator;
use refit_core::types::TrajectoryState;

/// Module re-selections tried when the crossing falls into a neighbour.
const MAX_RESELECTIONS: usize = 3;

/// State where `state` crosses layer `l`, or `None` if the particle misses it.
pub fn cross_layer(
    geometry: &BarrelGeometry,
    propagator: &HelixPropagator,
    state: &TrajectoryState,
    l: usize,
) -> Option<TrajectoryState> {
    let layer = geometry.layer(l)?;
    // well inside the layer the position φ says nothing about where the
    // particle goes (beam spot offsets); aim along the momentum instead
    let mut phi = if state.position.xy().norm() >= 0.5 * layer.radius {
        state.position.y.atan2(state.position.x)
    } else {
        state.momentum.y.atan2(state.momentum.x)
    };
    for _ in 0..MAX_RESELECTIONS {
        let surface = geometry.module_at(l, phi)?;
        let crossing = propagator.propagate(state, &surface)?;
        if crossing.position.z.abs() > layer.half_length {
            return None;
        }
        let crossing_phi = crossing.position.y.atan2(crossing.position.x);
        if layer.module_for_phi(crossing_phi) == surface.det_id.index % MODULE_STRIDE {
            return Some(crossing);
        }
        phi = crossing_phi;
    }
    None
}

/// Successive crossings of `layers`, stopping at the first layer missed.
pub fn trace_layers(
    geometry: &BarrelGeometry,
    propagator: &HelixPropagator,
    start: &TrajectoryState,
    layers: impl IntoIterator<Item = usize>,
) -> Vec<TrajectoryState> {
    let mut crossings: Vec<TrajectoryState> = Vec::new();
    for l in layers {
        let from = crossings.last().unwrap_or(start);
        match cross_layer(geometry, propagator, from, l) {
            Some(c) => crossings.push(c),
            None => break,
        }
    }
    crossings
}
