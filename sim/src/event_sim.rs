//! Track simulator.
//!
//! Follows a truth particle through the barrel and produces a reconstructed
//! track with:
//! - Gaussian in-plane hit smearing
//! - Hit inefficiency (crossed modules without a measurement)
//! - Optional muon-station hits
//! - Smeared boundary states at the innermost and outermost crossing
//! - Incoming particles (the helix travelled backwards) and outermost-first
//!   hit storage on request

use crate::particle::{gauss, Particle};
use detector_models::geometry::{plane_axes, BarrelGeometry};
use detector_models::hits::planar_hit_error;
use detector_models::navigation::trace_layers;
use detector_models::{DetectorSetup, HelixPropagator, PropagatorConfig, UniformField};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use refit_core::direction::PropagationDirection;
use refit_core::providers::Geometry;
use refit_core::types::{RecHit, StateCov, Track, TrajectoryState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Detector response of the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Tracker resolution across / along z (m)
    pub tracker_sigma: (f64, f64),
    /// Muon chamber resolution (m)
    pub muon_sigma: f64,
    /// Probability that a crossed module records a hit
    pub hit_efficiency: f64,
    /// Relative momentum smearing of the boundary states
    pub boundary_momentum_smear: f64,
    /// Extend the tracks into the muon stations
    pub with_muon_hits: bool,
    /// Flip each particle so that it travels towards the beam line
    pub incoming: bool,
    /// Store hits outermost first
    pub reverse_storage: bool,
    /// Tracks with fewer crossed layers are dropped
    pub min_layers: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tracker_sigma: (20e-6, 100e-6),
            muon_sigma: 200e-6,
            hit_efficiency: 0.98,
            boundary_momentum_smear: 0.01,
            with_muon_hits: false,
            incoming: false,
            reverse_storage: false,
            min_layers: 4,
        }
    }
}

/// A reconstructed track together with the particle that made it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulatedTrack {
    pub particle: Particle,
    pub track: Track,
}

/// Generates tracks from truth particles.
pub struct TrackSimulator {
    pub config: SimConfig,
    geometry: BarrelGeometry,
    truth: HelixPropagator,
    rng: ChaCha8Rng,
}

impl TrackSimulator {
    pub fn new(setup: &DetectorSetup, config: SimConfig, seed: u64) -> Self {
        // truth follows the particle exactly: no scattering
        let truth = HelixPropagator::new(
            Arc::new(UniformField::new(setup.config().bz)),
            PropagatorConfig {
                direction: PropagationDirection::AlongMomentum,
                scattering_variance_per_meter: 0.0,
                ..setup.config().propagator
            },
        );
        Self {
            config,
            geometry: setup.barrel().clone(),
            truth,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Simulate one particle. `None` if it crosses too few layers.
    pub fn simulate(&mut self, particle: &Particle) -> Option<SimulatedTrack> {
        let mut layers: Vec<usize> = self.geometry.tracker_layers().collect();
        if self.config.with_muon_hits {
            layers.extend(self.geometry.muon_layers());
        }
        let mut crossings =
            trace_layers(&self.geometry, &self.truth, &particle.vertex_state(), layers);
        if crossings.len() < self.config.min_layers.max(2) {
            debug!(id = particle.id, layers = crossings.len(), "particle dropped");
            return None;
        }

        if self.config.incoming {
            crossings = crossings
                .into_iter()
                .rev()
                .map(|c| TrajectoryState {
                    momentum: -c.momentum,
                    charge: -c.charge,
                    ..c
                })
                .collect();
        }

        let mut hits: Vec<RecHit> = Vec::with_capacity(crossings.len());
        for c in &crossings {
            let hit = self.make_hit(c)?;
            hits.push(hit);
        }

        let (first, last) = (crossings.first()?, crossings.last()?);
        let (inner, outer) = if first.radius() <= last.radius() {
            (first, last)
        } else {
            (last, first)
        };
        let innermost_state = self.boundary_state(inner);
        let outermost_state = self.boundary_state(outer);

        if self.config.reverse_storage {
            hits.reverse();
        }

        Some(SimulatedTrack {
            particle: particle.clone(),
            track: Track {
                hits,
                innermost_state: Some(innermost_state),
                outermost_state: Some(outermost_state),
                inner_det_id: inner.det_id,
                outer_det_id: outer.det_id,
            },
        })
    }

    fn make_hit(&mut self, crossing: &TrajectoryState) -> Option<RecHit> {
        if self.rng.gen::<f64>() > self.config.hit_efficiency {
            return Some(RecHit::missing(crossing.det_id));
        }
        let surface = self.geometry.surface(crossing.det_id)?;
        let (sigma_u, sigma_v) = if crossing.det_id.is_tracker() {
            self.config.tracker_sigma
        } else {
            (self.config.muon_sigma, self.config.muon_sigma)
        };
        let (u, v) = plane_axes(&surface);
        let position = crossing.position
            + u * (gauss(&mut self.rng) * sigma_u)
            + v * (gauss(&mut self.rng) * sigma_v);
        Some(RecHit::new(
            crossing.det_id,
            position,
            planar_hit_error(&surface, sigma_u, sigma_v),
        ))
    }

    fn boundary_state(&mut self, crossing: &TrajectoryState) -> TrajectoryState {
        let smear = self.config.boundary_momentum_smear;
        let momentum = crossing.momentum * (1.0 + gauss(&mut self.rng) * smear);
        let mut cov = StateCov::identity() * 1e-8;
        let sigma_p = (smear * momentum.norm()).max(1e-6);
        for i in 3..6 {
            cov[(i, i)] = sigma_p * sigma_p;
        }
        TrajectoryState {
            momentum,
            covariance: cov,
            ..crossing.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleGun;
    use refit_core::types::GlobalVector;

    fn particle(pt: f64) -> Particle {
        Particle {
            id: 1,
            vertex: GlobalVector::zeros(),
            momentum: GlobalVector::new(pt * 0.6, pt * 0.8, 0.5),
            charge: 1.0,
        }
    }

    fn simulator(config: SimConfig) -> TrackSimulator {
        TrackSimulator::new(&DetectorSetup::default(), config, 3)
    }

    #[test]
    fn prompt_track_has_inside_out_hits() {
        let mut sim = simulator(SimConfig {
            hit_efficiency: 1.0,
            ..Default::default()
        });
        let t = sim.simulate(&particle(10.0)).unwrap().track;
        assert_eq!(t.hits.len(), 10);
        assert_eq!(t.hits[0].det_id, t.inner_det_id);
        assert_eq!(t.hits[9].det_id, t.outer_det_id);
        assert!(t.hits[0].position.norm() < t.hits[9].position.norm());
        let inner = t.innermost_state.unwrap();
        assert!(inner.position.xy().dot(&inner.momentum.xy()) > 0.0);
    }

    #[test]
    fn incoming_and_reversed_storage() {
        let mut incoming = simulator(SimConfig {
            incoming: true,
            hit_efficiency: 1.0,
            ..Default::default()
        });
        let t = incoming.simulate(&particle(10.0)).unwrap().track;
        assert_eq!(t.hits[0].det_id, t.outer_det_id);
        let inner = t.innermost_state.unwrap();
        assert!(inner.position.xy().dot(&inner.momentum.xy()) < 0.0);
        assert_eq!(inner.charge, -1.0);

        let mut reversed = simulator(SimConfig {
            reverse_storage: true,
            hit_efficiency: 1.0,
            ..Default::default()
        });
        let t = reversed.simulate(&particle(10.0)).unwrap().track;
        assert_eq!(t.hits[0].det_id, t.outer_det_id);
        let inner = t.innermost_state.unwrap();
        assert!(inner.position.xy().dot(&inner.momentum.xy()) > 0.0);
    }

    #[test]
    fn muon_hits_on_request() {
        let mut sim = simulator(SimConfig {
            with_muon_hits: true,
            hit_efficiency: 1.0,
            ..Default::default()
        });
        let t = sim.simulate(&particle(30.0)).unwrap().track;
        assert_eq!(t.hits.len(), 15);
        assert_eq!(t.hits.iter().filter(|h| h.det_id.is_muon()).count(), 5);
    }

    #[test]
    fn inefficiency_leaves_invalid_hits() {
        let mut sim = simulator(SimConfig {
            hit_efficiency: 0.0,
            ..Default::default()
        });
        let t = sim.simulate(&particle(10.0)).unwrap().track;
        assert_eq!(t.valid_hit_count(), 0);
        assert_eq!(t.hits.len(), 10);
    }

    #[test]
    fn soft_particles_are_dropped() {
        let mut sim = simulator(SimConfig::default());
        assert!(sim.simulate(&particle(0.05)).is_none());
    }

    #[test]
    fn deterministic_for_a_seed() {
        let gun = ParticleGun::default();
        let p = gun.shoot(0, &mut ChaCha8Rng::seed_from_u64(1));
        let a = simulator(SimConfig::default()).simulate(&p);
        let b = simulator(SimConfig::default()).simulate(&p);
        assert_eq!(a, b);
    }
}
