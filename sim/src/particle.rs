//! Particle gun: truth particles drawn from pT / η / φ / charge ranges.

use rand::prelude::*;
use refit_core::types::{DetId, GlobalVector, StateCov, TrajectoryState};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A generated truth particle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Unique particle ID (used for metrics)
    pub id: u64,
    /// Production vertex (m)
    pub vertex: GlobalVector,
    /// Momentum at the vertex (GeV/c)
    pub momentum: GlobalVector,
    /// ±1
    pub charge: f64,
}

impl Particle {
    pub fn pt(&self) -> f64 {
        self.momentum.xy().norm()
    }

    pub fn phi(&self) -> f64 {
        self.momentum.y.atan2(self.momentum.x)
    }

    /// Pseudorapidity η = asinh(pz / pT).
    pub fn eta(&self) -> f64 {
        (self.momentum.z / self.pt()).asinh()
    }

    /// Exact state at the vertex.
    pub fn vertex_state(&self) -> TrajectoryState {
        TrajectoryState::new(
            DetId::tracker(0),
            self.vertex,
            self.momentum,
            self.charge,
            StateCov::zeros(),
        )
    }
}

/// Which charges the gun shoots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeSpec {
    Positive,
    Negative,
    /// 50/50
    Both,
}

/// Flat distributions in pT, η and φ around a Gaussian beam spot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticleGun {
    /// GeV/c
    pub pt_range: (f64, f64),
    pub eta_range: (f64, f64),
    pub phi_range: (f64, f64),
    pub charge: ChargeSpec,
    /// Transverse and longitudinal beam spot spread (m)
    pub beam_spot_sigma: (f64, f64),
}

impl Default for ParticleGun {
    fn default() -> Self {
        Self {
            pt_range: (1.0, 20.0),
            eta_range: (-1.0, 1.0),
            phi_range: (-PI, PI),
            charge: ChargeSpec::Both,
            beam_spot_sigma: (20e-6, 0.05),
        }
    }
}

impl ParticleGun {
    pub fn shoot<R: Rng>(&self, id: u64, rng: &mut R) -> Particle {
        let pt = uniform(rng, self.pt_range);
        let eta = uniform(rng, self.eta_range);
        let phi = uniform(rng, self.phi_range);
        let charge = match self.charge {
            ChargeSpec::Positive => 1.0,
            ChargeSpec::Negative => -1.0,
            ChargeSpec::Both => {
                if rng.gen::<bool>() {
                    1.0
                } else {
                    -1.0
                }
            }
        };
        let (sigma_t, sigma_z) = self.beam_spot_sigma;
        let vertex = GlobalVector::new(
            gauss(rng) * sigma_t,
            gauss(rng) * sigma_t,
            gauss(rng) * sigma_z,
        );
        Particle {
            id,
            vertex,
            momentum: GlobalVector::new(pt * phi.cos(), pt * phi.sin(), pt * eta.sinh()),
            charge,
        }
    }
}

fn uniform<R: Rng>(rng: &mut R, (lo, hi): (f64, f64)) -> f64 {
    lo + rng.gen::<f64>() * (hi - lo)
}

pub(crate) fn gauss<R: Rng>(rng: &mut R) -> f64 {
    rng.sample(rand_distr::StandardNormal)
}
