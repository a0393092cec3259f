//! Scenario definitions.
//!
//! Each scenario is a named particle gun, detector response and refitter
//! configuration. All scenarios are deterministic given the same seed.

use crate::event_sim::{SimConfig, SimulatedTrack, TrackSimulator};
use crate::particle::{ChargeSpec, ParticleGun};
use detector_models::DetectorSetup;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use refit_core::direction::RefitDirection;
use refit_core::RefitterConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Which pre-defined scenario to load.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// Prompt tracks from the beam spot, fitted along momentum
    Prompt,
    /// Particles travelling towards the beam line, fitted outside-in
    Incoming,
    /// High-pT tracks extended into the muon stations
    Muon,
    /// Prompt tracks whose hits are stored outermost first
    ReversedStorage,
}

/// A fully configured simulation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub n_tracks: usize,
    pub gun: ParticleGun,
    pub sim: SimConfig,
    pub refitter: RefitterConfig,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64, n_tracks: usize) -> Self {
        let base = Self {
            name: String::new(),
            seed,
            n_tracks,
            gun: ParticleGun::default(),
            sim: SimConfig::default(),
            refitter: RefitterConfig::default(),
        };
        match kind {
            ScenarioKind::Prompt => Self {
                name: "prompt".into(),
                ..base
            },
            ScenarioKind::Incoming => Self {
                name: "incoming".into(),
                sim: SimConfig {
                    incoming: true,
                    ..base.sim
                },
                refitter: RefitterConfig {
                    refit_direction: RefitDirection::outside_in(),
                    ..base.refitter
                },
                ..base
            },
            ScenarioKind::Muon => Self {
                name: "muon".into(),
                gun: ParticleGun {
                    pt_range: (10.0, 50.0),
                    eta_range: (-0.5, 0.5),
                    charge: ChargeSpec::Both,
                    ..base.gun
                },
                sim: SimConfig {
                    with_muon_hits: true,
                    ..base.sim
                },
                refitter: RefitterConfig {
                    include_muon_hits: true,
                    ..base.refitter
                },
                ..base
            },
            ScenarioKind::ReversedStorage => Self {
                name: "reversed-storage".into(),
                sim: SimConfig {
                    reverse_storage: true,
                    ..base.sim
                },
                ..base
            },
        }
    }

    /// Shoot `n_tracks` particles and simulate them. Particles that cross
    /// too few layers are skipped, so fewer tracks may come back.
    pub fn generate(&self, setup: &DetectorSetup) -> Vec<SimulatedTrack> {
        let mut gun_rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut simulator =
            TrackSimulator::new(setup, self.sim.clone(), self.seed.wrapping_add(1));
        let tracks: Vec<SimulatedTrack> = (0..self.n_tracks as u64)
            .filter_map(|id| simulator.simulate(&self.gun.shoot(id, &mut gun_rng)))
            .collect();
        info!(
            scenario = %self.name,
            requested = self.n_tracks,
            simulated = tracks.len(),
            "scenario generated"
        );
        tracks
    }
}
