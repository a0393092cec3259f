//! `sim`: Seeded particle-gun simulation and replay logs for the refitter.

pub mod event_sim;
pub mod particle;
pub mod replay;
pub mod scenarios;

pub use event_sim::{SimConfig, SimulatedTrack, TrackSimulator};
pub use particle::{ChargeSpec, Particle, ParticleGun};
pub use replay::{load_replay, save_replay, ReplayLog};
pub use scenarios::{Scenario, ScenarioKind};
