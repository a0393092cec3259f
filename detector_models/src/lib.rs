//! `detector_models`: Reference collaborators for `refit_core`.
//!
//! # Module layout
//! - [`geometry`]: Barrel of planar modules (tracker layers, muon stations)
//! - [`field`]: Uniform solenoid field
//! - [`propagator`]: Analytic helix propagator with numerical Jacobian
//! - [`hits`]: Planar measurement model, hit cloners and builders
//! - [`kalman`]: Kalman fitter and two-filter smoother
//! - [`navigation`]: Module search along a particle path
//! - [`setup`]: Named provider registry implementing `ServiceSource`

pub mod field;
pub mod geometry;
pub mod hits;
pub mod kalman;
pub mod navigation;
pub mod propagator;
pub mod setup;

pub use field::UniformField;
pub use geometry::{BarrelGeometry, BarrelLayer};
pub use kalman::{KfConfig, KfFitter, KfSmoother};
pub use propagator::{HelixPropagator, PropagatorConfig};
pub use setup::{DetectorConfig, DetectorSetup};
