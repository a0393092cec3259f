//! Detector setup: the named provider registry handed to the refitter.

use crate::field::UniformField;
use crate::geometry::BarrelGeometry;
use crate::hits::{MuonHitBuilder, TrackerHitBuilder};
use crate::kalman::{KfConfig, KfFitter, KfSmoother};
use crate::propagator::{HelixPropagator, PropagatorConfig};
use refit_core::direction::PropagationDirection;
use refit_core::providers::{Fitter, Geometry, HitBuilder, MagneticField, Propagator, Smoother};
use refit_core::services::{ProviderCategory, ServiceSource};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const KF_FITTER: &str = "KFFitter";
pub const KF_SMOOTHER: &str = "KFSmoother";
pub const PROPAGATOR_ANY: &str = "HelixPropagatorAny";
pub const PROPAGATOR_ALONG: &str = "HelixPropagatorAlong";
pub const PROPAGATOR_OPPOSITE: &str = "HelixPropagatorOpposite";
pub const TRACKER_HIT_BUILDER: &str = "TrackerHitBuilder";
pub const MUON_HIT_BUILDER: &str = "MuonHitBuilder";

/// Tunables of the reference detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Solenoid field (T)
    pub bz: f64,
    pub propagator: PropagatorConfig,
    pub kalman: KfConfig,
    /// Muon chamber alignment uncertainty (m)
    pub muon_alignment_sigma: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            bz: 3.8,
            propagator: PropagatorConfig::default(),
            kalman: KfConfig::default(),
            muon_alignment_sigma: MuonHitBuilder::default().alignment_sigma,
        }
    }
}

/// Barrel geometry, uniform field and Kalman components, with a generation
/// counter per provider category.
pub struct DetectorSetup {
    config: DetectorConfig,
    geometry: Arc<BarrelGeometry>,
    field: Arc<UniformField>,
    generations: HashMap<ProviderCategory, u64>,
}

impl DetectorSetup {
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_geometry(config, BarrelGeometry::standard())
    }

    pub fn with_geometry(config: DetectorConfig, geometry: BarrelGeometry) -> Self {
        Self {
            field: Arc::new(UniformField::new(config.bz)),
            geometry: Arc::new(geometry),
            config,
            generations: ProviderCategory::ALL.iter().map(|c| (*c, 1)).collect(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn barrel(&self) -> &BarrelGeometry {
        &self.geometry
    }

    /// Propagator with the given direction constraint.
    pub fn helix_propagator(&self, direction: PropagationDirection) -> HelixPropagator {
        HelixPropagator::new(
            self.field.clone(),
            PropagatorConfig {
                direction,
                ..self.config.propagator
            },
        )
    }

    /// Mark a provider category as changed.
    pub fn bump(&mut self, category: ProviderCategory) {
        let gen = self.generations.entry(category).or_insert(0);
        *gen += 1;
        debug!(%category, generation = *gen, "provider bumped");
    }

    /// Switch the field; every component built on it changes too.
    pub fn set_field(&mut self, bz: f64) {
        self.config.bz = bz;
        self.field = Arc::new(UniformField::new(bz));
        for category in [
            ProviderCategory::MagneticField,
            ProviderCategory::TrackingComponents,
            ProviderCategory::Fitters,
        ] {
            self.bump(category);
        }
    }
}

impl Default for DetectorSetup {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl ServiceSource for DetectorSetup {
    fn generation(&self, category: ProviderCategory) -> u64 {
        self.generations.get(&category).copied().unwrap_or(0)
    }

    fn fitter(&self, name: &str) -> Option<Arc<dyn Fitter>> {
        (name == KF_FITTER).then(|| {
            let propagator = self.helix_propagator(PropagationDirection::AlongMomentum);
            Arc::new(KfFitter::new(propagator, self.config.kalman)) as Arc<dyn Fitter>
        })
    }

    fn smoother(&self, name: &str) -> Option<Arc<dyn Smoother>> {
        (name == KF_SMOOTHER).then(|| {
            let propagator = self.helix_propagator(PropagationDirection::AlongMomentum);
            Arc::new(KfSmoother::new(propagator, self.config.kalman)) as Arc<dyn Smoother>
        })
    }

    fn propagator(&self, name: &str) -> Option<Arc<dyn Propagator>> {
        let direction = match name {
            PROPAGATOR_ANY => PropagationDirection::AnyDirection,
            PROPAGATOR_ALONG => PropagationDirection::AlongMomentum,
            PROPAGATOR_OPPOSITE => PropagationDirection::OppositeToMomentum,
            _ => return None,
        };
        Some(Arc::new(self.helix_propagator(direction)))
    }

    fn geometry(&self) -> Arc<dyn Geometry> {
        self.geometry.clone()
    }

    fn magnetic_field(&self) -> Arc<dyn MagneticField> {
        self.field.clone()
    }

    fn hit_builder(&self, name: &str) -> Option<Arc<dyn HitBuilder>> {
        let builder: Arc<dyn HitBuilder> = match name {
            TRACKER_HIT_BUILDER => Arc::new(TrackerHitBuilder),
            MUON_HIT_BUILDER => Arc::new(MuonHitBuilder {
                alignment_sigma: self.config.muon_alignment_sigma,
            }),
            _ => return None,
        };
        Some(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refit_core::config::RefitterConfig;

    #[test]
    fn default_names_resolve() {
        let setup = DetectorSetup::default();
        let cfg = RefitterConfig::default();
        assert!(setup.fitter(&cfg.fitter).is_some());
        assert!(setup.smoother(&cfg.smoother).is_some());
        assert!(setup.propagator(&cfg.propagator).is_some());
        assert!(setup.hit_builder(&cfg.tracker_hit_builder).is_some());
        assert!(setup.hit_builder(&cfg.muon_hit_builder).is_some());
        assert!(setup.propagator("RungeKutta").is_none());
    }

    #[test]
    fn set_field_bumps_dependent_categories() {
        let mut setup = DetectorSetup::default();
        setup.set_field(2.0);
        assert_eq!(setup.generation(ProviderCategory::MagneticField), 2);
        assert_eq!(setup.generation(ProviderCategory::TrackingComponents), 2);
        assert_eq!(setup.generation(ProviderCategory::Fitters), 2);
        assert_eq!(setup.generation(ProviderCategory::Geometry), 1);
        let b = setup.magnetic_field().field(&Default::default());
        assert_eq!(b.z, 2.0);
    }
}
