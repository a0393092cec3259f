//! Version-stamped provider cache.
//!
//! Providers are looked up through a [`ServiceSource`] that numbers each
//! category with a generation. [`Services::refresh`] only re-resolves a
//! category when its generation moved, and re-binds the tracker hit cloner
//! into the fitter and smoother whenever either side was refreshed.

use crate::config::RefitterConfig;
use crate::error::RefitError;
use crate::providers::{
    Fitter, Geometry, HitBuilder, HitCloner, MagneticField, Propagator, Smoother,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Provider families that are refreshed independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderCategory {
    /// Fitter and smoother
    Fitters,
    /// Propagator
    TrackingComponents,
    Geometry,
    MagneticField,
    /// Tracker and muon hit builders
    HitBuilders,
}

impl ProviderCategory {
    pub const ALL: [ProviderCategory; 5] = [
        ProviderCategory::Fitters,
        ProviderCategory::TrackingComponents,
        ProviderCategory::Geometry,
        ProviderCategory::MagneticField,
        ProviderCategory::HitBuilders,
    ];
}

impl fmt::Display for ProviderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderCategory::Fitters => "fitter",
            ProviderCategory::TrackingComponents => "tracking component",
            ProviderCategory::Geometry => "geometry",
            ProviderCategory::MagneticField => "magnetic field",
            ProviderCategory::HitBuilders => "hit builder",
        };
        f.write_str(name)
    }
}

/// Where providers come from, e.g. a per-run detector setup.
pub trait ServiceSource {
    /// Monotonically increasing generation of a category.
    fn generation(&self, category: ProviderCategory) -> u64;
    fn fitter(&self, name: &str) -> Option<Arc<dyn Fitter>>;
    fn smoother(&self, name: &str) -> Option<Arc<dyn Smoother>>;
    fn propagator(&self, name: &str) -> Option<Arc<dyn Propagator>>;
    fn geometry(&self) -> Arc<dyn Geometry>;
    fn magnetic_field(&self) -> Arc<dyn MagneticField>;
    fn hit_builder(&self, name: &str) -> Option<Arc<dyn HitBuilder>>;
}

/// A cached value with the generation it was resolved at.
#[derive(Debug)]
pub struct VersionedSlot<T> {
    generation: u64,
    value: Option<T>,
}

impl<T> Default for VersionedSlot<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            value: None,
        }
    }
}

impl<T> VersionedSlot<T> {
    /// Empty slots are always stale.
    pub fn is_stale(&self, generation: u64) -> bool {
        self.value.is_none() || self.generation != generation
    }

    pub fn refresh(&mut self, generation: u64, value: T) {
        self.generation = generation;
        self.value = Some(value);
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Tracker and muon hit builders plus the tracker hit cloner.
#[derive(Clone)]
pub struct HitBuilders {
    pub tracker: Arc<dyn HitBuilder>,
    pub muon: Arc<dyn HitBuilder>,
    pub cloner: Arc<dyn HitCloner>,
}

/// Cached providers owned by one refitter.
#[derive(Default)]
pub struct Services {
    fitter: VersionedSlot<Box<dyn Fitter>>,
    smoother: VersionedSlot<Box<dyn Smoother>>,
    propagator: VersionedSlot<Arc<dyn Propagator>>,
    geometry: VersionedSlot<Arc<dyn Geometry>>,
    field: VersionedSlot<Arc<dyn MagneticField>>,
    hit_builders: VersionedSlot<HitBuilders>,
}

/// Borrowed view of a fully populated [`Services`].
pub struct ReadyServices<'a> {
    pub fitter: &'a dyn Fitter,
    pub smoother: &'a dyn Smoother,
    pub propagator: &'a dyn Propagator,
    pub geometry: &'a dyn Geometry,
    pub field: &'a dyn MagneticField,
    pub hit_builders: &'a HitBuilders,
}

fn not_found(category: ProviderCategory, name: &str) -> RefitError {
    RefitError::ProviderNotFound {
        category,
        name: name.to_string(),
    }
}

impl Services {
    /// Re-resolve stale categories. Returns the categories that were refreshed.
    pub fn refresh(
        &mut self,
        source: &dyn ServiceSource,
        config: &RefitterConfig,
    ) -> Result<Vec<ProviderCategory>, RefitError> {
        let mut refreshed = Vec::new();

        let gen = source.generation(ProviderCategory::Fitters);
        if self.fitter.is_stale(gen) || self.smoother.is_stale(gen) {
            let fitter = source
                .fitter(&config.fitter)
                .ok_or_else(|| not_found(ProviderCategory::Fitters, &config.fitter))?;
            let smoother = source
                .smoother(&config.smoother)
                .ok_or_else(|| not_found(ProviderCategory::Fitters, &config.smoother))?;
            self.fitter.refresh(gen, fitter.box_clone());
            self.smoother.refresh(gen, smoother.box_clone());
            refreshed.push(ProviderCategory::Fitters);
        }

        let gen = source.generation(ProviderCategory::TrackingComponents);
        if self.propagator.is_stale(gen) {
            let propagator = source.propagator(&config.propagator).ok_or_else(|| {
                not_found(ProviderCategory::TrackingComponents, &config.propagator)
            })?;
            self.propagator.refresh(gen, propagator);
            refreshed.push(ProviderCategory::TrackingComponents);
        }

        let gen = source.generation(ProviderCategory::Geometry);
        if self.geometry.is_stale(gen) {
            self.geometry.refresh(gen, source.geometry());
            refreshed.push(ProviderCategory::Geometry);
        }

        let gen = source.generation(ProviderCategory::MagneticField);
        if self.field.is_stale(gen) {
            self.field.refresh(gen, source.magnetic_field());
            refreshed.push(ProviderCategory::MagneticField);
        }

        let gen = source.generation(ProviderCategory::HitBuilders);
        if self.hit_builders.is_stale(gen) {
            let tracker = source.hit_builder(&config.tracker_hit_builder).ok_or_else(|| {
                not_found(ProviderCategory::HitBuilders, &config.tracker_hit_builder)
            })?;
            let muon = source.hit_builder(&config.muon_hit_builder).ok_or_else(|| {
                not_found(ProviderCategory::HitBuilders, &config.muon_hit_builder)
            })?;
            let cloner = tracker.cloner();
            self.hit_builders.refresh(
                gen,
                HitBuilders {
                    tracker,
                    muon,
                    cloner,
                },
            );
            refreshed.push(ProviderCategory::HitBuilders);
        }

        let rebind = refreshed
            .iter()
            .any(|c| matches!(c, ProviderCategory::Fitters | ProviderCategory::HitBuilders));
        if rebind {
            if let Some(cloner) = self.hit_builders.get().map(|hb| hb.cloner.clone()) {
                if let Some(fitter) = self.fitter.get_mut() {
                    fitter.set_hit_cloner(cloner.clone());
                }
                if let Some(smoother) = self.smoother.get_mut() {
                    smoother.set_hit_cloner(cloner);
                }
            }
        }

        for category in &refreshed {
            trace!(%category, generation = source.generation(*category), "provider changed");
        }
        Ok(refreshed)
    }

    /// All providers, or `None` before the first successful refresh.
    pub fn ready(&self) -> Option<ReadyServices<'_>> {
        Some(ReadyServices {
            fitter: self.fitter.get()?.as_ref(),
            smoother: self.smoother.get()?.as_ref(),
            propagator: self.propagator.get()?.as_ref(),
            geometry: self.geometry.get()?.as_ref(),
            field: self.field.get()?.as_ref(),
            hit_builders: self.hit_builders.get()?,
        })
    }

    /// Generation each cached category was resolved at.
    pub fn generation(&self, category: ProviderCategory) -> u64 {
        match category {
            ProviderCategory::Fitters => self.fitter.generation(),
            ProviderCategory::TrackingComponents => self.propagator.generation(),
            ProviderCategory::Geometry => self.geometry.generation(),
            ProviderCategory::MagneticField => self.field.generation(),
            ProviderCategory::HitBuilders => self.hit_builders.generation(),
        }
    }
}
