//! Mock collaborators for unit tests.
//!
//! Geometry places every module on the +x axis at its radius, the propagator
//! moves a state onto the target surface origin, and the fitter/smoother
//! record their inputs and call counts.

use crate::direction::PropagationDirection;
use crate::providers::{
    Fitter, Geometry, HitBuilder, HitCloner, MagneticField, Propagator, Smoother,
};
use crate::services::{HitBuilders, ProviderCategory, ServiceSource};
use crate::trajectory::{Trajectory, TrajectoryMeasurement, TrajectorySeed};
use crate::types::{
    DetId, FitHit, GlobalVector, HitCov, RecHit, StateCov, Surface, Track, TrajectoryState,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

pub fn radial_surface(det_id: DetId, r: f64) -> Surface {
    Surface::new(det_id, GlobalVector::new(r, 0.0, 0.0), GlobalVector::x())
}

pub fn rec_hit(det_id: DetId, r: f64) -> RecHit {
    RecHit::new(det_id, GlobalVector::new(r, 0.0, 0.0), HitCov::identity() * 1e-8)
}

/// Fit hits `TK#0..n` at the given radii.
pub fn fit_hits(radii: &[f64]) -> Vec<FitHit> {
    radii
        .iter()
        .enumerate()
        .map(|(i, &r)| {
            let hit = rec_hit(DetId::tracker(i as u32), r);
            SurfaceCloner.clone_for_fit(&hit, &radial_surface(hit.det_id, r))
        })
        .collect()
}

/// Outward-moving state on `det_id` at radius `r`.
pub fn state_on(det_id: DetId, r: f64) -> TrajectoryState {
    TrajectoryState::new(
        det_id,
        GlobalVector::new(r, 0.0, 0.0),
        GlobalVector::new(1.0, 0.0, 0.0),
        1.0,
        StateCov::identity() * 1e-4,
    )
}

/// A track with hits `TK#0..n` at the given radii, registered in the
/// setup's geometry, plus the matching fit hits.
pub fn radial_track(setup: &MockSetup, radii: &[f64]) -> (Track, Vec<FitHit>) {
    let n = radii.len();
    let mut hits = Vec::with_capacity(n);
    for (i, &r) in radii.iter().enumerate() {
        let id = DetId::tracker(i as u32);
        setup.geometry().add_radial(id, r);
        hits.push(rec_hit(id, r));
    }
    let inner = DetId::tracker(0);
    let outer = DetId::tracker(n.saturating_sub(1) as u32);
    let track = Track {
        hits,
        innermost_state: radii.first().map(|&r| state_on(inner, r)),
        outermost_state: radii.last().map(|&r| state_on(outer, r)),
        inner_det_id: inner,
        outer_det_id: outer,
    };
    (track, fit_hits(radii))
}

pub fn hit_builders() -> HitBuilders {
    let builder: Arc<dyn HitBuilder> = Arc::new(MockHitBuilder);
    HitBuilders {
        tracker: builder.clone(),
        muon: builder,
        cloner: Arc::new(SurfaceCloner),
    }
}

// ---------------------------------------------------------------------------
// Geometry, field, hits
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockGeometry {
    surfaces: RwLock<HashMap<DetId, Surface>>,
}

impl MockGeometry {
    pub fn add_radial(&self, det_id: DetId, r: f64) {
        if let Ok(mut map) = self.surfaces.write() {
            map.insert(det_id, radial_surface(det_id, r));
        }
    }
}

impl Geometry for MockGeometry {
    fn surface(&self, det_id: DetId) -> Option<Surface> {
        self.surfaces.read().ok()?.get(&det_id).copied()
    }
}

pub struct MockField;

impl MagneticField for MockField {
    fn field(&self, _point: &GlobalVector) -> GlobalVector {
        GlobalVector::new(0.0, 0.0, 3.8)
    }
}

pub struct SurfaceCloner;

impl HitCloner for SurfaceCloner {
    fn clone_for_fit(&self, hit: &RecHit, surface: &Surface) -> FitHit {
        FitHit {
            surface: *surface,
            position: hit.position,
            error: hit.error,
        }
    }
}

pub struct MockHitBuilder;

impl HitBuilder for MockHitBuilder {
    fn cloner(&self) -> Arc<dyn HitCloner> {
        Arc::new(SurfaceCloner)
    }
}

// ---------------------------------------------------------------------------
// Propagator
// ---------------------------------------------------------------------------

/// Moves states onto the target surface origin, failing on chosen modules.
#[derive(Default)]
pub struct ScriptedPropagator {
    failing: Mutex<HashSet<DetId>>,
    calls: AtomicUsize,
}

impl ScriptedPropagator {
    pub fn failing_on(ids: &[DetId]) -> Self {
        Self {
            failing: Mutex::new(ids.iter().copied().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_on(&self, det_id: DetId) {
        if let Ok(mut set) = self.failing.lock() {
            set.insert(det_id);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Propagator for ScriptedPropagator {
    fn propagate(&self, state: &TrajectoryState, surface: &Surface) -> Option<TrajectoryState> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().ok()?.contains(&surface.det_id) {
            return None;
        }
        Some(TrajectoryState {
            det_id: surface.det_id,
            position: surface.origin,
            ..state.clone()
        })
    }
}

// ---------------------------------------------------------------------------
// Fitter / smoother
// ---------------------------------------------------------------------------

/// What the fitter was asked to do in one call.
#[derive(Clone, Debug, PartialEq)]
pub struct FitInput {
    pub hits: Vec<DetId>,
    pub start: DetId,
    pub direction: PropagationDirection,
}

#[derive(Default)]
struct FitLog {
    fit_calls: AtomicUsize,
    smooth_calls: AtomicUsize,
    cloner_bindings: AtomicUsize,
    fail_fit_on: Mutex<Option<usize>>,
    fail_smooth_on: Mutex<Option<usize>>,
    inputs: Mutex<Vec<FitInput>>,
}

#[derive(Clone)]
struct MockFitter {
    log: Arc<FitLog>,
}

impl Fitter for MockFitter {
    fn fit(&self, seed: &TrajectorySeed, hits: &[FitHit], start: &TrajectoryState) -> Vec<Trajectory> {
        let call = self.log.fit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut inputs) = self.log.inputs.lock() {
            inputs.push(FitInput {
                hits: hits.iter().map(FitHit::det_id).collect(),
                start: start.det_id,
                direction: seed.direction(),
            });
        }
        if self.log.fail_fit_on.lock().map(|f| *f == Some(call)).unwrap_or(false) {
            return Vec::new();
        }
        let mut traj = Trajectory::new(*seed, seed.direction());
        for hit in hits {
            let state = TrajectoryState {
                det_id: hit.det_id(),
                position: hit.surface.origin,
                ..start.clone()
            };
            traj.push(TrajectoryMeasurement::new(state, hit.clone()));
        }
        vec![traj]
    }

    fn set_hit_cloner(&mut self, _cloner: Arc<dyn HitCloner>) {
        self.log.cloner_bindings.fetch_add(1, Ordering::SeqCst);
    }

    fn box_clone(&self) -> Box<dyn Fitter> {
        Box::new(self.clone())
    }
}

#[derive(Clone)]
struct MockSmoother {
    log: Arc<FitLog>,
}

impl Smoother for MockSmoother {
    fn trajectories(&self, trajectory: &Trajectory) -> Vec<Trajectory> {
        let call = self.log.smooth_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.log.fail_smooth_on.lock().map(|f| *f == Some(call)).unwrap_or(false) {
            return Vec::new();
        }
        vec![trajectory.clone().with_chi2(call as f64)]
    }

    fn set_hit_cloner(&mut self, _cloner: Arc<dyn HitCloner>) {
        self.log.cloner_bindings.fetch_add(1, Ordering::SeqCst);
    }

    fn box_clone(&self) -> Box<dyn Smoother> {
        Box::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Service source
// ---------------------------------------------------------------------------

/// Service source handing out the mocks above under the default names.
pub struct MockSetup {
    generations: HashMap<ProviderCategory, u64>,
    geometry: Arc<MockGeometry>,
    pub propagator: Arc<ScriptedPropagator>,
    log: Arc<FitLog>,
}

impl MockSetup {
    pub fn new() -> Self {
        Self {
            generations: ProviderCategory::ALL.iter().map(|c| (*c, 1)).collect(),
            geometry: Arc::new(MockGeometry::default()),
            propagator: Arc::new(ScriptedPropagator::default()),
            log: Arc::new(FitLog::default()),
        }
    }

    pub fn bump(&mut self, category: ProviderCategory) {
        *self.generations.entry(category).or_insert(0) += 1;
    }

    pub fn geometry(&self) -> Arc<MockGeometry> {
        self.geometry.clone()
    }

    pub fn fitter_calls(&self) -> usize {
        self.log.fit_calls.load(Ordering::SeqCst)
    }

    pub fn smoother_calls(&self) -> usize {
        self.log.smooth_calls.load(Ordering::SeqCst)
    }

    pub fn cloner_bindings(&self) -> usize {
        self.log.cloner_bindings.load(Ordering::SeqCst)
    }

    pub fn fit_inputs(&self) -> Vec<FitInput> {
        self.log.inputs.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn fail_fit_on_call(&self, call: Option<usize>) {
        if let Ok(mut f) = self.log.fail_fit_on.lock() {
            *f = call;
        }
    }

    pub fn fail_smooth_on_call(&self, call: Option<usize>) {
        if let Ok(mut f) = self.log.fail_smooth_on.lock() {
            *f = call;
        }
    }
}

impl ServiceSource for MockSetup {
    fn generation(&self, category: ProviderCategory) -> u64 {
        self.generations.get(&category).copied().unwrap_or(0)
    }

    fn fitter(&self, name: &str) -> Option<Arc<dyn Fitter>> {
        (name == "KFFitter").then(|| Arc::new(MockFitter { log: self.log.clone() }) as Arc<dyn Fitter>)
    }

    fn smoother(&self, name: &str) -> Option<Arc<dyn Smoother>> {
        (name == "KFSmoother")
            .then(|| Arc::new(MockSmoother { log: self.log.clone() }) as Arc<dyn Smoother>)
    }

    fn propagator(&self, name: &str) -> Option<Arc<dyn Propagator>> {
        (name == "HelixPropagatorAny").then(|| self.propagator.clone() as Arc<dyn Propagator>)
    }

    fn geometry(&self) -> Arc<dyn Geometry> {
        self.geometry.clone()
    }

    fn magnetic_field(&self) -> Arc<dyn MagneticField> {
        Arc::new(MockField)
    }

    fn hit_builder(&self, name: &str) -> Option<Arc<dyn HitBuilder>> {
        matches!(name, "TrackerHitBuilder" | "MuonHitBuilder")
            .then(|| Arc::new(MockHitBuilder) as Arc<dyn HitBuilder>)
    }
}
