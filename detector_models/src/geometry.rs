//! Barrel detector geometry made of flat modules tiled in φ.
//!
//! Every layer is a ring of `n_modules` planar modules at radius `radius`.
//! Module `k` of layer `l` is centred at `(R cos φk, R sin φk, 0)` with
//! φk = 2πk/n and a radial normal. Its id index is `l * 1000 + k`.

use refit_core::providers::Geometry;
use refit_core::types::{DetId, GlobalVector, MuonSubsystem, Subsystem, Surface};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::TAU;

/// Modules per layer are indexed below this stride.
pub const MODULE_STRIDE: u32 = 1000;

/// Description of one barrel layer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BarrelLayer {
    pub subsystem: Subsystem,
    /// Distance of the module planes from the beam line (m)
    pub radius: f64,
    pub n_modules: u32,
    /// Modules cover |z| < half_length (m)
    pub half_length: f64,
}

impl BarrelLayer {
    pub fn tracker(radius: f64, half_length: f64) -> Self {
        // roughly 10 cm wide modules, never fewer than 8 per ring
        let n_modules = ((TAU * radius / 0.1).ceil() as u32).max(8);
        Self {
            subsystem: Subsystem::Tracker,
            radius,
            n_modules,
            half_length,
        }
    }

    pub fn muon(sub: MuonSubsystem, radius: f64) -> Self {
        Self {
            subsystem: Subsystem::Muon(sub),
            radius,
            n_modules: 12,
            half_length: 6.6,
        }
    }

    /// Azimuth of the centre of module `k`.
    pub fn module_phi(&self, k: u32) -> f64 {
        TAU * k as f64 / self.n_modules as f64
    }

    /// Module whose φ sector contains `phi`.
    pub fn module_for_phi(&self, phi: f64) -> u32 {
        let pitch = TAU / self.n_modules as f64;
        let k = (phi.rem_euclid(TAU) / pitch).round() as u32;
        k % self.n_modules
    }
}

/// Barrel tracker plus muon stations.
#[derive(Clone, Debug)]
pub struct BarrelGeometry {
    layers: Vec<BarrelLayer>,
    surfaces: HashMap<DetId, Surface>,
}

impl BarrelGeometry {
    /// Layers must be sorted by increasing radius.
    pub fn new(layers: Vec<BarrelLayer>) -> Self {
        let mut surfaces = HashMap::new();
        for (l, layer) in layers.iter().enumerate() {
            for k in 0..layer.n_modules {
                let id = module_id(layer.subsystem, l as u32, k);
                let phi = layer.module_phi(k);
                let normal = GlobalVector::new(phi.cos(), phi.sin(), 0.0);
                surfaces.insert(id, Surface::new(id, normal * layer.radius, normal));
            }
        }
        Self { layers, surfaces }
    }

    /// Ten tracker layers between 4 cm and 1 m, then interleaved DT and RPC
    /// stations between 4.5 m and 6.3 m.
    pub fn standard() -> Self {
        let mut layers: Vec<BarrelLayer> = [0.04, 0.07, 0.11, 0.25, 0.35, 0.5, 0.6, 0.7, 0.85, 1.0]
            .into_iter()
            .map(|r| BarrelLayer::tracker(r, 2.7))
            .collect();
        layers.extend([
            BarrelLayer::muon(MuonSubsystem::Dt, 4.5),
            BarrelLayer::muon(MuonSubsystem::Rpc, 4.7),
            BarrelLayer::muon(MuonSubsystem::Dt, 5.3),
            BarrelLayer::muon(MuonSubsystem::Dt, 6.1),
            BarrelLayer::muon(MuonSubsystem::Rpc, 6.3),
        ]);
        Self::new(layers)
    }

    pub fn layers(&self) -> &[BarrelLayer] {
        &self.layers
    }

    pub fn layer(&self, l: usize) -> Option<&BarrelLayer> {
        self.layers.get(l)
    }

    /// Indices of the tracker layers, innermost first.
    pub fn tracker_layers(&self) -> impl Iterator<Item = usize> + '_ {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, layer)| layer.subsystem == Subsystem::Tracker)
            .map(|(l, _)| l)
    }

    /// Indices of the muon stations, innermost first.
    pub fn muon_layers(&self) -> impl Iterator<Item = usize> + '_ {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, layer)| layer.subsystem != Subsystem::Tracker)
            .map(|(l, _)| l)
    }

    /// Surface of the module of layer `l` covering azimuth `phi`.
    pub fn module_at(&self, l: usize, phi: f64) -> Option<Surface> {
        let layer = self.layers.get(l)?;
        let id = module_id(layer.subsystem, l as u32, layer.module_for_phi(phi));
        self.surfaces.get(&id).copied()
    }

    /// Layer a module id belongs to.
    pub fn layer_of(&self, det_id: DetId) -> Option<usize> {
        let l = (det_id.index / MODULE_STRIDE) as usize;
        (self.layers.get(l)?.subsystem == det_id.subsystem).then_some(l)
    }

    pub fn module_count(&self) -> usize {
        self.surfaces.len()
    }
}

impl Default for BarrelGeometry {
    fn default() -> Self {
        Self::standard()
    }
}

impl Geometry for BarrelGeometry {
    fn surface(&self, det_id: DetId) -> Option<Surface> {
        self.surfaces.get(&det_id).copied()
    }
}

fn module_id(subsystem: Subsystem, layer: u32, module: u32) -> DetId {
    DetId {
        subsystem,
        index: layer * MODULE_STRIDE + module,
    }
}

/// In-plane unit axes (u, v) of a surface: u lies in the transverse plane,
/// v completes a right-handed (u, v, n) frame.
pub fn plane_axes(surface: &Surface) -> (GlobalVector, GlobalVector) {
    let n = surface.normal;
    let mut u = GlobalVector::z().cross(&n);
    if u.norm() < 1e-9 {
        u = GlobalVector::x().cross(&n);
    }
    let u = u.normalize();
    let v = n.cross(&u);
    (u, v)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
