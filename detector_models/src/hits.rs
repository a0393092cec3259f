//! Hit builders, hit cloners and the planar measurement model.
//!
//! # Measurement
//! A hit measures the two in-plane coordinates of its module:
//! z = [u·(x − o), v·(x − o)] with (u, v) from [`plane_axes`], so H is the
//! constant 2×6 matrix [[uᵀ 0], [vᵀ 0]] and R = Aᵀ E A for the 3×3 global
//! hit error E and A = [u v].

use crate::geometry::plane_axes;
use nalgebra::{Matrix2, Matrix3x2, SMatrix, Vector2};
use refit_core::providers::{HitBuilder, HitCloner};
use refit_core::types::{FitHit, GlobalVector, HitCov, RecHit, Surface};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 2×6 observation matrix.
pub type HMatrix = SMatrix<f64, 2, 6>;

/// Linear observation model of a planar module.
#[derive(Clone, Debug)]
pub struct PlanarMeasurement {
    origin: GlobalVector,
    axes: Matrix3x2<f64>,
}

impl PlanarMeasurement {
    pub fn new(surface: &Surface) -> Self {
        let (u, v) = plane_axes(surface);
        Self {
            origin: surface.origin,
            axes: Matrix3x2::from_columns(&[u, v]),
        }
    }

    pub fn h_matrix(&self) -> HMatrix {
        let mut h = HMatrix::zeros();
        h.fixed_view_mut::<2, 3>(0, 0).copy_from(&self.axes.transpose());
        h
    }

    pub fn r_matrix(&self, error: &HitCov) -> Matrix2<f64> {
        self.axes.transpose() * error * self.axes
    }

    /// Local coordinates of a global point.
    pub fn apply(&self, position: &GlobalVector) -> Vector2<f64> {
        self.axes.transpose() * (position - self.origin)
    }
}

/// Binds a hit to its module plane, projecting the position onto it.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlanarHitCloner;

impl HitCloner for PlanarHitCloner {
    fn clone_for_fit(&self, hit: &RecHit, surface: &Surface) -> FitHit {
        FitHit {
            surface: *surface,
            position: surface.project(&hit.position),
            error: hit.error,
        }
    }
}

/// Planar cloner that adds an in-plane alignment uncertainty.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MuonHitCloner {
    /// Alignment error added in quadrature (m)
    pub alignment_sigma: f64,
}

impl HitCloner for MuonHitCloner {
    fn clone_for_fit(&self, hit: &RecHit, surface: &Surface) -> FitHit {
        let n = surface.normal;
        let in_plane = HitCov::identity() - n * n.transpose();
        FitHit {
            error: hit.error + in_plane * self.alignment_sigma.powi(2),
            ..PlanarHitCloner.clone_for_fit(hit, surface)
        }
    }
}

/// Builds fit hits for silicon tracker modules.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrackerHitBuilder;

impl HitBuilder for TrackerHitBuilder {
    fn cloner(&self) -> Arc<dyn HitCloner> {
        Arc::new(PlanarHitCloner)
    }
}

/// Builds fit hits for muon chambers.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MuonHitBuilder {
    pub alignment_sigma: f64,
}

impl Default for MuonHitBuilder {
    fn default() -> Self {
        Self {
            alignment_sigma: 200e-6,
        }
    }
}

impl HitBuilder for MuonHitBuilder {
    fn cloner(&self) -> Arc<dyn HitCloner> {
        Arc::new(MuonHitCloner {
            alignment_sigma: self.alignment_sigma,
        })
    }
}

/// Global error matrix of a hit with independent in-plane resolutions
/// `sigma_u` (transverse) and `sigma_v` (along z).
pub fn planar_hit_error(surface: &Surface, sigma_u: f64, sigma_v: f64) -> HitCov {
    let (u, v) = plane_axes(surface);
    u * u.transpose() * sigma_u.powi(2) + v * v.transpose() * sigma_v.powi(2)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
