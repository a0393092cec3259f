//! Refit metrics: success rate, failure breakdown, χ²/ndof and pT resolution.

use crate::error::RefitFailure;
use crate::trajectory::Trajectory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Accumulated refit statistics over a batch of tracks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RefitMetrics {
    /// Tracks handed to the refitter
    pub n_tracks: u64,
    /// Tracks that produced a trajectory
    pub n_refitted: u64,
    /// Failures keyed by [`RefitFailure::label`]
    pub failures: BTreeMap<String, u64>,
    /// Sum of χ²/ndof over refitted tracks with positive ndof
    pub sum_chi2_per_ndof: f64,
    pub n_chi2: u64,
    /// Sum of squared relative pT residuals against truth
    pub sum_sq_rel_pt: f64,
    pub n_pt: u64,
}

impl RefitMetrics {
    /// Record one refit outcome. `true_pt` is the generated transverse
    /// momentum, when known.
    pub fn accumulate(&mut self, result: &Result<Trajectory, RefitFailure>, true_pt: Option<f64>) {
        self.n_tracks += 1;
        let traj = match result {
            Ok(t) => t,
            Err(failure) => {
                *self.failures.entry(failure.label().to_string()).or_insert(0) += 1;
                return;
            }
        };
        self.n_refitted += 1;

        let ndof = traj.ndof();
        if ndof > 0 {
            self.sum_chi2_per_ndof += traj.chi2() / ndof as f64;
            self.n_chi2 += 1;
        }

        let fitted = traj.geometrical_innermost_state().map(|s| s.transverse_momentum());
        if let (Some(fitted), Some(truth)) = (fitted, true_pt) {
            if truth > 0.0 {
                let rel = (fitted - truth) / truth;
                self.sum_sq_rel_pt += rel * rel;
                self.n_pt += 1;
            }
        }
    }

    /// Merge statistics from another batch.
    pub fn merge(&mut self, other: &RefitMetrics) {
        self.n_tracks += other.n_tracks;
        self.n_refitted += other.n_refitted;
        for (label, count) in &other.failures {
            *self.failures.entry(label.clone()).or_insert(0) += count;
        }
        self.sum_chi2_per_ndof += other.sum_chi2_per_ndof;
        self.n_chi2 += other.n_chi2;
        self.sum_sq_rel_pt += other.sum_sq_rel_pt;
        self.n_pt += other.n_pt;
    }

    /// Fraction of tracks that produced a trajectory.
    pub fn efficiency(&self) -> f64 {
        if self.n_tracks == 0 { 0.0 } else { self.n_refitted as f64 / self.n_tracks as f64 }
    }

    pub fn mean_chi2_per_ndof(&self) -> f64 {
        if self.n_chi2 == 0 { 0.0 } else { self.sum_chi2_per_ndof / self.n_chi2 as f64 }
    }

    /// RMS of (fitted pT − true pT) / true pT.
    pub fn rms_relative_pt(&self) -> f64 {
        if self.n_pt == 0 {
            return 0.0;
        }
        (self.sum_sq_rel_pt / self.n_pt as f64).sqrt()
    }
}
