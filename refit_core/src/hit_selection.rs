//! Hit selection: reduce a track's hits to the ordered fit-ready sequence.
//!
//! - invalid hits are skipped
//! - tracker hits are cloned onto their geometry-resolved surface
//! - muon hits are dropped unless `include_muon_hits` is set; RPC hits are
//!   additionally dropped when `refit_rpc_hits` is off
//!
//! The input order is preserved.

use crate::config::RefitterConfig;
use crate::providers::Geometry;
use crate::services::HitBuilders;
use crate::types::{FitHit, MuonSubsystem, RecHit, Subsystem, Track};
use tracing::{debug, trace};

/// How muon-system hits are treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MuonHitPolicy {
    pub refit_rpc_hits: bool,
    pub include_muon_hits: bool,
}

impl From<&RefitterConfig> for MuonHitPolicy {
    fn from(cfg: &RefitterConfig) -> Self {
        Self {
            refit_rpc_hits: cfg.refit_rpc_hits,
            include_muon_hits: cfg.include_muon_hits,
        }
    }
}

/// Build the fit-ready hit sequence of `track`.
pub fn select_hits(
    track: &Track,
    geometry: &dyn Geometry,
    builders: &HitBuilders,
    policy: MuonHitPolicy,
) -> Vec<FitHit> {
    track
        .hits
        .iter()
        .filter(|hit| hit.valid)
        .filter_map(|hit| select_one(hit, geometry, builders, policy))
        .collect()
}

fn select_one(
    hit: &RecHit,
    geometry: &dyn Geometry,
    builders: &HitBuilders,
    policy: MuonHitPolicy,
) -> Option<FitHit> {
    match hit.det_id.subsystem {
        Subsystem::Tracker => {
            let built = builders.tracker.build(hit, geometry);
            if built.is_none() {
                debug!(det = %hit.det_id, "tracker hit on a module unknown to the geometry");
            }
            built
        }
        Subsystem::Muon(sub) => {
            if sub == MuonSubsystem::Rpc && !policy.refit_rpc_hits {
                trace!(det = %hit.det_id, "RPC hit discarded");
                return None;
            }
            if !policy.include_muon_hits {
                return None;
            }
            builders.muon.build(hit, geometry)
        }
    }
}
