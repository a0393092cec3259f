//! Refitter configuration.

use crate::direction::RefitDirection;
use serde::{Deserialize, Serialize};

/// Configuration supplied once when the refitter is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefitterConfig {
    /// Fit direction policy: `alongMomentum`, `oppositeToMomentum`,
    /// `insideOut` or `outsideIn`
    pub refit_direction: RefitDirection,
    /// Name of the fitter provider
    pub fitter: String,
    /// Name of the smoother provider
    pub smoother: String,
    /// Name of the propagator used to reach the first hit and for predictions
    pub propagator: String,
    pub tracker_hit_builder: String,
    pub muon_hit_builder: String,
    /// Keep RPC hits. Only consulted when `include_muon_hits` is set; with the
    /// default configuration every muon hit is dropped anyway.
    pub refit_rpc_hits: bool,
    /// Send muon-system hits to the fit. Off by default: muon hits are
    /// always dropped.
    pub include_muon_hits: bool,
    /// Skip fitting; return the propagated predictions at every hit.
    pub predictions_only: bool,
}

impl Default for RefitterConfig {
    fn default() -> Self {
        Self {
            refit_direction: RefitDirection::along_momentum(),
            fitter: "KFFitter".into(),
            smoother: "KFSmoother".into(),
            propagator: "HelixPropagatorAny".into(),
            tracker_hit_builder: "TrackerHitBuilder".into(),
            muon_hit_builder: "MuonHitBuilder".into(),
            refit_rpc_hits: true,
            include_muon_hits: false,
            predictions_only: false,
        }
    }
}
