//! Refit direction resolution.
//!
//! Three inputs decide how a track is refitted: the geometrical order of the
//! selected hits (`RH`), the direction the particle travels at its innermost
//! state (`P`) and the configured fit direction (`FD`, or the geometrical fit
//! direction `GFD` when no propagation direction is configured).
//!
//! With an explicit propagation direction there are 8 cases:
//!
//! | case | RH | P  | FD | reverse hits | start from |
//! |------|----|----|----|--------------|------------|
//! | 1    | IO | IO | AM | no           | innermost  |
//! | 2    | IO | IO | OM | yes          | outermost  |
//! | 3    | IO | OI | AM | no           | innermost  |
//! | 4    | IO | OI | OM | yes          | outermost  |
//! | 5    | OI | IO | AM | yes          | innermost  |
//! | 6    | OI | IO | OM | no           | outermost  |
//! | 7    | OI | OI | AM | yes          | innermost  |
//! | 8    | OI | OI | OM | no           | outermost  |
//!
//! Rules: hits are kept when RH and FD agree (IO-AM, OI-OM); the fit starts
//! from the innermost state along momentum and from the outermost otherwise.
//! P does not take part once FD is explicit, so rows 3, 4, 7 and 8 behave
//! like rows 1, 2, 5 and 6.
//!
//! With only a geometrical direction configured (the "bis" cases), FD is
//! derived first: along momentum when P agrees with GFD, opposite otherwise.
//! Hits are then put into GFD order and the starting end is decided by GFD:
//!
//! | case  | RH | P  | GFD | FD | reverse hits | start from |
//! |-------|----|----|-----|----|--------------|------------|
//! | 1 bis | IO | IO | IO  | AM | no           | innermost  |
//! | 2 bis | IO | IO | OI  | OM | yes          | outermost  |
//! | 3 bis | IO | OI | OI  | AM | yes          | outermost  |
//! | 4 bis | IO | OI | IO  | OM | no           | innermost  |
//! | 5 bis | OI | IO | IO  | AM | yes          | innermost  |
//! | 6 bis | OI | IO | OI  | OM | no           | outermost  |
//! | 7 bis | OI | OI | OI  | AM | no           | outermost  |
//! | 8 bis | OI | OI | IO  | OM | yes          | innermost  |

use crate::error::RefitError;
use crate::types::GlobalVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Geometrical order of a hit sequence, or the geometrical sense of travel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometricalDirection {
    InsideOut,
    OutsideIn,
    Undetermined,
}

/// Propagation direction relative to the particle momentum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropagationDirection {
    AlongMomentum,
    OppositeToMomentum,
    AnyDirection,
}

impl PropagationDirection {
    /// Swap along/opposite; `AnyDirection` stays as is.
    pub fn opposite(self) -> Self {
        match self {
            PropagationDirection::AlongMomentum => PropagationDirection::OppositeToMomentum,
            PropagationDirection::OppositeToMomentum => PropagationDirection::AlongMomentum,
            PropagationDirection::AnyDirection => PropagationDirection::AnyDirection,
        }
    }
}

/// Configured fit direction: a geometrical preference and/or a propagation
/// direction. Built from one of the names `alongMomentum`,
/// `oppositeToMomentum`, `insideOut`, `outsideIn`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefitDirection {
    geometrical: GeometricalDirection,
    propagation: PropagationDirection,
}

impl RefitDirection {
    pub fn along_momentum() -> Self {
        Self {
            geometrical: GeometricalDirection::Undetermined,
            propagation: PropagationDirection::AlongMomentum,
        }
    }

    pub fn opposite_to_momentum() -> Self {
        Self {
            geometrical: GeometricalDirection::Undetermined,
            propagation: PropagationDirection::OppositeToMomentum,
        }
    }

    pub fn inside_out() -> Self {
        Self {
            geometrical: GeometricalDirection::InsideOut,
            propagation: PropagationDirection::AnyDirection,
        }
    }

    pub fn outside_in() -> Self {
        Self {
            geometrical: GeometricalDirection::OutsideIn,
            propagation: PropagationDirection::AnyDirection,
        }
    }

    pub fn geometrical_direction(&self) -> GeometricalDirection {
        self.geometrical
    }

    pub fn propagation_direction(&self) -> PropagationDirection {
        self.propagation
    }
}

impl Default for RefitDirection {
    fn default() -> Self {
        Self::along_momentum()
    }
}

impl FromStr for RefitDirection {
    type Err = RefitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alongMomentum" => Ok(Self::along_momentum()),
            "oppositeToMomentum" => Ok(Self::opposite_to_momentum()),
            "insideOut" => Ok(Self::inside_out()),
            "outsideIn" => Ok(Self::outside_in()),
            other => Err(RefitError::UnknownRefitDirection(other.to_string())),
        }
    }
}

impl TryFrom<String> for RefitDirection {
    type Error = RefitError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RefitDirection> for String {
    fn from(d: RefitDirection) -> Self {
        d.to_string()
    }
}

impl fmt::Display for RefitDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match (self.propagation, self.geometrical) {
            (PropagationDirection::AlongMomentum, _) => "alongMomentum",
            (PropagationDirection::OppositeToMomentum, _) => "oppositeToMomentum",
            (PropagationDirection::AnyDirection, GeometricalDirection::OutsideIn) => "outsideIn",
            (PropagationDirection::AnyDirection, _) => "insideOut",
        };
        f.write_str(name)
    }
}

/// Which boundary state of the track the fit starts from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackEnd {
    Innermost,
    Outermost,
}

impl fmt::Display for TrackEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackEnd::Innermost => f.write_str("innermost"),
            TrackEnd::Outermost => f.write_str("outermost"),
        }
    }
}

/// Outcome of [`resolve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectionDecision {
    pub reverse_hits: bool,
    pub start_from: TrackEnd,
    /// Propagation direction the fit runs in (never `AnyDirection` when the
    /// configured direction is geometrical)
    pub propagation_direction: PropagationDirection,
}

/// Order of two hit positions by their distance from the detector centre.
pub fn order_by_radius(first: &GlobalVector, last: &GlobalVector) -> GeometricalDirection {
    let (r_first, r_last) = (first.norm(), last.norm());
    if r_first < r_last {
        GeometricalDirection::InsideOut
    } else if r_first > r_last {
        GeometricalDirection::OutsideIn
    } else {
        GeometricalDirection::Undetermined
    }
}

/// Geometrical sense of travel at a state.
///
/// Transverse-plane test only: the particle moves inside-out when momentum
/// and position agree in sign on x or on y. z is ignored.
pub fn momentum_direction(position: &GlobalVector, momentum: &GlobalVector) -> GeometricalDirection {
    if momentum.x * position.x > 0.0 || momentum.y * position.y > 0.0 {
        GeometricalDirection::InsideOut
    } else {
        GeometricalDirection::OutsideIn
    }
}

/// Decide hit reversal, starting end and propagation direction.
///
/// `momentum` is only consulted when `policy` carries no propagation
/// direction of its own.
pub fn resolve(
    rec_hits_order: GeometricalDirection,
    momentum: GeometricalDirection,
    policy: RefitDirection,
) -> DirectionDecision {
    use GeometricalDirection::*;
    use PropagationDirection::*;

    let configured = policy.propagation_direction();
    let preferred = policy.geometrical_direction();

    if configured != AnyDirection {
        let reverse_hits = matches!(
            (rec_hits_order, configured),
            (InsideOut, OppositeToMomentum) | (OutsideIn, AlongMomentum)
        );
        let start_from = if configured == OppositeToMomentum {
            TrackEnd::Outermost
        } else {
            TrackEnd::Innermost
        };
        return DirectionDecision {
            reverse_hits,
            start_from,
            propagation_direction: configured,
        };
    }

    let propagation_direction = if momentum == preferred {
        AlongMomentum
    } else {
        OppositeToMomentum
    };
    let start_from = if preferred == OutsideIn {
        TrackEnd::Outermost
    } else {
        TrackEnd::Innermost
    };
    DirectionDecision {
        reverse_hits: preferred != rec_hits_order,
        start_from,
        propagation_direction,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
