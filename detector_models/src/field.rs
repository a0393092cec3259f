//! Magnetic field maps.

use refit_core::providers::MagneticField;
use refit_core::types::GlobalVector;
use serde::{Deserialize, Serialize};

/// Solenoid-like field: uniform and along z everywhere.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniformField {
    /// Field strength along z (T)
    pub bz: f64,
}

impl UniformField {
    pub fn new(bz: f64) -> Self {
        Self { bz }
    }
}

impl Default for UniformField {
    fn default() -> Self {
        Self { bz: 3.8 }
    }
}

impl MagneticField for UniformField {
    fn field(&self, _point: &GlobalVector) -> GlobalVector {
        GlobalVector::new(0.0, 0.0, self.bz)
    }
}
