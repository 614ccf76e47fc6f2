//! Engine configuration

use athena_common::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::curve::PremiumCurve;

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Curve used by pools created without one of their own
    pub default_curve: CurveSettings,
    /// Most pools a single deposit may back
    pub max_pools_per_position: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_curve: CurveSettings::default(),
            max_pools_per_position: crate::DEFAULT_MAX_POOLS_PER_POSITION,
        }
    }
}

/// Premium curve parameters as percentages, e.g. `u_optimal = 75`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveSettings {
    pub u_optimal: Decimal,
    pub r0: Decimal,
    pub r_slope1: Decimal,
    pub r_slope2: Decimal,
}

impl Default for CurveSettings {
    fn default() -> Self {
        Self {
            u_optimal: Decimal::from(75),
            r0: Decimal::ONE,
            r_slope1: Decimal::from(5),
            r_slope2: Decimal::from(11),
        }
    }
}

impl CurveSettings {
    /// Validate and convert to ray parameters
    pub fn to_curve(&self) -> Result<PremiumCurve> {
        PremiumCurve::from_percentages(self.u_optimal, self.r0, self.r_slope1, self.r_slope2)
    }
}
