//! Premium curve - utilization to annual premium rate
//!
//! Piecewise linear, kinked at `u_optimal`:
//!
//! ```text
//! u <= u_optimal : rate = r0 + r_slope1 * (u / u_optimal)
//! u >  u_optimal : rate = r0 + r_slope1 + r_slope2 * ((u - u_optimal) / (1 - u_optimal))
//! ```
//!
//! Rates are annual percentages in ray; utilization and `u_optimal` are fractions.

use athena_common::{AthenaError, Ray, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Validated premium curve parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumCurve {
    u_optimal: Ray,
    r0: Ray,
    r_slope1: Ray,
    r_slope2: Ray,
}

impl PremiumCurve {
    /// Build a curve, rejecting parameters that would make the tick clock undefined
    pub fn new(u_optimal: Ray, r0: Ray, r_slope1: Ray, r_slope2: Ray) -> Result<Self> {
        if u_optimal.is_zero() || u_optimal >= Ray::ONE {
            return Err(AthenaError::InvalidCurve(format!(
                "u_optimal must be strictly between 0 and 1, got {u_optimal}"
            )));
        }
        if r0.is_zero() {
            return Err(AthenaError::InvalidCurve(
                "base rate r0 must be positive".to_string(),
            ));
        }
        Ok(Self {
            u_optimal,
            r0,
            r_slope1,
            r_slope2,
        })
    }

    /// Build a curve from human-readable percentages, e.g. `u_optimal = 75`
    pub fn from_percentages(
        u_optimal: Decimal,
        r0: Decimal,
        r_slope1: Decimal,
        r_slope2: Decimal,
    ) -> Result<Self> {
        let u_optimal = Ray::from_decimal(u_optimal)?.div_int(athena_common::PERCENT)?;
        Self::new(
            u_optimal,
            Ray::from_decimal(r0)?,
            Ray::from_decimal(r_slope1)?,
            Ray::from_decimal(r_slope2)?,
        )
    }

    pub fn u_optimal(&self) -> Ray {
        self.u_optimal
    }

    /// Rate at zero utilization
    pub fn base_rate(&self) -> Ray {
        self.r0
    }

    /// Rate at 100% utilization
    pub fn max_rate(&self) -> Ray {
        self.r0 + self.r_slope1 + self.r_slope2
    }

    /// Premium rate for a utilization fraction
    pub fn rate(&self, utilization: Ray) -> Ray {
        rate(utilization, self)
    }

    /// Premium rate for a capital snapshot
    pub fn rate_for(&self, insured: u128, available: u128) -> Ray {
        self.rate(utilization(insured, available))
    }
}

impl Default for PremiumCurve {
    /// 75% kink, 1% base, +5% up to the kink, +11% above it
    fn default() -> Self {
        Self {
            u_optimal: Ray::from_raw(Ray::ONE.raw() / 4 * 3),
            r0: Ray::from_int(1),
            r_slope1: Ray::from_int(5),
            r_slope2: Ray::from_int(11),
        }
    }
}

/// Insured over available capital, zero when nothing is available
pub fn utilization(insured: u128, available: u128) -> Ray {
    Ray::from_ratio(insured, available).unwrap_or(Ray::ZERO)
}

/// Premium rate at `utilization` on `curve`
///
/// Total over validated curves: both denominators are non-zero by construction.
pub fn rate(utilization: Ray, curve: &PremiumCurve) -> Ray {
    if utilization <= curve.u_optimal {
        let progress = utilization
            .ray_div(curve.u_optimal)
            .unwrap_or_else(|_| unreachable!("u_optimal validated non-zero"));
        curve.r0 + curve.r_slope1.ray_mul(progress)
    } else {
        let excess = (utilization - curve.u_optimal)
            .ray_div(Ray::ONE - curve.u_optimal)
            .unwrap_or_else(|_| unreachable!("u_optimal validated below one"));
        curve.r0 + curve.r_slope1 + curve.r_slope2.ray_mul(excess)
    }
}
