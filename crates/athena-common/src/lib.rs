//! # Athena Common
//!
//! Shared math, identifiers and errors for the Athena cover engine.
//!
//! ## Core Types
//!
//! - [`Ray`]: 27-digit fixed-point number used for every rate, index and premium
//! - [`PoolId`], [`CoverId`], [`PositionId`]: typed identifiers
//! - [`AthenaError`]: unified error type returned by every engine operation
//!
//! ## Units
//!
//! Capital and premium amounts crossing the API are raw token units (`u128`).
//! Premium rates are annual percentages expressed in ray, so `Ray::from_int(2)`
//! is a 2% yearly rate. Utilization is a fraction in ray.

pub mod error;
pub mod math;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{AthenaError, MathError, Result};
pub use math::ray::{Ray, RAY};
pub use math::share::mul_div_ceil;
pub use types::ids::{CoverId, PoolId, PositionId};

/// Athena version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Seconds in one day
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Days in one premium year
pub const DAYS_PER_YEAR: u128 = 365;

/// Rates are annual percentages
pub const PERCENT: u128 = 100;

/// Divisor turning `capital * annual_percent_rate` into a daily premium
pub const YEARLY_PERCENT_DIVISOR: u128 = PERCENT * DAYS_PER_YEAR;
