//! Fixed-point arithmetic
//!
//! - [`ray`]: 27-digit scaled decimal arithmetic with half-up rounding
//! - [`share`]: pro-rata token shares, rounded up

pub mod ray;
pub mod share;
