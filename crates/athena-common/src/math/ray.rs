//! Ray - 27-digit fixed-point arithmetic
//!
//! A [`Ray`] is an unsigned 256-bit integer scaled by 10^27. Products and
//! quotients of two rays round half-up. Multiplying a ray by a plain integer
//! (token amounts, tick counts) uses [`Ray::mul_int`], which is exact and keeps
//! token-sized magnitudes far from the 256-bit ceiling.
//!
//! Overflow is a broken caller contract, never a recoverable condition: every
//! operation panics instead of wrapping or saturating.

use ethnum::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::num::NonZeroU128;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use crate::error::MathError;

/// 10^27
pub const RAY: U256 = U256::new(1_000_000_000_000_000_000_000_000_000);

/// Half a ray, used for half-up rounding
const HALF_RAY: U256 = U256::new(500_000_000_000_000_000_000_000_000);

/// Number of decimal places in a ray
pub const RAY_DECIMALS: u32 = 27;

type MathResult<T> = std::result::Result<T, MathError>;

/// Fixed-point number scaled by 10^27
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ray(U256);

#[cold]
#[inline(never)]
fn overflow(op: &str) -> ! {
    panic!("ray arithmetic overflow in {op}")
}

impl Ray {
    pub const ZERO: Ray = Ray(U256::ZERO);
    pub const ONE: Ray = Ray(RAY);

    /// Wrap an already-scaled value
    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    /// Underlying scaled value
    pub const fn raw(&self) -> U256 {
        self.0
    }

    /// Convert a whole number into a ray
    pub fn from_int(value: u128) -> Self {
        match U256::new(value).checked_mul(RAY) {
            Some(raw) => Self(raw),
            None => overflow("from_int"),
        }
    }

    /// `numerator / denominator` as a ray, rounded half-up
    pub fn from_ratio(numerator: u128, denominator: u128) -> MathResult<Self> {
        Self::from_int(numerator).div_int(denominator)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == U256::ZERO
    }

    /// `self * rhs`, rounded half-up
    pub fn ray_mul(self, rhs: Ray) -> Ray {
        if self.is_zero() || rhs.is_zero() {
            return Ray::ZERO;
        }
        let product = self
            .0
            .checked_mul(rhs.0)
            .and_then(|p| p.checked_add(HALF_RAY))
            .unwrap_or_else(|| overflow("ray_mul"));
        Ray(product / RAY)
    }

    /// `self / rhs`, rounded half-up
    pub fn ray_div(self, rhs: Ray) -> MathResult<Ray> {
        if rhs.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let scaled = self
            .0
            .checked_mul(RAY)
            .and_then(|s| s.checked_add(rhs.0 / 2))
            .unwrap_or_else(|| overflow("ray_div"));
        Ok(Ray(scaled / rhs.0))
    }

    /// Exact product with a whole number
    pub fn mul_int(self, rhs: u128) -> Ray {
        match self.0.checked_mul(U256::new(rhs)) {
            Some(raw) => Ray(raw),
            None => overflow("mul_int"),
        }
    }

    /// Quotient by a whole number, rounded half-up
    pub fn div_int(self, rhs: u128) -> MathResult<Ray> {
        NonZeroU128::new(rhs)
            .map(|divisor| self.div_nonzero(divisor))
            .ok_or(MathError::DivisionByZero)
    }

    /// Quotient by a non-zero whole number, rounded half-up
    pub fn div_nonzero(self, rhs: NonZeroU128) -> Ray {
        let divisor = U256::new(rhs.get());
        let numerator = self
            .0
            .checked_add(divisor / 2)
            .unwrap_or_else(|| overflow("div_int"));
        Ray(numerator / divisor)
    }

    /// Number of whole `rhs` that fit in `self` (floor)
    pub fn quotient(self, rhs: Ray) -> MathResult<u128> {
        if rhs.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        Ok(to_u128(self.0 / rhs.0, "quotient"))
    }

    /// Integer part, rounded down
    pub fn floor(self) -> u128 {
        to_u128(self.0 / RAY, "floor")
    }

    /// Integer part, rounded half-up
    pub fn round(self) -> u128 {
        let raw = self
            .0
            .checked_add(HALF_RAY)
            .unwrap_or_else(|| overflow("round"));
        to_u128(raw / RAY, "round")
    }

    /// `self - rhs`, or zero when `rhs > self`
    pub fn saturating_sub(self, rhs: Ray) -> Ray {
        Ray(self.0.saturating_sub(rhs.0))
    }

    /// Convert a non-negative decimal into a ray
    ///
    /// Decimals with 28 fractional digits lose the last one, rounded half-up.
    pub fn from_decimal(value: Decimal) -> MathResult<Ray> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MathError::NegativeDecimal);
        }
        let mantissa = value.mantissa().unsigned_abs();
        let scale = value.scale();
        if scale <= RAY_DECIMALS {
            let factor = U256::new(10).pow(RAY_DECIMALS - scale);
            U256::new(mantissa)
                .checked_mul(factor)
                .map(Ray)
                .ok_or(MathError::DecimalOutOfRange)
        } else {
            let divisor = U256::new(10).pow(scale - RAY_DECIMALS);
            Ok(Ray((U256::new(mantissa) + divisor / 2) / divisor))
        }
    }
}

fn to_u128(value: U256, op: &str) -> u128 {
    let (high, low) = value.into_words();
    if high != 0 {
        overflow(op);
    }
    low
}

impl Add for Ray {
    type Output = Ray;

    fn add(self, rhs: Ray) -> Ray {
        match self.0.checked_add(rhs.0) {
            Some(raw) => Ray(raw),
            None => overflow("add"),
        }
    }
}

impl Sub for Ray {
    type Output = Ray;

    fn sub(self, rhs: Ray) -> Ray {
        match self.0.checked_sub(rhs.0) {
            Some(raw) => Ray(raw),
            None => overflow("sub"),
        }
    }
}

impl AddAssign for Ray {
    fn add_assign(&mut self, rhs: Ray) {
        *self = *self + rhs;
    }
}

impl SubAssign for Ray {
    fn sub_assign(&mut self, rhs: Ray) {
        *self = *self - rhs;
    }
}

impl Sum for Ray {
    fn sum<I: Iterator<Item = Ray>>(iter: I) -> Ray {
        iter.fold(Ray::ZERO, |acc, r| acc + r)
    }
}

impl fmt::Display for Ray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int = self.0 / RAY;
        let frac = self.0 % RAY;
        if frac == U256::ZERO {
            return write!(f, "{int}");
        }
        let digits = format!("{:0>27}", frac.to_string());
        write!(f, "{int}.{}", digits.trim_end_matches('0'))
    }
}

impl fmt::Debug for Ray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ray({self})")
    }
}

impl FromStr for Ray {
    type Err = MathError;

    /// Parse a decimal such as `"0.75"` or `"182500"`
    fn from_str(s: &str) -> MathResult<Ray> {
        let (int, frac) = match s.split_once('.') {
            Some((int, frac)) => (int, frac),
            None => (s, ""),
        };
        if frac.len() > RAY_DECIMALS as usize
            || int.is_empty()
            || !int.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(MathError::DecimalOutOfRange);
        }
        let padded = format!("{int}{frac:0<27}");
        U256::from_str_radix(&padded, 10)
            .map(Ray)
            .map_err(|_| MathError::DecimalOutOfRange)
    }
}

// Rays travel as decimal strings; JSON numbers cannot carry 27 digits.
impl Serialize for Ray {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ray {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Ray, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn ray(s: &str) -> Ray {
        s.parse().unwrap()
    }

    #[test]
    fn test_mul_rounds_half_up() {
        // 1e-27 * 0.5 = 0.5e-27 rounds up to 1e-27
        let tiny = Ray::from_raw(U256::ONE);
        assert_eq!(tiny.ray_mul(ray("0.5")), tiny);
        // 1e-27 * 0.4 rounds down to zero
        assert_eq!(tiny.ray_mul(ray("0.4")), Ray::ZERO);
        assert_eq!(ray("1.5").ray_mul(ray("2")), ray("3"));
    }

    #[test]
    fn test_div_rounds_half_up() {
        assert_eq!(Ray::from_int(2).ray_div(Ray::from_int(3)).unwrap(), ray("0.666666666666666666666666667"));
        assert_eq!(Ray::from_int(1).ray_div(Ray::from_int(3)).unwrap(), ray("0.333333333333333333333333333"));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(Ray::ONE.ray_div(Ray::ZERO), Err(MathError::DivisionByZero));
        assert_eq!(Ray::ONE.div_int(0), Err(MathError::DivisionByZero));
        assert_eq!(Ray::ONE.quotient(Ray::ZERO), Err(MathError::DivisionByZero));
    }

    #[test]
    fn test_claim_ratio_is_exact_quarter() {
        let ratio = Ray::from_ratio(182_500, 730_000).unwrap();
        assert_eq!(ratio.raw(), U256::new(250_000_000_000_000_000_000_000_000));
    }

    #[test]
    fn test_floor_and_round() {
        assert_eq!(ray("17.5").floor(), 17);
        assert_eq!(ray("17.5").round(), 18);
        assert_eq!(ray("17.49").round(), 17);
    }

    #[test]
    fn test_quotient_floors() {
        assert_eq!(Ray::from_int(2190).quotient(Ray::from_int(3)).unwrap(), 730);
        assert_eq!(Ray::from_int(2191).quotient(Ray::from_int(3)).unwrap(), 730);
    }

    #[test]
    #[should_panic(expected = "overflow")]
    fn test_sub_underflow_panics() {
        let _ = Ray::ONE - Ray::from_int(2);
    }

    #[test]
    fn test_from_decimal() {
        assert_eq!(Ray::from_decimal(dec!(0.75)).unwrap(), ray("0.75"));
        assert_eq!(Ray::from_decimal(dec!(11)).unwrap(), Ray::from_int(11));
        assert_eq!(Ray::from_decimal(dec!(-1)), Err(MathError::NegativeDecimal));
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(ray("2.5").to_string(), "2.5");
        assert_eq!(Ray::from_int(730).to_string(), "730");
        assert_eq!(ray("0.000000000000000000000000001").to_string(), "0.000000000000000000000000001");
        assert!("1.2.3".parse::<Ray>().is_err());
        assert!("abc".parse::<Ray>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&ray("0.25")).unwrap();
        assert_eq!(json, "\"0.25\"");
        let back: Ray = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ray("0.25"));
    }

    proptest! {
        #[test]
        fn prop_mul_then_div_round_trips(value in 0u128..1_000_000_000_000_000_000_000_000_000_000u128,
                                          factor in 1_000_000_000_000_000_000_000_000_000u128..u128::MAX / 4) {
            let a = Ray::from_raw(U256::new(value));
            let b = Ray::from_raw(U256::new(factor));
            let back = a.ray_mul(b).ray_div(b).unwrap();
            let diff = if back > a { back - a } else { a - back };
            prop_assert!(diff.raw() <= U256::ONE);
        }

        #[test]
        fn prop_div_then_mul_round_trips(value in 0u128..1_000_000_000_000_000_000_000_000_000_000u128,
                                          factor in 1u128..=1_000_000_000_000_000_000_000_000_000u128) {
            let a = Ray::from_raw(U256::new(value));
            let b = Ray::from_raw(U256::new(factor));
            let back = a.ray_div(b).unwrap().ray_mul(b);
            let diff = if back > a { back - a } else { a - back };
            prop_assert!(diff.raw() <= U256::ONE);
        }

        #[test]
        fn prop_int_ratio_matches_mul_int(n in 0u128..1_000_000_000_000u128, d in 1u128..1_000_000u128) {
            let ratio = Ray::from_ratio(n * d, d).unwrap();
            prop_assert_eq!(ratio, Ray::from_int(n));
        }
    }
}
