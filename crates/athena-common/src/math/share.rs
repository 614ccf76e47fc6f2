//! Pro-rata shares of token amounts
//!
//! `value * numerator / denominator` evaluated in 256 bits so the product of
//! two token amounts never overflows.

use ethnum::U256;
use std::num::NonZeroU128;

/// `value * numerator / denominator`, rounded up
pub fn mul_div_ceil(value: u128, numerator: u128, denominator: NonZeroU128) -> u128 {
    let product = U256::new(value) * U256::new(numerator);
    let divisor = U256::new(denominator.get());
    let mut quotient = product / divisor;
    if product % divisor != U256::ZERO {
        quotient += U256::ONE;
    }
    u128::try_from(quotient).unwrap_or_else(|_| panic!("share {quotient} does not fit in u128"))
}
