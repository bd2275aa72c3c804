//! Reserve Arithmetic
//!
//! Integer-only helpers used by aggregation, planning and execution.
//! The "degrade to zero" policy lives here instead of in raw underflow or
//! division-by-zero behavior:
//! - `saturating_sub`: floor at zero
//! - `div_or_zero`: zero divisor gives zero
//! - `scale_to_decimals`: decimal normalization to the common fixed-point scale
//! - `get_amount_out`: constant-product quote (x * y = k, 0.3% fee)

use alloy::primitives::U256;

/// a - b, floored at zero
pub fn saturating_sub(a: U256, b: U256) -> U256 {
    a.saturating_sub(b)
}

/// a / b (truncating), or zero when b is zero
pub fn div_or_zero(a: U256, b: U256) -> U256 {
    a.checked_div(b).unwrap_or(U256::ZERO)
}

/// Rescale `amount` from `from_decimals` to `to_decimals`.
/// Scaling up multiplies by 10^(to - from); scaling down truncates.
pub fn scale_to_decimals(amount: U256, from_decimals: u8, to_decimals: u8) -> U256 {
    if from_decimals == to_decimals || amount.is_zero() {
        return amount;
    }

    if from_decimals < to_decimals {
        let factor = U256::from(10u64).pow(U256::from(to_decimals - from_decimals));
        amount.saturating_mul(factor)
    } else {
        let factor = U256::from(10u64).pow(U256::from(from_decimals - to_decimals));
        amount / factor
    }
}

/// Calculate amount out for a given input using constant product formula
/// Includes 0.3% fee (997/1000)
///
/// Formula: amount_out = (amount_in * 997 * reserve_out) / (reserve_in * 1000 + amount_in * 997)
pub fn get_amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256) -> U256 {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return U256::ZERO;
    }

    let amount_in_with_fee = amount_in.saturating_mul(U256::from(997));
    let numerator = amount_in_with_fee.saturating_mul(reserve_out);
    let denominator = reserve_in
        .saturating_mul(U256::from(1000))
        .saturating_add(amount_in_with_fee);

    numerator / denominator
}
