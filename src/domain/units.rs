//! Conversions between raw token units and human amounts.

use alloy::primitives::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

const BPS_DENOMINATOR: u64 = 10_000;

/// Convert a raw token amount into whole-token units.
///
/// Exact while the value fits the 96-bit decimal mantissa, f64 precision beyond that.
pub fn to_decimal_units(raw: U256, decimals: u8) -> Decimal {
    if raw.is_zero() {
        return Decimal::ZERO;
    }
    let scale = u32::from(decimals);
    if scale <= 28 {
        if let Ok(value) = u128::try_from(raw) {
            if let Ok(signed) = i128::try_from(value) {
                if let Ok(exact) = Decimal::try_from_i128_with_scale(signed, scale) {
                    return exact;
                }
            }
        }
    }
    let approx = f64::from(raw) / 10f64.powi(i32::from(decimals));
    Decimal::from_f64_retain(approx).unwrap_or(Decimal::MAX)
}

/// Convert a fraction (0.025 = 2.5%) to basis points, rounding down.
pub fn fraction_to_bps(fraction: Decimal) -> u64 {
    (fraction * Decimal::from(BPS_DENOMINATOR))
        .floor()
        .to_u64()
        .unwrap_or(0)
        .min(BPS_DENOMINATOR)
}

/// Minimum acceptable output for a quoted amount under a slippage fraction.
///
/// Never exceeds `quoted`.
pub fn apply_slippage(quoted: U256, slippage: Decimal) -> U256 {
    let bps = fraction_to_bps(slippage.max(Decimal::ZERO));
    let keep = U256::from(BPS_DENOMINATOR - bps);
    let denominator = U256::from(BPS_DENOMINATOR);
    match quoted.checked_mul(keep) {
        Some(scaled) => scaled / denominator,
        None => quoted / denominator * keep,
    }
}
