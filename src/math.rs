//! Fixed-point helpers
//!
//! Integer mulDiv with explicit rounding (U512 intermediates), conversions
//! between integer token units and `Decimal`, and the rational rate curve
//! `f(x) = k·x / (1 + e·x)` every solver composes.
//!
//! Created: 2026-10-18
//!
//! Notes:
//!     - Integer paths mirror contract rounding; Decimal paths carry
//!       28 significant digits and truncate beyond that
//!     - Overflow is always reported, never clamped

use alloy::primitives::{U256, U512};
use rust_decimal::prelude::*;

use crate::error::QuoteError;

// ── Constants ────────────────────────────────────────────────────────────────

/// Largest scale a `Decimal` can carry
const MAX_SCALE: u32 = 28;

/// Largest `Decimal` mantissa (2^96 - 1)
const MAX_MANTISSA: u128 = (1u128 << 96) - 1;

/// Fee denominator for parts-per-million fees
pub const PPM: u32 = 1_000_000;

/// 2^96, the fixed-point scale of sqrtPriceX96
pub fn q96() -> U256 {
    U256::from(1u8) << 96
}

// ── Integer mulDiv ───────────────────────────────────────────────────────────

fn narrow(value: U512) -> Result<U256, QuoteError> {
    let limbs = value.as_limbs();
    if limbs[4..].iter().any(|l| *l != 0) {
        return Err(QuoteError::Overflow);
    }
    Ok(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// floor(a * b / d) with a 512-bit intermediate
pub fn mul_div(a: U256, b: U256, d: U256) -> Result<U256, QuoteError> {
    if d.is_zero() {
        return Err(QuoteError::DivisionByZero);
    }
    narrow(U512::from(a) * U512::from(b) / U512::from(d))
}

/// ceil(a * b / d) with a 512-bit intermediate
pub fn mul_div_rounding_up(a: U256, b: U256, d: U256) -> Result<U256, QuoteError> {
    if d.is_zero() {
        return Err(QuoteError::DivisionByZero);
    }
    let product = U512::from(a) * U512::from(b);
    let divisor = U512::from(d);
    let mut result = product / divisor;
    if !(product % divisor).is_zero() {
        result += U512::from(1u8);
    }
    narrow(result)
}

/// ceil(a / b)
pub fn div_rounding_up(a: U256, b: U256) -> Result<U256, QuoteError> {
    if b.is_zero() {
        return Err(QuoteError::DivisionByZero);
    }
    let q = a / b;
    Ok(if (a % b).is_zero() { q } else { q + U256::from(1u8) })
}

/// High and low 256-bit words of a * b
pub fn mul_512(a: U256, b: U256) -> (U256, U256) {
    let product = U512::from(a) * U512::from(b);
    let hi = product >> 256;
    let lo = product - (hi << 256);
    // both halves fit by construction
    let hi = narrow(hi).unwrap_or(U256::MAX);
    let lo = narrow(lo).unwrap_or(U256::MAX);
    (hi, lo)
}

pub fn pow10(exp: u32) -> Result<U256, QuoteError> {
    U256::from(10u8)
        .checked_pow(U256::from(exp))
        .ok_or(QuoteError::Overflow)
}

// ── Decimal conversions ──────────────────────────────────────────────────────

fn decimal_from_parts(mantissa: U256, scale: u32) -> Result<Decimal, QuoteError> {
    if mantissa > U256::from(MAX_MANTISSA) {
        return Err(QuoteError::Overflow);
    }
    Decimal::try_from_i128_with_scale(mantissa.to::<u128>() as i128, scale)
        .map_err(|_| QuoteError::Overflow)
}

/// Integer token amount to decimal units (`amount / 10^decimals`).
///
/// Exact while the value fits 28 significant digits, truncated below that.
pub fn wei_to_decimal(amount: U256, decimals: u8) -> Result<Decimal, QuoteError> {
    let ten = U256::from(10u8);
    let max = U256::from(MAX_MANTISSA);
    let mut value = amount;
    let mut scale = u32::from(decimals);
    while scale > MAX_SCALE || value > max {
        if scale == 0 {
            return Err(QuoteError::Overflow);
        }
        value /= ten;
        scale -= 1;
    }
    decimal_from_parts(value, scale)
}

/// Decimal units to integer token amount, rounding down
pub fn decimal_to_wei(amount: Decimal, decimals: u8) -> Result<U256, QuoteError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(QuoteError::NegativeAmount(amount));
    }
    let mantissa = U256::from(amount.mantissa().unsigned_abs());
    let numerator = pow10(u32::from(decimals))?;
    let denominator = pow10(amount.scale())?;
    mul_div(mantissa, numerator, denominator)
}

/// num / den as a Decimal, keeping as many fractional digits as fit
pub fn fraction_to_decimal(num: U256, den: U256) -> Result<Decimal, QuoteError> {
    if den.is_zero() {
        return Err(QuoteError::DivisionByZero);
    }
    let max = U512::from(U256::from(MAX_MANTISSA));
    let mut scale = MAX_SCALE;
    loop {
        let scaled = U512::from(num) * U512::from(pow10(scale)?) / U512::from(den);
        if scaled <= max {
            return decimal_from_parts(narrow(scaled)?, scale);
        }
        if scale == 0 {
            return Err(QuoteError::Overflow);
        }
        scale -= 1;
    }
}

/// Q64.96 fixed-point value as a Decimal
pub fn q96_to_decimal(value: U256) -> Result<Decimal, QuoteError> {
    fraction_to_decimal(value, q96())
}

/// 10^exp as a Decimal, for exponents a Decimal can hold
pub fn decimal_pow10(exp: i32) -> Result<Decimal, QuoteError> {
    if exp.unsigned_abs() > MAX_SCALE {
        return Err(QuoteError::Overflow);
    }
    if exp >= 0 {
        Decimal::try_from_i128_with_scale(10i128.pow(exp as u32), 0)
    } else {
        Decimal::try_from_i128_with_scale(1, exp.unsigned_abs())
    }
    .map_err(|_| QuoteError::Overflow)
}

pub fn decimal_sqrt(value: Decimal) -> Result<Decimal, QuoteError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(QuoteError::NonRealRadicand(value));
    }
    value.sqrt().ok_or(QuoteError::Overflow)
}

/// Validate a fractional fee in [0, 1)
pub fn check_fee(fee: Decimal) -> Result<Decimal, QuoteError> {
    if fee.is_sign_negative() || fee >= Decimal::ONE {
        return Err(QuoteError::InvalidFee(fee));
    }
    Ok(fee)
}

/// PPM fee (e.g. 3000 = 0.3%) as a fraction
pub fn fee_from_ppm(ppm: u32) -> Result<Decimal, QuoteError> {
    check_fee(Decimal::from(ppm) / Decimal::from(PPM))
}

// ── Rate curves ──────────────────────────────────────────────────────────────

/// Output-given-input law of the form `f(x) = k·x / (1 + e·x)`.
///
/// Constant-product pools, a concentrated-liquidity range and a single
/// order-book order all price this way, and the family is closed under
/// composition, so a whole cycle collapses to one curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCurve {
    /// Marginal rate at zero size
    pub k: Decimal,
    /// Price-impact coefficient
    pub e: Decimal,
}

impl RateCurve {
    pub fn new(k: Decimal, e: Decimal) -> Self {
        Self { k, e }
    }

    pub fn identity() -> Self {
        Self::new(Decimal::ONE, Decimal::ZERO)
    }

    /// Curve of `next(self(x))`
    pub fn then(&self, next: &RateCurve) -> Result<RateCurve, QuoteError> {
        let k = next.k.checked_mul(self.k).ok_or(QuoteError::Overflow)?;
        let e = self
            .k
            .checked_mul(next.e)
            .and_then(|ke| self.e.checked_add(ke))
            .ok_or(QuoteError::Overflow)?;
        Ok(RateCurve { k, e })
    }

    pub fn apply(&self, x: Decimal) -> Result<Decimal, QuoteError> {
        let denom = self
            .e
            .checked_mul(x)
            .and_then(|ex| ex.checked_add(Decimal::ONE))
            .ok_or(QuoteError::Overflow)?;
        if denom <= Decimal::ZERO {
            return Err(QuoteError::DivisionByZero);
        }
        self.k
            .checked_mul(x)
            .and_then(|kx| kx.checked_div(denom))
            .ok_or(QuoteError::Overflow)
    }

    /// Input that produces `y`; fails past the curve's asymptote `k / e`
    pub fn inverse(&self, y: Decimal) -> Result<Decimal, QuoteError> {
        let denom = self
            .e
            .checked_mul(y)
            .and_then(|ey| self.k.checked_sub(ey))
            .ok_or(QuoteError::Overflow)?;
        if denom <= Decimal::ZERO {
            let available = if self.e.is_zero() {
                Decimal::MAX
            } else {
                self.k / self.e
            };
            return Err(QuoteError::InsufficientLiquidity {
                requested: y,
                available,
            });
        }
        y.checked_div(denom).ok_or(QuoteError::Overflow)
    }

    /// Input maximising `f(x) - x`: `x* = (√k − 1) / e`.
    ///
    /// `None` when the loop is not profitable at the margin (`k ≤ 1`) or the
    /// curve has no price impact to bound the optimum (`e ≤ 0`).
    pub fn optimal_input(&self) -> Result<Option<Decimal>, QuoteError> {
        if self.k <= Decimal::ONE || self.e <= Decimal::ZERO {
            return Ok(None);
        }
        let root = decimal_sqrt(self.k)?;
        let x = (root - Decimal::ONE)
            .checked_div(self.e)
            .ok_or(QuoteError::Overflow)?;
        Ok((x > Decimal::ZERO).then_some(x))
    }

    /// Derivative `k / (1 + e·x)^2`
    pub fn marginal_rate(&self, x: Decimal) -> Result<Decimal, QuoteError> {
        let denom = self
            .e
            .checked_mul(x)
            .and_then(|ex| ex.checked_add(Decimal::ONE))
            .ok_or(QuoteError::Overflow)?;
        let square = denom.checked_mul(denom).ok_or(QuoteError::Overflow)?;
        if square.is_zero() {
            return Err(QuoteError::DivisionByZero);
        }
        self.k.checked_div(square).ok_or(QuoteError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_mul_div_rounding() {
        let a = U256::from(10u64);
        let b = U256::from(10u64);
        let d = U256::from(3u64);
        assert_eq!(mul_div(a, b, d).unwrap(), U256::from(33u64));
        assert_eq!(mul_div_rounding_up(a, b, d).unwrap(), U256::from(34u64));
        assert_eq!(mul_div(a, b, U256::from(4u64)).unwrap(), U256::from(25u64));
        assert_eq!(mul_div_rounding_up(a, b, U256::from(4u64)).unwrap(), U256::from(25u64));
        assert_eq!(mul_div(a, b, U256::ZERO), Err(QuoteError::DivisionByZero));
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // (2^255 * 4) / 8 does not fit 256 bits in the middle but the result does
        let big = U256::from(1u8) << 255;
        assert_eq!(
            mul_div(big, U256::from(4u8), U256::from(8u8)).unwrap(),
            U256::from(1u8) << 254
        );
        assert_eq!(mul_div(U256::MAX, U256::MAX, U256::from(1u8)), Err(QuoteError::Overflow));
    }

    #[test]
    fn test_mul_512_halves() {
        let (hi, lo) = mul_512(U256::MAX, U256::from(2u8));
        assert_eq!(hi, U256::from(1u8));
        assert_eq!(lo, U256::MAX - U256::from(1u8));
    }

    #[test]
    fn test_wei_to_decimal_exact_and_truncated() {
        let one_eth = U256::from(10u64).pow(U256::from(18));
        assert_eq!(wei_to_decimal(one_eth, 18).unwrap(), Decimal::ONE);
        assert_eq!(wei_to_decimal(U256::from(1u64), 18).unwrap(), dec!(0.000000000000000001));

        // 10^40 wei at 18 decimals = 10^22 tokens, digits below 28 significant are dropped
        let huge = U256::from(10u64).pow(U256::from(40)) + U256::from(7u64);
        assert_eq!(wei_to_decimal(huge, 18).unwrap(), dec!(10000000000000000000000));
    }

    #[test]
    fn test_decimal_to_wei_floors() {
        assert_eq!(decimal_to_wei(dec!(1.5), 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(decimal_to_wei(dec!(0.0000015), 6).unwrap(), U256::from(1u64));
        assert!(matches!(
            decimal_to_wei(dec!(-1), 6),
            Err(QuoteError::NegativeAmount(_))
        ));
    }

    #[test]
    fn test_q96_to_decimal() {
        assert_eq!(q96_to_decimal(q96()).unwrap(), Decimal::ONE);
        assert_eq!(q96_to_decimal(q96() * U256::from(3u8)).unwrap(), dec!(3));
        assert_eq!(q96_to_decimal(q96() >> 1).unwrap(), dec!(0.5));
    }

    #[test]
    fn test_fee_validation() {
        assert_eq!(fee_from_ppm(3000).unwrap(), dec!(0.003));
        assert!(check_fee(dec!(1)).is_err());
        assert!(check_fee(dec!(-0.01)).is_err());
        assert_eq!(check_fee(Decimal::ZERO).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_sqrt_rejects_negative() {
        assert!((decimal_sqrt(dec!(4)).unwrap() - dec!(2)).abs() < dec!(0.000000000001));
        assert!(matches!(decimal_sqrt(dec!(-4)), Err(QuoteError::NonRealRadicand(_))));
    }

    #[test]
    fn test_curve_composition_matches_sequential_application() {
        let f = RateCurve::new(dec!(2), dec!(0.001));
        let g = RateCurve::new(dec!(0.75), dec!(0.0004));
        let fg = f.then(&g).unwrap();
        let x = dec!(37.5);
        let sequential = g.apply(f.apply(x).unwrap()).unwrap();
        let composed = fg.apply(x).unwrap();
        assert!((sequential - composed).abs() < dec!(0.000000000001));
    }

    #[test]
    fn test_curve_inverse() {
        let f = RateCurve::new(dec!(2), dec!(0.001));
        let y = f.apply(dec!(100)).unwrap();
        let x = f.inverse(y).unwrap();
        assert!((x - dec!(100)).abs() < dec!(0.000000000001));
        assert!(f.inverse(dec!(2000)).is_err());
    }

    #[test]
    fn test_optimal_input_is_stationary() {
        let curve = RateCurve::new(dec!(1.21), dec!(0.002));
        let x = curve.optimal_input().unwrap().unwrap();
        // (sqrt(1.21) - 1) / 0.002 = 50
        assert!((x - dec!(50)).abs() < dec!(0.000001));
        let slope = curve.marginal_rate(x).unwrap();
        assert!((slope - Decimal::ONE).abs() < dec!(0.0000001));

        assert_eq!(RateCurve::new(dec!(0.99), dec!(0.002)).optimal_input().unwrap(), None);
        assert_eq!(RateCurve::new(dec!(1.5), Decimal::ZERO).optimal_input().unwrap(), None);
    }

    #[test]
    fn test_marginal_rate_reports_overflow() {
        let curve = RateCurve::new(dec!(2), Decimal::MAX);
        assert_eq!(curve.marginal_rate(dec!(10)), Err(QuoteError::Overflow));
        let steep = RateCurve::new(dec!(2), dec!(1000000000000000));
        assert_eq!(steep.marginal_rate(dec!(1000000000000000)), Err(QuoteError::Overflow));
        assert_eq!(RateCurve::new(dec!(2), dec!(1)).marginal_rate(dec!(1)).unwrap(), dec!(0.5));
    }
}
