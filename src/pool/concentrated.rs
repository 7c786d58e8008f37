//! Concentrated-Liquidity Pool (Uniswap V3 style)
//!
//! Purpose:
//!     Exact within-range swap math on sqrtPriceX96 plus the range
//!     bookkeeping the tick walker needs to step across boundaries.
//!
//! Created: 2026-02-01
//! Modified: 2026-10-18 - Full TickMath, computeSwapStep, range crossing
//!
//! Notes:
//!     - Fees are PPM (3000 = 0.30%) and taken from the input
//!     - A quote never leaves the current range; `bounded` on the result
//!       tells the caller the remainder needs a tick walk
//!     - Every multiple of tick_spacing is treated as a potential boundary
//!
//! References:
//!     - Uniswap V3 TickMath.sol: getSqrtRatioAtTick
//!     - Uniswap V3 SqrtPriceMath.sol: getNextSqrtPriceFromInput, getAmount0/1Delta
//!     - Uniswap V3 SwapMath.sol: computeSwapStep

use alloy::primitives::U256;
use rust_decimal::Decimal;

use super::SwapQuote;
use crate::error::QuoteError;
use crate::math::{
    div_rounding_up, fee_from_ppm, mul_div, mul_div_rounding_up, q96, q96_to_decimal,
    decimal_pow10, RateCurve, PPM,
};
use crate::types::{SourceId, Token};

// ── Constants ────────────────────────────────────────────────────────────────

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;

/// 2^128 / sqrt(1.0001)^(2^i) for i = 1..19, Q128
const TICK_RATIOS: [u128; 19] = [
    0xfff97272373d413259a46990580e213a,
    0xfff2e50f5f656932ef12357cf3c7fdcc,
    0xffe5caca7e10e4e61c3624eaa0941cd0,
    0xffcb9843d60f6159c9db58835c926644,
    0xff973b41fa98c081472e6896dfb254c0,
    0xff2ea16466c96a3843ec78b326b52861,
    0xfe5dee046a99a2a811c461f1969c3053,
    0xfcbe86c7900a88aedcffc83b479aa3a4,
    0xf987a7253ac413176f2b074cf7815e54,
    0xf3392b0822b70005940c7a398e4b70f3,
    0xe7159475a2c29b7443b29c7fa6e889d9,
    0xd097f3bdfd2022b8845ad8f792aa5825,
    0xa9f746462d870fdf8a65dc1f90e061e5,
    0x70d869a156d2a1b890bb3df62baf32f7,
    0x31be135f97d08fd981231505542fcfa6,
    0x9aa508b5b7a84e1c677de54f3e99bc9,
    0x5d6af8dedb81196699c329225ee604,
    0x2216e584f5fa1ea926041bedfe98,
    0x48a170391f7dc42444e8fa2,
];

/// Tick spacing used by the standard fee tiers
pub fn tick_spacing_for_fee(fee_ppm: u32) -> i32 {
    match fee_ppm {
        100 => 1,
        500 => 10,
        2500 => 50,
        3000 => 60,
        10000 => 200,
        _ => 1,
    }
}

// ── TickMath / SqrtPriceMath ─────────────────────────────────────────────────

/// sqrt(1.0001^tick) * 2^96, rounded up like the contract
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Result<U256, QuoteError> {
    let abs_tick = tick.unsigned_abs();
    if abs_tick > MAX_TICK as u32 {
        return Err(QuoteError::TickOutOfRange(tick));
    }

    let mut ratio = if abs_tick & 0x1 != 0 {
        U256::from(0xfffcb933bd6fad37aa2d162d1a594001u128)
    } else {
        U256::from(1u8) << 128
    };
    for (i, factor) in TICK_RATIOS.iter().enumerate() {
        if abs_tick & (1u32 << (i + 1)) != 0 {
            ratio = (ratio * U256::from(*factor)) >> 128;
        }
    }
    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128 -> Q96, rounding up
    let low_mask: U256 = (U256::from(1u8) << 32) - U256::from(1u8);
    let round = if (ratio & low_mask).is_zero() { 0u8 } else { 1u8 };
    Ok((ratio >> 32) + U256::from(round))
}

/// Token0 between two prices: L * 2^96 * (b - a) / (a * b)
pub fn get_amount0_delta(
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, QuoteError> {
    let (lower, upper) = if sqrt_a > sqrt_b {
        (sqrt_b, sqrt_a)
    } else {
        (sqrt_a, sqrt_b)
    };
    if lower.is_zero() {
        return Err(QuoteError::DivisionByZero);
    }
    let numerator1 = U256::from(liquidity) << 96;
    let numerator2 = upper - lower;
    if round_up {
        div_rounding_up(mul_div_rounding_up(numerator1, numerator2, upper)?, lower)
    } else {
        Ok(mul_div(numerator1, numerator2, upper)? / lower)
    }
}

/// Token1 between two prices: L * (b - a) / 2^96
pub fn get_amount1_delta(
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, QuoteError> {
    let diff = if sqrt_a > sqrt_b {
        sqrt_a - sqrt_b
    } else {
        sqrt_b - sqrt_a
    };
    if round_up {
        mul_div_rounding_up(U256::from(liquidity), diff, q96())
    } else {
        mul_div(U256::from(liquidity), diff, q96())
    }
}

/// getNextSqrtPriceFromAmount0RoundingUp (adding token0, price falls)
///
/// Primary: ceil(L·2^96 · sqrtP / (L·2^96 + amount·sqrtP))
/// Fallback when amount·sqrtP overflows: ceil(L·2^96 / (L·2^96 / sqrtP + amount))
pub fn next_sqrt_price_from_amount0(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
) -> Result<U256, QuoteError> {
    if amount.is_zero() {
        return Ok(sqrt_price_x96);
    }
    if sqrt_price_x96.is_zero() {
        return Err(QuoteError::DivisionByZero);
    }
    let numerator1: U256 = U256::from(liquidity) << 96;

    if let Some(product) = amount.checked_mul(sqrt_price_x96) {
        if let Some(denominator) = numerator1.checked_add(product) {
            return mul_div_rounding_up(numerator1, sqrt_price_x96, denominator);
        }
    }

    let denominator = (numerator1 / sqrt_price_x96)
        .checked_add(amount)
        .ok_or(QuoteError::Overflow)?;
    div_rounding_up(numerator1, denominator)
}

/// getNextSqrtPriceFromAmount1RoundingDown (adding token1, price rises)
pub fn next_sqrt_price_from_amount1(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
) -> Result<U256, QuoteError> {
    if liquidity == 0 {
        return Err(QuoteError::ZeroLiquidity);
    }
    let quotient = mul_div(amount, q96(), U256::from(liquidity))?;
    sqrt_price_x96
        .checked_add(quotient)
        .ok_or(QuoteError::Overflow)
}

/// Outcome of one exact-input swap step toward a target price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    pub sqrt_price_next: U256,
    /// Input net of fee
    pub amount_in: U256,
    pub fee_amount: U256,
    pub amount_out: U256,
    pub reached_target: bool,
}

impl SwapStep {
    /// Gross input consumed, fee included
    pub fn consumed(&self) -> U256 {
        self.amount_in + self.fee_amount
    }
}

/// computeSwapStep for exact input
pub fn compute_swap_step(
    sqrt_current: U256,
    sqrt_target: U256,
    liquidity: u128,
    amount_remaining: U256,
    fee_ppm: u32,
) -> Result<SwapStep, QuoteError> {
    if fee_ppm >= PPM {
        return Err(QuoteError::InvalidFee(Decimal::from(fee_ppm) / Decimal::from(PPM)));
    }
    let zero_for_one = sqrt_current >= sqrt_target;
    let fee = U256::from(fee_ppm);
    let ppm = U256::from(PPM);

    let remaining_less_fee = mul_div(amount_remaining, ppm - fee, ppm)?;
    let max_in = if zero_for_one {
        get_amount0_delta(sqrt_target, sqrt_current, liquidity, true)?
    } else {
        get_amount1_delta(sqrt_current, sqrt_target, liquidity, true)?
    };

    let sqrt_next = if remaining_less_fee >= max_in {
        sqrt_target
    } else if zero_for_one {
        next_sqrt_price_from_amount0(sqrt_current, liquidity, remaining_less_fee)?
    } else {
        next_sqrt_price_from_amount1(sqrt_current, liquidity, remaining_less_fee)?
    };
    let reached_target = sqrt_next == sqrt_target;

    let (amount_in, amount_out) = if zero_for_one {
        let amount_in = if reached_target {
            max_in
        } else {
            get_amount0_delta(sqrt_next, sqrt_current, liquidity, true)?
        };
        (amount_in, get_amount1_delta(sqrt_next, sqrt_current, liquidity, false)?)
    } else {
        let amount_in = if reached_target {
            max_in
        } else {
            get_amount1_delta(sqrt_current, sqrt_next, liquidity, true)?
        };
        (amount_in, get_amount0_delta(sqrt_current, sqrt_next, liquidity, false)?)
    };

    let fee_amount = if reached_target {
        mul_div_rounding_up(amount_in, fee, ppm - fee)?
    } else {
        amount_remaining - amount_in
    };

    Ok(SwapStep {
        sqrt_price_next: sqrt_next,
        amount_in,
        fee_amount,
        amount_out,
        reached_target,
    })
}

// ── Pool snapshot ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcentratedPool {
    pub id: SourceId,
    pub token0: Token,
    pub token1: Token,
    pub fee_ppm: u32,
    pub liquidity: u128,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub tick_spacing: i32,
}

impl ConcentratedPool {
    /// Build a snapshot, checking the price lies inside the tick's range
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: SourceId,
        token0: Token,
        token1: Token,
        fee_ppm: u32,
        liquidity: u128,
        sqrt_price_x96: U256,
        tick: i32,
        tick_spacing: i32,
    ) -> Result<Self, QuoteError> {
        fee_from_ppm(fee_ppm)?;
        if tick_spacing <= 0 || !(MIN_TICK..=MAX_TICK).contains(&tick) {
            return Err(QuoteError::TickOutOfRange(tick));
        }
        let pool = Self {
            id,
            token0,
            token1,
            fee_ppm,
            liquidity,
            sqrt_price_x96,
            tick,
            tick_spacing,
        };
        let (lower, upper) = pool.range_bounds();
        let lo = get_sqrt_ratio_at_tick(lower.max(MIN_TICK))?;
        let hi = get_sqrt_ratio_at_tick(upper.min(MAX_TICK))?;
        if sqrt_price_x96 < lo || sqrt_price_x96 > hi {
            return Err(QuoteError::TickOutOfRange(tick));
        }
        Ok(pool)
    }

    pub fn fee(&self) -> Result<Decimal, QuoteError> {
        fee_from_ppm(self.fee_ppm)
    }

    /// `[lower, upper)` of the range holding the current tick
    pub fn range_bounds(&self) -> (i32, i32) {
        let lower = self.tick.div_euclid(self.tick_spacing) * self.tick_spacing;
        (lower, lower + self.tick_spacing)
    }

    /// Tick whose liquidity delta applies when leaving the range
    pub fn crossing_tick(&self, zero_for_one: bool) -> i32 {
        let (lower, upper) = self.range_bounds();
        if zero_for_one {
            lower
        } else {
            upper
        }
    }

    /// sqrtPriceX96 of the range boundary in the trade direction
    pub fn boundary_sqrt_price(&self, zero_for_one: bool) -> Result<U256, QuoteError> {
        get_sqrt_ratio_at_tick(self.crossing_tick(zero_for_one).clamp(MIN_TICK, MAX_TICK))
    }

    /// One swap step bounded by the current range
    pub fn step(&self, zero_for_one: bool, amount_in: U256) -> Result<SwapStep, QuoteError> {
        compute_swap_step(
            self.sqrt_price_x96,
            self.boundary_sqrt_price(zero_for_one)?,
            self.liquidity,
            amount_in,
            self.fee_ppm,
        )
    }

    /// Range-bounded quote: returns the boundary maximum when the request
    /// would push the price out of the current range
    pub fn quote_output(&self, zero_for_one: bool, amount_in: U256) -> Result<SwapQuote, QuoteError> {
        let step = self.step(zero_for_one, amount_in)?;
        let consumed = step.consumed();
        Ok(SwapQuote {
            amount_in: consumed,
            amount_out: step.amount_out,
            bounded: step.reached_target && consumed < amount_in,
        })
    }

    /// Gross input (fee included) that moves the price to the range boundary
    pub fn max_input(&self, zero_for_one: bool) -> Result<U256, QuoteError> {
        let target = self.boundary_sqrt_price(zero_for_one)?;
        let net = if zero_for_one {
            get_amount0_delta(target, self.sqrt_price_x96, self.liquidity, true)?
        } else {
            get_amount1_delta(self.sqrt_price_x96, target, self.liquidity, true)?
        };
        let fee = U256::from(self.fee_ppm);
        Ok(net + mul_div_rounding_up(net, fee, U256::from(PPM) - fee)?)
    }

    /// Output released by moving the price to the range boundary
    pub fn max_output(&self, zero_for_one: bool) -> Result<U256, QuoteError> {
        let target = self.boundary_sqrt_price(zero_for_one)?;
        if zero_for_one {
            get_amount1_delta(target, self.sqrt_price_x96, self.liquidity, false)
        } else {
            get_amount0_delta(self.sqrt_price_x96, target, self.liquidity, false)
        }
    }

    /// Copy of the pool moved into the adjacent range.
    ///
    /// Moving down subtracts the lower tick's net liquidity and leaves the
    /// tick one below the boundary; moving up adds the upper tick's.
    pub fn crossed(&self, zero_for_one: bool, net_liquidity: i128) -> Result<Self, QuoteError> {
        let (lower, upper) = self.range_bounds();
        let boundary = if zero_for_one { lower } else { upper };
        if boundary <= MIN_TICK || boundary >= MAX_TICK {
            return Err(QuoteError::TickOutOfRange(boundary));
        }
        let delta = if zero_for_one { -net_liquidity } else { net_liquidity };
        let liquidity = i128::try_from(self.liquidity)
            .ok()
            .and_then(|l| l.checked_add(delta))
            .filter(|l| *l >= 0)
            .ok_or(QuoteError::NegativeLiquidity(boundary))?;

        let mut next = self.clone();
        next.liquidity = liquidity as u128;
        next.sqrt_price_x96 = get_sqrt_ratio_at_tick(boundary)?;
        next.tick = if zero_for_one { boundary - 1 } else { boundary };
        Ok(next)
    }

    /// Virtual reserves of the current range in decimal units:
    /// (L / sqrtP, L * sqrtP)
    pub fn virtual_reserves(&self) -> Result<(Decimal, Decimal), QuoteError> {
        if self.liquidity == 0 {
            return Err(QuoteError::ZeroLiquidity);
        }
        let l = U256::from(self.liquidity);
        let reserve0 = mul_div(l, q96(), self.sqrt_price_x96)?;
        let reserve1 = mul_div(l, self.sqrt_price_x96, q96())?;
        Ok((
            self.token0.to_decimal(reserve0)?,
            self.token1.to_decimal(reserve1)?,
        ))
    }

    /// In-range pricing law as a rate curve, fee on input.
    ///
    /// token0 in: k = R1(1-f)/R0, e = (1-f)/R0
    /// token1 in: k = R0(1-f)/R1, e = (1-f)/R1
    pub fn curve(&self, zero_for_one: bool) -> Result<RateCurve, QuoteError> {
        let (reserve0, reserve1) = self.virtual_reserves()?;
        let keep = Decimal::ONE - self.fee()?;
        let curve = if zero_for_one {
            RateCurve::new(reserve1 * keep / reserve0, keep / reserve0)
        } else {
            RateCurve::new(reserve0 * keep / reserve1, keep / reserve1)
        };
        Ok(curve)
    }

    /// Spot price of token0 in token1, decimal adjusted
    pub fn price(&self) -> Result<Decimal, QuoteError> {
        let ratio = q96_to_decimal(self.sqrt_price_x96)?;
        let scale = decimal_pow10(i32::from(self.token0.decimals) - i32::from(self.token1.decimals))?;
        ratio
            .checked_mul(ratio)
            .and_then(|p| p.checked_mul(scale))
            .ok_or(QuoteError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Exchange;
    use alloy::primitives::Address;
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn pool_at_tick(tick: i32, liquidity: u128, spacing: i32) -> ConcentratedPool {
        ConcentratedPool::new(
            SourceId::new(Exchange::UniswapV3, Address::repeat_byte(0x33)),
            Token::new("T0", Address::repeat_byte(0x10), 18),
            Token::new("T1", Address::repeat_byte(0x11), 18),
            3000,
            liquidity,
            get_sqrt_ratio_at_tick(tick).unwrap(),
            tick,
            spacing,
        )
        .unwrap()
    }

    #[test]
    fn test_sqrt_ratio_known_values() {
        assert_eq!(get_sqrt_ratio_at_tick(0).unwrap(), q96());
        assert_eq!(
            get_sqrt_ratio_at_tick(MIN_TICK).unwrap(),
            U256::from(4295128739u64)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(MAX_TICK).unwrap(),
            U256::from_str("1461446703485210103287273052203988822378723970342").unwrap()
        );
        assert!(get_sqrt_ratio_at_tick(MAX_TICK + 1).is_err());
    }

    #[test]
    fn test_sqrt_ratio_monotonic_and_close_to_float() {
        let mut prev = get_sqrt_ratio_at_tick(-5000).unwrap();
        for tick in (-4990..=5000).step_by(10) {
            let ratio = get_sqrt_ratio_at_tick(tick).unwrap();
            assert!(ratio > prev, "ratio not increasing at tick {}", tick);
            prev = ratio;
        }
        for tick in [-2000, -60, 1, 60, 1000, 4000] {
            let exact = q96_to_decimal(get_sqrt_ratio_at_tick(tick).unwrap())
                .unwrap()
                .to_f64()
                .unwrap();
            let approx = 1.0001_f64.powf(tick as f64 / 2.0);
            assert!((exact - approx).abs() / approx < 1e-9, "tick {}", tick);
        }
    }

    #[test]
    fn test_amount_deltas_rounding() {
        let a = get_sqrt_ratio_at_tick(-60).unwrap();
        let b = get_sqrt_ratio_at_tick(60).unwrap();
        let l = 1_000_000_000_000_000_000u128;
        let up0 = get_amount0_delta(a, b, l, true).unwrap();
        let down0 = get_amount0_delta(a, b, l, false).unwrap();
        assert!(up0 - down0 <= U256::from(1u8));
        let up1 = get_amount1_delta(b, a, l, true).unwrap();
        let down1 = get_amount1_delta(a, b, l, false).unwrap();
        assert!(up1 - down1 <= U256::from(1u8));
        // symmetric range around price 1 holds roughly equal amounts
        let diff = if up0 > up1 { up0 - up1 } else { up1 - up0 };
        assert!(diff < up0 / U256::from(1000u64));
    }

    #[test]
    fn test_fee_application() {
        // fee 500 (0.05%) on 1,000,000 input
        let amount = U256::from(1_000_000u64);
        let after_fee = mul_div(amount, U256::from(PPM - 500), U256::from(PPM)).unwrap();
        assert_eq!(after_fee, U256::from(999_500u64));
    }

    #[test]
    fn test_swap_step_stays_in_range() {
        let pool = pool_at_tick(30, 10u128.pow(24), 60);
        let amount = U256::from(10u64).pow(U256::from(18));
        let step = pool.step(true, amount).unwrap();
        assert!(!step.reached_target);
        assert_eq!(step.consumed(), amount);
        assert!(step.sqrt_price_next < pool.sqrt_price_x96);
        assert!(step.amount_out > U256::ZERO);

        let quote = pool.quote_output(true, amount).unwrap();
        assert!(!quote.bounded);
        assert_eq!(quote.amount_out, step.amount_out);
    }

    #[test]
    fn test_swap_step_stops_at_boundary() {
        let pool = pool_at_tick(30, 10u128.pow(20), 60);
        let max_in = pool.max_input(false).unwrap();
        let quote = pool.quote_output(false, max_in * U256::from(3u8)).unwrap();
        assert!(quote.bounded);
        assert_eq!(quote.amount_in, max_in);
        assert_eq!(quote.amount_out, pool.max_output(false).unwrap());
    }

    #[test]
    fn test_range_bounds_negative_ticks() {
        let pool = pool_at_tick(-1, 10u128.pow(20), 60);
        assert_eq!(pool.range_bounds(), (-60, 0));
        assert_eq!(pool.crossing_tick(true), -60);
        assert_eq!(pool.crossing_tick(false), 0);
    }

    #[test]
    fn test_crossed_updates_liquidity_and_tick() {
        let pool = pool_at_tick(30, 5_000, 60);
        let down = pool.crossed(true, 2_000).unwrap();
        assert_eq!(down.liquidity, 3_000);
        assert_eq!(down.tick, -1);
        assert_eq!(down.sqrt_price_x96, q96());
        assert_eq!(down.range_bounds(), (-60, 0));

        let up = pool.crossed(false, 2_000).unwrap();
        assert_eq!(up.liquidity, 7_000);
        assert_eq!(up.tick, 60);

        assert_eq!(pool.crossed(true, 6_000), Err(QuoteError::NegativeLiquidity(0)));
        // caller's snapshot untouched
        assert_eq!(pool.liquidity, 5_000);
    }

    #[test]
    fn test_tick_outside_price_range_rejected() {
        let result = ConcentratedPool::new(
            SourceId::new(Exchange::UniswapV3, Address::ZERO),
            Token::new("T0", Address::repeat_byte(0x10), 18),
            Token::new("T1", Address::repeat_byte(0x11), 18),
            3000,
            1,
            get_sqrt_ratio_at_tick(500).unwrap(),
            0,
            60,
        );
        assert_eq!(result, Err(QuoteError::TickOutOfRange(0)));
    }

    #[test]
    fn test_curve_matches_exact_step() {
        // mid-range, so neither direction starts on a boundary
        let pool = pool_at_tick(150, 10u128.pow(24), 60);
        for zero_for_one in [true, false] {
            let curve = pool.curve(zero_for_one).unwrap();
            let amount = U256::from(10u64).pow(U256::from(18));
            let exact = pool.quote_output(zero_for_one, amount).unwrap().amount_out;
            let token_out = if zero_for_one { &pool.token1 } else { &pool.token0 };
            let exact = token_out.to_decimal(exact).unwrap();
            let predicted = curve.apply(dec!(1)).unwrap();
            assert!((predicted - exact).abs() < dec!(0.000000001), "{} vs {}", predicted, exact);
        }
    }

    #[test]
    fn test_on_lower_boundary_no_room_downward() {
        let pool = pool_at_tick(120, 10u128.pow(24), 60);
        let amount = U256::from(10u64).pow(U256::from(18));
        assert_eq!(pool.max_input(true).unwrap(), U256::ZERO);
        let quote = pool.quote_output(true, amount).unwrap();
        assert_eq!(quote.amount_out, U256::ZERO);
        assert!(pool.max_input(false).unwrap() > U256::ZERO);
        assert!(pool.quote_output(false, amount).unwrap().amount_out > U256::ZERO);
    }

    #[test]
    fn test_price_at_tick_zero() {
        let pool = pool_at_tick(0, 1, 1);
        assert_eq!(pool.price().unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_tick_spacing() {
        assert_eq!(tick_spacing_for_fee(100), 1);
        assert_eq!(tick_spacing_for_fee(500), 10);
        assert_eq!(tick_spacing_for_fee(3000), 60);
        assert_eq!(tick_spacing_for_fee(10000), 200);
    }
}
