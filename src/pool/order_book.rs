//! Order-Book Strategies (Carbon style)
//!
//! Each order is a single-sided range order `{y, z, A, B}`:
//!   y = liquidity left to sell, z = capacity at the highest rate,
//!   A, B = 48-bit floats of sqrt(highest) - sqrt(lowest) and sqrt(lowest),
//!   both scaled by ONE = 2^48.
//!
//! Created: 2026-10-18
//!
//! Notes:
//!     - Float layout: value = exponent * 2^48 | mantissa (48-bit mantissa),
//!       decoded as mantissa << exponent; wire-compatible, do not change
//!     - Trade math mirrors the controller's target/source amount formulas
//!       bit for bit, including the minFactor scaling
//!     - orders[0] sells token0, orders[1] sells token1; fee is taken
//!       from the output

use alloy::primitives::U256;
use rust_decimal::Decimal;

use super::SwapQuote;
use crate::arbitrage::allocator::{Allocation, OrderBookAllocator, SubAllocation, SubOrder};
use crate::error::{AllocationError, QuoteError};
use crate::math::{
    decimal_pow10, decimal_sqrt, decimal_to_wei, fee_from_ppm, fraction_to_decimal, mul_512,
    mul_div, mul_div_rounding_up, RateCurve, PPM,
};
use crate::types::{SourceId, Token};

/// Fixed-point scale of encoded rates and float mantissa width
pub const ONE: u64 = 1 << 48;

fn one() -> U256 {
    U256::from(ONE)
}

// ── Float and rate encoding ──────────────────────────────────────────────────

/// Pack a value into the 48-bit-mantissa float used for A and B.
/// Low bits beyond the mantissa are dropped.
pub fn encode_float(value: U256) -> Result<u64, QuoteError> {
    let exponent = (value / one()).bit_len();
    let mantissa = value >> exponent;
    let encoded = U256::from(ONE) * U256::from(exponent) | mantissa;
    if encoded > U256::from(u64::MAX) {
        return Err(QuoteError::Overflow);
    }
    Ok(encoded.to::<u64>())
}

pub fn decode_float(value: u64) -> U256 {
    U256::from(value % ONE) << (value / ONE) as usize
}

/// floor(sqrt(rate) * ONE) with the bits below the mantissa cleared
pub fn encode_rate(rate: Decimal) -> Result<U256, QuoteError> {
    let scaled = decimal_sqrt(rate)?
        .checked_mul(Decimal::from(ONE))
        .ok_or(QuoteError::Overflow)?;
    let data = decimal_to_wei(scaled, 0)?;
    let length = (data / one()).bit_len();
    Ok((data >> length) << length)
}

pub fn decode_rate(value: U256) -> Result<Decimal, QuoteError> {
    let root = fraction_to_decimal(value, one())?;
    root.checked_mul(root).ok_or(QuoteError::Overflow)
}

/// Human-readable order: liquidity plus its three rates (target per source)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedOrder {
    pub liquidity: u128,
    pub lowest_rate: Decimal,
    pub highest_rate: Decimal,
    pub marginal_rate: Decimal,
}

pub fn encode_order(decoded: &DecodedOrder) -> Result<Order, QuoteError> {
    let y = U256::from(decoded.liquidity);
    let lowest = encode_rate(decoded.lowest_rate)?;
    let highest = encode_rate(decoded.highest_rate)?;
    let marginal = encode_rate(decoded.marginal_rate)?;
    if highest < lowest || marginal < lowest || marginal > highest {
        return Err(QuoteError::InvalidRate {
            lowest: decoded.lowest_rate,
            marginal: decoded.marginal_rate,
            highest: decoded.highest_rate,
        });
    }

    let z = if highest == marginal {
        y
    } else {
        if marginal == lowest {
            return Err(QuoteError::DivisionByZero);
        }
        y * (highest - lowest) / (marginal - lowest)
    };
    if z > U256::from(u128::MAX) {
        return Err(QuoteError::Overflow);
    }

    Ok(Order {
        y: decoded.liquidity,
        z: z.to::<u128>(),
        a: encode_float(highest - lowest)?,
        b: encode_float(lowest)?,
    })
}

pub fn decode_order(order: &Order) -> Result<DecodedOrder, QuoteError> {
    let a = decode_float(order.a);
    let b = decode_float(order.b);
    let y = U256::from(order.y);
    let z = U256::from(order.z);
    let marginal = if order.y == order.z {
        b + a
    } else {
        if z.is_zero() {
            return Err(QuoteError::DivisionByZero);
        }
        b + a * y / z
    };
    Ok(DecodedOrder {
        liquidity: order.y,
        lowest_rate: decode_rate(b)?,
        highest_rate: decode_rate(b + a)?,
        marginal_rate: decode_rate(marginal)?,
    })
}

// ── Order pricing ────────────────────────────────────────────────────────────

/// Smallest factor that scales a * b back into 256 bits
fn min_factor(a: U256, b: U256) -> U256 {
    let (hi, lo) = mul_512(a, b);
    if hi > !lo {
        hi + U256::from(2u8)
    } else {
        hi + U256::from(1u8)
    }
}

fn allocation_to_quote(err: AllocationError) -> QuoteError {
    match err {
        AllocationError::Quote(inner) => inner,
        AllocationError::NoSubOrders => QuoteError::ZeroLiquidity,
        _ => QuoteError::Unsupported("unbalanced order allocation"),
    }
}

/// Result of filling one order with an input amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderFill {
    pub amount_in: U256,
    /// Output before the fee
    pub gross_out: U256,
    pub amount_out: U256,
    pub depleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Order {
    pub y: u128,
    pub z: u128,
    pub a: u64,
    pub b: u64,
}

impl Order {
    pub fn is_active(&self) -> bool {
        self.y > 0
    }

    fn terms(&self) -> Result<(U256, U256, U256), QuoteError> {
        let a = decode_float(self.a);
        let b = decode_float(self.b);
        let z = U256::from(self.z);
        let temp1 = z.checked_mul(one()).ok_or(QuoteError::Overflow)?;
        let temp2 = U256::from(self.y)
            .checked_mul(a)
            .zip(z.checked_mul(b))
            .and_then(|(ya, zb)| ya.checked_add(zb))
            .ok_or(QuoteError::Overflow)?;
        Ok((a, temp1, temp2))
    }

    fn linear_rate(&self) -> Result<(U256, U256), QuoteError> {
        let b = decode_float(self.b);
        let b2 = b.checked_mul(b).ok_or(QuoteError::Overflow)?;
        Ok((b2, one() * one()))
    }

    /// Output (before fee) for `source` input, not clamped to `y`
    pub fn target_amount(&self, source: U256) -> Result<U256, QuoteError> {
        if source.is_zero() {
            return Ok(U256::ZERO);
        }
        if self.a == 0 || decode_float(self.a).is_zero() {
            let (b2, one2) = self.linear_rate()?;
            return mul_div(source, b2, one2);
        }
        let (a, temp1, temp2) = self.terms()?;
        if temp1.is_zero() {
            return Err(QuoteError::ZeroLiquidity);
        }
        let temp3 = temp2.checked_mul(source).ok_or(QuoteError::Overflow)?;
        let factor = min_factor(temp1, temp1).max(min_factor(temp3, a));
        let temp4 = mul_div_rounding_up(temp1, temp1, factor)?;
        let temp5 = mul_div_rounding_up(temp3, a, factor)?;
        mul_div(temp2, temp3 / factor, temp4 + temp5)
    }

    /// Input needed for `target` output (before fee), rounded up
    pub fn source_amount(&self, target: U256) -> Result<U256, QuoteError> {
        if target.is_zero() {
            return Ok(U256::ZERO);
        }
        if target > U256::from(self.y) {
            let unit = U256::from(1u8);
            return Err(QuoteError::InsufficientLiquidity {
                requested: fraction_to_decimal(target, unit).unwrap_or(Decimal::MAX),
                available: fraction_to_decimal(U256::from(self.y), unit)?,
            });
        }
        if self.a == 0 || decode_float(self.a).is_zero() {
            let (b2, one2) = self.linear_rate()?;
            return mul_div_rounding_up(target, one2, b2);
        }
        let (a, temp1, temp2) = self.terms()?;
        let temp3 = target
            .checked_mul(a)
            .and_then(|xa| temp2.checked_sub(xa))
            .ok_or(QuoteError::Overflow)?;
        let factor = min_factor(temp1, temp1).max(min_factor(temp2, temp3));
        let temp4 = mul_div_rounding_up(temp1, temp1, factor)?;
        let temp5 = mul_div(temp2, temp3, factor)?;
        mul_div_rounding_up(target, temp4, temp5)
    }

    /// Input that sells the whole of `y`
    pub fn capacity_in(&self) -> Result<U256, QuoteError> {
        self.source_amount(U256::from(self.y))
    }

    /// Fill with up to `amount_in`; the input is clamped to what depletes `y`
    pub fn fill(&self, amount_in: U256, fee_ppm: u32) -> Result<OrderFill, QuoteError> {
        let capacity = self.capacity_in()?;
        let consumed = amount_in.min(capacity);
        let gross_out = self.target_amount(consumed)?.min(U256::from(self.y));
        let fee = U256::from(fee_ppm);
        let ppm = U256::from(PPM);
        Ok(OrderFill {
            amount_in: consumed,
            gross_out,
            amount_out: mul_div(gross_out, ppm - fee, ppm)?,
            depleted: consumed == capacity,
        })
    }

    /// Pricing law in decimal units, valid up to `capacity_in`.
    ///
    /// With r = (yA + zB) / (z·ONE), the current sqrt rate:
    ///   k = r² · 10^(d_in - d_out) · (1 - fee)
    ///   e = (A / ONE) · r · 10^(d_in - d_out) / z
    pub fn curve(&self, fee_ppm: u32, token_in: &Token, token_out: &Token) -> Result<RateCurve, QuoteError> {
        if !self.is_active() {
            return Err(QuoteError::ZeroLiquidity);
        }
        let keep = Decimal::ONE - fee_from_ppm(fee_ppm)?;
        let scale = decimal_pow10(i32::from(token_in.decimals) - i32::from(token_out.decimals))?;
        let a = decode_float(self.a);

        if a.is_zero() {
            let root = fraction_to_decimal(decode_float(self.b), one())?;
            return Ok(RateCurve::new(root * root * scale * keep, Decimal::ZERO));
        }

        let (_, temp1, temp2) = self.terms()?;
        if temp1.is_zero() {
            return Err(QuoteError::ZeroLiquidity);
        }
        let root = fraction_to_decimal(temp2, temp1)?;
        let width = fraction_to_decimal(a, one())?;
        let capacity = token_out.to_decimal(U256::from(self.z))?;
        let k = root
            .checked_mul(root)
            .and_then(|r2| r2.checked_mul(scale))
            .map(|v| v * keep)
            .ok_or(QuoteError::Overflow)?;
        let e = width
            .checked_mul(root)
            .and_then(|v| v.checked_mul(scale))
            .and_then(|v| v.checked_div(capacity))
            .ok_or(QuoteError::Overflow)?;
        Ok(RateCurve::new(k, e))
    }
}

/// A strategy pairs one order per direction under a single on-chain id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    pub id: U256,
    pub orders: [Order; 2],
}

/// All strategies of one token pair on an order-book venue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookSource {
    pub id: SourceId,
    pub token0: Token,
    pub token1: Token,
    pub fee_ppm: u32,
    pub strategies: Vec<Strategy>,
}

impl OrderBookSource {
    pub fn new(
        id: SourceId,
        token0: Token,
        token1: Token,
        fee_ppm: u32,
        strategies: Vec<Strategy>,
    ) -> Result<Self, QuoteError> {
        fee_from_ppm(fee_ppm)?;
        Ok(Self {
            id,
            token0,
            token1,
            fee_ppm,
            strategies,
        })
    }

    /// Index of the order that sells the output token
    pub fn order_index(zero_for_one: bool) -> usize {
        if zero_for_one {
            1
        } else {
            0
        }
    }

    pub fn sides(&self, zero_for_one: bool) -> (&Token, &Token) {
        if zero_for_one {
            (&self.token0, &self.token1)
        } else {
            (&self.token1, &self.token0)
        }
    }

    /// Orders with liquidity left in the trade direction
    pub fn active_orders(&self, zero_for_one: bool) -> Vec<SubOrder> {
        let index = Self::order_index(zero_for_one);
        self.strategies
            .iter()
            .filter(|s| s.orders[index].is_active())
            .map(|s| SubOrder {
                strategy_id: s.id,
                order: s.orders[index],
            })
            .collect()
    }

    /// Input that depletes every active order
    pub fn capacity_in(&self, zero_for_one: bool) -> Result<U256, QuoteError> {
        self.active_orders(zero_for_one)
            .iter()
            .try_fold(U256::ZERO, |acc, s| -> Result<U256, QuoteError> {
                Ok(acc + s.order.capacity_in()?)
            })
    }

    /// Split up to `amount_in` across the active orders, best marginal
    /// rate first. Input beyond total capacity is left unconsumed.
    pub fn allocate(&self, zero_for_one: bool, amount_in: U256) -> Result<Allocation, QuoteError> {
        let orders = self.active_orders(zero_for_one);
        match orders.as_slice() {
            [] => Err(QuoteError::ZeroLiquidity),
            [single] => {
                let fill = single.order.fill(amount_in, self.fee_ppm)?;
                Ok(Allocation {
                    subs: vec![SubAllocation {
                        strategy_id: single.strategy_id,
                        amount_in: fill.amount_in,
                        amount_out: fill.amount_out,
                    }],
                })
            }
            _ => {
                let capacity = self.capacity_in(zero_for_one)?;
                let usable = amount_in.min(capacity);
                let allocator = OrderBookAllocator::new(self.fee_ppm);
                let (token_in, token_out) = self.sides(zero_for_one);
                let weights = allocator
                    .quote_weights(&orders, usable, token_in, token_out)
                    .map_err(allocation_to_quote)?;
                allocator
                    .allocate(&orders, usable, &weights)
                    .map_err(allocation_to_quote)
            }
        }
    }

    pub fn quote_output(&self, zero_for_one: bool, amount_in: U256) -> Result<SwapQuote, QuoteError> {
        let allocation = self.allocate(zero_for_one, amount_in)?;
        let consumed = allocation.total_in();
        Ok(SwapQuote {
            amount_in: consumed,
            amount_out: allocation.total_out(),
            bounded: consumed < amount_in,
        })
    }

    /// Input needed for `amount_out` net of fee; single active order only
    pub fn quote_input(&self, zero_for_one: bool, amount_out: U256) -> Result<SwapQuote, QuoteError> {
        let orders = self.active_orders(zero_for_one);
        let [single] = orders.as_slice() else {
            return Err(QuoteError::Unsupported("multi-order input"));
        };
        let fee = U256::from(self.fee_ppm);
        let ppm = U256::from(PPM);
        let gross = mul_div_rounding_up(amount_out, ppm, ppm - fee)?;
        let amount_in = single.order.source_amount(gross)?;
        Ok(SwapQuote::full(amount_in, amount_out))
    }
}
