//! Constant-Product Pool (x * y = k)
//!
//! Fee is taken on the output side:
//!   amount_out = amount_in * balance_out * (1 - fee) / (amount_in + balance_in)
//!
//! Created: 2026-10-18
//!
//! Notes:
//!     - Integer quotes use the exact rational form of the Decimal fee
//!       (mantissa / 10^scale), so no precision is lost at the boundary
//!     - `OrientedReserves` is a read-only directional view; pools are
//!       never mutated to "reverse" tokens

use alloy::primitives::{U256, U512};
use rust_decimal::Decimal;

use super::SwapQuote;
use crate::error::QuoteError;
use crate::math::{check_fee, pow10, RateCurve};
use crate::types::{SourceId, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantProductPool {
    pub id: SourceId,
    pub token0: Token,
    pub token1: Token,
    /// Fraction in [0, 1)
    pub fee: Decimal,
}

impl ConstantProductPool {
    pub fn new(id: SourceId, token0: Token, token1: Token, fee: Decimal) -> Result<Self, QuoteError> {
        check_fee(fee)?;
        Ok(Self {
            id,
            token0,
            token1,
            fee,
        })
    }

    /// Spot price of token0 in token1 (decimal units)
    pub fn price(&self) -> Result<Decimal, QuoteError> {
        let b0 = self.token0.balance_decimal()?;
        if b0.is_zero() {
            return Err(QuoteError::ZeroLiquidity);
        }
        Ok(self.token1.balance_decimal()? / b0)
    }

    fn sides(&self, zero_for_one: bool) -> (&Token, &Token) {
        if zero_for_one {
            (&self.token0, &self.token1)
        } else {
            (&self.token1, &self.token0)
        }
    }

    /// Decimal-unit view for one trade direction
    pub fn oriented(&self, zero_for_one: bool) -> Result<OrientedReserves, QuoteError> {
        let (tin, tout) = self.sides(zero_for_one);
        OrientedReserves::new(tin.balance_decimal()?, tout.balance_decimal()?, self.fee)
    }

    /// (1 - fee) as an exact integer fraction
    fn fee_factor(&self) -> Result<(U256, U256), QuoteError> {
        let keep = Decimal::ONE - self.fee;
        Ok((
            U256::from(keep.mantissa().unsigned_abs()),
            pow10(keep.scale())?,
        ))
    }

    /// Exact integer output for `amount_in`, rounded down
    pub fn quote_output(&self, zero_for_one: bool, amount_in: U256) -> Result<SwapQuote, QuoteError> {
        let (tin, tout) = self.sides(zero_for_one);
        if tin.balance.is_zero() || tout.balance.is_zero() {
            return Err(QuoteError::ZeroLiquidity);
        }
        let (keep_num, keep_den) = self.fee_factor()?;
        let numerator = U512::from(amount_in) * U512::from(tout.balance) * U512::from(keep_num);
        let denominator = (U512::from(amount_in) + U512::from(tin.balance)) * U512::from(keep_den);
        let out = numerator / denominator;
        Ok(SwapQuote::full(amount_in, U256::from_limbs_slice(&out.as_limbs()[..4])))
    }

    /// Exact integer input needed for `amount_out`, rounded up
    pub fn quote_input(&self, zero_for_one: bool, amount_out: U256) -> Result<SwapQuote, QuoteError> {
        let (tin, tout) = self.sides(zero_for_one);
        if tin.balance.is_zero() || tout.balance.is_zero() {
            return Err(QuoteError::ZeroLiquidity);
        }
        let (keep_num, keep_den) = self.fee_factor()?;
        let capacity = U512::from(tout.balance) * U512::from(keep_num);
        let wanted = U512::from(amount_out) * U512::from(keep_den);
        if wanted >= capacity {
            return Err(QuoteError::InsufficientLiquidity {
                requested: tout.to_decimal(amount_out)?,
                available: tout.balance_decimal()? * (Decimal::ONE - self.fee),
            });
        }
        let numerator = U512::from(amount_out) * U512::from(tin.balance) * U512::from(keep_den);
        let denominator = capacity - wanted;
        let mut amount_in = numerator / denominator;
        if !(numerator % denominator).is_zero() {
            amount_in += U512::from(1u8);
        }
        let limbs = amount_in.as_limbs();
        if limbs[4..].iter().any(|l| *l != 0) {
            return Err(QuoteError::Overflow);
        }
        Ok(SwapQuote::full(U256::from_limbs_slice(&limbs[..4]), amount_out))
    }
}

/// Directional reserves of a constant-product pool in decimal units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientedReserves {
    pub balance_in: Decimal,
    pub balance_out: Decimal,
    pub fee: Decimal,
}

impl OrientedReserves {
    pub fn new(balance_in: Decimal, balance_out: Decimal, fee: Decimal) -> Result<Self, QuoteError> {
        check_fee(fee)?;
        if balance_in <= Decimal::ZERO || balance_out <= Decimal::ZERO {
            return Err(QuoteError::ZeroLiquidity);
        }
        Ok(Self {
            balance_in,
            balance_out,
            fee,
        })
    }

    /// Output before the fee is deducted
    fn gross_out(&self, amount_in: Decimal) -> Result<Decimal, QuoteError> {
        amount_in
            .checked_mul(self.balance_out)
            .and_then(|n| n.checked_div(amount_in + self.balance_in))
            .ok_or(QuoteError::Overflow)
    }

    pub fn amount_out(&self, amount_in: Decimal) -> Result<Decimal, QuoteError> {
        if amount_in.is_sign_negative() {
            return Err(QuoteError::NegativeAmount(amount_in));
        }
        Ok(self.gross_out(amount_in)? * (Decimal::ONE - self.fee))
    }

    /// Input that yields exactly `amount_out`
    pub fn amount_in_for(&self, amount_out: Decimal) -> Result<Decimal, QuoteError> {
        let capacity = self.balance_out * (Decimal::ONE - self.fee);
        if amount_out >= capacity {
            return Err(QuoteError::InsufficientLiquidity {
                requested: amount_out,
                available: capacity,
            });
        }
        amount_out
            .checked_mul(self.balance_in)
            .and_then(|n| n.checked_div(capacity - amount_out))
            .ok_or(QuoteError::Overflow)
    }

    /// View after `amount_in` has been traded.
    ///
    /// The pre-fee output leaves the curve, so quoting `a` on the original
    /// view and then `b` on the advanced view equals quoting `a + b` once.
    pub fn advanced(&self, amount_in: Decimal) -> Result<Self, QuoteError> {
        let gross = self.gross_out(amount_in)?;
        Self::new(self.balance_in + amount_in, self.balance_out - gross, self.fee)
    }

    pub fn curve(&self) -> RateCurve {
        RateCurve::new(
            (Decimal::ONE - self.fee) * self.balance_out / self.balance_in,
            Decimal::ONE / self.balance_in,
        )
    }
}
