//! Weighted Pool (Balancer V2 style)
//!
//!   amount_out = balance_out * (1 - (balance_in / (balance_in + in_net))^(w_in / w_out))
//!   in_net     = amount_in * (1 - fee)
//!
//! Created: 2026-10-18
//!
//! Notes:
//!     - Trades whose net input exceeds 30% of balance_in, or whose output
//!       exceeds 30% of balance_out, are rejected like the vault does
//!     - Only weight ratios matter; weights need not sum to one

use alloy::primitives::{B256, U256};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

use super::SwapQuote;
use crate::error::QuoteError;
use crate::math::check_fee;
use crate::types::{SourceId, Token};

/// Maximum in/out ratio accepted by the vault
pub const MAX_RATIO: Decimal = dec!(0.3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedPool {
    pub id: SourceId,
    /// Vault pool id, passed through to settlement
    pub pool_id: B256,
    pub tokens: Vec<Token>,
    pub weights: Vec<Decimal>,
    pub fee: Decimal,
}

/// Two tokens of a weighted pool seen from one trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedPair {
    pub balance_in: Decimal,
    pub weight_in: Decimal,
    pub balance_out: Decimal,
    pub weight_out: Decimal,
    pub fee: Decimal,
}

impl WeightedPool {
    pub fn new(
        id: SourceId,
        pool_id: B256,
        tokens: Vec<Token>,
        weights: Vec<Decimal>,
        fee: Decimal,
    ) -> Result<Self, QuoteError> {
        check_fee(fee)?;
        if tokens.len() < 2 || tokens.len() != weights.len() {
            return Err(QuoteError::ZeroLiquidity);
        }
        if weights.iter().any(|w| *w <= Decimal::ZERO) {
            return Err(QuoteError::DivisionByZero);
        }
        Ok(Self {
            id,
            pool_id,
            tokens,
            weights,
            fee,
        })
    }

    pub fn pair(&self, index_in: usize, index_out: usize) -> Result<WeightedPair, QuoteError> {
        let tin = self.tokens.get(index_in).ok_or(QuoteError::ZeroLiquidity)?;
        let tout = self.tokens.get(index_out).ok_or(QuoteError::ZeroLiquidity)?;
        let pair = WeightedPair {
            balance_in: tin.balance_decimal()?,
            weight_in: self.weights[index_in],
            balance_out: tout.balance_decimal()?,
            weight_out: self.weights[index_out],
            fee: self.fee,
        };
        if pair.balance_in.is_zero() || pair.balance_out.is_zero() {
            return Err(QuoteError::ZeroLiquidity);
        }
        Ok(pair)
    }

    pub fn quote_output(&self, index_in: usize, index_out: usize, amount_in: U256) -> Result<SwapQuote, QuoteError> {
        let pair = self.pair(index_in, index_out)?;
        let tin = &self.tokens[index_in];
        let tout = &self.tokens[index_out];
        let out = pair.calc_out_given_in(tin.to_decimal(amount_in)?)?;
        Ok(SwapQuote::full(amount_in, tout.to_wei(out)?))
    }

    pub fn quote_input(&self, index_in: usize, index_out: usize, amount_out: U256) -> Result<SwapQuote, QuoteError> {
        let pair = self.pair(index_in, index_out)?;
        let tin = &self.tokens[index_in];
        let tout = &self.tokens[index_out];
        let amount_in = pair.calc_in_given_out(tout.to_decimal(amount_out)?)?;
        // round up so the input always covers the requested output
        let mut wei = tin.to_wei(amount_in)?;
        if tin.to_decimal(wei)? < amount_in {
            wei += U256::from(1u8);
        }
        Ok(SwapQuote::full(wei, amount_out))
    }
}

impl WeightedPair {
    fn keep(&self) -> Decimal {
        Decimal::ONE - self.fee
    }

    /// Largest gross input the vault accepts
    pub fn max_in(&self) -> Decimal {
        self.balance_in * MAX_RATIO / self.keep()
    }

    pub fn calc_out_given_in(&self, amount_in: Decimal) -> Result<Decimal, QuoteError> {
        if amount_in.is_sign_negative() {
            return Err(QuoteError::NegativeAmount(amount_in));
        }
        let in_net = amount_in * self.keep();
        let in_limit = self.balance_in * MAX_RATIO;
        if in_net > in_limit {
            return Err(QuoteError::ExcessiveTradeSize {
                amount: in_net,
                limit: in_limit,
            });
        }

        let base = self.balance_in / (self.balance_in + in_net);
        let exponent = self.weight_in / self.weight_out;
        let power = base.checked_powd(exponent).ok_or(QuoteError::Overflow)?;
        let out = self.balance_out * (Decimal::ONE - power);

        let out_limit = self.balance_out * MAX_RATIO;
        if out > out_limit {
            return Err(QuoteError::ExcessiveTradeSize {
                amount: out,
                limit: out_limit,
            });
        }
        Ok(out.max(Decimal::ZERO))
    }

    pub fn calc_in_given_out(&self, amount_out: Decimal) -> Result<Decimal, QuoteError> {
        let out_limit = self.balance_out * MAX_RATIO;
        if amount_out > out_limit {
            return Err(QuoteError::ExcessiveTradeSize {
                amount: amount_out,
                limit: out_limit,
            });
        }
        let base = self.balance_out / (self.balance_out - amount_out);
        let exponent = self.weight_out / self.weight_in;
        let power = base.checked_powd(exponent).ok_or(QuoteError::Overflow)?;
        let in_net = self.balance_in * (power - Decimal::ONE);

        let in_limit = self.balance_in * MAX_RATIO;
        if in_net > in_limit {
            return Err(QuoteError::ExcessiveTradeSize {
                amount: in_net,
                limit: in_limit,
            });
        }
        Ok(in_net / self.keep())
    }
}
