//! LiquiditySource: one enum over all pricing laws
//!
//! Snapshots are built once and never mutated; anything that needs a
//! moved state (tick crossing, partial fills) works on a copy.
//!
//! Created: 2026-10-18

use alloy::primitives::{Address, U256};

use super::{ConcentratedPool, ConstantProductPool, OrderBookSource, SwapQuote, WeightedPool};
use crate::error::QuoteError;
use crate::types::{canonical_token, SourceId, SourceKind, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiquiditySource {
    ConstantProduct(ConstantProductPool),
    ConcentratedLiquidity(ConcentratedPool),
    OrderBook(OrderBookSource),
    Weighted(WeightedPool),
}

impl LiquiditySource {
    pub fn kind(&self) -> SourceKind {
        match self {
            LiquiditySource::ConstantProduct(_) => SourceKind::ConstantProduct,
            LiquiditySource::ConcentratedLiquidity(_) => SourceKind::ConcentratedLiquidity,
            LiquiditySource::OrderBook(_) => SourceKind::OrderBook,
            LiquiditySource::Weighted(_) => SourceKind::Weighted,
        }
    }

    pub fn id(&self) -> SourceId {
        match self {
            LiquiditySource::ConstantProduct(p) => p.id,
            LiquiditySource::ConcentratedLiquidity(p) => p.id,
            LiquiditySource::OrderBook(p) => p.id,
            LiquiditySource::Weighted(p) => p.id,
        }
    }

    pub fn tokens(&self) -> Vec<&Token> {
        match self {
            LiquiditySource::ConstantProduct(p) => vec![&p.token0, &p.token1],
            LiquiditySource::ConcentratedLiquidity(p) => vec![&p.token0, &p.token1],
            LiquiditySource::OrderBook(p) => vec![&p.token0, &p.token1],
            LiquiditySource::Weighted(p) => p.tokens.iter().collect(),
        }
    }

    pub fn token(&self, index: usize) -> Option<&Token> {
        self.tokens().get(index).copied()
    }

    /// Index of `address`, comparing canonical (wrapped) forms
    pub fn token_index(&self, address: Address, wrapped_native: Address) -> Option<usize> {
        let wanted = canonical_token(address, wrapped_native);
        self.tokens()
            .iter()
            .position(|t| canonical_token(t.address, wrapped_native) == wanted)
    }

    /// Direction flag for two-token sources
    fn zero_for_one(&self, index_in: usize, index_out: usize) -> Result<bool, QuoteError> {
        match (index_in, index_out) {
            (0, 1) => Ok(true),
            (1, 0) => Ok(false),
            _ => {
                let missing = if index_in > 1 { index_in } else { index_out };
                Err(QuoteError::TokenNotInSource(
                    self.token(missing).map(|t| t.address).unwrap_or(Address::ZERO),
                ))
            }
        }
    }

    /// Exact output for `amount_in` of token `index_in`, in integer units.
    ///
    /// Concentrated-liquidity quotes stop at the current range boundary
    /// (`bounded = true`); the tick walker continues from there.
    pub fn quote_output(&self, index_in: usize, index_out: usize, amount_in: U256) -> Result<SwapQuote, QuoteError> {
        match self {
            LiquiditySource::ConstantProduct(p) => {
                p.quote_output(self.zero_for_one(index_in, index_out)?, amount_in)
            }
            LiquiditySource::ConcentratedLiquidity(p) => {
                p.quote_output(self.zero_for_one(index_in, index_out)?, amount_in)
            }
            LiquiditySource::OrderBook(p) => {
                p.quote_output(self.zero_for_one(index_in, index_out)?, amount_in)
            }
            LiquiditySource::Weighted(p) => {
                if index_in == index_out || index_in >= p.tokens.len() || index_out >= p.tokens.len() {
                    return Err(QuoteError::TokenNotInSource(Address::ZERO));
                }
                p.quote_output(index_in, index_out, amount_in)
            }
        }
    }

    /// Exact input needed for `amount_out`, where the source supports it
    pub fn quote_input(&self, index_in: usize, index_out: usize, amount_out: U256) -> Result<SwapQuote, QuoteError> {
        match self {
            LiquiditySource::ConstantProduct(p) => {
                p.quote_input(self.zero_for_one(index_in, index_out)?, amount_out)
            }
            LiquiditySource::ConcentratedLiquidity(_) => Err(QuoteError::Unsupported("exact-output")),
            LiquiditySource::OrderBook(p) => {
                p.quote_input(self.zero_for_one(index_in, index_out)?, amount_out)
            }
            LiquiditySource::Weighted(p) => {
                if index_in == index_out || index_in >= p.tokens.len() || index_out >= p.tokens.len() {
                    return Err(QuoteError::TokenNotInSource(Address::ZERO));
                }
                p.quote_input(index_in, index_out, amount_out)
            }
        }
    }

    /// Address-keyed convenience over `quote_output`
    pub fn quote_output_by_address(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        wrapped_native: Address,
    ) -> Result<SwapQuote, QuoteError> {
        let index_in = self
            .token_index(token_in, wrapped_native)
            .ok_or(QuoteError::TokenNotInSource(token_in))?;
        let index_out = self
            .token_index(token_out, wrapped_native)
            .ok_or(QuoteError::TokenNotInSource(token_out))?;
        self.quote_output(index_in, index_out, amount_in)
    }
}
