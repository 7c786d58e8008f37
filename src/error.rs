//! Engine error types
//!
//! Typed failures returned by quoting, validation and solving.
//! Expected-negative outcomes (no arbitrage, exhausted tick walks) are
//! not errors and never appear here.
//!
//! Created: 2026-10-18

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::Exchange;

/// Token continuity and route-shape defects in a candidate cycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("cycle has {0} hops, at least 3 are required")]
    TooShort(usize),

    #[error("hop {hop}: token index {index} is not part of the source")]
    TokenNotInSource { hop: usize, index: usize },

    #[error("hop {hop}: token {token} is not part of the source")]
    UnknownToken { hop: usize, token: Address },

    #[error("hop {hop}: incoming and outgoing token are the same")]
    DegenerateHop { hop: usize },

    #[error("hop {hop}: outgoing token {outgoing} does not match next incoming token {incoming}")]
    Discontinuity {
        hop: usize,
        outgoing: Address,
        incoming: Address,
    },

    #[error("cycle does not close: starts with {start}, ends with {end}")]
    NotClosed { start: Address, end: Address },

    #[error("hop {hop} on {exchange} is not an allowed base venue")]
    InvalidRouteTopology { hop: usize, exchange: Exchange },

    #[error("hop {hop}: no snapshot for {exchange}:{address}")]
    MissingSnapshot {
        hop: usize,
        exchange: Exchange,
        address: Address,
    },
}

/// Numeric and protocol-limit failures while pricing a single source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error("source has zero liquidity")]
    ZeroLiquidity,

    #[error("division by zero")]
    DivisionByZero,

    #[error("non-real square root of {0}")]
    NonRealRadicand(Decimal),

    #[error("arithmetic overflow")]
    Overflow,

    #[error("negative amount {0}")]
    NegativeAmount(Decimal),

    #[error("invalid fee {0}")]
    InvalidFee(Decimal),

    #[error("rates out of order: lowest {lowest}, marginal {marginal}, highest {highest}")]
    InvalidRate {
        lowest: Decimal,
        marginal: Decimal,
        highest: Decimal,
    },

    #[error("trade size {amount} exceeds protocol limit {limit}")]
    ExcessiveTradeSize { amount: Decimal, limit: Decimal },

    #[error("requested output {requested} exceeds available liquidity {available}")]
    InsufficientLiquidity { requested: Decimal, available: Decimal },

    #[error("token {0} is not part of the source")]
    TokenNotInSource(Address),

    #[error("tick {0} is outside the supported range")]
    TickOutOfRange(i32),

    #[error("liquidity would become negative crossing tick {0}")]
    NegativeLiquidity(i32),

    #[error("{0} quotes are not supported by this source")]
    Unsupported(&'static str),
}

/// Failures while splitting a hop across order-book sub-orders
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("no active sub-orders to allocate across")]
    NoSubOrders,

    #[error("weights length {weights} does not match {orders} sub-orders")]
    WeightMismatch { weights: usize, orders: usize },

    #[error("requested input {requested} exceeds sub-order capacity {capacity}")]
    InsufficientCapacity { requested: U256, capacity: U256 },

    #[error("allocated input {allocated} does not equal requested {requested}")]
    ConservationViolated { requested: U256, allocated: U256 },

    #[error(transparent)]
    Quote(#[from] QuoteError),
}

/// Anything that stops a cycle from being solved or settled
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    #[error("invalid cycle: {0}")]
    Sequence(#[from] SequenceError),

    #[error("quote failed: {0}")]
    Quote(#[from] QuoteError),

    #[error("allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    #[error("no solver registered for variant pattern {0}")]
    UnsupportedVariantPairing(String),

    #[error("slippage tolerance {0} bps is above 10000")]
    InvalidSlippage(u32),

    #[error("hop {hop} absorbed {consumed} of {requested}, the rest would be stranded")]
    PartialFill {
        hop: usize,
        requested: U256,
        consumed: U256,
    },
}

impl SolveError {
    /// True for failures caused by a protocol size limit rather than bad input
    pub fn is_trade_size_limit(&self) -> bool {
        matches!(
            self,
            SolveError::Quote(QuoteError::ExcessiveTradeSize { .. })
                | SolveError::Quote(QuoteError::InsufficientLiquidity { .. })
                | SolveError::Allocation(AllocationError::InsufficientCapacity { .. })
                | SolveError::PartialFill { .. }
        )
    }
}
