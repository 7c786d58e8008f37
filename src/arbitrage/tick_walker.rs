//! Tick walker
//!
//! Continues a concentrated-liquidity trade across range boundaries.
//! Every crossing builds a new pool copy from the adjacent tick's net
//! liquidity; the caller's snapshot is never touched.
//!
//! Created: 2026-10-18

use alloy::primitives::{Address, U256};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::QuoteError;
use crate::pool::ConcentratedPool;

/// Net liquidity delta of initialised ticks, supplied by the state layer
pub trait TickLiquidityLookup: Send + Sync {
    /// `None` when the tick is not initialised (treated as zero)
    fn net_liquidity(&self, pool: Address, tick: i32) -> Option<i128>;
}

/// In-memory tick table keyed by `(pool, tick)`
#[derive(Debug, Clone, Default)]
pub struct TickTable {
    entries: HashMap<(Address, i32), i128>,
}

impl TickTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pool: Address, tick: i32, net_liquidity: i128) {
        self.entries.insert((pool, tick), net_liquidity);
    }

    pub fn with(mut self, pool: Address, tick: i32, net_liquidity: i128) -> Self {
        self.insert(pool, tick, net_liquidity);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TickLiquidityLookup for TickTable {
    fn net_liquidity(&self, pool: Address, tick: i32) -> Option<i128> {
        self.entries.get(&(pool, tick)).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkStatus {
    /// Filled inside the starting range
    InRange,
    /// Filled after one or more crossings
    Crossed,
    /// Crossing limit (or the tick domain edge) reached; partial fill
    Exhausted,
}

/// Part of a walk that happened inside one range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeFill {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    /// Gross input, fee included
    pub amount_in: U256,
    pub amount_out: U256,
}

#[derive(Debug, Clone)]
pub struct WalkResult {
    pub amount_in: U256,
    pub amount_out: U256,
    pub status: WalkStatus,
    pub crossings: usize,
    pub fills: Vec<RangeFill>,
    /// Pool state after the walk
    pub state: ConcentratedPool,
}

pub struct TickWalker<'a> {
    lookup: &'a dyn TickLiquidityLookup,
    max_crossings: usize,
}

impl<'a> TickWalker<'a> {
    pub fn new(lookup: &'a dyn TickLiquidityLookup, max_crossings: usize) -> Self {
        Self {
            lookup,
            max_crossings,
        }
    }

    pub fn max_crossings(&self) -> usize {
        self.max_crossings
    }

    /// Move `pool` across the boundary of its current range
    pub fn cross(&self, pool: &ConcentratedPool, zero_for_one: bool) -> Result<ConcentratedPool, QuoteError> {
        let tick = pool.crossing_tick(zero_for_one);
        let net = self.lookup.net_liquidity(pool.id.address, tick).unwrap_or(0);
        let next = pool.crossed(zero_for_one, net)?;
        debug!(
            "Crossed tick {} on {}: liquidity {} -> {}",
            tick, pool.id, pool.liquidity, next.liquidity
        );
        Ok(next)
    }

    /// Exact-input quote that keeps crossing ranges until the input is
    /// used up, the crossing limit is hit, or the tick domain ends
    pub fn walk(&self, pool: &ConcentratedPool, zero_for_one: bool, amount_in: U256) -> Result<WalkResult, QuoteError> {
        let mut state = pool.clone();
        let mut remaining = amount_in;
        let mut amount_out = U256::ZERO;
        let mut crossings = 0usize;
        let mut fills = Vec::new();

        let status = loop {
            if state.liquidity > 0 {
                let step = state.step(zero_for_one, remaining)?;
                let consumed = step.consumed().min(remaining);
                let (tick_lower, tick_upper) = state.range_bounds();
                fills.push(RangeFill {
                    tick_lower,
                    tick_upper,
                    liquidity: state.liquidity,
                    amount_in: consumed,
                    amount_out: step.amount_out,
                });
                remaining -= consumed;
                amount_out += step.amount_out;
                if !step.reached_target || remaining.is_zero() {
                    break if crossings == 0 {
                        WalkStatus::InRange
                    } else {
                        WalkStatus::Crossed
                    };
                }
            }
            if crossings >= self.max_crossings {
                warn!(
                    "Tick walk on {} exhausted after {} crossings, {} input left",
                    pool.id, crossings, remaining
                );
                break WalkStatus::Exhausted;
            }
            state = match self.cross(&state, zero_for_one) {
                Ok(next) => next,
                Err(QuoteError::TickOutOfRange(tick)) => {
                    warn!("Tick walk on {} reached domain edge at {}", pool.id, tick);
                    break WalkStatus::Exhausted;
                }
                Err(e) => return Err(e),
            };
            crossings += 1;
        };

        Ok(WalkResult {
            amount_in: amount_in - remaining,
            amount_out,
            status,
            crossings,
            fills,
            state,
        })
    }
}
