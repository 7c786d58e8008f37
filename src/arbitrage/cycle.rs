//! Cycles and hop continuity
//!
//! A cycle is an ordered list of hops over liquidity-source snapshots that
//! starts and ends in the same token. Cycles are built fresh for every
//! evaluation and never mutated afterwards.
//!
//! Created: 2026-10-18

use alloy::primitives::Address;
use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::SequenceError;
use crate::pool::LiquiditySource;
use crate::types::{canonical_token, Exchange, SourceKind, Token};

/// Minimum hops in a cycle
pub const MIN_CYCLE_LEN: usize = 3;

/// A candidate leg as supplied by the cycle finder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleLeg {
    pub exchange: Exchange,
    pub pool: Address,
    pub token_in: Address,
    pub token_out: Address,
}

impl CycleLeg {
    pub fn new(exchange: Exchange, pool: Address, token_in: Address, token_out: Address) -> Self {
        Self {
            exchange,
            pool,
            token_in,
            token_out,
        }
    }
}

/// One trade through one source, identified by token indices in that source
#[derive(Debug, Clone)]
pub struct Hop {
    pub source: Arc<LiquiditySource>,
    pub token_in: usize,
    pub token_out: usize,
}

impl Hop {
    pub fn new(source: Arc<LiquiditySource>, token_in: usize, token_out: usize) -> Self {
        Self {
            source,
            token_in,
            token_out,
        }
    }

    /// Resolve token addresses to indices (native and wrapped match)
    pub fn from_addresses(
        hop: usize,
        source: Arc<LiquiditySource>,
        token_in: Address,
        token_out: Address,
        wrapped_native: Address,
    ) -> Result<Self, SequenceError> {
        let index_in = source
            .token_index(token_in, wrapped_native)
            .ok_or(SequenceError::UnknownToken { hop, token: token_in })?;
        let index_out = source
            .token_index(token_out, wrapped_native)
            .ok_or(SequenceError::UnknownToken { hop, token: token_out })?;
        Ok(Self::new(source, index_in, index_out))
    }

    pub fn incoming(&self) -> Option<&Token> {
        self.source.token(self.token_in)
    }

    pub fn outgoing(&self) -> Option<&Token> {
        self.source.token(self.token_out)
    }

    /// For two-token sources: token0 is the incoming token
    pub fn zero_for_one(&self) -> bool {
        self.token_in == 0
    }

    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn exchange(&self) -> Exchange {
        self.source.id().exchange
    }
}

#[derive(Debug, Clone)]
pub struct Cycle {
    hops: Vec<Hop>,
}

impl Cycle {
    pub fn new(hops: Vec<Hop>) -> Self {
        Self { hops }
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Token the cycle borrows and repays
    pub fn start_token(&self) -> Option<&Token> {
        self.hops.first().and_then(Hop::incoming)
    }

    /// Variant of every hop, in order
    pub fn pattern(&self) -> Vec<SourceKind> {
        self.hops.iter().map(Hop::kind).collect()
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let legs: Vec<String> = self
            .hops
            .iter()
            .map(|h| {
                let symbol = h.incoming().map(|t| t.symbol.as_str()).unwrap_or("?");
                format!("{}@{}", symbol, h.exchange())
            })
            .collect();
        write!(f, "{}", legs.join(" -> "))
    }
}

/// Check length, token continuity, closure and the base-venue rule.
///
/// Tokens are compared by canonical address, never by symbol.
pub fn validate(cycle: &Cycle, config: &EngineConfig) -> Result<(), SequenceError> {
    let hops = cycle.hops();
    if hops.len() < MIN_CYCLE_LEN {
        return Err(SequenceError::TooShort(hops.len()));
    }
    let canonical = |t: &Token| canonical_token(t.address, config.wrapped_native);

    let mut ends = Vec::with_capacity(hops.len());
    for (i, hop) in hops.iter().enumerate() {
        let incoming = hop
            .incoming()
            .ok_or(SequenceError::TokenNotInSource { hop: i, index: hop.token_in })?;
        let outgoing = hop
            .outgoing()
            .ok_or(SequenceError::TokenNotInSource { hop: i, index: hop.token_out })?;
        if hop.token_in == hop.token_out || canonical(incoming) == canonical(outgoing) {
            return Err(SequenceError::DegenerateHop { hop: i });
        }
        ends.push((canonical(incoming), canonical(outgoing)));
    }

    for i in 0..ends.len() - 1 {
        let (_, outgoing) = ends[i];
        let (incoming, _) = ends[i + 1];
        if outgoing != incoming {
            return Err(SequenceError::Discontinuity {
                hop: i,
                outgoing,
                incoming,
            });
        }
    }

    let (start, _) = ends[0];
    let (_, end) = ends[ends.len() - 1];
    if start != end {
        return Err(SequenceError::NotClosed { start, end });
    }

    let last = hops.len() - 1;
    for i in [0, last] {
        let exchange = hops[i].exchange();
        if !config.is_base_venue(exchange) {
            return Err(SequenceError::InvalidRouteTopology { hop: i, exchange });
        }
    }
    Ok(())
}
