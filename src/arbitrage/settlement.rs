//! Settlement builder
//!
//! Turns a solved cycle into per-hop settlement records and maps those
//! onto the settlement contract's `Route` wire format.
//!
//! Created: 2026-10-18
//!
//! Notes:
//!     - `min_amount_out = amount_out * (10000 - slippage_bps) / 10000`, floored
//!     - When a token is the input of more than one hop, the last such hop
//!       gets `amount_in = 0`, which the contract reads as "spend the whole
//!       balance", so rounding dust from earlier hops is swept

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::{SolCall, SolValue};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::allocator::SubAllocation;
use super::cycle::Hop;
use super::engine::SolvedCycle;
use crate::config::EngineConfig;
use crate::contracts::{Flashloan, IArbitrageSettlement, Route, TradeAction};
use crate::error::{QuoteError, SolveError};
use crate::pool::LiquiditySource;
use crate::types::{canonical_token, Exchange, SourceId, SourceKind};

pub const MAX_SLIPPAGE_BPS: u32 = 10_000;

/// One resolved hop, ready for encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRecord {
    pub source_id: SourceId,
    pub kind: SourceKind,
    pub incoming_token: Address,
    pub outgoing_token: Address,
    /// Zero when this hop sweeps the full balance
    pub amount_in: U256,
    pub amount_out: U256,
    pub min_amount_out: U256,
    /// Unix seconds
    pub deadline: u64,
    /// Per-strategy split, only when several orders contribute
    pub sub_allocations: Vec<SubAllocation>,
    /// Every order-book fill of the hop, one or more
    pub trade_actions: Vec<SubAllocation>,
    pub swept: bool,
}

/// JSON view of a record, big integers as decimal strings
#[derive(Debug, Clone, Serialize)]
pub struct SettlementView {
    pub exchange: Exchange,
    pub source: Address,
    pub incoming_token: Address,
    pub outgoing_token: Address,
    pub amount_in: String,
    pub amount_out: String,
    pub min_amount_out: String,
    pub deadline: u64,
    pub sub_allocations: Vec<(String, String, String)>,
    pub swept: bool,
}

impl From<&SettlementRecord> for SettlementView {
    fn from(r: &SettlementRecord) -> Self {
        Self {
            exchange: r.source_id.exchange,
            source: r.source_id.address,
            incoming_token: r.incoming_token,
            outgoing_token: r.outgoing_token,
            amount_in: r.amount_in.to_string(),
            amount_out: r.amount_out.to_string(),
            min_amount_out: r.min_amount_out.to_string(),
            deadline: r.deadline,
            sub_allocations: r
                .sub_allocations
                .iter()
                .map(|s| (s.strategy_id.to_string(), s.amount_in.to_string(), s.amount_out.to_string()))
                .collect(),
            swept: r.swept,
        }
    }
}

pub fn min_amount_out(amount_out: U256, slippage_bps: u32) -> Result<U256, SolveError> {
    if slippage_bps > MAX_SLIPPAGE_BPS {
        return Err(SolveError::InvalidSlippage(slippage_bps));
    }
    let scale = U256::from(MAX_SLIPPAGE_BPS);
    Ok(crate::math::mul_div(amount_out, scale - U256::from(slippage_bps), scale)?)
}

/// Indices of hops whose input is swept
fn sweep_indices(solved: &SolvedCycle) -> HashSet<usize> {
    let mut last_use: HashMap<Address, (usize, usize)> = HashMap::new();
    for (i, hop) in solved.hops.iter().enumerate() {
        let token = canonical_token(hop.token_in, solved.wrapped_native);
        let entry = last_use.entry(token).or_insert((0, i));
        entry.0 += 1;
        entry.1 = i;
    }
    last_use
        .into_values()
        .filter(|(uses, _)| *uses > 1)
        .map(|(_, last)| last)
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct SettlementBuilder {
    sweep_repeated_inputs: bool,
}

impl Default for SettlementBuilder {
    fn default() -> Self {
        Self {
            sweep_repeated_inputs: true,
        }
    }
}

impl SettlementBuilder {
    pub fn new(sweep_repeated_inputs: bool) -> Self {
        Self {
            sweep_repeated_inputs,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.sweep_repeated_inputs)
    }

    pub fn build(&self, solved: &SolvedCycle, slippage_bps: u32, deadline: u64) -> Result<Vec<SettlementRecord>, SolveError> {
        let swept = if self.sweep_repeated_inputs {
            sweep_indices(solved)
        } else {
            HashSet::new()
        };

        solved
            .hops
            .iter()
            .enumerate()
            .map(|(i, hop)| {
                let sweep = swept.contains(&i);
                if sweep {
                    debug!("Hop {} sweeps full balance of {}", i, hop.token_in);
                }
                let sub_allocations = if hop.sub_allocations.len() > 1 {
                    hop.sub_allocations.clone()
                } else {
                    Vec::new()
                };
                Ok(SettlementRecord {
                    source_id: hop.source_id,
                    kind: hop.kind,
                    incoming_token: hop.token_in,
                    outgoing_token: hop.token_out,
                    amount_in: if sweep { U256::ZERO } else { hop.amount_in },
                    amount_out: hop.amount_out,
                    min_amount_out: min_amount_out(hop.amount_out, slippage_bps)?,
                    deadline,
                    sub_allocations,
                    trade_actions: hop.sub_allocations.clone(),
                    swept: sweep,
                })
            })
            .collect()
    }
}

/// Settlement records for a solved cycle, with repeated-input sweeping
pub fn build_settlement(solved: &SolvedCycle, slippage_bps: u32, deadline: u64) -> Result<Vec<SettlementRecord>, SolveError> {
    SettlementBuilder::default().build(solved, slippage_bps, deadline)
}

// ── Wire mapping ─────────────────────────────────────────────────────────────

/// Order-book payload: `(uint32 offset, uint32 count, TradeAction[])`
fn order_book_data(actions: &[SubAllocation]) -> Result<Bytes, SolveError> {
    let actions = actions
        .iter()
        .map(|a| {
            Ok(TradeAction {
                strategyId: a.strategy_id,
                amount: u128::try_from(a.amount_in).map_err(|_| QuoteError::Overflow)?,
            })
        })
        .collect::<Result<Vec<_>, SolveError>>()?;
    let count = u32::try_from(actions.len()).map_err(|_| QuoteError::Overflow)?;
    Ok((0u32, count, actions).abi_encode_params().into())
}

/// Single flag byte followed by 31 zero bytes
fn router_variant_data(flag: u8) -> Bytes {
    let mut word = [0u8; 32];
    word[0] = flag;
    Bytes::copy_from_slice(&word)
}

/// Map one record onto the contract's route struct
pub fn route_for(record: &SettlementRecord, hop: &Hop, routers: &HashMap<Exchange, Address>) -> Result<Route, SolveError> {
    let exchange = record.source_id.exchange;
    let (custom_int, custom_data) = match hop.source.as_ref() {
        LiquiditySource::ConcentratedLiquidity(pool) => {
            let data = exchange
                .router_variant()
                .map(router_variant_data)
                .unwrap_or_default();
            (U256::from(pool.fee_ppm), data)
        }
        LiquiditySource::OrderBook(_) => (U256::ZERO, order_book_data(&record.trade_actions)?),
        LiquiditySource::Weighted(pool) => (U256::ZERO, Bytes::copy_from_slice(pool.pool_id.as_slice())),
        LiquiditySource::ConstantProduct(_) => (U256::ZERO, Bytes::new()),
    };
    Ok(Route {
        platformId: exchange.platform_id(),
        sourceToken: record.incoming_token,
        targetToken: record.outgoing_token,
        sourceAmount: record.amount_in,
        minTargetAmount: record.min_amount_out,
        deadline: U256::from(record.deadline),
        customAddress: routers.get(&exchange).copied().unwrap_or(record.source_id.address),
        customInt: custom_int,
        customData: custom_data,
    })
}

pub fn routes_for(solved: &SolvedCycle, records: &[SettlementRecord], config: &EngineConfig) -> Result<Vec<Route>, SolveError> {
    records
        .iter()
        .zip(solved.cycle.hops())
        .map(|(record, hop)| route_for(record, hop, &config.routers))
        .collect()
}

/// ABI encoding of a bare route list
pub fn encode_route_list(routes: &[Route]) -> Bytes {
    routes.to_vec().abi_encode().into()
}

/// Calldata borrowing the start amount from the first hop's venue
pub fn encode_flashloan_call(solved: &SolvedCycle, routes: Vec<Route>) -> Result<Bytes, SolveError> {
    let first = solved
        .hops
        .first()
        .ok_or_else(|| SolveError::UnsupportedVariantPairing("empty cycle".to_string()))?;
    let flashloan = Flashloan {
        platformId: first.source_id.exchange.platform_id(),
        sourceTokens: vec![first.token_in],
        sourceAmounts: vec![solved.amount_in],
    };
    let call = IArbitrageSettlement::flashloanAndArbV2Call {
        flashloans: vec![flashloan],
        routes,
    };
    Ok(call.abi_encode().into())
}
