//! Arbitrage engine
//!
//! Validates a cycle, sizes it with the matching hop solver, re-quotes
//! every hop exactly in wei and applies the profit floor. Pure with
//! respect to its inputs, so independent cycles solve in parallel.
//!
//! Created: 2026-10-18

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::allocator::SubAllocation;
use super::cycle::{validate, Cycle};
use super::solver::{pattern_name, simulate, simulate_within_capacity, SolveContext, SolverRegistry};
use super::tick_walker::{TickLiquidityLookup, WalkStatus};
use crate::config::EngineConfig;
use crate::error::{SequenceError, SolveError};
use crate::types::{SourceId, SourceKind, Token};

/// Exact fill of one hop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolvedHop {
    pub source_id: SourceId,
    pub kind: SourceKind,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    /// Order-book fills per strategy (empty for other sources)
    pub sub_allocations: Vec<SubAllocation>,
    pub tick_status: Option<WalkStatus>,
    pub crossings: usize,
}

#[derive(Debug, Clone)]
pub struct SolvedCycle {
    pub cycle: Cycle,
    pub solver: &'static str,
    pub hops: Vec<SolvedHop>,
    pub amount_in: U256,
    pub amount_out: U256,
    /// Start-token decimal units
    pub profit: Decimal,
    pub predicted_out: Decimal,
    pub wrapped_native: Address,
}

impl SolvedCycle {
    /// Set when the concentrated hop stopped at the crossing limit
    pub fn exhausted(&self) -> bool {
        self.hops
            .iter()
            .any(|h| h.tick_status == Some(WalkStatus::Exhausted))
    }
}

#[derive(Debug, Clone)]
pub enum SolveOutcome {
    Profitable(Box<SolvedCycle>),
    NoArbitrage,
}

impl SolveOutcome {
    pub fn is_profitable(&self) -> bool {
        matches!(self, SolveOutcome::Profitable(_))
    }

    pub fn solved(&self) -> Option<&SolvedCycle> {
        match self {
            SolveOutcome::Profitable(solved) => Some(solved.as_ref()),
            SolveOutcome::NoArbitrage => None,
        }
    }
}

/// Summary for reports
#[derive(Debug, Clone, Serialize)]
pub struct SolveSummary {
    pub route: String,
    pub pattern: String,
    pub amount_in: String,
    pub amount_out: String,
    pub profit: Decimal,
}

impl From<&SolvedCycle> for SolveSummary {
    fn from(solved: &SolvedCycle) -> Self {
        Self {
            route: solved.cycle.to_string(),
            pattern: pattern_name(&solved.cycle.pattern()),
            amount_in: solved.amount_in.to_string(),
            amount_out: solved.amount_out.to_string(),
            profit: solved.profit,
        }
    }
}

pub struct ArbEngine {
    config: EngineConfig,
    registry: SolverRegistry,
    ticks: Arc<dyn TickLiquidityLookup>,
}

impl ArbEngine {
    pub fn new(config: EngineConfig, ticks: Arc<dyn TickLiquidityLookup>) -> Self {
        Self::with_registry(config, ticks, SolverRegistry::default())
    }

    pub fn with_registry(config: EngineConfig, ticks: Arc<dyn TickLiquidityLookup>, registry: SolverRegistry) -> Self {
        Self {
            config,
            registry,
            ticks,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn context(&self) -> SolveContext<'_> {
        SolveContext::new(&self.config, self.ticks.as_ref())
    }

    pub fn validate(&self, cycle: &Cycle) -> Result<(), SequenceError> {
        validate(cycle, &self.config)
    }

    /// Exact sequential quote of `cycle` for `amount_in` start-token wei.
    /// Fails with `PartialFill` if any hop would strand part of its input.
    pub fn quote_cycle(&self, cycle: &Cycle, amount_in: U256) -> Result<Vec<SolvedHop>, SolveError> {
        simulate(cycle, amount_in, &self.context())
    }

    pub fn solve(&self, cycle: &Cycle) -> Result<SolveOutcome, SolveError> {
        self.validate(cycle)?;
        let pattern = cycle.pattern();
        let solver = self.registry.select(&pattern)?;
        let ctx = self.context();

        let Some(candidate) = solver.solve(cycle, &ctx)? else {
            debug!("No arbitrage on {} ({})", cycle, pattern_name(&pattern));
            return Ok(SolveOutcome::NoArbitrage);
        };

        let hops = simulate_within_capacity(cycle, candidate.amount_in, &ctx)?;
        let (Some(first), Some(last)) = (hops.first(), hops.last()) else {
            return Ok(SolveOutcome::NoArbitrage);
        };
        let amount_in = first.amount_in;
        let amount_out = last.amount_out;
        if amount_out <= amount_in {
            debug!(
                "Exact re-quote of {} not profitable: in={} out={}",
                cycle, amount_in, amount_out
            );
            return Ok(SolveOutcome::NoArbitrage);
        }

        let start = start_token(cycle)?;
        let profit = start.to_decimal(amount_out - amount_in)?;
        if profit < self.config.min_profit {
            debug!("Profit {} below floor {} on {}", profit, self.config.min_profit, cycle);
            return Ok(SolveOutcome::NoArbitrage);
        }

        info!(
            "Solved {} via {}: in={} out={} profit={} {}",
            cycle, solver.name(), amount_in, amount_out, profit, start.symbol
        );
        Ok(SolveOutcome::Profitable(Box::new(SolvedCycle {
            cycle: cycle.clone(),
            solver: solver.name(),
            hops,
            amount_in,
            amount_out,
            profit,
            predicted_out: candidate.predicted_out,
            wrapped_native: self.config.wrapped_native,
        })))
    }

    /// Solve independent cycles in parallel on the blocking pool
    pub async fn solve_batch(self: &Arc<Self>, cycles: Vec<Cycle>) -> Result<Vec<Result<SolveOutcome, SolveError>>> {
        let handles = cycles.into_iter().map(|cycle| {
            let engine = Arc::clone(self);
            tokio::task::spawn_blocking(move || engine.solve(&cycle))
        });
        join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.context("solver task failed"))
            .collect()
    }
}

fn start_token(cycle: &Cycle) -> Result<&Token, SolveError> {
    cycle
        .start_token()
        .ok_or_else(|| SolveError::UnsupportedVariantPairing("empty cycle".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::cycle::tests::cp_hop;
    use crate::arbitrage::cycle::Hop;
    use crate::arbitrage::settlement::{build_settlement, routes_for};
    use crate::arbitrage::tick_walker::TickTable;
    use crate::pool::order_book::{encode_order, DecodedOrder};
    use crate::pool::{LiquiditySource, Order, OrderBookSource, Strategy};
    use crate::types::Exchange;
    use rust_decimal_macros::dec;

    fn engine(config: EngineConfig) -> ArbEngine {
        ArbEngine::new(config, Arc::new(TickTable::new()))
    }

    fn scenario() -> Cycle {
        Cycle::new(vec![
            cp_hop(Exchange::BancorV3, 0xa0, (1, 1_000), (2, 2_000)),
            cp_hop(Exchange::UniswapV2, 0xb0, (2, 500), (3, 1_500)),
            cp_hop(Exchange::BancorV3, 0xc0, (3, 2_200), (1, 1_050)),
        ])
    }

    fn balanced() -> Cycle {
        Cycle::new(vec![
            cp_hop(Exchange::BancorV3, 0xa0, (1, 1_000), (2, 1_000)),
            cp_hop(Exchange::BancorV3, 0xb0, (2, 1_000), (3, 1_000)),
            cp_hop(Exchange::BancorV3, 0xc0, (3, 1_000), (1, 1_000)),
        ])
    }

    #[test]
    fn test_end_to_end_scenario() {
        let engine = engine(EngineConfig::default());
        let outcome = engine.solve(&scenario()).unwrap();
        let solved = outcome.solved().unwrap();
        assert_eq!(solved.solver, "constant_product");
        assert!(solved.amount_in > U256::ZERO);
        assert!(solved.profit > Decimal::ZERO);

        // re-quoting hop by hop reproduces the closed-form prediction
        let requote = engine.quote_cycle(&solved.cycle, solved.amount_in).unwrap();
        assert_eq!(requote.last().unwrap().amount_out, solved.amount_out);
        let start = solved.cycle.start_token().unwrap();
        let exact = start.to_decimal(solved.amount_out).unwrap();
        assert!((exact - solved.predicted_out).abs() < dec!(0.000001));
    }

    #[test]
    fn test_balanced_loop_is_no_arbitrage() {
        let outcome = engine(EngineConfig::default()).solve(&balanced()).unwrap();
        assert!(!outcome.is_profitable());
    }

    #[test]
    fn test_profit_floor() {
        let config = EngineConfig {
            min_profit: dec!(100000),
            ..EngineConfig::default()
        };
        let outcome = engine(config).solve(&scenario()).unwrap();
        assert!(matches!(outcome, SolveOutcome::NoArbitrage));
    }

    #[test]
    fn test_invalid_topology_is_an_error() {
        let mut hops = scenario().hops().to_vec();
        hops[0] = cp_hop(Exchange::SushiswapV2, 0xa0, (1, 1_000), (2, 2_000));
        let err = engine(EngineConfig::default()).solve(&Cycle::new(hops)).unwrap_err();
        assert!(matches!(
            err,
            SolveError::Sequence(SequenceError::InvalidRouteTopology { hop: 0, .. })
        ));
    }

    #[test]
    fn test_solve_batch_in_parallel() {
        let engine = Arc::new(engine(EngineConfig::default()));
        let results = tokio_test::block_on(engine.solve_batch(vec![scenario(), balanced(), scenario()])).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].as_ref().unwrap().is_profitable());
        assert!(!results[1].as_ref().unwrap().is_profitable());
        let a = results[0].as_ref().unwrap().solved().unwrap().amount_in;
        let b = results[2].as_ref().unwrap().solved().unwrap().amount_in;
        assert_eq!(a, b);
    }

    /// T1 -> T2 on a pool, T2 -> T3 across two strategies, T3 -> T1 on a pool
    fn two_order_cycle() -> Cycle {
        let order = |marginal: Decimal| {
            encode_order(&DecodedOrder {
                liquidity: 20 * 10u128.pow(18),
                lowest_rate: dec!(1.2),
                highest_rate: dec!(1.3),
                marginal_rate: marginal,
            })
            .unwrap()
        };
        let book = OrderBookSource::new(
            SourceId::new(Exchange::CarbonV1, Address::repeat_byte(0xca)),
            Token::new("T2", Address::repeat_byte(2), 18),
            Token::new("T3", Address::repeat_byte(3), 18),
            2_000,
            vec![
                Strategy {
                    id: U256::from(11u8),
                    orders: [Order::default(), order(dec!(1.3))],
                },
                Strategy {
                    id: U256::from(12u8),
                    orders: [Order::default(), order(dec!(1.25))],
                },
            ],
        )
        .unwrap();
        Cycle::new(vec![
            cp_hop(Exchange::BancorV3, 0xa0, (1, 1_000), (2, 1_000)),
            Hop::new(Arc::new(LiquiditySource::OrderBook(book)), 0, 1),
            cp_hop(Exchange::BancorV3, 0xc0, (3, 1_000), (1, 1_000)),
        ])
    }

    fn book_capacity(cycle: &Cycle) -> U256 {
        match cycle.hops()[1].source.as_ref() {
            LiquiditySource::OrderBook(book) => book.capacity_in(true).unwrap(),
            other => panic!("unexpected source {:?}", other.kind()),
        }
    }

    #[test]
    fn test_multi_order_cycle_settles_per_strategy() {
        let config = EngineConfig::default();
        let engine = engine(config.clone());
        let cycle = two_order_cycle();
        let outcome = engine.solve(&cycle).unwrap();
        let solved = outcome.solved().unwrap();
        assert_eq!(solved.solver, "order_book");
        assert!(solved.profit > Decimal::ZERO);

        // every hop absorbs exactly what the previous one produced
        let hops = &solved.hops;
        assert_eq!(hops[1].amount_in, hops[0].amount_out);
        assert_eq!(hops[2].amount_in, hops[1].amount_out);
        assert!(hops[1].amount_in <= book_capacity(&cycle));

        // both strategies fill and the split conserves the hop's amounts
        let subs = &hops[1].sub_allocations;
        assert_eq!(subs.len(), 2);
        let sub_in = subs.iter().fold(U256::ZERO, |acc, s| acc + s.amount_in);
        let sub_out = subs.iter().fold(U256::ZERO, |acc, s| acc + s.amount_out);
        assert_eq!(sub_in, hops[1].amount_in);
        assert_eq!(sub_out, hops[1].amount_out);

        let records = build_settlement(solved, 50, 1_700_000_000).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(&records[1].trade_actions, subs);
        assert_eq!(&records[1].sub_allocations, subs);
        assert!(records[0].sub_allocations.is_empty());
        assert!(records.iter().all(|r| !r.swept));
        assert_eq!(records[0].amount_out, records[1].amount_in);
        assert_eq!(records[1].amount_out, records[2].amount_in);

        let routes = routes_for(solved, &records, &config).unwrap();
        assert_eq!(routes[1].platformId, Exchange::CarbonV1.platform_id());
        assert!(!routes[1].customData.is_empty());
    }

    #[test]
    fn test_quote_cycle_rejects_stranded_input() {
        let engine = engine(EngineConfig::default());
        let cycle = two_order_cycle();
        let capacity = book_capacity(&cycle);
        // 100 T1 buys far more T2 than both strategies can take
        let err = engine
            .quote_cycle(&cycle, U256::from(100u64) * U256::from(10u64).pow(U256::from(18)))
            .unwrap_err();
        let SolveError::PartialFill { hop, requested, consumed } = err.clone() else {
            panic!("expected a partial fill, got {err}");
        };
        assert_eq!(hop, 1);
        assert!(consumed <= capacity);
        assert!(requested > consumed);
        assert!(err.is_trade_size_limit());
    }

    #[test]
    fn test_solve_trims_to_what_every_hop_absorbs() {
        let engine = engine(EngineConfig::default());
        let cycle = two_order_cycle();
        let capacity = book_capacity(&cycle);
        let oversized = U256::from(100u64) * U256::from(10u64).pow(U256::from(18));
        let ctx = engine.context();
        let hops = simulate_within_capacity(&cycle, oversized, &ctx).unwrap();
        assert!(hops[0].amount_in < oversized);
        assert!(hops[1].amount_in <= capacity);
        assert_eq!(hops[1].amount_in, hops[0].amount_out);
        // one more wei would overflow the book
        let next = hops[0].amount_in + U256::from(1u8);
        assert!(matches!(
            engine.quote_cycle(&cycle, next),
            Err(SolveError::PartialFill { hop: 1, .. })
        ));
    }
}
