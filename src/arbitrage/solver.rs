//! Hop solvers
//!
//! One solver per pattern of adjacent source variants. Each returns the
//! start-token input that maximises `output - input` for the whole
//! cycle, or `None` when no positive-profit input exists.
//!
//! Created: 2026-10-18
//!
//! Notes:
//!     - Constant-product hops, a concentrated-liquidity range and a single
//!       order all share the curve `f(x) = kx / (1 + ex)`, so those cycles
//!       compose into one curve with optimum `x* = (√k − 1) / e`
//!     - Multi-order books and weighted pools have no closed form and are
//!       sized by golden-section search over an exact simulation
//!     - Candidates are re-quoted exactly in wei by the engine

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use super::cycle::{Cycle, Hop};
use super::engine::SolvedHop;
use super::tick_walker::{TickLiquidityLookup, TickWalker, WalkStatus};
use crate::config::EngineConfig;
use crate::error::{QuoteError, SolveError};
use crate::math::RateCurve;
use crate::pool::{ConcentratedPool, LiquiditySource, OrderBookSource, OrientedReserves, WeightedPool};
use crate::types::{SourceKind, Token};

/// 1/φ for golden-section search
const INV_PHI: Decimal = dec!(0.6180339887498948482045868344);

/// Upper search bound when the first hop can out-supply the middle hop
const SEARCH_HEADROOM: Decimal = dec!(10);

/// Bisection steps when trimming an input to what every hop absorbs
const FIT_STEPS: usize = 256;

/// Shared, read-only inputs of one solve call
pub struct SolveContext<'a> {
    pub config: &'a EngineConfig,
    pub ticks: &'a dyn TickLiquidityLookup,
}

impl<'a> SolveContext<'a> {
    pub fn new(config: &'a EngineConfig, ticks: &'a dyn TickLiquidityLookup) -> Self {
        Self { config, ticks }
    }

    pub fn walker(&self) -> TickWalker<'a> {
        TickWalker::new(self.ticks, self.config.max_cross_tick_checks)
    }
}

/// Optimal input found by a solver, before exact re-quoting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Start-token input in wei
    pub amount_in: U256,
    /// Final output the solver predicts, start-token decimal units
    pub predicted_out: Decimal,
    pub tick_status: Option<WalkStatus>,
    pub crossings: usize,
}

impl Candidate {
    fn from_decimal(start: &Token, amount_in: Decimal, predicted_out: Decimal) -> Result<Option<Self>, SolveError> {
        let wei = start.to_wei(amount_in)?;
        if wei.is_zero() {
            return Ok(None);
        }
        Ok(Some(Self {
            amount_in: wei,
            predicted_out,
            tick_status: None,
            crossings: 0,
        }))
    }
}

pub trait HopSolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn matches(&self, pattern: &[SourceKind]) -> bool;

    fn solve(&self, cycle: &Cycle, ctx: &SolveContext) -> Result<Option<Candidate>, SolveError>;
}

/// Solvers looked up by the cycle's variant pattern
pub struct SolverRegistry {
    solvers: Vec<Box<dyn HopSolver>>,
}

impl Default for SolverRegistry {
    fn default() -> Self {
        Self {
            solvers: vec![
                Box::new(ConstantProductSolver),
                Box::new(ConcentratedSolver),
                Box::new(OrderBookSolver),
                Box::new(WeightedSolver),
            ],
        }
    }
}

impl SolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, solver: Box<dyn HopSolver>) {
        self.solvers.push(solver);
    }

    pub fn select(&self, pattern: &[SourceKind]) -> Result<&dyn HopSolver, SolveError> {
        self.solvers
            .iter()
            .find(|s| s.matches(pattern))
            .map(|s| s.as_ref())
            .ok_or_else(|| SolveError::UnsupportedVariantPairing(pattern_name(pattern)))
    }
}

/// `cp->cl->cp` style label
pub fn pattern_name(pattern: &[SourceKind]) -> String {
    pattern
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join("->")
}

fn is_sandwich(pattern: &[SourceKind], middle: SourceKind) -> bool {
    matches!(
        pattern,
        [SourceKind::ConstantProduct, m, SourceKind::ConstantProduct] if *m == middle
    )
}

// ── Source views ─────────────────────────────────────────────────────────────

fn start_token(cycle: &Cycle) -> Result<&Token, SolveError> {
    cycle
        .start_token()
        .ok_or_else(|| SolveError::UnsupportedVariantPairing("empty cycle".to_string()))
}

fn mismatch(hop: &Hop) -> SolveError {
    SolveError::UnsupportedVariantPairing(format!("unexpected {} source", hop.kind()))
}

fn constant_product(hop: &Hop) -> Result<OrientedReserves, SolveError> {
    match hop.source.as_ref() {
        LiquiditySource::ConstantProduct(p) => Ok(p.oriented(hop.zero_for_one())?),
        _ => Err(mismatch(hop)),
    }
}

fn concentrated(hop: &Hop) -> Result<&ConcentratedPool, SolveError> {
    match hop.source.as_ref() {
        LiquiditySource::ConcentratedLiquidity(p) => Ok(p),
        _ => Err(mismatch(hop)),
    }
}

fn order_book(hop: &Hop) -> Result<&OrderBookSource, SolveError> {
    match hop.source.as_ref() {
        LiquiditySource::OrderBook(p) => Ok(p),
        _ => Err(mismatch(hop)),
    }
}

fn weighted(hop: &Hop) -> Result<&WeightedPool, SolveError> {
    match hop.source.as_ref() {
        LiquiditySource::Weighted(p) => Ok(p),
        _ => Err(mismatch(hop)),
    }
}

fn token_pair(hop: &Hop) -> Result<(&Token, &Token), SolveError> {
    let tin = hop.incoming().ok_or_else(|| mismatch(hop))?;
    let tout = hop.outgoing().ok_or_else(|| mismatch(hop))?;
    Ok((tin, tout))
}

// ── Exact simulation ─────────────────────────────────────────────────────────

/// Exact wei quote of one hop. Concentrated hops walk ticks, order-book
/// hops keep their per-order split.
pub fn quote_hop(hop: &Hop, amount_in: U256, ctx: &SolveContext) -> Result<SolvedHop, SolveError> {
    let (tin, tout) = token_pair(hop)?;
    let mut solved = SolvedHop {
        source_id: hop.source.id(),
        kind: hop.kind(),
        token_in: tin.address,
        token_out: tout.address,
        amount_in,
        amount_out: U256::ZERO,
        sub_allocations: Vec::new(),
        tick_status: None,
        crossings: 0,
    };
    match hop.source.as_ref() {
        LiquiditySource::ConcentratedLiquidity(pool) => {
            let walk = ctx.walker().walk(pool, hop.zero_for_one(), amount_in)?;
            solved.amount_in = walk.amount_in;
            solved.amount_out = walk.amount_out;
            solved.tick_status = Some(walk.status);
            solved.crossings = walk.crossings;
        }
        LiquiditySource::OrderBook(book) => {
            let allocation = book.allocate(hop.zero_for_one(), amount_in)?;
            solved.amount_in = allocation.total_in();
            solved.amount_out = allocation.total_out();
            solved.sub_allocations = allocation.subs;
        }
        source => {
            let quote = source.quote_output(hop.token_in, hop.token_out, amount_in)?;
            solved.amount_in = quote.amount_in;
            solved.amount_out = quote.amount_out;
        }
    }
    Ok(solved)
}

/// Quote every hop in order, feeding each output into the next hop.
/// A hop that cannot absorb its whole input is a `PartialFill`.
pub fn simulate(cycle: &Cycle, amount_in: U256, ctx: &SolveContext) -> Result<Vec<SolvedHop>, SolveError> {
    let mut next_in = amount_in;
    let mut hops = Vec::with_capacity(cycle.len());
    for (i, hop) in cycle.hops().iter().enumerate() {
        let solved = quote_hop(hop, next_in, ctx)?;
        if solved.amount_in < next_in {
            return Err(SolveError::PartialFill {
                hop: i,
                requested: next_in,
                consumed: solved.amount_in,
            });
        }
        next_in = solved.amount_out;
        hops.push(solved);
    }
    Ok(hops)
}

/// Simulate `amount_in`, or the largest smaller input every hop absorbs
/// in full when some hop would leave part of its input unconsumed
pub fn simulate_within_capacity(cycle: &Cycle, amount_in: U256, ctx: &SolveContext) -> Result<Vec<SolvedHop>, SolveError> {
    let first_err = match simulate(cycle, amount_in, ctx) {
        Err(e @ SolveError::PartialFill { .. }) => e,
        other => return other,
    };

    let mut lo = U256::ZERO;
    let mut hi = amount_in;
    let mut best = None;
    for _ in 0..FIT_STEPS {
        if hi - lo <= U256::from(1u8) {
            break;
        }
        let mid = lo + (hi - lo) / U256::from(2u8);
        match simulate(cycle, mid, ctx) {
            Ok(hops) => {
                lo = mid;
                best = Some(hops);
            }
            Err(SolveError::PartialFill { .. }) => hi = mid,
            Err(e) => return Err(e),
        }
    }
    match best {
        Some(hops) => {
            debug!("Trimmed input on {} from {} to {}", cycle, amount_in, lo);
            Ok(hops)
        }
        None => Err(first_err),
    }
}

/// Profit of an exact simulation in start-token decimal units.
/// `None` when a protocol size limit rejects the trade.
fn simulated_profit(cycle: &Cycle, start: &Token, x: Decimal, ctx: &SolveContext) -> Result<Option<Decimal>, SolveError> {
    let wei = start.to_wei(x)?;
    if wei.is_zero() {
        return Ok(Some(Decimal::ZERO));
    }
    match simulate(cycle, wei, ctx) {
        Ok(hops) => {
            let spent = hops.first().map(|h| h.amount_in).unwrap_or(wei);
            let received = hops.last().map(|h| h.amount_out).unwrap_or_default();
            Ok(Some(start.to_decimal(received)? - start.to_decimal(spent)?))
        }
        Err(e) if e.is_trade_size_limit() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Golden-section maximisation over `[0, upper]`. Infeasible points
/// (`None`) rank below every feasible one.
fn golden_section<F>(upper: Decimal, iterations: usize, mut objective: F) -> Result<Option<(Decimal, Decimal)>, SolveError>
where
    F: FnMut(Decimal) -> Result<Option<Decimal>, SolveError>,
{
    let mut lo = Decimal::ZERO;
    let mut hi = upper;
    let mut c = hi - INV_PHI * (hi - lo);
    let mut d = lo + INV_PHI * (hi - lo);
    let mut fc = objective(c)?;
    let mut fd = objective(d)?;
    let mut best: Option<(Decimal, Decimal)> = None;

    let keep_best = |x: Decimal, v: Option<Decimal>, best: &mut Option<(Decimal, Decimal)>| {
        if let Some(v) = v {
            if best.map_or(true, |(_, b)| v > b) {
                *best = Some((x, v));
            }
        }
    };
    keep_best(c, fc, &mut best);
    keep_best(d, fd, &mut best);

    for _ in 0..iterations {
        if fc >= fd {
            hi = d;
            d = c;
            fd = fc;
            c = hi - INV_PHI * (hi - lo);
            fc = objective(c)?;
            keep_best(c, fc, &mut best);
        } else {
            lo = c;
            c = d;
            fc = fd;
            d = lo + INV_PHI * (hi - lo);
            fd = objective(d)?;
            keep_best(d, fd, &mut best);
        }
    }
    Ok(best)
}

fn search(cycle: &Cycle, upper: Decimal, ctx: &SolveContext) -> Result<Option<Candidate>, SolveError> {
    let start = start_token(cycle)?;
    let best = golden_section(upper, ctx.config.max_search_iterations, |x| {
        simulated_profit(cycle, start, x, ctx)
    })?;
    match best {
        Some((x, profit)) if profit > Decimal::ZERO => {
            debug!("Search optimum {} {} (profit {})", x, start.symbol, profit);
            Candidate::from_decimal(start, x, x + profit)
        }
        _ => Ok(None),
    }
}

// ── Closed-form solvers ──────────────────────────────────────────────────────

/// Any number (≥ 3) of constant-product hops
pub struct ConstantProductSolver;

impl HopSolver for ConstantProductSolver {
    fn name(&self) -> &'static str {
        "constant_product"
    }

    fn matches(&self, pattern: &[SourceKind]) -> bool {
        pattern.len() >= 3 && pattern.iter().all(|k| *k == SourceKind::ConstantProduct)
    }

    fn solve(&self, cycle: &Cycle, _ctx: &SolveContext) -> Result<Option<Candidate>, SolveError> {
        let start = start_token(cycle)?;
        let curve = cycle
            .hops()
            .iter()
            .try_fold(RateCurve::identity(), |acc, hop| -> Result<RateCurve, SolveError> {
                Ok(acc.then(&constant_product(hop)?.curve())?)
            })?;
        let Some(x) = curve.optimal_input()? else {
            debug!("No arbitrage: composed rate {} on {}", curve.k, cycle);
            return Ok(None);
        };
        Candidate::from_decimal(start, x, curve.apply(x)?)
    }
}

/// Constant product -> concentrated liquidity -> constant product,
/// crossing ranges while the optimum lies beyond the current one
pub struct ConcentratedSolver;

impl HopSolver for ConcentratedSolver {
    fn name(&self) -> &'static str {
        "concentrated"
    }

    fn matches(&self, pattern: &[SourceKind]) -> bool {
        is_sandwich(pattern, SourceKind::ConcentratedLiquidity)
    }

    fn solve(&self, cycle: &Cycle, ctx: &SolveContext) -> Result<Option<Candidate>, SolveError> {
        let hops = cycle.hops();
        let start = start_token(cycle)?;
        let mut first = constant_product(&hops[0])?;
        let mut last = constant_product(&hops[2])?;
        let zero_for_one = hops[1].zero_for_one();
        let (mid_in, mid_out) = token_pair(&hops[1])?;
        let mut pool = concentrated(&hops[1])?.clone();
        let walker = ctx.walker();

        let mut spent = Decimal::ZERO;
        let mut received = Decimal::ZERO;
        let mut crossings = 0usize;

        let status = loop {
            if pool.liquidity > 0 {
                let curve = first.curve().then(&pool.curve(zero_for_one)?)?.then(&last.curve())?;
                let Some(x) = curve.optimal_input()? else {
                    break in_range_status(crossings);
                };
                let range_cap = mid_in.to_decimal(pool.max_input(zero_for_one)?)?;
                if first.amount_out(x)? <= range_cap {
                    spent += x;
                    received += curve.apply(x)?;
                    break in_range_status(crossings);
                }

                // optimum lies past the boundary: take the whole range
                let x_boundary = first.amount_in_for(range_cap)?;
                let released = mid_out.to_decimal(pool.max_output(zero_for_one)?)?;
                spent += x_boundary;
                received += last.amount_out(released)?;
                first = first.advanced(x_boundary)?;
                last = last.advanced(released)?;
                debug!(
                    "Range [{}, {}) of {} filled by {} {}",
                    pool.range_bounds().0,
                    pool.range_bounds().1,
                    pool.id,
                    x_boundary,
                    start.symbol
                );
            }
            if crossings >= walker.max_crossings() {
                break WalkStatus::Exhausted;
            }
            pool = match walker.cross(&pool, zero_for_one) {
                Ok(next) => next,
                Err(QuoteError::TickOutOfRange(_)) => break WalkStatus::Exhausted,
                Err(e) => return Err(e.into()),
            };
            crossings += 1;
        };

        if spent <= Decimal::ZERO || received <= spent {
            return Ok(None);
        }
        Ok(Candidate::from_decimal(start, spent, received)?.map(|c| Candidate {
            tick_status: Some(status),
            crossings,
            ..c
        }))
    }
}

fn in_range_status(crossings: usize) -> WalkStatus {
    if crossings == 0 {
        WalkStatus::InRange
    } else {
        WalkStatus::Crossed
    }
}

/// Constant product -> order book -> constant product.
/// A single active order has a closed form; several are searched.
pub struct OrderBookSolver;

impl HopSolver for OrderBookSolver {
    fn name(&self) -> &'static str {
        "order_book"
    }

    fn matches(&self, pattern: &[SourceKind]) -> bool {
        is_sandwich(pattern, SourceKind::OrderBook)
    }

    fn solve(&self, cycle: &Cycle, ctx: &SolveContext) -> Result<Option<Candidate>, SolveError> {
        let hops = cycle.hops();
        let start = start_token(cycle)?;
        let first = constant_product(&hops[0])?;
        let last = constant_product(&hops[2])?;
        let book = order_book(&hops[1])?;
        let zero_for_one = hops[1].zero_for_one();
        let (mid_in, mid_out) = token_pair(&hops[1])?;

        let orders = book.active_orders(zero_for_one);
        let capacity = mid_in.to_decimal(book.capacity_in(zero_for_one)?)?;
        match orders.as_slice() {
            [] => {
                debug!("No active orders on {}", book.id);
                Ok(None)
            }
            [single] => {
                let curve = first
                    .curve()
                    .then(&single.order.curve(book.fee_ppm, mid_in, mid_out)?)?
                    .then(&last.curve())?;
                let Some(mut x) = curve.optimal_input()? else {
                    return Ok(None);
                };
                // past depletion the order adds nothing
                if first.amount_out(x)? > capacity {
                    x = first.amount_in_for(capacity)?;
                }
                Candidate::from_decimal(start, x, curve.apply(x)?)
            }
            _ => {
                let upper = match first.amount_in_for(capacity) {
                    Ok(x) => x,
                    Err(QuoteError::InsufficientLiquidity { .. }) => first.balance_in * SEARCH_HEADROOM,
                    Err(e) => return Err(e.into()),
                };
                search(cycle, upper, ctx)
            }
        }
    }
}

/// Constant product -> weighted -> constant product, searched inside the
/// weighted pool's trade-size limits
pub struct WeightedSolver;

impl HopSolver for WeightedSolver {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn matches(&self, pattern: &[SourceKind]) -> bool {
        is_sandwich(pattern, SourceKind::Weighted)
    }

    fn solve(&self, cycle: &Cycle, ctx: &SolveContext) -> Result<Option<Candidate>, SolveError> {
        let hops = cycle.hops();
        let first = constant_product(&hops[0])?;
        let pair = weighted(&hops[1])?.pair(hops[1].token_in, hops[1].token_out)?;
        let upper = match first.amount_in_for(pair.max_in()) {
            Ok(x) => x,
            Err(QuoteError::InsufficientLiquidity { .. }) => first.balance_in * SEARCH_HEADROOM,
            Err(e) => return Err(e.into()),
        };
        search(cycle, upper, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::cycle::tests::cp_hop;
    use crate::arbitrage::tick_walker::tests::pool_at_tick_zero;
    use crate::arbitrage::tick_walker::TickTable;
    use crate::pool::order_book::{encode_order, DecodedOrder};
    use crate::pool::{ConstantProductPool, Order, Strategy};
    use crate::types::{Exchange, SourceId};
    use alloy::primitives::{Address, B256};
    use std::sync::Arc;

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18))
    }

    /// A (1000/2000) -> B (500/1500) -> C (2200/1050), all 0.3%
    pub(crate) fn scenario_cycle() -> Cycle {
        Cycle::new(vec![
            cp_hop(Exchange::BancorV3, 0xa0, (1, 1_000), (2, 2_000)),
            cp_hop(Exchange::UniswapV2, 0xb0, (2, 500), (3, 1_500)),
            cp_hop(Exchange::BancorV3, 0xc0, (3, 2_200), (1, 1_050)),
        ])
    }

    fn token(tag: u8, units: u64) -> Token {
        Token::new(format!("T{}", tag), Address::repeat_byte(tag), 18).with_balance(e18(units))
    }

    fn hop(source: LiquiditySource) -> Hop {
        Hop::new(Arc::new(source), 0, 1)
    }

    /// Price-1 pool at tick 0 with T3 as token0, traded upward with T2 in
    fn thin_pool(liquidity: u128) -> ConcentratedPool {
        let mut pool = pool_at_tick_zero(liquidity);
        pool.token0 = Token::new("T3", Address::repeat_byte(3), 18);
        pool.token1 = Token::new("T2", Address::repeat_byte(2), 18);
        pool
    }

    #[test]
    fn test_registry_selects_by_pattern() {
        let registry = SolverRegistry::default();
        use SourceKind::*;
        assert_eq!(registry.select(&[ConstantProduct; 4]).unwrap().name(), "constant_product");
        assert_eq!(
            registry
                .select(&[ConstantProduct, ConcentratedLiquidity, ConstantProduct])
                .unwrap()
                .name(),
            "concentrated"
        );
        assert_eq!(
            registry.select(&[ConstantProduct, Weighted, ConstantProduct]).unwrap().name(),
            "weighted"
        );
        let err = registry.select(&[OrderBook, OrderBook, ConstantProduct]).err().unwrap();
        assert_eq!(err, SolveError::UnsupportedVariantPairing("ob->ob->cp".to_string()));
    }

    #[test]
    fn test_constant_product_scenario_matches_requote() {
        let config = EngineConfig::default();
        let ticks = TickTable::new();
        let ctx = SolveContext::new(&config, &ticks);
        let cycle = scenario_cycle();

        let candidate = ConstantProductSolver.solve(&cycle, &ctx).unwrap().unwrap();
        assert!(candidate.amount_in > U256::ZERO);
        assert!(candidate.predicted_out > Decimal::ZERO);

        let hops = simulate(&cycle, candidate.amount_in, &ctx).unwrap();
        let start = cycle.start_token().unwrap();
        let exact_out = start.to_decimal(hops[2].amount_out).unwrap();
        assert!((exact_out - candidate.predicted_out).abs() < dec!(0.000001));
        assert!(exact_out > start.to_decimal(candidate.amount_in).unwrap());
    }

    #[test]
    fn test_constant_product_optimum_is_a_maximum() {
        let config = EngineConfig::default();
        let ticks = TickTable::new();
        let ctx = SolveContext::new(&config, &ticks);
        let cycle = scenario_cycle();
        let start = cycle.start_token().unwrap();
        let candidate = ConstantProductSolver.solve(&cycle, &ctx).unwrap().unwrap();
        let x = start.to_decimal(candidate.amount_in).unwrap();
        let at = simulated_profit(&cycle, start, x, &ctx).unwrap().unwrap();
        for shifted in [x * dec!(0.9), x * dec!(1.1)] {
            let p = simulated_profit(&cycle, start, shifted, &ctx).unwrap().unwrap();
            assert!(p < at);
        }
    }

    #[test]
    fn test_balanced_loop_has_no_arbitrage() {
        let config = EngineConfig::default();
        let ticks = TickTable::new();
        let ctx = SolveContext::new(&config, &ticks);
        let cycle = Cycle::new(vec![
            cp_hop(Exchange::BancorV3, 0xa0, (1, 1_000), (2, 1_000)),
            cp_hop(Exchange::BancorV3, 0xb0, (2, 1_000), (3, 1_000)),
            cp_hop(Exchange::BancorV3, 0xc0, (3, 1_000), (1, 1_000)),
        ]);
        assert_eq!(ConstantProductSolver.solve(&cycle, &ctx).unwrap(), None);
    }

    #[test]
    fn test_golden_section_finds_parabola_peak() {
        let best = golden_section(dec!(10), 60, |x| Ok(Some(dec!(9) - (x - dec!(3)) * (x - dec!(3)))))
            .unwrap()
            .unwrap();
        assert!((best.0 - dec!(3)).abs() < dec!(0.0001));
        // infeasible tail is avoided
        let best = golden_section(dec!(10), 60, |x| {
            Ok(if x > dec!(2) { None } else { Some(x) })
        })
        .unwrap()
        .unwrap();
        assert!(best.0 <= dec!(2) && best.0 > dec!(1.99));
    }

    #[test]
    fn test_concentrated_in_range_optimum() {
        let config = EngineConfig::default();
        let ticks = TickTable::new();
        let ctx = SolveContext::new(&config, &ticks);
        // huge liquidity keeps the optimum inside the first range
        let pool = thin_pool(10u128.pow(24));
        let cycle = Cycle::new(vec![
            cp_hop(Exchange::BancorV3, 0xa0, (1, 1_000), (2, 1_100)),
            Hop::new(Arc::new(LiquiditySource::ConcentratedLiquidity(pool)), 1, 0),
            cp_hop(Exchange::BancorV3, 0xc0, (3, 1_000), (1, 1_000)),
        ]);
        let candidate = ConcentratedSolver.solve(&cycle, &ctx).unwrap().unwrap();
        assert_eq!(candidate.tick_status, Some(WalkStatus::InRange));
        let hops = simulate(&cycle, candidate.amount_in, &ctx).unwrap();
        let start = cycle.start_token().unwrap();
        let exact = start.to_decimal(hops[2].amount_out).unwrap();
        assert!((exact - candidate.predicted_out).abs() < dec!(0.0001));
    }

    #[test]
    fn test_concentrated_crosses_when_range_is_thin() {
        let config = EngineConfig::default();
        let pool = thin_pool(10u128.pow(20));
        let mut ticks = TickTable::new();
        for i in 1..=40 {
            ticks.insert(pool.id.address, 60 * i, 0);
        }
        let ctx = SolveContext::new(&config, &ticks);
        let cycle = Cycle::new(vec![
            cp_hop(Exchange::BancorV3, 0xa0, (1, 1_000), (2, 1_100)),
            Hop::new(Arc::new(LiquiditySource::ConcentratedLiquidity(pool)), 1, 0),
            cp_hop(Exchange::BancorV3, 0xc0, (3, 1_000), (1, 1_000)),
        ]);
        let candidate = ConcentratedSolver.solve(&cycle, &ctx).unwrap().unwrap();
        assert!(candidate.crossings > 0);
        assert!(matches!(
            candidate.tick_status,
            Some(WalkStatus::Crossed) | Some(WalkStatus::Exhausted)
        ));
        let hops = simulate_within_capacity(&cycle, candidate.amount_in, &ctx).unwrap();
        assert!(hops[2].amount_out > hops[0].amount_in);
        assert_eq!(hops[1].amount_in, hops[0].amount_out);
        assert_eq!(hops[2].amount_in, hops[1].amount_out);
    }

    #[test]
    fn test_order_book_single_order_closed_form() {
        let config = EngineConfig::default();
        let ticks = TickTable::new();
        let ctx = SolveContext::new(&config, &ticks);
        // order sells T3 for T2 at 1.2..1.3, marginal 1.25
        let order = encode_order(&DecodedOrder {
            liquidity: 500 * 10u128.pow(18),
            lowest_rate: dec!(1.2),
            highest_rate: dec!(1.3),
            marginal_rate: dec!(1.25),
        })
        .unwrap();
        let book = crate::pool::OrderBookSource::new(
            SourceId::new(Exchange::CarbonV1, Address::repeat_byte(0xca)),
            Token::new("T2", Address::repeat_byte(2), 18),
            Token::new("T3", Address::repeat_byte(3), 18),
            2_000,
            vec![Strategy {
                id: U256::from(1u8),
                orders: [Order::default(), order],
            }],
        )
        .unwrap();
        let cycle = Cycle::new(vec![
            cp_hop(Exchange::BancorV3, 0xa0, (1, 1_000), (2, 1_000)),
            hop(LiquiditySource::OrderBook(book)),
            cp_hop(Exchange::BancorV3, 0xc0, (3, 1_000), (1, 1_000)),
        ]);
        let candidate = OrderBookSolver.solve(&cycle, &ctx).unwrap().unwrap();
        let hops = simulate(&cycle, candidate.amount_in, &ctx).unwrap();
        assert_eq!(hops[1].sub_allocations.len(), 1);
        let start = cycle.start_token().unwrap();
        let exact = start.to_decimal(hops[2].amount_out).unwrap();
        assert!((exact - candidate.predicted_out).abs() < dec!(0.001));
    }

    #[test]
    fn test_weighted_search_respects_limits() {
        let config = EngineConfig::default();
        let ticks = TickTable::new();
        let ctx = SolveContext::new(&config, &ticks);
        let pool = WeightedPool::new(
            SourceId::new(Exchange::BalancerV2, Address::repeat_byte(0xba)),
            B256::repeat_byte(0xba),
            vec![token(2, 1_000), token(3, 1_000)],
            vec![dec!(0.8), dec!(0.2)],
            dec!(0.003),
        )
        .unwrap();
        let cycle = Cycle::new(vec![
            cp_hop(Exchange::BancorV3, 0xa0, (1, 1_000), (2, 1_000)),
            hop(LiquiditySource::Weighted(pool)),
            cp_hop(Exchange::BancorV3, 0xc0, (3, 1_000), (1, 1_000)),
        ]);
        let candidate = WeightedSolver.solve(&cycle, &ctx).unwrap().unwrap();
        let hops = simulate(&cycle, candidate.amount_in, &ctx).unwrap();
        assert!(hops[1].amount_in <= e18(300));
        assert!(hops[2].amount_out > hops[0].amount_in);
    }

    #[test]
    fn test_mismatched_source_is_reported() {
        let cp = ConstantProductPool::new(
            SourceId::new(Exchange::UniswapV2, Address::repeat_byte(9)),
            token(1, 10),
            token(2, 10),
            dec!(0.003),
        )
        .unwrap();
        let h = hop(LiquiditySource::ConstantProduct(cp));
        assert!(concentrated(&h).is_err());
        assert!(constant_product(&h).is_ok());
    }
}
