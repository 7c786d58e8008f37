//! Arbitrage Module
//!
//! Cycle validation, trade sizing, tick walking, order-book allocation
//! and settlement for cyclic arbitrage.
//!
//! Created: 2026-01-27
//! Modified: 2026-10-18 - Cycle solver engine replaces two-pool detector/executor

pub mod allocator;
pub mod cycle;
pub mod engine;
pub mod settlement;
pub mod solver;
pub mod tick_walker;

pub use allocator::{Allocation, OrderBookAllocator, SubAllocation, SubOrder};
pub use cycle::{validate, Cycle, CycleLeg, Hop};
pub use engine::{ArbEngine, SolveOutcome, SolveSummary, SolvedCycle, SolvedHop};
pub use settlement::{build_settlement, SettlementBuilder, SettlementRecord, SettlementView};
pub use solver::{Candidate, HopSolver, SolveContext, SolverRegistry};
pub use tick_walker::{TickLiquidityLookup, TickTable, TickWalker, WalkResult, WalkStatus};
