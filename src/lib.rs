//! DEX Arbitrage Engine Library
//!
//! Trade sizing and multi-hop settlement for cyclic arbitrage across
//! constant-product, concentrated-liquidity, order-book and weighted
//! liquidity sources.
//!
//! Created: 2026-01-28
//! Modified: 2026-10-18 - Engine crate: pool snapshots, cycle solving, settlement

pub mod arbitrage;
pub mod config;
pub mod contracts;
pub mod error;
pub mod math;
pub mod pool;
pub mod scenario;
pub mod types;

// Re-export commonly used types
pub use arbitrage::{build_settlement, validate, ArbEngine, Cycle, SettlementRecord, SolveOutcome, SolvedCycle};
pub use config::{load_config, EngineConfig};
pub use error::{AllocationError, QuoteError, SequenceError, SolveError};
pub use pool::{LiquiditySource, SnapshotBook};
pub use types::{Exchange, SourceKind, Token};
