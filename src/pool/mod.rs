//! Liquidity sources
//!
//! Point-in-time snapshots of every supported pool type, their exact
//! swap quotes, and the concurrent snapshot book the engine reads from.
//!
//! Created: 2026-01-27
//! Modified: 2026-10-18 - Tagged LiquiditySource over four pricing laws

pub mod concentrated;
pub mod constant_product;
pub mod order_book;
pub mod snapshot;
pub mod source;
pub mod weighted;

pub use concentrated::ConcentratedPool;
pub use constant_product::{ConstantProductPool, OrientedReserves};
pub use order_book::{Order, OrderBookSource, Strategy};
pub use snapshot::SnapshotBook;
pub use source::LiquiditySource;
pub use weighted::WeightedPool;

use alloy::primitives::U256;

/// Result of an exact-input quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    /// Input actually consumed (less than requested when `bounded`)
    pub amount_in: U256,
    pub amount_out: U256,
    /// The source could not absorb the whole request at this state
    pub bounded: bool,
}

impl SwapQuote {
    pub fn full(amount_in: U256, amount_out: U256) -> Self {
        Self {
            amount_in,
            amount_out,
            bounded: false,
        }
    }
}
