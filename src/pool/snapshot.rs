//! Snapshot Book
//!
//! Thread-safe storage for liquidity-source snapshots using DashMap.
//! Each entry carries the block it was read at; older snapshots never
//! replace newer ones.
//!
//! Created: 2026-01-27
//! Modified: 2026-10-18 - Keyed by (exchange, pool address), Arc snapshots, cycle building

use alloy::primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::LiquiditySource;
use crate::arbitrage::cycle::{Cycle, CycleLeg, Hop};
use crate::error::SequenceError;
use crate::types::{canonical_token, Exchange};

/// One stored snapshot
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub source: Arc<LiquiditySource>,
    pub block: u64,
}

/// Thread-safe snapshot store
///
/// Readers get `Arc` clones, so a parallel batch shares one immutable
/// copy of each pool no matter how often the book is refreshed.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBook {
    sources: Arc<DashMap<(Exchange, Address), Snapshot>>,
}

impl SnapshotBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a snapshot unless a newer one is already stored.
    /// Returns whether the book changed.
    pub fn update_source(&self, source: LiquiditySource, block: u64) -> bool {
        let id = source.id();
        let key = (id.exchange, id.address);
        if let Some(existing) = self.sources.get(&key) {
            if existing.block > block {
                warn!(
                    "Rejected stale snapshot for {} (block {} < stored {})",
                    id, block, existing.block
                );
                return false;
            }
        }
        debug!("Updating source {} ({}) at block {}", id, source.kind(), block);
        self.sources.insert(
            key,
            Snapshot {
                source: Arc::new(source),
                block,
            },
        );
        true
    }

    pub fn get(&self, exchange: Exchange, address: Address) -> Option<Arc<LiquiditySource>> {
        self.sources
            .get(&(exchange, address))
            .map(|entry| Arc::clone(&entry.source))
    }

    pub fn get_snapshot(&self, exchange: Exchange, address: Address) -> Option<Snapshot> {
        self.sources.get(&(exchange, address)).map(|entry| entry.clone())
    }

    /// All sources holding `token` (canonical comparison)
    pub fn sources_for_token(&self, token: Address, wrapped_native: Address) -> Vec<Arc<LiquiditySource>> {
        let wanted = canonical_token(token, wrapped_native);
        self.sources
            .iter()
            .filter(|entry| {
                entry
                    .source
                    .tokens()
                    .iter()
                    .any(|t| canonical_token(t.address, wrapped_native) == wanted)
            })
            .map(|entry| Arc::clone(&entry.source))
            .collect()
    }

    /// Check if any snapshot is more than `max_blocks` old
    pub fn is_stale(&self, current_block: u64, max_blocks: u64) -> bool {
        self.sources
            .iter()
            .any(|entry| current_block.saturating_sub(entry.block) > max_blocks)
    }

    /// (source_count, oldest_block, newest_block)
    pub fn stats(&self) -> (usize, u64, u64) {
        let count = self.sources.len();
        let min_block = self.sources.iter().map(|e| e.block).min().unwrap_or(0);
        let max_block = self.sources.iter().map(|e| e.block).max().unwrap_or(0);
        (count, min_block, max_block)
    }

    pub fn remove(&self, exchange: Exchange, address: Address) -> Option<Snapshot> {
        self.sources.remove(&(exchange, address)).map(|(_, v)| v)
    }

    pub fn contains(&self, exchange: Exchange, address: Address) -> bool {
        self.sources.contains_key(&(exchange, address))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn clear(&self) {
        self.sources.clear();
    }

    /// Resolve candidate legs against the current snapshots.
    ///
    /// Only lookup failures are reported here; continuity is checked by
    /// `validate`.
    pub fn build_cycle(&self, legs: &[CycleLeg], wrapped_native: Address) -> Result<Cycle, SequenceError> {
        let hops = legs
            .iter()
            .enumerate()
            .map(|(hop, leg)| {
                let source = self.get(leg.exchange, leg.pool).ok_or(SequenceError::MissingSnapshot {
                    hop,
                    exchange: leg.exchange,
                    address: leg.pool,
                })?;
                Hop::from_addresses(hop, source, leg.token_in, leg.token_out, wrapped_native)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Cycle::new(hops))
    }
}
