//! Scenario files
//!
//! JSON description of pool snapshots, tick tables and candidate cycles,
//! used by the binary and for offline replays. Big integers and
//! addresses are strings; decimals may be strings or numbers.
//!
//! Created: 2026-10-18

use alloy::primitives::{Address, B256, U256};
use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::arbitrage::cycle::{Cycle, CycleLeg};
use crate::arbitrage::tick_walker::TickTable;
use crate::error::SequenceError;
use crate::pool::order_book::{encode_order, DecodedOrder};
use crate::pool::{
    ConcentratedPool, ConstantProductPool, LiquiditySource, Order, OrderBookSource, SnapshotBook, Strategy,
    WeightedPool,
};
use crate::types::{Exchange, SourceId, Token};

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Scenario {
    #[serde(default)]
    pub block: u64,
    pub tokens: Vec<TokenSpec>,
    pub pools: Vec<PoolSpec>,
    #[serde(default)]
    pub ticks: Vec<TickSpec>,
    pub cycles: Vec<Vec<LegSpec>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenSpec {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoolSpec {
    ConstantProduct {
        exchange: Exchange,
        address: String,
        tokens: [String; 2],
        balances: [String; 2],
        fee: Decimal,
    },
    ConcentratedLiquidity {
        exchange: Exchange,
        address: String,
        tokens: [String; 2],
        fee_ppm: u32,
        liquidity: String,
        sqrt_price_x96: String,
        tick: i32,
        #[serde(default)]
        tick_spacing: Option<i32>,
    },
    OrderBook {
        exchange: Exchange,
        address: String,
        tokens: [String; 2],
        fee_ppm: u32,
        strategies: Vec<StrategySpec>,
    },
    Weighted {
        exchange: Exchange,
        address: String,
        pool_id: String,
        tokens: Vec<String>,
        balances: Vec<String>,
        weights: Vec<Decimal>,
        fee: Decimal,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StrategySpec {
    pub id: String,
    /// [sells token0, sells token1]
    pub orders: [OrderSpec; 2],
}

/// An order either as stored on chain or by its human-readable rates
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum OrderSpec {
    Encoded { y: String, z: String, a: u64, b: u64 },
    Rates {
        liquidity: String,
        lowest_rate: Decimal,
        highest_rate: Decimal,
        marginal_rate: Decimal,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TickSpec {
    pub pool: String,
    pub tick: i32,
    pub net_liquidity: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LegSpec {
    pub exchange: Exchange,
    pub pool: String,
    pub token_in: String,
    pub token_out: String,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn address(value: &str) -> Result<Address> {
    Address::from_str(value.trim()).with_context(|| format!("Invalid address: {}", value))
}

fn uint(value: &str) -> Result<U256> {
    U256::from_str(value.trim()).map_err(|e| anyhow!("Invalid integer '{}': {}", value, e))
}

fn u128_value(value: &str) -> Result<u128> {
    let v = uint(value)?;
    u128::try_from(v).map_err(|_| anyhow!("Integer '{}' does not fit in 128 bits", value))
}

fn i128_value(value: &str) -> Result<i128> {
    value
        .trim()
        .parse::<i128>()
        .with_context(|| format!("Invalid signed integer: {}", value))
}

impl OrderSpec {
    fn to_order(&self) -> Result<Order> {
        match self {
            OrderSpec::Encoded { y, z, a, b } => Ok(Order {
                y: u128_value(y)?,
                z: u128_value(z)?,
                a: *a,
                b: *b,
            }),
            OrderSpec::Rates {
                liquidity,
                lowest_rate,
                highest_rate,
                marginal_rate,
            } => {
                let liquidity = u128_value(liquidity)?;
                if liquidity == 0 {
                    return Ok(Order::default());
                }
                encode_order(&DecodedOrder {
                    liquidity,
                    lowest_rate: *lowest_rate,
                    highest_rate: *highest_rate,
                    marginal_rate: *marginal_rate,
                })
                .map_err(|e| anyhow!("Invalid order rates: {}", e))
            }
        }
    }
}

impl Scenario {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse scenario JSON")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read scenario file: {}", path.as_ref().display()))?;
        let scenario = Self::from_json(&content)?;
        info!(
            "Scenario loaded: {} tokens, {} pools, {} ticks, {} cycles",
            scenario.tokens.len(),
            scenario.pools.len(),
            scenario.ticks.len(),
            scenario.cycles.len()
        );
        Ok(scenario)
    }

    fn token_table(&self) -> Result<HashMap<Address, Token>> {
        self.tokens
            .iter()
            .map(|t| {
                let addr = address(&t.address)?;
                Ok((addr, Token::new(t.symbol.clone(), addr, t.decimals)))
            })
            .collect()
    }

    fn token(table: &HashMap<Address, Token>, value: &str, balance: U256) -> Result<Token> {
        let addr = address(value)?;
        let token = table
            .get(&addr)
            .cloned()
            .ok_or_else(|| anyhow!("Token {} is not declared in the scenario", value))?;
        Ok(token.with_balance(balance))
    }

    fn source(spec: &PoolSpec, table: &HashMap<Address, Token>) -> Result<LiquiditySource> {
        let source = match spec {
            PoolSpec::ConstantProduct {
                exchange,
                address: pool,
                tokens,
                balances,
                fee,
            } => {
                let id = SourceId::new(*exchange, address(pool)?);
                LiquiditySource::ConstantProduct(ConstantProductPool::new(
                    id,
                    Self::token(table, &tokens[0], uint(&balances[0])?)?,
                    Self::token(table, &tokens[1], uint(&balances[1])?)?,
                    *fee,
                )?)
            }
            PoolSpec::ConcentratedLiquidity {
                exchange,
                address: pool,
                tokens,
                fee_ppm,
                liquidity,
                sqrt_price_x96,
                tick,
                tick_spacing,
            } => {
                let id = SourceId::new(*exchange, address(pool)?);
                let spacing = tick_spacing.unwrap_or_else(|| crate::pool::concentrated::tick_spacing_for_fee(*fee_ppm));
                LiquiditySource::ConcentratedLiquidity(ConcentratedPool::new(
                    id,
                    Self::token(table, &tokens[0], U256::ZERO)?,
                    Self::token(table, &tokens[1], U256::ZERO)?,
                    *fee_ppm,
                    u128_value(liquidity)?,
                    uint(sqrt_price_x96)?,
                    *tick,
                    spacing,
                )?)
            }
            PoolSpec::OrderBook {
                exchange,
                address: pool,
                tokens,
                fee_ppm,
                strategies,
            } => {
                let id = SourceId::new(*exchange, address(pool)?);
                let strategies = strategies
                    .iter()
                    .map(|s| {
                        Ok(Strategy {
                            id: uint(&s.id)?,
                            orders: [s.orders[0].to_order()?, s.orders[1].to_order()?],
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                LiquiditySource::OrderBook(OrderBookSource::new(
                    id,
                    Self::token(table, &tokens[0], U256::ZERO)?,
                    Self::token(table, &tokens[1], U256::ZERO)?,
                    *fee_ppm,
                    strategies,
                )?)
            }
            PoolSpec::Weighted {
                exchange,
                address: pool,
                pool_id,
                tokens,
                balances,
                weights,
                fee,
            } => {
                if tokens.len() != balances.len() {
                    anyhow::bail!("Weighted pool {}: {} tokens but {} balances", pool, tokens.len(), balances.len());
                }
                let id = SourceId::new(*exchange, address(pool)?);
                let tokens = tokens
                    .iter()
                    .zip(balances)
                    .map(|(t, b)| Self::token(table, t, uint(b)?))
                    .collect::<Result<Vec<_>>>()?;
                let pool_id = B256::from_str(pool_id.trim()).with_context(|| format!("Invalid pool id: {}", pool_id))?;
                LiquiditySource::Weighted(WeightedPool::new(id, pool_id, tokens, weights.clone(), *fee)?)
            }
        };
        if source.kind() != source.id().exchange.kind() {
            warn!(
                "Source {} is {} but {} usually lists {} sources",
                source.id(),
                source.kind(),
                source.id().exchange,
                source.id().exchange.kind()
            );
        }
        Ok(source)
    }

    /// Snapshot book holding every pool at the scenario block
    pub fn snapshot_book(&self) -> Result<SnapshotBook> {
        let table = self.token_table()?;
        let book = SnapshotBook::new();
        for spec in &self.pools {
            book.update_source(Self::source(spec, &table)?, self.block);
        }
        Ok(book)
    }

    pub fn tick_table(&self) -> Result<TickTable> {
        let mut table = TickTable::new();
        for t in &self.ticks {
            table.insert(address(&t.pool)?, t.tick, i128_value(&t.net_liquidity)?);
        }
        Ok(table)
    }

    /// Candidate legs of every cycle, in file order
    pub fn legs(&self) -> Result<Vec<Vec<CycleLeg>>> {
        self.cycles
            .iter()
            .map(|legs| {
                legs.iter()
                    .map(|l| {
                        Ok(CycleLeg::new(
                            l.exchange,
                            address(&l.pool)?,
                            address(&l.token_in)?,
                            address(&l.token_out)?,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    /// Resolve every cycle against `book`; lookup failures stay per cycle
    pub fn build_cycles(&self, book: &SnapshotBook, wrapped_native: Address) -> Result<Vec<Result<Cycle, SequenceError>>> {
        Ok(self
            .legs()?
            .iter()
            .map(|legs| book.build_cycle(legs, wrapped_native))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "block": 100,
        "tokens": [
            {"symbol": "T1", "address": "0x1111111111111111111111111111111111111111", "decimals": 18},
            {"symbol": "T2", "address": "0x2222222222222222222222222222222222222222", "decimals": 18},
            {"symbol": "T3", "address": "0x3333333333333333333333333333333333333333", "decimals": 18}
        ],
        "pools": [
            {"kind": "constant_product", "exchange": "bancor_v3",
             "address": "0xa0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0",
             "tokens": ["0x1111111111111111111111111111111111111111", "0x2222222222222222222222222222222222222222"],
             "balances": ["1000000000000000000000", "2000000000000000000000"], "fee": "0.003"},
            {"kind": "constant_product", "exchange": "uniswap_v2",
             "address": "0xb0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0",
             "tokens": ["0x2222222222222222222222222222222222222222", "0x3333333333333333333333333333333333333333"],
             "balances": ["500000000000000000000", "1500000000000000000000"], "fee": 0.003},
            {"kind": "constant_product", "exchange": "bancor_v3",
             "address": "0xc0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0",
             "tokens": ["0x3333333333333333333333333333333333333333", "0x1111111111111111111111111111111111111111"],
             "balances": ["2200000000000000000000", "1050000000000000000000"], "fee": "0.003"},
            {"kind": "order_book", "exchange": "carbon_v1",
             "address": "0xcacacacacacacacacacacacacacacacacacacaca",
             "tokens": ["0x2222222222222222222222222222222222222222", "0x3333333333333333333333333333333333333333"],
             "fee_ppm": 2000,
             "strategies": [{"id": "7", "orders": [
                {"y": "0", "z": "0", "a": 0, "b": 0},
                {"liquidity": "500000000000000000000", "lowest_rate": "1.2", "highest_rate": "1.3", "marginal_rate": "1.25"}
             ]}]}
        ],
        "ticks": [{"pool": "0x5555555555555555555555555555555555555555", "tick": 60, "net_liquidity": "-42"}],
        "cycles": [[
            {"exchange": "bancor_v3", "pool": "0xa0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0",
             "token_in": "0x1111111111111111111111111111111111111111", "token_out": "0x2222222222222222222222222222222222222222"},
            {"exchange": "uniswap_v2", "pool": "0xb0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0",
             "token_in": "0x2222222222222222222222222222222222222222", "token_out": "0x3333333333333333333333333333333333333333"},
            {"exchange": "bancor_v3", "pool": "0xc0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0",
             "token_in": "0x3333333333333333333333333333333333333333", "token_out": "0x1111111111111111111111111111111111111111"}
        ], [
            {"exchange": "bancor_v3", "pool": "0xdededededededededededededededededededede",
             "token_in": "0x1111111111111111111111111111111111111111", "token_out": "0x2222222222222222222222222222222222222222"}
        ]]
    }"#;

    #[test]
    fn test_parse_and_build_book() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        let book = scenario.snapshot_book().unwrap();
        assert_eq!(book.len(), 4);
        let carbon = book
            .get(Exchange::CarbonV1, Address::repeat_byte(0xca))
            .unwrap();
        match carbon.as_ref() {
            LiquiditySource::OrderBook(ob) => {
                assert_eq!(ob.strategies.len(), 1);
                assert!(!ob.strategies[0].orders[0].is_active());
                assert!(ob.strategies[0].orders[1].is_active());
            }
            other => panic!("unexpected source {:?}", other.kind()),
        }
        let ticks = scenario.tick_table().unwrap();
        assert_eq!(ticks.len(), 1);
    }

    #[test]
    fn test_cycles_resolve_per_entry() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        let book = scenario.snapshot_book().unwrap();
        let cycles = scenario.build_cycles(&book, Address::ZERO).unwrap();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].as_ref().unwrap().len(), 3);
        assert!(matches!(cycles[1], Err(SequenceError::MissingSnapshot { hop: 0, .. })));
    }

    #[test]
    fn test_undeclared_token_rejected() {
        let broken = SCENARIO.replace(
            "{\"symbol\": \"T3\", \"address\": \"0x3333333333333333333333333333333333333333\", \"decimals\": 18}",
            "{\"symbol\": \"T3\", \"address\": \"0x4444444444444444444444444444444444444444\", \"decimals\": 18}",
        );
        let scenario = Scenario::from_json(&broken).unwrap();
        assert!(scenario.snapshot_book().is_err());
    }

    #[test]
    fn test_bad_integer_rejected() {
        assert!(uint("12x").is_err());
        assert!(u128_value("340282366920938463463374607431768211456").is_err());
        assert_eq!(i128_value(" -5 ").unwrap(), -5);
    }
}
