//! Core data types
//!
//! Tokens, venues and source identifiers shared by the pool and
//! arbitrage modules.
//!
//! Created: 2026-01-28
//! Modified: 2026-10-18 - Venue table with platform ids, canonical token mapping

use alloy::primitives::{address, Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QuoteError;
use crate::math::{decimal_to_wei, wei_to_decimal};

/// Sentinel address used by routers for the chain's native gas token
pub const NATIVE_TOKEN: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// Map the native-token sentinel onto its wrapped form.
///
/// Every token comparison in the engine goes through this so that
/// `ETH` and `WETH` legs chain together.
pub fn canonical_token(token: Address, wrapped_native: Address) -> Address {
    if token == NATIVE_TOKEN {
        wrapped_native
    } else {
        token
    }
}

/// Fungible asset as seen by one liquidity source.
///
/// `balance` is the source-local reserve in the token's integer unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
    pub balance: U256,
}

impl Token {
    pub fn new(symbol: impl Into<String>, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            address,
            decimals,
            balance: U256::ZERO,
        }
    }

    pub fn with_balance(mut self, balance: U256) -> Self {
        self.balance = balance;
        self
    }

    /// Reserve in decimal units (`balance / 10^decimals`)
    pub fn balance_decimal(&self) -> Result<Decimal, QuoteError> {
        wei_to_decimal(self.balance, self.decimals)
    }

    pub fn to_decimal(&self, amount: U256) -> Result<Decimal, QuoteError> {
        wei_to_decimal(amount, self.decimals)
    }

    /// Decimal units back to the integer unit, rounding down
    pub fn to_wei(&self, amount: Decimal) -> Result<U256, QuoteError> {
        decimal_to_wei(amount, self.decimals)
    }
}

/// Liquidity-source variant, used to pick a solver for a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    ConstantProduct,
    ConcentratedLiquidity,
    OrderBook,
    Weighted,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SourceKind::ConstantProduct => write!(f, "cp"),
            SourceKind::ConcentratedLiquidity => write!(f, "cl"),
            SourceKind::OrderBook => write!(f, "ob"),
            SourceKind::Weighted => write!(f, "w"),
        }
    }
}

/// Venues the settlement contract can route through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exchange {
    BancorV2,
    BancorV3,
    UniswapV2,
    SushiswapV2,
    PancakeswapV2,
    UniswapV3,
    SushiswapV3,
    PancakeswapV3,
    CarbonV1,
    BalancerV2,
}

impl Exchange {
    pub const ALL: [Exchange; 10] = [
        Exchange::BancorV2,
        Exchange::BancorV3,
        Exchange::UniswapV2,
        Exchange::SushiswapV2,
        Exchange::PancakeswapV2,
        Exchange::UniswapV3,
        Exchange::SushiswapV3,
        Exchange::PancakeswapV3,
        Exchange::CarbonV1,
        Exchange::BalancerV2,
    ];

    /// Integer venue code understood by the settlement contract.
    /// Forks share the code of the protocol they fork.
    pub fn platform_id(&self) -> u32 {
        match self {
            Exchange::BancorV2 => 1,
            Exchange::BancorV3 => 2,
            Exchange::UniswapV2 | Exchange::SushiswapV2 | Exchange::PancakeswapV2 => 3,
            Exchange::UniswapV3 | Exchange::SushiswapV3 | Exchange::PancakeswapV3 => 4,
            Exchange::CarbonV1 => 6,
            Exchange::BalancerV2 => 7,
        }
    }

    /// Liquidity-source variant snapshots from this venue must have
    pub fn kind(&self) -> SourceKind {
        match self {
            Exchange::BancorV2
            | Exchange::BancorV3
            | Exchange::UniswapV2
            | Exchange::SushiswapV2
            | Exchange::PancakeswapV2 => SourceKind::ConstantProduct,
            Exchange::UniswapV3 | Exchange::SushiswapV3 | Exchange::PancakeswapV3 => {
                SourceKind::ConcentratedLiquidity
            }
            Exchange::CarbonV1 => SourceKind::OrderBook,
            Exchange::BalancerV2 => SourceKind::Weighted,
        }
    }

    /// Router-variant flag for concentrated-liquidity forks whose router
    /// interface differs from Uniswap's (sent as a padded custom_data word)
    pub fn router_variant(&self) -> Option<u8> {
        match self {
            Exchange::PancakeswapV3 => Some(0x01),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::BancorV2 => "bancor_v2",
            Exchange::BancorV3 => "bancor_v3",
            Exchange::UniswapV2 => "uniswap_v2",
            Exchange::SushiswapV2 => "sushiswap_v2",
            Exchange::PancakeswapV2 => "pancakeswap_v2",
            Exchange::UniswapV3 => "uniswap_v3",
            Exchange::SushiswapV3 => "sushiswap_v3",
            Exchange::PancakeswapV3 => "pancakeswap_v3",
            Exchange::CarbonV1 => "carbon_v1",
            Exchange::BalancerV2 => "balancer_v2",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace('-', "_");
        Exchange::ALL
            .iter()
            .find(|e| e.as_str() == key)
            .copied()
            .ok_or_else(|| format!("unknown exchange: '{}'", s))
    }
}

/// Identifies one liquidity source: the venue plus its pool address
/// (or controller address for venues without per-pool contracts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId {
    pub exchange: Exchange,
    pub address: Address,
}

impl SourceId {
    pub fn new(exchange: Exchange, address: Address) -> Self {
        Self { exchange, address }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.address)
    }
}
