//! Configuration management
//!
//! Engine settings come from a TOML file with serde defaults, then
//! `ARB_*` environment variables (a `.env` file is honoured) override
//! individual keys.
//!
//! Created: 2026-01-28
//! Modified: 2026-10-18 - Engine/settlement/router sections, env overrides

use alloy::primitives::{address, Address};
use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::types::Exchange;

/// Wrapped ether on mainnet
pub const DEFAULT_WRAPPED_NATIVE: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

// ── TOML layout ──────────────────────────────────────────────────────────────

/// Top-level TOML configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub settlement: SettlementSection,
    /// Venue name -> router / controller / vault address
    #[serde(default)]
    pub routers: HashMap<String, String>,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_max_cross_tick_checks")]
    pub max_cross_tick_checks: usize,
    #[serde(default = "default_max_search_iterations")]
    pub max_search_iterations: usize,
    #[serde(default)]
    pub min_profit: Decimal,
    #[serde(default = "default_wrapped_native")]
    pub wrapped_native: String,
    #[serde(default = "default_base_venues")]
    pub base_venues: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementSection {
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_true")]
    pub sweep_repeated_inputs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_max_cross_tick_checks() -> usize { 20 }
fn default_max_search_iterations() -> usize { 64 }
fn default_wrapped_native() -> String { DEFAULT_WRAPPED_NATIVE.to_string() }
fn default_base_venues() -> Vec<String> { vec![Exchange::BancorV3.to_string()] }
fn default_slippage_bps() -> u32 { 50 }
fn default_deadline_secs() -> u64 { 120 }
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_cross_tick_checks: default_max_cross_tick_checks(),
            max_search_iterations: default_max_search_iterations(),
            min_profit: Decimal::ZERO,
            wrapped_native: default_wrapped_native(),
            base_venues: default_base_venues(),
        }
    }
}

impl Default for SettlementSection {
    fn default() -> Self {
        Self {
            slippage_bps: default_slippage_bps(),
            deadline_secs: default_deadline_secs(),
            sweep_repeated_inputs: true,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ── Parsed configuration ─────────────────────────────────────────────────────

/// Validated engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Range crossings allowed per concentrated-liquidity hop
    pub max_cross_tick_checks: usize,
    /// Iterations for hops without a closed form
    pub max_search_iterations: usize,
    /// Profit floor in the cycle's start token (decimal units)
    pub min_profit: Decimal,
    pub wrapped_native: Address,
    /// Venues allowed at the first and last hop
    pub base_venues: Vec<Exchange>,
    pub slippage_bps: u32,
    pub deadline_secs: u64,
    pub sweep_repeated_inputs: bool,
    pub routers: HashMap<Exchange, Address>,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cross_tick_checks: default_max_cross_tick_checks(),
            max_search_iterations: default_max_search_iterations(),
            min_profit: Decimal::ZERO,
            wrapped_native: DEFAULT_WRAPPED_NATIVE,
            base_venues: vec![Exchange::BancorV3],
            slippage_bps: default_slippage_bps(),
            deadline_secs: default_deadline_secs(),
            sweep_repeated_inputs: true,
            routers: HashMap::new(),
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn parse_address(value: &str, what: &str) -> Result<Address> {
    Address::from_str(value.trim()).with_context(|| format!("Invalid {} address: {}", what, value))
}

fn parse_exchange(value: &str) -> Result<Exchange> {
    Exchange::from_str(value).map_err(|e| anyhow!(e))
}

fn env_override<T>(key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Ok(value) = std::env::var(key) {
        *target = value
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, value))?;
        debug!("Config override from {}", key);
    }
    Ok(())
}

impl EngineConfig {
    /// Convert the raw TOML layout, parsing addresses and venue names
    pub fn from_toml(raw: &TomlConfig) -> Result<Self> {
        if raw.settlement.slippage_bps > 10_000 {
            anyhow::bail!("slippage_bps must be at most 10000, got {}", raw.settlement.slippage_bps);
        }
        let base_venues = raw
            .engine
            .base_venues
            .iter()
            .map(|v| parse_exchange(v))
            .collect::<Result<Vec<_>>>()
            .context("Invalid base_venues")?;
        let routers = raw
            .routers
            .iter()
            .map(|(venue, addr)| Ok((parse_exchange(venue)?, parse_address(addr, venue)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self {
            max_cross_tick_checks: raw.engine.max_cross_tick_checks,
            max_search_iterations: raw.engine.max_search_iterations.max(1),
            min_profit: raw.engine.min_profit,
            wrapped_native: parse_address(&raw.engine.wrapped_native, "wrapped_native")?,
            base_venues,
            slippage_bps: raw.settlement.slippage_bps,
            deadline_secs: raw.settlement.deadline_secs,
            sweep_repeated_inputs: raw.settlement.sweep_repeated_inputs,
            routers,
            log_level: raw.logging.level.clone(),
            log_json: raw.logging.json,
        })
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let raw: TomlConfig = toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;
        Self::from_toml(&raw)
    }

    /// Apply `ARB_*` environment overrides on top of file settings
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        env_override("ARB_MAX_CROSS_TICK_CHECKS", &mut self.max_cross_tick_checks)?;
        env_override("ARB_MAX_SEARCH_ITERATIONS", &mut self.max_search_iterations)?;
        env_override("ARB_MIN_PROFIT", &mut self.min_profit)?;
        env_override("ARB_SLIPPAGE_BPS", &mut self.slippage_bps)?;
        env_override("ARB_DEADLINE_SECS", &mut self.deadline_secs)?;
        env_override("ARB_SWEEP_REPEATED_INPUTS", &mut self.sweep_repeated_inputs)?;
        env_override("ARB_WRAPPED_NATIVE", &mut self.wrapped_native)?;
        if let Ok(level) = std::env::var("ARB_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(venues) = std::env::var("ARB_BASE_VENUES") {
            self.base_venues = venues
                .split(',')
                .filter(|v| !v.trim().is_empty())
                .map(parse_exchange)
                .collect::<Result<Vec<_>>>()
                .context("Invalid ARB_BASE_VENUES")?;
        }
        if self.slippage_bps > 10_000 {
            anyhow::bail!("ARB_SLIPPAGE_BPS must be at most 10000, got {}", self.slippage_bps);
        }
        Ok(())
    }

    pub fn is_base_venue(&self, exchange: Exchange) -> bool {
        self.base_venues.contains(&exchange)
    }

    pub fn router(&self, exchange: Exchange) -> Option<Address> {
        self.routers.get(&exchange).copied()
    }
}

/// Load `.env`, then the TOML file if given, then environment overrides
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    dotenv::dotenv().ok();
    let mut config = match path {
        Some(p) => EngineConfig::load(p)?,
        None => EngineConfig::default(),
    };
    config.apply_env_overrides()?;
    Ok(config)
}
