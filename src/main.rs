//! DEX Arbitrage Engine
//!
//! Offline entry point: loads engine configuration and a JSON scenario
//! (pool snapshots, tick table, candidate cycles), solves every cycle in
//! parallel and prints settlement records plus contract calldata as JSON.
//!
//! Created: 2026-01-27
//! Modified: 2026-10-18 - Scenario-driven cycle solving and settlement report

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use dexarb_engine::arbitrage::settlement::{encode_flashloan_call, routes_for};
use dexarb_engine::arbitrage::{ArbEngine, SettlementBuilder, SettlementView, SolveOutcome, SolveSummary};
use dexarb_engine::config::{load_config, EngineConfig};
use dexarb_engine::scenario::Scenario;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Cyclic arbitrage sizing and settlement
#[derive(Parser)]
#[command(name = "dexarb-engine")]
struct Args {
    /// Engine configuration (TOML)
    #[arg(short, long, env = "ARB_CONFIG")]
    config: Option<PathBuf>,

    /// Scenario with pools, ticks and candidate cycles (JSON)
    #[arg(short, long)]
    scenario: PathBuf,

    /// Override slippage tolerance in basis points
    #[arg(long)]
    slippage_bps: Option<u32>,
}

#[derive(Debug, Serialize)]
struct CycleReport {
    index: usize,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<SolveSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    settlement: Vec<SettlementView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    calldata: Option<String>,
}

impl CycleReport {
    fn failed(index: usize, error: impl ToString) -> Self {
        Self {
            index,
            status: "error",
            summary: None,
            error: Some(error.to_string()),
            settlement: Vec::new(),
            calldata: None,
        }
    }
}

fn init_tracing(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn settle(index: usize, outcome: SolveOutcome, config: &EngineConfig, deadline: u64) -> CycleReport {
    let solved = match outcome {
        SolveOutcome::NoArbitrage => {
            return CycleReport {
                index,
                status: "no_arbitrage",
                summary: None,
                error: None,
                settlement: Vec::new(),
                calldata: None,
            }
        }
        SolveOutcome::Profitable(solved) => solved,
    };
    if solved.exhausted() {
        warn!("Cycle {} sized with an exhausted tick walk", index);
    }

    let builder = SettlementBuilder::from_config(config);
    let records = match builder.build(&solved, config.slippage_bps, deadline) {
        Ok(records) => records,
        Err(e) => return CycleReport::failed(index, e),
    };
    let calldata = match routes_for(&solved, &records, config).and_then(|routes| encode_flashloan_call(&solved, routes)) {
        Ok(data) => data,
        Err(e) => return CycleReport::failed(index, e),
    };

    CycleReport {
        index,
        status: "profitable",
        summary: Some(SolveSummary::from(&*solved)),
        error: None,
        settlement: records.iter().map(SettlementView::from).collect(),
        calldata: Some(calldata.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bps) = args.slippage_bps {
        if bps > 10_000 {
            anyhow::bail!("--slippage-bps must be at most 10000, got {}", bps);
        }
        config.slippage_bps = bps;
    }
    init_tracing(&config);

    info!("DEX Arbitrage Engine starting");
    info!(
        "Max tick crossings: {}, slippage: {} bps, min profit: {}",
        config.max_cross_tick_checks, config.slippage_bps, config.min_profit
    );

    let scenario = Scenario::load(&args.scenario)?;
    let book = scenario.snapshot_book()?;
    let ticks = Arc::new(scenario.tick_table()?);
    let (blocks, oldest, newest) = book.stats();
    info!("Snapshot book: {} sources (blocks {}..={})", blocks, oldest, newest);

    let engine = Arc::new(ArbEngine::new(config.clone(), ticks));

    let mut reports = Vec::new();
    let mut runnable = Vec::new();
    let mut runnable_index = Vec::new();
    for (index, built) in scenario.build_cycles(&book, config.wrapped_native)?.into_iter().enumerate() {
        match built {
            Ok(cycle) => {
                runnable_index.push(index);
                runnable.push(cycle);
            }
            Err(e) => {
                error!("Cycle {} rejected: {}", index, e);
                reports.push(CycleReport::failed(index, e));
            }
        }
    }

    let deadline = u64::try_from(Utc::now().timestamp()).unwrap_or_default() + config.deadline_secs;
    let outcomes = engine.solve_batch(runnable).await?;
    for (index, outcome) in runnable_index.into_iter().zip(outcomes) {
        let report = match outcome {
            Ok(outcome) => settle(index, outcome, &config, deadline),
            Err(e) => {
                error!("Cycle {} failed: {}", index, e);
                CycleReport::failed(index, e)
            }
        };
        reports.push(report);
    }
    reports.sort_by_key(|r| r.index);

    let profitable = reports.iter().filter(|r| r.status == "profitable").count();
    info!("Solved {} cycles, {} profitable", reports.len(), profitable);
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
