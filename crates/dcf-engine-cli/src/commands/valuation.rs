use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use dcf_engine_core::valuation::bridge::{round_price, BridgeStatus};
use dcf_engine_core::valuation::report::ReportOptions;
use dcf_engine_core::{with_metadata, DcfEngine};

use super::model::{load_model, ModelArgs};

/// Arguments for the full valuation report
#[derive(Args)]
pub struct ValueArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Omit the WACC x growth sensitivity grid
    #[arg(long)]
    pub skip_sensitivity: bool,
}

/// Arguments for the sensitivity grid
#[derive(Args)]
pub struct SensitivityArgs {
    #[command(flatten)]
    pub model: ModelArgs,
}

/// Arguments for a what-if price
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct PriceArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Discount rate to value at (e.g. 0.09 for 9%)
    #[arg(long)]
    pub wacc: Decimal,

    /// Terminal growth rate to value at
    #[arg(long)]
    pub growth: Decimal,
}

#[derive(Debug, Serialize)]
struct WhatIfPrice {
    wacc: Decimal,
    terminal_growth_rate: Decimal,
    /// Rounded to cents
    price: Decimal,
    unrounded_price: Decimal,
    status: BridgeStatus,
}

pub fn run_value(args: ValueArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let model = load_model(&args.model)?;
    let mut engine = DcfEngine::with_config(&model.snapshot, model.assumptions, model.config);
    let report = engine.run_report_with(ReportOptions {
        ticker: model.ticker,
        include_sensitivity: !args.skip_sensitivity,
    })?;

    tracing::info!(
        ticker = report.result.ticker.as_deref().unwrap_or("-"),
        target_price = %report.result.target_price,
        wacc = %report.result.wacc.wacc,
        "valuation complete"
    );
    Ok(serde_json::to_value(report)?)
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let model = load_model(&args.model)?;
    let mut engine = DcfEngine::with_config(&model.snapshot, model.assumptions, model.config);
    let grid = engine.compute_sensitivity()?;

    let elapsed = start.elapsed().as_micros() as u64;
    let output = with_metadata(
        "12-month DCF target price across WACC x terminal growth",
        engine.assumptions(),
        engine.warnings().to_vec(),
        elapsed,
        grid,
    );
    Ok(serde_json::to_value(output)?)
}

pub fn run_price(mut args: PriceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    // The what-if growth doubles as the terminal assumption when none is given
    if args.model.terminal_growth.is_none() {
        args.model.terminal_growth = Some(args.growth);
    }
    let model = load_model(&args.model)?;
    let mut engine = DcfEngine::with_config(&model.snapshot, model.assumptions, model.config);
    let result = engine.compute_single_result(args.wacc, args.growth)?;

    let elapsed = start.elapsed().as_micros() as u64;
    let output = with_metadata(
        "12-month DCF target price at a chosen WACC and terminal growth",
        engine.assumptions(),
        engine.warnings().to_vec(),
        elapsed,
        WhatIfPrice {
            wacc: args.wacc,
            terminal_growth_rate: args.growth,
            price: round_price(result.target_price),
            unrounded_price: result.target_price,
            status: result.status,
        },
    );
    Ok(serde_json::to_value(output)?)
}
