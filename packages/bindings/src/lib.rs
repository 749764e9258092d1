use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use std::time::Instant;

use dcf_engine_core::valuation::bridge::{round_price, BridgeStatus};
use dcf_engine_core::valuation::margins::estimate_margins;
use dcf_engine_core::valuation::wacc::calculate_wacc as core_calculate_wacc;
use dcf_engine_core::{
    with_metadata, Assumptions, CalculationTrace, DcfEngine, EngineConfig, FinancialSnapshot,
};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_inputs(
    snapshot_json: &str,
    assumptions_json: &str,
) -> NapiResult<(FinancialSnapshot, Assumptions)> {
    let snapshot: FinancialSnapshot = serde_json::from_str(snapshot_json).map_err(to_napi_error)?;
    let assumptions: Assumptions =
        serde_json::from_str(assumptions_json).map_err(to_napi_error)?;
    Ok((snapshot, assumptions))
}

/// Rates cross the boundary as strings so no precision is lost to f64.
fn parse_rate(field: &str, value: &str) -> NapiResult<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|e| to_napi_error(format!("Invalid {field} '{value}': {e}")))
}

fn parse_config(config_json: Option<String>) -> NapiResult<EngineConfig> {
    match config_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi_error),
        None => Ok(EngineConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

/// Full report: target price, WACC breakdown, forecast and sensitivity grid.
#[napi]
pub fn compute_valuation(
    snapshot_json: String,
    assumptions_json: String,
    config_json: Option<String>,
) -> NapiResult<String> {
    let (snapshot, assumptions) = parse_inputs(&snapshot_json, &assumptions_json)?;
    let config = parse_config(config_json)?;
    let mut engine = DcfEngine::with_config(&snapshot, assumptions, config);
    let output = engine.run_report().map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn compute_sensitivity(
    snapshot_json: String,
    assumptions_json: String,
    config_json: Option<String>,
) -> NapiResult<String> {
    let start = Instant::now();
    let (snapshot, assumptions) = parse_inputs(&snapshot_json, &assumptions_json)?;
    let config = parse_config(config_json)?;
    let mut engine = DcfEngine::with_config(&snapshot, assumptions, config);
    let grid = engine.compute_sensitivity().map_err(to_napi_error)?;
    let output = with_metadata(
        "12-month DCF target price across WACC x terminal growth",
        engine.assumptions(),
        engine.warnings().to_vec(),
        start.elapsed().as_micros() as u64,
        grid,
    );
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Serialize)]
struct SinglePrice {
    wacc: Decimal,
    terminal_growth_rate: Decimal,
    price: Decimal,
    unrounded_price: Decimal,
    status: BridgeStatus,
    warnings: Vec<String>,
}

#[napi]
pub fn compute_single_price(
    snapshot_json: String,
    assumptions_json: String,
    wacc: String,
    growth: String,
) -> NapiResult<String> {
    let (snapshot, assumptions) = parse_inputs(&snapshot_json, &assumptions_json)?;
    let wacc = parse_rate("wacc", &wacc)?;
    let growth = parse_rate("growth", &growth)?;
    let mut engine = DcfEngine::new(&snapshot, assumptions);
    let result = engine
        .compute_single_result(wacc, growth)
        .map_err(to_napi_error)?;
    serde_json::to_string(&SinglePrice {
        wacc,
        terminal_growth_rate: growth,
        price: round_price(result.target_price),
        unrounded_price: result.target_price,
        status: result.status,
        warnings: engine.warnings().to_vec(),
    })
    .map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_wacc(snapshot_json: String) -> NapiResult<String> {
    let snapshot: FinancialSnapshot =
        serde_json::from_str(&snapshot_json).map_err(to_napi_error)?;
    let output = core_calculate_wacc(&snapshot, &EngineConfig::default()).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi(js_name = "estimateMargins")]
pub fn estimate_historical_margins(snapshot_json: String) -> NapiResult<String> {
    let start = Instant::now();
    let snapshot: FinancialSnapshot =
        serde_json::from_str(&snapshot_json).map_err(to_napi_error)?;
    snapshot.validate().map_err(to_napi_error)?;
    let mut trace = CalculationTrace::new();
    let margins = estimate_margins(&snapshot, &mut trace).map_err(to_napi_error)?;
    let output = with_metadata(
        "Unweighted mean of historical line items over revenue",
        &snapshot,
        Vec::new(),
        start.elapsed().as_micros() as u64,
        margins,
    );
    serde_json::to_string(&output).map_err(to_napi_error)
}
