use dcf_engine_core::time_value::present_value_of_stream;
use dcf_engine_core::valuation::bridge::{value_from_cash_flows, BridgeInput, BridgeStatus};
use dcf_engine_core::valuation::forecast::ufcf_stream;
use dcf_engine_core::valuation::margins::estimate_margins;
use dcf_engine_core::valuation::report::ReportOptions;
use dcf_engine_core::valuation::wacc::calculate_wacc;
use dcf_engine_core::{
    Assumptions, CalculationTrace, DcfEngine, DcfError, EngineConfig, FinancialSnapshot,
};
use pretty_assertions::assert_eq;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

// ===========================================================================
// Fixtures
// ===========================================================================

/// Debt-free company growing 10% a year at a constant 20% EBIT margin.
fn acme() -> FinancialSnapshot {
    serde_json::from_value(serde_json::json!({
        "years": ["2021", "2022", "2023"],
        "revenue": ["100", "110", "121"],
        "ebit": ["20", "22", "24.2"],
        "net_income": ["15.8", "17.38", "19.118"],
        "effective_tax_rate": ["0.21", "0.21", "0.21"],
        "current_assets": ["40", "40", "40"],
        "current_liabilities": ["10", "10", "10"],
        "cash_and_equivalents": ["20", "20", "20"],
        "total_assets": ["200", "210", "220"],
        "total_liabilities": ["80", "82", "84"],
        "ppe_net": ["60", "61", "62"],
        "d_and_a": ["5", "5", "5"],
        "capex": ["-6", "-6", "-6"],
        "shares_outstanding": "100",
        "beta": "1.0",
        "stock_price": "50",
        "market_cap": "5000",
        "risk_free_rate": "0.04",
        "market_return_rate": "0.10"
    }))
    .unwrap()
}

fn base_assumptions() -> Assumptions {
    Assumptions::new(vec![dec!(0.05); 5], dec!(0.025)).unwrap()
}

fn assert_close(actual: Decimal, expected: Decimal, tolerance: Decimal) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} +/- {tolerance}, got {actual}"
    );
}

// ===========================================================================
// Base case
// ===========================================================================

#[test]
fn test_reference_company_target_price() {
    let snap = acme();
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    let v = engine.compute_valuation().unwrap();

    // Ke = 4% + 1.0 * 6%; no debt, so WACC = Ke
    assert_eq!(v.wacc, dec!(0.10));
    assert_eq!(v.result.status, BridgeStatus::Defined);
    assert_eq!(v.target_price, dec!(2.94));
    assert_close(v.result.target_price, dec!(2.9383658362), dec!(0.0000001));
}

#[test]
fn test_reference_company_forecast() {
    let snap = acme();
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    let v = engine.compute_valuation().unwrap();

    let y1 = &v.forecast[0];
    assert_eq!(y1.revenue, dec!(127.05));
    assert_close(y1.ebit, dec!(25.41), dec!(0.0000001));
    assert_close(y1.ufcf, dec!(17.3304), dec!(0.0000001));
    assert_close(v.forecast[4].ufcf, dec!(22.32123264), dec!(0.0000001));
    assert_close(v.result.terminal_value, dec!(305.05684608), dec!(0.000001));
    assert_close(v.result.enterprise_value, dec!(264.6972578376), dec!(0.000001));
    // net debt = 0 debt - 20 cash
    assert_eq!(v.result.net_debt, dec!(-20));
}

#[test]
fn test_compute_valuation_is_idempotent() {
    let snap = acme();
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    let first = engine.compute_valuation().unwrap();
    let second = engine.compute_valuation().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_trace_covers_every_phase() {
    let snap = acme();
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    let v = engine.compute_valuation().unwrap();

    for title in [
        " PHASE 1: HISTORICAL DRIVERS (BASELINE)",
        " CALCULATING WACC",
        " PHASE 2 & 3: PROJECTIONS & UFCF",
        " PHASE 4: DCF VALUATION",
        " PHASE 5: 12-MONTH TARGET PRICE BRIDGE",
        " FINAL TARGET PRICE: $2.94",
    ] {
        assert!(v.trace.iter().any(|l| l == title), "missing trace line {title:?}");
    }
}

#[test]
fn test_forecast_stream_matches_bridge_stage1() {
    let snap = acme();
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    let v = engine.compute_valuation().unwrap();

    let ufcfs = ufcf_stream(&v.forecast);
    let (discounted, stage1) = present_value_of_stream(v.wacc, &ufcfs).unwrap();
    assert_eq!(stage1, v.result.stage1_pv);
    assert_eq!(discounted, v.result.discounted_ufcfs);
}

#[test]
fn test_standalone_bridge_matches_engine() {
    let snap = acme();
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    let v = engine.compute_valuation().unwrap();

    let input = BridgeInput {
        total_debt: Decimal::ZERO,
        cash: dec!(20),
        shares_outstanding: dec!(100),
    };
    let direct =
        value_from_cash_flows(v.wacc, dec!(0.025), &ufcf_stream(&v.forecast), &input).unwrap();
    assert_eq!(direct, v.result);
}

// ===========================================================================
// Undefined and degenerate cases
// ===========================================================================

#[test]
fn test_growth_equal_to_wacc_returns_zero_price() {
    let snap = acme();
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    assert_eq!(engine.compute_single(dec!(0.05), dec!(0.05)).unwrap(), Decimal::ZERO);

    let assumptions = Assumptions::new(vec![dec!(0.05); 5], dec!(0.10)).unwrap();
    let mut engine = DcfEngine::new(&snap, assumptions);
    let v = engine.compute_valuation().unwrap();
    assert_eq!(v.target_price, Decimal::ZERO);
    assert!(!v.result.is_defined());
}

#[test]
fn test_zero_historical_revenue_is_an_error() {
    let mut snap = acme();
    snap.revenue[0] = Decimal::ZERO;
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    match engine.compute_valuation().unwrap_err() {
        DcfError::DivisionUndefined { context } => assert!(context.contains("2021")),
        e => panic!("Expected DivisionUndefined, got {e:?}"),
    }

    let mut trace = CalculationTrace::new();
    assert!(estimate_margins(&snap, &mut trace).is_err());
}

#[test]
fn test_zero_capitalisation_uses_fallback_wacc() {
    let mut snap = acme();
    snap.market_cap = Decimal::ZERO;
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    let v = engine.compute_valuation().unwrap();
    assert_eq!(v.wacc, dec!(0.10));
    assert!(engine.base_wacc().unwrap().wacc_defaulted);
}

#[test]
fn test_malformed_snapshot_rejected() {
    let mut snap = acme();
    snap.d_and_a.pop();
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    match engine.compute_valuation().unwrap_err() {
        DcfError::InvalidInput { field, .. } => assert_eq!(field, "d_and_a"),
        e => panic!("Expected InvalidInput, got {e:?}"),
    }
}

#[test]
fn test_longer_horizon_discounts_terminal_value_further() {
    let snap = acme();
    let seven = Assumptions {
        revenue_growth_rates: vec![dec!(0.05); 7],
        terminal_growth_rate: dec!(0.025),
        projection_years: 7,
    };
    let mut engine = DcfEngine::new(&snap, seven);
    let v = engine.compute_valuation().unwrap();

    assert_eq!(v.forecast.len(), 7);
    let factor = (Decimal::ONE + v.wacc).powi(7);
    assert_close(
        v.result.pv_terminal_value,
        v.result.terminal_value / factor,
        dec!(0.0000000001),
    );
}

// ===========================================================================
// Sensitivity
// ===========================================================================

#[test]
fn test_sensitivity_grid_reference_values() {
    let snap = acme();
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    let grid = engine.compute_sensitivity().unwrap();

    assert_eq!(
        grid.growth_steps,
        vec![dec!(0.005), dec!(0.015), dec!(0.025), dec!(0.035), dec!(0.045)]
    );
    assert_eq!(
        grid.wacc_steps(),
        vec![dec!(0.09), dec!(0.095), dec!(0.10), dec!(0.105), dec!(0.11)]
    );

    let tol = dec!(0.0001);
    assert_close(grid.price_at(0, 0).unwrap(), dec!(2.7392), tol);
    assert_close(grid.price_at(0, 4).unwrap(), dec!(4.5417), tol);
    assert_close(grid.price_at(2, 2).unwrap(), dec!(2.9384), tol);
    assert_close(grid.price_at(4, 0).unwrap(), dec!(2.2479), tol);
    assert_close(grid.price_at(4, 4).unwrap(), dec!(3.2044), tol);
}

#[test]
fn test_sensitivity_monotone_in_both_directions() {
    let snap = acme();
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    let grid = engine.compute_sensitivity().unwrap();

    for row in &grid.rows {
        assert!(row.prices.windows(2).all(|p| p[1] > p[0]));
    }
    for col in 0..grid.growth_steps.len() {
        let column: Vec<Decimal> = grid.rows.iter().map(|r| r.prices[col]).collect();
        assert!(column.windows(2).all(|p| p[1] < p[0]));
    }
}

#[test]
fn test_sensitivity_centre_equals_headline() {
    let snap = acme();
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    let v = engine.compute_valuation().unwrap();
    let grid = engine.compute_sensitivity().unwrap();
    assert_eq!(grid.base_price().map(|p| p.round_dp(2)), Some(v.target_price));
}

// ===========================================================================
// Standalone WACC and report
// ===========================================================================

#[test]
fn test_standalone_wacc_weights_sum_to_one() {
    let mut snap = acme();
    snap.total_debt = vec![dec!(900), dec!(950), dec!(1000)];
    snap.interest_expense = vec![dec!(-40), dec!(-45), dec!(-50)];
    let out = calculate_wacc(&snap, &EngineConfig::default()).unwrap();
    let w = &out.result;

    assert_eq!(w.equity_weight + w.debt_weight + w.preferred_weight, Decimal::ONE);
    // Kd = 50 / 1000 = 5%, after tax 3.95%
    assert_eq!(w.after_tax_cost_of_debt, dec!(0.0395));
    // 5000/6000 * 10% + 1000/6000 * 3.95%
    assert_close(w.wacc, dec!(0.0899166666667), dec!(0.0000000001));
}

#[test]
fn test_report_upside_and_company_data() {
    let snap = acme();
    let mut engine = DcfEngine::new(&snap, base_assumptions());
    let out = engine
        .run_report_with(ReportOptions {
            ticker: Some("ACME".into()),
            include_sensitivity: true,
        })
        .unwrap();
    let report = out.result;

    assert_eq!(report.target_price, dec!(2.94));
    // 2.94 / 50 - 1
    assert_eq!(report.upside, dec!(-0.9412));
    assert_eq!(report.company.market_cap, dec!(5000));
    assert_eq!(report.company.total_debt, Decimal::ZERO);
    assert!(report.sensitivity.is_some());
}
