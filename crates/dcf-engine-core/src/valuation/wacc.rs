use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::EngineConfig;
use crate::snapshot::FinancialSnapshot;
use crate::trace::{fmt_money, fmt_number, fmt_pct, CalculationTrace};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::DcfResult;

/// Output of the WACC calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaccOutput {
    /// Weighted average cost of capital
    pub wacc: Rate,
    /// Cost of equity via CAPM
    pub cost_of_equity: Rate,
    /// Pre-tax cost of debt (interest / total debt, or the configured default)
    pub cost_of_debt_pretax: Rate,
    /// Tax rate applied to the debt shield
    pub tax_rate: Rate,
    /// After-tax cost of debt
    pub after_tax_cost_of_debt: Rate,
    /// Preferred dividends / preferred equity
    pub cost_of_preferred: Rate,
    pub equity_weight: Rate,
    pub debt_weight: Rate,
    pub preferred_weight: Rate,
    /// Market cap + total debt + preferred equity
    pub total_capital: Money,
    /// Cost of debt fell back to the configured default (no reported debt)
    pub cost_of_debt_defaulted: bool,
    /// Tax rate fell back to the configured default
    pub tax_rate_defaulted: bool,
    /// Total capital was zero, so the configured fallback WACC was returned
    pub wacc_defaulted: bool,
}

/// Calculate WACC from a snapshot's latest balance sheet and market data.
///
/// Cost of equity: Ke = Rf + Beta * (Rm - Rf)
/// After-tax cost of debt: Kd_at = |interest| / debt * (1 - t)
/// Cost of preferred: Kp = |preferred dividends| / preferred equity
/// WACC = Ke * We + Kd_at * Wd + Kp * Wp, market-value weights
pub fn calculate_wacc(
    snapshot: &FinancialSnapshot,
    config: &EngineConfig,
) -> DcfResult<ComputationOutput<WaccOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let mut trace = CalculationTrace::new();

    snapshot.validate()?;
    config.validate()?;

    let output = compute_wacc(snapshot, config, &mut trace, &mut warnings);

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "WACC via CAPM with market-value weights",
        snapshot,
        warnings,
        elapsed,
        output,
    ))
}

/// Engine-side WACC step. Never fails: degenerate capital structures resolve
/// to the configured fallbacks and are reported through `warnings`.
pub(crate) fn compute_wacc(
    snapshot: &FinancialSnapshot,
    config: &EngineConfig,
    trace: &mut CalculationTrace,
    warnings: &mut Vec<String>,
) -> WaccOutput {
    trace.header("CALCULATING WACC");

    // --- Cost of equity (CAPM) ---
    let rf = snapshot.risk_free_rate;
    let rm = snapshot.market_return_rate;
    let beta = snapshot.beta;
    let cost_of_equity = rf + beta * (rm - rf);

    trace.record("1. Cost of Equity (CAPM)");
    trace.record(format!("   Risk Free Rate: {}", fmt_pct(rf, 2)));
    trace.record(format!("   Beta:           {}", fmt_number(beta, 3)));
    trace.record(format!("   Market Return:  {}", fmt_pct(rm, 2)));
    trace.record(format!("   -> Cost Equity: {}", fmt_pct(cost_of_equity, 2)));

    // --- Cost of debt ---
    let total_debt = snapshot.latest_total_debt();
    let interest = snapshot.latest_interest_expense().abs();
    let (cost_of_debt_pretax, cost_of_debt_defaulted) = if total_debt > Decimal::ZERO {
        (interest / total_debt, false)
    } else {
        (config.default_cost_of_debt, true)
    };
    let (tax_rate, tax_rate_defaulted) = snapshot.usable_tax_rate(config.default_tax_rate);
    let after_tax_cost_of_debt = cost_of_debt_pretax * (Decimal::ONE - tax_rate);

    trace.record("2. Cost of Debt");
    trace.record(format!("   Interest Exp:   {}", fmt_money(interest)));
    trace.record(format!("   Total Debt:     {}", fmt_money(total_debt)));
    trace.record(format!("   Pre-Tax Cost:   {}", fmt_pct(cost_of_debt_pretax, 2)));
    trace.record(format!("   Tax Rate:       {}", fmt_pct(tax_rate, 2)));
    trace.record(format!("   -> After-Tax:   {}", fmt_pct(after_tax_cost_of_debt, 2)));

    if cost_of_debt_defaulted {
        warnings.push(format!(
            "No reported debt; cost of debt defaulted to {}",
            fmt_pct(config.default_cost_of_debt, 2)
        ));
    }
    if tax_rate_defaulted {
        warnings.push(format!(
            "Reported effective tax rate ({}) unusable; defaulted to {}",
            snapshot.latest_tax_rate(),
            fmt_pct(config.default_tax_rate, 2)
        ));
    }

    // --- Cost of preferred ---
    let preferred_equity = snapshot.latest_preferred_equity();
    let cost_of_preferred = if preferred_equity > Decimal::ZERO {
        snapshot.latest_preferred_dividends().abs() / preferred_equity
    } else {
        Decimal::ZERO
    };

    // --- Weights ---
    let market_cap = snapshot.market_cap;
    let total_capital = market_cap + total_debt + preferred_equity;

    if total_capital <= Decimal::ZERO {
        trace.record(format!(
            "Total capital is {}; using fallback WACC {}",
            fmt_money(total_capital),
            fmt_pct(config.fallback_wacc, 2)
        ));
        warnings.push(format!(
            "Total capitalisation unavailable; WACC defaulted to {}",
            fmt_pct(config.fallback_wacc, 2)
        ));
        return WaccOutput {
            wacc: config.fallback_wacc,
            cost_of_equity,
            cost_of_debt_pretax,
            tax_rate,
            after_tax_cost_of_debt,
            cost_of_preferred,
            equity_weight: Decimal::ZERO,
            debt_weight: Decimal::ZERO,
            preferred_weight: Decimal::ZERO,
            total_capital,
            cost_of_debt_defaulted,
            tax_rate_defaulted,
            wacc_defaulted: true,
        };
    }

    let debt_weight = total_debt / total_capital;
    let preferred_weight = preferred_equity / total_capital;
    // Residual so the three weights sum to exactly one
    let equity_weight = Decimal::ONE - debt_weight - preferred_weight;

    trace.record("3. Weighting");
    trace.record(format!(
        "   Market Cap:     {} ({})",
        fmt_money(market_cap),
        fmt_pct(equity_weight, 1)
    ));
    trace.record(format!(
        "   Total Debt:     {} ({})",
        fmt_money(total_debt),
        fmt_pct(debt_weight, 1)
    ));
    trace.record(format!(
        "   Pref Equity:    {} ({})",
        fmt_money(preferred_equity),
        fmt_pct(preferred_weight, 1)
    ));
    trace.record(format!("   Cost of Pref:   {}", fmt_pct(cost_of_preferred, 2)));

    let wacc = equity_weight * cost_of_equity
        + debt_weight * after_tax_cost_of_debt
        + preferred_weight * cost_of_preferred;

    trace.record(format!("-> FINAL WACC: {}", fmt_pct(wacc, 4)));

    // --- Reasonableness warnings ---
    if beta > dec!(3.0) {
        warnings.push(format!(
            "High beta ({beta}): verify market data; betas above 3.0 are unusual"
        ));
    }
    if wacc > dec!(0.20) {
        warnings.push(format!(
            "WACC of {} exceeds 20%; appropriate for high-risk situations only",
            fmt_pct(wacc, 2)
        ));
    }
    if wacc <= Decimal::ZERO {
        warnings.push(format!(
            "Non-positive WACC ({}); valuation will be undefined",
            fmt_pct(wacc, 2)
        ));
    }

    WaccOutput {
        wacc,
        cost_of_equity,
        cost_of_debt_pretax,
        tax_rate,
        after_tax_cost_of_debt,
        cost_of_preferred,
        equity_weight,
        debt_weight,
        preferred_weight,
        total_capital,
        cost_of_debt_defaulted,
        tax_rate_defaulted,
        wacc_defaulted: false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
