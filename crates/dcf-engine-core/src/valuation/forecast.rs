use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::assumptions::Assumptions;
use crate::trace::{fmt_money, CalculationTrace};
use crate::types::{Money, Rate};

use super::margins::HistoricalMargins;

/// Projection for a single forecast year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    /// 1-based forecast year
    pub year: u32,
    pub revenue: Money,
    pub ebit: Money,
    pub taxes: Money,
    pub nopat: Money,
    pub d_and_a: Money,
    pub capex: Money,
    /// Net working capital level at year end
    pub nwc: Money,
    pub change_in_nwc: Money,
    /// Unlevered free cash flow = NOPAT + D&A - CapEx - change in NWC
    pub ufcf: Money,
}

/// Project revenue and unlevered free cash flow for each year of the horizon.
///
/// Revenue compounds from `base_revenue` (latest actual) at each year's growth
/// rate; every other line is a fixed share of that year's revenue. The NWC
/// change in year 1 is measured against `margins.anchor_nwc`.
pub fn forecast_cash_flows(
    base_revenue: Money,
    margins: &HistoricalMargins,
    assumptions: &Assumptions,
    tax_rate: Rate,
    trace: &mut CalculationTrace,
) -> Vec<ForecastRow> {
    trace.header("PHASE 2 & 3: PROJECTIONS & UFCF");
    trace.record(format!("Base Revenue: {}", fmt_money(base_revenue)));
    trace.record(format!(
        "{:<5} | {:<15} | {:<15} | {:<12} | {:<15} | {:<12} | {:<12} | {:<12} | {:<15}",
        "Year", "Revenue", "EBIT", "Taxes", "NOPAT", "D&A", "CapEx", "Chg NWC", "UFCF"
    ));
    trace.record("-".repeat(140));

    let mut rows = Vec::with_capacity(assumptions.revenue_growth_rates.len());
    let mut revenue = base_revenue;
    let mut prev_nwc = margins.anchor_nwc;

    for (idx, growth) in assumptions.revenue_growth_rates.iter().enumerate() {
        revenue *= Decimal::ONE + growth;

        let ebit = revenue * margins.ebit_margin;
        let taxes = ebit * tax_rate;
        let nopat = ebit - taxes;
        let d_and_a = revenue * margins.da_margin;
        let capex = revenue * margins.capex_margin;
        let nwc = revenue * margins.nwc_margin;
        let change_in_nwc = nwc - prev_nwc;
        let ufcf = nopat + d_and_a - capex - change_in_nwc;

        let row = ForecastRow {
            year: idx as u32 + 1,
            revenue,
            ebit,
            taxes,
            nopat,
            d_and_a,
            capex,
            nwc,
            change_in_nwc,
            ufcf,
        };
        trace.record(format!(
            "{:<5} | {:<15} | {:<15} | {:<12} | {:<15} | {:<12} | {:<12} | {:<12} | {:<15}",
            row.year,
            fmt_money(row.revenue),
            fmt_money(row.ebit),
            fmt_money(row.taxes),
            fmt_money(row.nopat),
            fmt_money(row.d_and_a),
            fmt_money(row.capex),
            fmt_money(row.change_in_nwc),
            fmt_money(row.ufcf),
        ));
        rows.push(row);

        prev_nwc = nwc;
    }

    rows
}

/// UFCF column of a forecast, in year order.
pub fn ufcf_stream(rows: &[ForecastRow]) -> Vec<Money> {
    rows.iter().map(|r| r.ufcf).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
