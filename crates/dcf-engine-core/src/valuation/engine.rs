use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::assumptions::Assumptions;
use crate::config::EngineConfig;
use crate::snapshot::FinancialSnapshot;
use crate::trace::{fmt_money, fmt_number, fmt_pct, CalculationTrace};
use crate::types::{Money, Rate};
use crate::DcfResult;

use super::bridge::{
    round_price, trace_bridge, value_from_cash_flows, BridgeInput, BridgeStatus, ValuationResult,
};
use super::forecast::{forecast_cash_flows, ufcf_stream, ForecastRow};
use super::margins::{estimate_margins, HistoricalMargins};
use super::sensitivity::{build_sensitivity_grid, cells_with_status, SensitivityGrid};
use super::wacc::{compute_wacc, WaccOutput};

/// Share of enterprise value above which the terminal value dominates.
const TERMINAL_VALUE_WARN_PCT: Rate = dec!(0.75);

/// Base-case valuation returned by [`DcfEngine::compute_valuation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    /// 12-month target price, rounded to cents; zero when undefined
    pub target_price: Money,
    pub wacc: Rate,
    pub forecast: Vec<ForecastRow>,
    /// Trace lines produced by this call only
    pub trace: Vec<String>,
    pub result: ValuationResult,
}

/// Stateful DCF run over one snapshot and one set of assumptions.
///
/// The engine caches its margin estimate, WACC and forecast so that what-if
/// prices and the sensitivity grid reuse the same operating projection. It
/// performs no I/O; everything it computes is appended to its trace.
/// Warnings accumulate across calls, each distinct message once.
#[derive(Debug, Clone)]
pub struct DcfEngine<'a> {
    snapshot: &'a FinancialSnapshot,
    assumptions: Assumptions,
    config: EngineConfig,
    trace: CalculationTrace,
    warnings: Vec<String>,
    margins: Option<HistoricalMargins>,
    wacc: Option<WaccOutput>,
    forecast: Option<Vec<ForecastRow>>,
}

impl<'a> DcfEngine<'a> {
    pub fn new(snapshot: &'a FinancialSnapshot, assumptions: Assumptions) -> Self {
        Self::with_config(snapshot, assumptions, EngineConfig::default())
    }

    pub fn with_config(
        snapshot: &'a FinancialSnapshot,
        assumptions: Assumptions,
        config: EngineConfig,
    ) -> Self {
        Self {
            snapshot,
            assumptions,
            config,
            trace: CalculationTrace::new(),
            warnings: Vec::new(),
            margins: None,
            wacc: None,
            forecast: None,
        }
    }

    /// Run margins, WACC, forecast and the valuation bridge end to end.
    ///
    /// Every call recomputes from the snapshot and refreshes the cached
    /// forecast, so repeated calls return identical results.
    pub fn compute_valuation(&mut self) -> DcfResult<Valuation> {
        self.run_base().map(|(valuation, _, _)| valuation)
    }

    /// Base case plus the margin and WACC detail it was built from.
    pub(crate) fn run_base(&mut self) -> DcfResult<(Valuation, HistoricalMargins, WaccOutput)> {
        self.validate_inputs()?;
        let mark = self.trace.len();

        let margins = estimate_margins(self.snapshot, &mut self.trace)?;
        let wacc = self.run_wacc();
        let forecast = self.project(&margins);
        let ufcfs = ufcf_stream(&forecast);
        let input = self.bridge_input();

        let result = value_from_cash_flows(
            wacc.wacc,
            self.assumptions.terminal_growth_rate,
            &ufcfs,
            &input,
        )?;
        trace_bridge(&result, &ufcfs, &input, &mut self.trace);
        self.check_result(&result);

        let valuation = Valuation {
            target_price: round_price(result.target_price),
            wacc: wacc.wacc,
            forecast: forecast.clone(),
            trace: self.trace.since(mark),
            result,
        };

        self.margins = Some(margins.clone());
        self.wacc = Some(wacc.clone());
        self.forecast = Some(forecast);

        Ok((valuation, margins, wacc))
    }

    /// Target price over the configured WACC x terminal-growth grid around
    /// the base case. Computes the base WACC and forecast first if needed.
    pub fn compute_sensitivity(&mut self) -> DcfResult<SensitivityGrid> {
        self.validate_inputs()?;
        let ufcfs = self.ensure_forecast()?;
        let base_wacc = self.ensure_wacc().wacc;
        let base_growth = self.assumptions.terminal_growth_rate;
        let input = self.bridge_input();

        let grid = build_sensitivity_grid(
            base_wacc,
            base_growth,
            &ufcfs,
            &input,
            &self.config.sensitivity,
        )?;

        self.trace.header("SENSITIVITY ANALYSIS (WACC x TERMINAL GROWTH)");
        let columns: Vec<String> = grid
            .growth_steps
            .iter()
            .map(|g| format!("{:>10}", fmt_pct(*g, 2)))
            .collect();
        self.trace.record(format!("{:<10} | {}", "WACC", columns.join(" ")));
        for row in &grid.rows {
            let cells: Vec<String> = row
                .prices
                .iter()
                .map(|p| format!("{:>10}", fmt_number(round_price(*p), 2)))
                .collect();
            self.trace
                .record(format!("{:<10} | {}", fmt_pct(row.wacc, 2), cells.join(" ")));
        }

        for status in BridgeStatus::UNDEFINED {
            let count = cells_with_status(&grid, status);
            if count > 0 {
                self.warn(format!(
                    "{count} sensitivity cells undefined ({}); reported as 0",
                    status.describe()
                ));
            }
        }

        Ok(grid)
    }

    /// What-if price for an arbitrary (WACC, terminal growth) pair using the
    /// cached forecast. Unrounded; zero when the valuation is undefined.
    pub fn compute_single(&mut self, wacc: Rate, growth: Rate) -> DcfResult<Money> {
        self.compute_single_result(wacc, growth)
            .map(|result| result.target_price)
    }

    /// Full bridge behind [`compute_single`](Self::compute_single). An
    /// undefined result also adds a warning.
    pub fn compute_single_result(
        &mut self,
        wacc: Rate,
        growth: Rate,
    ) -> DcfResult<ValuationResult> {
        self.validate_inputs()?;
        let ufcfs = self.ensure_forecast()?;
        let result = value_from_cash_flows(wacc, growth, &ufcfs, &self.bridge_input())?;
        self.trace.record(format!(
            "What-if: WACC {} / g {} -> {}",
            fmt_pct(wacc, 4),
            fmt_pct(growth, 2),
            match result.status {
                BridgeStatus::Defined => format!("${}", fmt_number(result.target_price, 4)),
                status => format!("undefined ({})", status.describe()),
            }
        ));
        if !result.is_defined() {
            self.warn(format!(
                "What-if WACC {} / g {} undefined ({}); price reported as 0",
                fmt_pct(wacc, 4),
                fmt_pct(growth, 2),
                result.status.describe()
            ));
        }
        Ok(result)
    }

    pub fn trace(&self) -> &CalculationTrace {
        &self.trace
    }

    /// WACC from the most recent run, if any.
    pub fn base_wacc(&self) -> Option<&WaccOutput> {
        self.wacc.as_ref()
    }

    pub fn cached_margins(&self) -> Option<&HistoricalMargins> {
        self.margins.as_ref()
    }

    pub fn cached_forecast(&self) -> Option<&[ForecastRow]> {
        self.forecast.as_deref()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn snapshot(&self) -> &'a FinancialSnapshot {
        self.snapshot
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn validate_inputs(&self) -> DcfResult<()> {
        self.snapshot.validate()?;
        self.assumptions.validate()?;
        self.config.validate()
    }

    fn project(&mut self, margins: &HistoricalMargins) -> Vec<ForecastRow> {
        let (tax_rate, _) = self.snapshot.usable_tax_rate(self.config.default_tax_rate);
        forecast_cash_flows(
            self.snapshot.latest_revenue(),
            margins,
            &self.assumptions,
            tax_rate,
            &mut self.trace,
        )
    }

    /// UFCFs of the cached forecast, projecting once if nothing is cached.
    fn ensure_forecast(&mut self) -> DcfResult<Vec<Money>> {
        if let Some(rows) = &self.forecast {
            return Ok(ufcf_stream(rows));
        }
        let margins = match self.margins.clone() {
            Some(m) => m,
            None => estimate_margins(self.snapshot, &mut self.trace)?,
        };
        let rows = self.project(&margins);
        let ufcfs = ufcf_stream(&rows);
        self.margins = Some(margins);
        self.forecast = Some(rows);
        Ok(ufcfs)
    }

    fn ensure_wacc(&mut self) -> WaccOutput {
        if let Some(wacc) = &self.wacc {
            return wacc.clone();
        }
        let out = self.run_wacc();
        self.wacc = Some(out.clone());
        out
    }

    fn run_wacc(&mut self) -> WaccOutput {
        let mut warnings = Vec::new();
        let out = compute_wacc(self.snapshot, &self.config, &mut self.trace, &mut warnings);
        for warning in warnings {
            self.warn(warning);
        }
        out
    }

    fn warn(&mut self, message: String) {
        if !self.warnings.contains(&message) {
            self.warnings.push(message);
        }
    }

    fn bridge_input(&self) -> BridgeInput {
        BridgeInput {
            total_debt: self.snapshot.latest_total_debt(),
            cash: self.snapshot.latest_cash(),
            shares_outstanding: self.snapshot.shares_outstanding,
        }
    }

    fn check_result(&mut self, result: &ValuationResult) {
        match result.status {
            BridgeStatus::Defined => {
                let tv_pct = result.terminal_value_pct();
                if tv_pct > TERMINAL_VALUE_WARN_PCT {
                    self.warn(format!(
                        "Terminal value is {} of enterprise value; the price rests mostly on the perpetuity assumption",
                        fmt_pct(tv_pct, 1)
                    ));
                }
                if result.equity_value_12m < Decimal::ZERO {
                    self.warn(format!(
                        "Negative equity value ({}): net debt exceeds enterprise value",
                        fmt_money(result.equity_value_12m)
                    ));
                }
            }
            BridgeStatus::GrowthAtOrAboveWacc => self.warn(format!(
                "WACC ({}) is not above terminal growth ({}); target price reported as 0",
                fmt_pct(result.wacc, 2),
                fmt_pct(result.terminal_growth_rate, 2)
            )),
            BridgeStatus::DiscountRateAtOrBelowMinusOne => {
                self.warn("WACC at or below -100%; target price reported as 0".into())
            }
            BridgeStatus::NoSharesOutstanding => {
                self.warn("No shares outstanding; target price reported as 0".into())
            }
            BridgeStatus::ArithmeticOverflow => self.warn(format!(
                "Valuation at WACC {} / g {} overflows decimal range; target price reported as 0",
                fmt_pct(result.wacc, 4),
                fmt_pct(result.terminal_growth_rate, 2)
            )),
        }
    }
}
