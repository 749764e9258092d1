use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::DcfResult;

use super::bridge::ValuationResult;
use super::engine::DcfEngine;
use super::forecast::ForecastRow;
use super::margins::HistoricalMargins;
use super::sensitivity::SensitivityGrid;
use super::wacc::WaccOutput;

/// Latest-year company figures shown next to a valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyData {
    pub market_cap: Money,
    pub beta: Decimal,
    pub shares_outstanding: Decimal,
    pub total_debt: Money,
    pub cash: Money,
    /// Reported EBITDA, or EBIT + D&A where none was reported
    pub ebitda: Money,
    pub book_value: Money,
}

/// Complete valuation report for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationReport {
    pub ticker: Option<String>,
    pub current_price: Money,
    /// Rounded headline price; zero when the valuation is undefined
    pub target_price: Money,
    /// target / current - 1; zero when there is no current price
    pub upside: Rate,
    pub wacc: WaccOutput,
    pub margins: HistoricalMargins,
    pub forecast: Vec<ForecastRow>,
    pub valuation: ValuationResult,
    pub sensitivity: Option<SensitivityGrid>,
    pub company: CompanyData,
    pub trace: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub ticker: Option<String>,
    pub include_sensitivity: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            ticker: None,
            include_sensitivity: true,
        }
    }
}

impl DcfEngine<'_> {
    /// Base valuation and sensitivity grid in one envelope.
    pub fn run_report(&mut self) -> DcfResult<ComputationOutput<ValuationReport>> {
        self.run_report_with(ReportOptions::default())
    }

    pub fn run_report_with(
        &mut self,
        options: ReportOptions,
    ) -> DcfResult<ComputationOutput<ValuationReport>> {
        let start = Instant::now();
        let mark = self.trace().len();

        let (valuation, margins, wacc) = self.run_base()?;
        let sensitivity = if options.include_sensitivity {
            Some(self.compute_sensitivity()?)
        } else {
            None
        };

        let snapshot = self.snapshot();
        let current_price = snapshot.stock_price;
        let report = ValuationReport {
            ticker: options.ticker,
            current_price,
            target_price: valuation.target_price,
            upside: upside(valuation.target_price, current_price),
            wacc,
            margins,
            forecast: valuation.forecast,
            valuation: valuation.result,
            sensitivity,
            company: CompanyData {
                market_cap: snapshot.market_cap,
                beta: snapshot.beta,
                shares_outstanding: snapshot.shares_outstanding,
                total_debt: snapshot.latest_total_debt(),
                cash: snapshot.latest_cash(),
                ebitda: snapshot.with_derived_ebitda().latest_ebitda(),
                book_value: snapshot.book_value().last().copied().unwrap_or_default(),
            },
            trace: self.trace().since(mark),
        };

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "12-month forward FCFF DCF (Gordon growth terminal value)",
            self.assumptions(),
            self.warnings().to_vec(),
            elapsed,
            report,
        ))
    }
}

/// Implied return from the current price to the target.
pub fn upside(target_price: Money, current_price: Money) -> Rate {
    if current_price <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        target_price / current_price - Decimal::ONE
    }
}
