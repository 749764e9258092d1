use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::DcfError;
use crate::types::{Money, Rate};
use crate::DcfResult;

/// Number of historical fiscal years every snapshot carries.
pub const HISTORY_YEARS: usize = 3;

/// Statutory rate assumed when an effective tax rate cannot be derived.
pub const DEFAULT_TAX_RATE: Rate = dec!(0.21);

fn zero_series() -> Vec<Money> {
    vec![Decimal::ZERO; HISTORY_YEARS]
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Normalised three-year financial statement history plus current market data.
///
/// Every per-year series is ordered oldest to newest. Values the loader could
/// not find are stored as zero, so a zero means "unknown" rather than a true
/// zero balance. A series omitted from serialized input deserializes as three
/// zeros for the same reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    /// Fiscal period labels, e.g. ["2021", "2022", "2023"]
    pub years: Vec<String>,

    // Income statement
    #[serde(default = "zero_series")]
    pub revenue: Vec<Money>,
    #[serde(default = "zero_series")]
    pub ebit: Vec<Money>,
    /// Informational only; never used by the valuation formulas
    #[serde(default = "zero_series")]
    pub ebitda: Vec<Money>,
    #[serde(default = "zero_series")]
    pub net_income: Vec<Money>,
    #[serde(default = "zero_series")]
    pub effective_tax_rate: Vec<Rate>,
    #[serde(default = "zero_series")]
    pub interest_expense: Vec<Money>,

    // Balance sheet
    #[serde(default = "zero_series")]
    pub current_assets: Vec<Money>,
    #[serde(default = "zero_series")]
    pub current_liabilities: Vec<Money>,
    #[serde(default = "zero_series")]
    pub cash_and_equivalents: Vec<Money>,
    #[serde(default = "zero_series")]
    pub short_term_debt: Vec<Money>,
    #[serde(default = "zero_series")]
    pub long_term_debt: Vec<Money>,
    #[serde(default = "zero_series")]
    pub total_debt: Vec<Money>,
    #[serde(default = "zero_series")]
    pub total_assets: Vec<Money>,
    #[serde(default = "zero_series")]
    pub total_liabilities: Vec<Money>,
    #[serde(default = "zero_series")]
    pub ppe_net: Vec<Money>,
    #[serde(default = "zero_series")]
    pub preferred_equity: Vec<Money>,

    // Cash flow statement
    #[serde(default = "zero_series")]
    pub d_and_a: Vec<Money>,
    /// Capital expenditure; usually reported as a negative cash outflow
    #[serde(default = "zero_series")]
    pub capex: Vec<Money>,
    #[serde(default = "zero_series")]
    pub preferred_dividends: Vec<Money>,

    // Market data
    pub shares_outstanding: Decimal,
    pub beta: Decimal,
    pub stock_price: Money,
    pub market_cap: Money,
    pub risk_free_rate: Rate,
    pub market_return_rate: Rate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl FinancialSnapshot {
    /// Check the shape invariants loaders must guarantee before a snapshot
    /// reaches the engine.
    pub fn validate(&self) -> DcfResult<()> {
        if self.years.len() != HISTORY_YEARS {
            return Err(DcfError::InvalidInput {
                field: "years".into(),
                reason: format!(
                    "Expected {HISTORY_YEARS} period labels, got {}",
                    self.years.len()
                ),
            });
        }

        for (field, series) in self.named_series() {
            if series.len() != HISTORY_YEARS {
                return Err(DcfError::InvalidInput {
                    field: field.into(),
                    reason: format!(
                        "Expected {HISTORY_YEARS} yearly values, got {}",
                        series.len()
                    ),
                });
            }
        }

        if self.shares_outstanding < Decimal::ZERO {
            return Err(DcfError::InvalidInput {
                field: "shares_outstanding".into(),
                reason: "Shares outstanding cannot be negative".into(),
            });
        }
        if self.market_cap < Decimal::ZERO {
            return Err(DcfError::InvalidInput {
                field: "market_cap".into(),
                reason: "Market capitalisation cannot be negative".into(),
            });
        }

        Ok(())
    }

    /// Net working capital per year: (current assets - cash) - (current
    /// liabilities - short-term debt).
    pub fn nwc(&self) -> Vec<Money> {
        self.current_assets
            .iter()
            .zip(&self.cash_and_equivalents)
            .zip(self.current_liabilities.iter().zip(&self.short_term_debt))
            .map(|((ca, cash), (cl, st_debt))| (ca - cash) - (cl - st_debt))
            .collect()
    }

    /// Book value of equity per year: total assets - total liabilities.
    pub fn book_value(&self) -> Vec<Money> {
        self.total_assets
            .iter()
            .zip(&self.total_liabilities)
            .map(|(a, l)| a - l)
            .collect()
    }

    /// Copy of the snapshot with EBITDA back-filled as EBIT + D&A for every
    /// year the loader left at zero.
    pub fn with_derived_ebitda(&self) -> Self {
        let mut out = self.clone();
        for (i, value) in out.ebitda.iter_mut().enumerate() {
            if value.is_zero() {
                let ebit = self.ebit.get(i).copied().unwrap_or_default();
                let da = self.d_and_a.get(i).copied().unwrap_or_default();
                *value = ebit + da;
            }
        }
        out
    }

    pub fn latest_revenue(&self) -> Money {
        latest(&self.revenue)
    }

    pub fn latest_total_debt(&self) -> Money {
        latest(&self.total_debt)
    }

    pub fn latest_cash(&self) -> Money {
        latest(&self.cash_and_equivalents)
    }

    pub fn latest_interest_expense(&self) -> Money {
        latest(&self.interest_expense)
    }

    pub fn latest_preferred_equity(&self) -> Money {
        latest(&self.preferred_equity)
    }

    pub fn latest_preferred_dividends(&self) -> Money {
        latest(&self.preferred_dividends)
    }

    pub fn latest_ebitda(&self) -> Money {
        latest(&self.ebitda)
    }

    /// Most recent effective tax rate as reported (zero when unknown).
    pub fn latest_tax_rate(&self) -> Rate {
        latest(&self.effective_tax_rate)
    }

    /// Most recent effective tax rate, or `fallback` when the reported rate is
    /// unusable (zero/unknown, negative, or 100% and above).
    pub fn usable_tax_rate(&self, fallback: Rate) -> (Rate, bool) {
        let t = self.latest_tax_rate();
        if t > Decimal::ZERO && t < Decimal::ONE {
            (t, false)
        } else {
            (fallback, true)
        }
    }

    /// Net debt at the latest balance sheet date: total debt - cash.
    pub fn latest_net_debt(&self) -> Money {
        self.latest_total_debt() - self.latest_cash()
    }

    fn named_series(&self) -> [(&'static str, &Vec<Money>); 19] {
        [
            ("revenue", &self.revenue),
            ("ebit", &self.ebit),
            ("ebitda", &self.ebitda),
            ("net_income", &self.net_income),
            ("effective_tax_rate", &self.effective_tax_rate),
            ("interest_expense", &self.interest_expense),
            ("current_assets", &self.current_assets),
            ("current_liabilities", &self.current_liabilities),
            ("cash_and_equivalents", &self.cash_and_equivalents),
            ("short_term_debt", &self.short_term_debt),
            ("long_term_debt", &self.long_term_debt),
            ("total_debt", &self.total_debt),
            ("total_assets", &self.total_assets),
            ("total_liabilities", &self.total_liabilities),
            ("ppe_net", &self.ppe_net),
            ("preferred_equity", &self.preferred_equity),
            ("d_and_a", &self.d_and_a),
            ("capex", &self.capex),
            ("preferred_dividends", &self.preferred_dividends),
        ]
    }
}

/// Effective tax rate as loaders derive it: tax expense over pre-tax income,
/// or the statutory default when pre-tax income is zero.
pub fn effective_tax_rate(tax_expense: Money, pretax_income: Money) -> Rate {
    if pretax_income.is_zero() {
        DEFAULT_TAX_RATE
    } else {
        tax_expense / pretax_income
    }
}

fn latest(series: &[Money]) -> Money {
    series.last().copied().unwrap_or(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
