use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::DcfError;
use crate::types::Rate;
use crate::DcfResult;

/// Forecast horizon used when none is specified.
pub const DEFAULT_PROJECTION_YEARS: u32 = 5;

fn default_projection_years() -> u32 {
    DEFAULT_PROJECTION_YEARS
}

/// User-chosen forward assumptions for one valuation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumptions {
    /// Annual revenue growth for each forecast year, in order
    pub revenue_growth_rates: Vec<Rate>,
    /// Perpetuity growth rate applied after the explicit forecast
    pub terminal_growth_rate: Rate,
    /// Explicit forecast horizon in years; must equal the number of growth rates
    #[serde(default = "default_projection_years")]
    pub projection_years: u32,
}

impl Assumptions {
    /// Build a five-year assumption set and validate it.
    pub fn new(revenue_growth_rates: Vec<Rate>, terminal_growth_rate: Rate) -> DcfResult<Self> {
        let assumptions = Self {
            revenue_growth_rates,
            terminal_growth_rate,
            projection_years: DEFAULT_PROJECTION_YEARS,
        };
        assumptions.validate()?;
        Ok(assumptions)
    }

    pub fn validate(&self) -> DcfResult<()> {
        if self.projection_years == 0 {
            return Err(DcfError::InvalidInput {
                field: "projection_years".into(),
                reason: "Forecast horizon must be at least one year".into(),
            });
        }
        if self.revenue_growth_rates.len() != self.projection_years as usize {
            return Err(DcfError::InvalidInput {
                field: "revenue_growth_rates".into(),
                reason: format!(
                    "Exactly {} growth rates required, got {}",
                    self.projection_years,
                    self.revenue_growth_rates.len()
                ),
            });
        }
        // Growth of -100% or worse wipes out revenue entirely
        if let Some(g) = self.revenue_growth_rates.iter().find(|g| **g <= dec!(-1)) {
            return Err(DcfError::InvalidInput {
                field: "revenue_growth_rates".into(),
                reason: format!("Growth rate {g} must be greater than -100%"),
            });
        }
        if self.terminal_growth_rate <= dec!(-1) {
            return Err(DcfError::InvalidInput {
                field: "terminal_growth_rate".into(),
                reason: "Terminal growth rate must be greater than -100%".into(),
            });
        }
        Ok(())
    }
}
