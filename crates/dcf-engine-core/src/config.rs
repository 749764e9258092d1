use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::DcfError;
use crate::types::Rate;
use crate::DcfResult;

/// Fallback constants and sensitivity grid layout used by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pre-tax cost of debt assumed when the company reports no debt
    pub default_cost_of_debt: Rate,
    /// Tax rate assumed when the reported effective rate is unusable
    pub default_tax_rate: Rate,
    /// Discount rate returned when total capitalisation is zero
    pub fallback_wacc: Rate,
    pub sensitivity: SensitivityConfig,
}

/// Offsets applied to the base WACC (rows) and base terminal growth (columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityConfig {
    pub wacc_offsets: Vec<Rate>,
    pub growth_offsets: Vec<Rate>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_cost_of_debt: dec!(0.05),
            default_tax_rate: dec!(0.21),
            fallback_wacc: dec!(0.10),
            sensitivity: SensitivityConfig::default(),
        }
    }
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            wacc_offsets: vec![dec!(-0.01), dec!(-0.005), dec!(0), dec!(0.005), dec!(0.01)],
            growth_offsets: vec![dec!(-0.02), dec!(-0.01), dec!(0), dec!(0.01), dec!(0.02)],
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> DcfResult<()> {
        if self.default_cost_of_debt < Decimal::ZERO {
            return Err(DcfError::InvalidInput {
                field: "default_cost_of_debt".into(),
                reason: "Cost of debt cannot be negative".into(),
            });
        }
        if self.default_tax_rate < Decimal::ZERO || self.default_tax_rate >= Decimal::ONE {
            return Err(DcfError::InvalidInput {
                field: "default_tax_rate".into(),
                reason: "Tax rate must be in [0, 1)".into(),
            });
        }
        if self.fallback_wacc <= Decimal::ZERO {
            return Err(DcfError::InvalidInput {
                field: "fallback_wacc".into(),
                reason: "Fallback WACC must be positive".into(),
            });
        }
        self.sensitivity.validate()
    }
}

impl SensitivityConfig {
    pub fn validate(&self) -> DcfResult<()> {
        validate_offsets("sensitivity.wacc_offsets", &self.wacc_offsets)?;
        validate_offsets("sensitivity.growth_offsets", &self.growth_offsets)
    }

    /// Row and column of the unperturbed base case.
    pub fn base_position(&self) -> (usize, usize) {
        let row = self.wacc_offsets.iter().position(|o| o.is_zero()).unwrap_or(0);
        let col = self.growth_offsets.iter().position(|o| o.is_zero()).unwrap_or(0);
        (row, col)
    }
}

fn validate_offsets(field: &str, offsets: &[Rate]) -> DcfResult<()> {
    if offsets.is_empty() {
        return Err(DcfError::InvalidInput {
            field: field.into(),
            reason: "At least one offset is required".into(),
        });
    }
    if offsets.windows(2).any(|w| w[0] >= w[1]) {
        return Err(DcfError::InvalidInput {
            field: field.into(),
            reason: "Offsets must be strictly ascending".into(),
        });
    }
    if !offsets.iter().any(|o| o.is_zero()) {
        return Err(DcfError::InvalidInput {
            field: field.into(),
            reason: "Offsets must include 0 for the base case".into(),
        });
    }
    Ok(())
}
