use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::SensitivityConfig;
use crate::types::{Money, Rate};
use crate::DcfResult;

use super::bridge::{value_from_cash_flows, BridgeInput, BridgeStatus};

/// One WACC row of the sensitivity matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRow {
    pub wacc: Rate,
    /// Target price per growth step, ascending growth; zero where undefined
    pub prices: Vec<Money>,
    /// Bridge status of each cell, aligned with `prices`
    pub statuses: Vec<BridgeStatus>,
}

/// Target price over a WACC x terminal-growth grid with the operating
/// forecast held fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityGrid {
    pub base_wacc: Rate,
    pub base_growth: Rate,
    /// Column headers, ascending
    pub growth_steps: Vec<Rate>,
    /// Rows ascending by WACC
    pub rows: Vec<SensitivityRow>,
    /// (row, column) of the unperturbed case
    pub base_position: (usize, usize),
}

impl SensitivityGrid {
    pub fn price_at(&self, row: usize, col: usize) -> Option<Money> {
        self.rows.get(row).and_then(|r| r.prices.get(col)).copied()
    }

    pub fn base_price(&self) -> Option<Money> {
        let (row, col) = self.base_position;
        self.price_at(row, col)
    }

    pub fn wacc_steps(&self) -> Vec<Rate> {
        self.rows.iter().map(|r| r.wacc).collect()
    }
}

/// Re-run the valuation bridge for every (WACC, g) pair around the base case.
pub fn build_sensitivity_grid(
    base_wacc: Rate,
    base_growth: Rate,
    ufcfs: &[Money],
    input: &BridgeInput,
    config: &SensitivityConfig,
) -> DcfResult<SensitivityGrid> {
    config.validate()?;

    let growth_steps: Vec<Rate> = config
        .growth_offsets
        .iter()
        .map(|o| base_growth + o)
        .collect();

    let mut rows = Vec::with_capacity(config.wacc_offsets.len());
    for offset in &config.wacc_offsets {
        let wacc = base_wacc + offset;
        let mut prices = Vec::with_capacity(growth_steps.len());
        let mut statuses = Vec::with_capacity(growth_steps.len());
        for g in &growth_steps {
            let cell = value_from_cash_flows(wacc, *g, ufcfs, input)?;
            prices.push(cell.target_price);
            statuses.push(cell.status);
        }
        rows.push(SensitivityRow {
            wacc,
            prices,
            statuses,
        });
    }

    Ok(SensitivityGrid {
        base_wacc,
        base_growth,
        growth_steps,
        rows,
        base_position: config.base_position(),
    })
}

/// Count of cells with no defined valuation. A defined price of exactly zero
/// is not counted.
pub fn undefined_cells(grid: &SensitivityGrid) -> usize {
    grid.rows
        .iter()
        .flat_map(|r| r.statuses.iter())
        .filter(|s| **s != BridgeStatus::Defined)
        .count()
}

/// Count of cells carrying `status`.
pub fn cells_with_status(grid: &SensitivityGrid, status: BridgeStatus) -> usize {
    grid.rows
        .iter()
        .flat_map(|r| r.statuses.iter())
        .filter(|s| **s == status)
        .count()
}
