use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DcfError;
use crate::snapshot::FinancialSnapshot;
use crate::trace::{fmt_money, fmt_pct, CalculationTrace};
use crate::types::{Money, Rate};
use crate::DcfResult;

/// Forward operating drivers derived from the historical snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalMargins {
    /// Mean of EBIT / revenue
    pub ebit_margin: Rate,
    /// Mean of D&A / revenue
    pub da_margin: Rate,
    /// Mean of NWC / revenue
    pub nwc_margin: Rate,
    /// Mean of |CapEx| / revenue
    pub capex_margin: Rate,
    /// Latest actual NWC balance; the year-0 anchor for the first NWC change
    pub anchor_nwc: Money,
}

/// Average each operating line over revenue across the historical years.
///
/// Fails with `DivisionUndefined` if any year's revenue is zero, since every
/// ratio uses revenue as its denominator.
pub fn estimate_margins(
    snapshot: &FinancialSnapshot,
    trace: &mut CalculationTrace,
) -> DcfResult<HistoricalMargins> {
    trace.header("PHASE 1: HISTORICAL DRIVERS (BASELINE)");

    let revenue = &snapshot.revenue;
    if revenue.is_empty() {
        return Err(DcfError::InsufficientData(
            "Margin estimation requires at least one year of revenue".into(),
        ));
    }
    if let Some(idx) = revenue.iter().position(|r| r.is_zero()) {
        let year = snapshot
            .years
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("#{idx}"));
        return Err(DcfError::DivisionUndefined {
            context: format!("historical margins: revenue for {year} is zero"),
        });
    }

    let nwc = snapshot.nwc();
    let capex_abs: Vec<Money> = snapshot.capex.iter().map(|c| c.abs()).collect();

    trace.record(format!("Years Used:           {:?}", snapshot.years));
    trace.record(format!("Historical Revenue:   {}", fmt_list(revenue)));
    trace.record(format!("Historical EBIT:      {}", fmt_list(&snapshot.ebit)));
    trace.record(format!("Historical D&A:       {}", fmt_list(&snapshot.d_and_a)));
    trace.record(format!("Historical CapEx:     {}", fmt_list(&snapshot.capex)));
    trace.record(format!("Historical NWC:       {}", fmt_list(&nwc)));

    let ebit_margins = ratios("ebit", &snapshot.ebit, revenue)?;
    let da_margins = ratios("d_and_a", &snapshot.d_and_a, revenue)?;
    let nwc_margins = ratios("nwc", &nwc, revenue)?;
    let capex_margins = ratios("capex", &capex_abs, revenue)?;

    let margins = HistoricalMargins {
        ebit_margin: mean(&ebit_margins),
        da_margin: mean(&da_margins),
        nwc_margin: mean(&nwc_margins),
        capex_margin: mean(&capex_margins),
        anchor_nwc: nwc.last().copied().unwrap_or(Decimal::ZERO),
    };

    trace.record("--- Calculated Margins ---");
    trace.record(format!("EBIT Margins:     {}", fmt_rates(&ebit_margins)));
    trace.record(format!("Avg EBIT Margin:  {}", fmt_pct(margins.ebit_margin, 4)));
    trace.record(format!("D&A Margins:      {}", fmt_rates(&da_margins)));
    trace.record(format!("Avg D&A Margin:   {}", fmt_pct(margins.da_margin, 4)));
    trace.record(format!("NWC Margins:      {}", fmt_rates(&nwc_margins)));
    trace.record(format!("Avg NWC Margin:   {}", fmt_pct(margins.nwc_margin, 4)));
    trace.record(format!("CapEx Margins:    {}", fmt_rates(&capex_margins)));
    trace.record(format!("Avg CapEx Margin: {}", fmt_pct(margins.capex_margin, 4)));
    trace.record(format!("Anchor NWC:       {}", fmt_money(margins.anchor_nwc)));

    Ok(margins)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn ratios(field: &str, numerators: &[Money], revenue: &[Money]) -> DcfResult<Vec<Rate>> {
    if numerators.len() != revenue.len() {
        return Err(DcfError::InvalidInput {
            field: field.into(),
            reason: format!(
                "Series has {} values but revenue has {}",
                numerators.len(),
                revenue.len()
            ),
        });
    }
    Ok(numerators.iter().zip(revenue).map(|(n, r)| n / r).collect())
}

/// Unweighted arithmetic mean; callers guarantee a non-empty slice.
fn mean(values: &[Rate]) -> Rate {
    let sum: Decimal = values.iter().sum();
    sum / Decimal::from(values.len())
}

fn fmt_list(values: &[Money]) -> String {
    let items: Vec<String> = values.iter().map(|v| fmt_money(*v)).collect();
    format!("[{}]", items.join(", "))
}

fn fmt_rates(values: &[Rate]) -> String {
    let items: Vec<String> = values.iter().map(|v| fmt_pct(*v, 2)).collect();
    format!("[{}]", items.join(", "))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::sample_snapshot;
    use rust_decimal_macros::dec;

    #[test]
    fn test_constant_ebit_margin() {
        let mut trace = CalculationTrace::new();
        let m = estimate_margins(&sample_snapshot(), &mut trace).unwrap();
        assert_eq!(m.ebit_margin, dec!(0.2));
        assert_eq!(m.anchor_nwc, dec!(10));
    }

    #[test]
    fn test_ratios_are_unweighted_means() {
        let mut trace = CalculationTrace::new();
        let m = estimate_margins(&sample_snapshot(), &mut trace).unwrap();

        // D&A of 5 on revenue 100 / 110 / 121
        let expected_da = (dec!(5) / dec!(100) + dec!(5) / dec!(110) + dec!(5) / dec!(121)) / dec!(3);
        assert!(
            (m.da_margin - expected_da).abs() < dec!(0.0000000001),
            "D&A margin: expected ~{expected_da}, got {}",
            m.da_margin
        );
        // CapEx is negative in the source data; the margin uses its magnitude
        assert!(m.capex_margin > Decimal::ZERO);
        assert!((m.capex_margin - dec!(0.0547107438)).abs() < dec!(0.0000001));
        assert!((m.nwc_margin - dec!(0.0911845730)).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_zero_revenue_is_division_undefined() {
        let mut snap = sample_snapshot();
        snap.revenue = vec![dec!(100), Decimal::ZERO, dec!(121)];
        let mut trace = CalculationTrace::new();
        match estimate_margins(&snap, &mut trace).unwrap_err() {
            DcfError::DivisionUndefined { context } => assert!(context.contains("2022")),
            e => panic!("Expected DivisionUndefined, got {e:?}"),
        }
    }

    #[test]
    fn test_mismatched_series_rejected() {
        let mut snap = sample_snapshot();
        snap.d_and_a = vec![dec!(5), dec!(5)];
        let mut trace = CalculationTrace::new();
        assert!(estimate_margins(&snap, &mut trace).is_err());
    }

    #[test]
    fn test_trace_records_averages() {
        let mut trace = CalculationTrace::new();
        estimate_margins(&sample_snapshot(), &mut trace).unwrap();
        assert!(trace
            .entries()
            .iter()
            .any(|e| e.starts_with("Avg EBIT Margin:") && e.ends_with("20.0000%")));
    }
}
