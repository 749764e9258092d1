use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::DcfError;
use crate::time_value::{compound_factor, discount_stream};
use crate::trace::{fmt_money, fmt_number, fmt_pct, CalculationTrace};
use crate::types::{Money, Rate};
use crate::DcfResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Whether a valuation is mathematically defined under its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeStatus {
    Defined,
    /// Gordon growth requires WACC > g
    GrowthAtOrAboveWacc,
    /// (1 + WACC) must be positive to discount
    DiscountRateAtOrBelowMinusOne,
    /// Per-share value needs a positive share count
    NoSharesOutstanding,
    /// An intermediate value left the decimal range
    ArithmeticOverflow,
}

impl BridgeStatus {
    /// Statuses under which no price is produced.
    pub const UNDEFINED: [BridgeStatus; 4] = [
        BridgeStatus::GrowthAtOrAboveWacc,
        BridgeStatus::DiscountRateAtOrBelowMinusOne,
        BridgeStatus::NoSharesOutstanding,
        BridgeStatus::ArithmeticOverflow,
    ];

    pub fn describe(&self) -> &'static str {
        match self {
            BridgeStatus::Defined => "defined",
            BridgeStatus::GrowthAtOrAboveWacc => "WACC <= terminal growth",
            BridgeStatus::DiscountRateAtOrBelowMinusOne => "WACC at or below -100%",
            BridgeStatus::NoSharesOutstanding => "no shares outstanding",
            BridgeStatus::ArithmeticOverflow => "values overflow decimal range",
        }
    }
}

/// Capital-structure inputs to the enterprise-to-equity bridge, all taken
/// from the latest historical year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeInput {
    pub total_debt: Money,
    pub cash: Money,
    pub shares_outstanding: Decimal,
}

/// Full enterprise/equity bridge for one (WACC, terminal growth) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub wacc: Rate,
    pub terminal_growth_rate: Rate,
    /// UFCF(i) / (1 + WACC)^i for each forecast year
    pub discounted_ufcfs: Vec<Money>,
    /// Sum of `discounted_ufcfs`
    pub stage1_pv: Money,
    /// Gordon growth value at the end of the horizon
    pub terminal_value: Money,
    pub pv_terminal_value: Money,
    /// Stage-1 PV + PV of terminal value
    pub enterprise_value: Money,
    /// EV grown one year at WACC, less the year-1 cash flow
    pub enterprise_value_12m: Money,
    pub net_debt: Money,
    pub equity_value_12m: Money,
    /// Unrounded; zero whenever `status` is not `Defined`
    pub target_price: Money,
    pub status: BridgeStatus,
}

impl ValuationResult {
    pub fn is_defined(&self) -> bool {
        self.status == BridgeStatus::Defined
    }

    /// Share of current enterprise value contributed by the terminal value.
    pub fn terminal_value_pct(&self) -> Rate {
        self.pv_terminal_value
            .checked_div(self.enterprise_value)
            .unwrap_or(Decimal::ZERO)
    }

    fn undefined(wacc: Rate, g: Rate, status: BridgeStatus) -> Self {
        Self {
            wacc,
            terminal_growth_rate: g,
            discounted_ufcfs: Vec::new(),
            stage1_pv: Decimal::ZERO,
            terminal_value: Decimal::ZERO,
            pv_terminal_value: Decimal::ZERO,
            enterprise_value: Decimal::ZERO,
            enterprise_value_12m: Decimal::ZERO,
            net_debt: Decimal::ZERO,
            equity_value_12m: Decimal::ZERO,
            target_price: Decimal::ZERO,
            status,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Discount a UFCF stream plus Gordon terminal value and bridge to a
/// 12-month-forward price per share.
///
/// Undefined cases (WACC <= g, WACC <= -100%, no shares, decimal overflow) are
/// not errors: they return a result whose `target_price` is zero and whose
/// `status` says why. Every exponent derives from the length of `ufcfs`.
pub fn value_from_cash_flows(
    wacc: Rate,
    terminal_growth_rate: Rate,
    ufcfs: &[Money],
    input: &BridgeInput,
) -> DcfResult<ValuationResult> {
    let (first_ufcf, last_ufcf) = match (ufcfs.first(), ufcfs.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(DcfError::InsufficientData(
                "Valuation bridge requires at least one forecast cash flow".into(),
            ))
        }
    };
    let g = terminal_growth_rate;

    if wacc <= dec!(-1) {
        return Ok(ValuationResult::undefined(
            wacc,
            g,
            BridgeStatus::DiscountRateAtOrBelowMinusOne,
        ));
    }

    // --- Stage 1 ---
    let Some((discounted_ufcfs, stage1_pv)) = discount_stream(wacc, ufcfs) else {
        return Ok(ValuationResult::undefined(
            wacc,
            g,
            BridgeStatus::ArithmeticOverflow,
        ));
    };

    if wacc <= g {
        return Ok(ValuationResult {
            discounted_ufcfs,
            stage1_pv,
            ..ValuationResult::undefined(wacc, g, BridgeStatus::GrowthAtOrAboveWacc)
        });
    }

    let Some(stage2) = gordon_bridge(wacc, g, first_ufcf, last_ufcf, ufcfs.len(), stage1_pv, input)
    else {
        return Ok(ValuationResult {
            discounted_ufcfs,
            stage1_pv,
            ..ValuationResult::undefined(wacc, g, BridgeStatus::ArithmeticOverflow)
        });
    };

    let (target_price, status) = if input.shares_outstanding > Decimal::ZERO {
        match stage2.equity_value_12m.checked_div(input.shares_outstanding) {
            Some(price) => (price, BridgeStatus::Defined),
            None => (Decimal::ZERO, BridgeStatus::ArithmeticOverflow),
        }
    } else {
        (Decimal::ZERO, BridgeStatus::NoSharesOutstanding)
    };

    Ok(ValuationResult {
        wacc,
        terminal_growth_rate: g,
        discounted_ufcfs,
        stage1_pv,
        terminal_value: stage2.terminal_value,
        pv_terminal_value: stage2.pv_terminal_value,
        enterprise_value: stage2.enterprise_value,
        enterprise_value_12m: stage2.enterprise_value_12m,
        net_debt: stage2.net_debt,
        equity_value_12m: stage2.equity_value_12m,
        target_price,
        status,
    })
}

struct Stage2 {
    terminal_value: Money,
    pv_terminal_value: Money,
    enterprise_value: Money,
    enterprise_value_12m: Money,
    net_debt: Money,
    equity_value_12m: Money,
}

/// Terminal value through equity value, `None` on overflow. Requires
/// WACC > g and WACC > -100%.
fn gordon_bridge(
    wacc: Rate,
    g: Rate,
    first_ufcf: Money,
    last_ufcf: Money,
    horizon: usize,
    stage1_pv: Money,
    input: &BridgeInput,
) -> Option<Stage2> {
    // --- Stage 2: Gordon growth terminal value ---
    let spread = wacc.checked_sub(g)?;
    let terminal_value = last_ufcf
        .checked_mul(Decimal::ONE.checked_add(g)?)?
        .checked_div(spread)?;
    let pv_terminal_value = terminal_value.checked_div(compound_factor(wacc, horizon as u32)?)?;

    // --- Enterprise value, rolled forward twelve months ---
    let enterprise_value = stage1_pv.checked_add(pv_terminal_value)?;
    let enterprise_value_12m = enterprise_value
        .checked_mul(Decimal::ONE + wacc)?
        .checked_sub(first_ufcf)?;

    // --- Equity bridge ---
    let net_debt = input.total_debt.checked_sub(input.cash)?;
    let equity_value_12m = enterprise_value_12m.checked_sub(net_debt)?;

    Some(Stage2 {
        terminal_value,
        pv_terminal_value,
        enterprise_value,
        enterprise_value_12m,
        net_debt,
        equity_value_12m,
    })
}

/// Headline price convention: two decimals, banker's rounding.
pub fn round_price(price: Money) -> Money {
    price.round_dp(2)
}

/// Append the discounting and 12-month bridge steps of `result` to `trace`.
pub fn trace_bridge(
    result: &ValuationResult,
    ufcfs: &[Money],
    input: &BridgeInput,
    trace: &mut CalculationTrace,
) {
    trace.header("PHASE 4: DCF VALUATION");
    trace.record(format!(
        "{:<5} | {:<15} | {:<12} | {:<15}",
        "Year", "UFCF", "Discount Fac", "PV"
    ));
    trace.record("-".repeat(60));
    for (i, (flow, pv)) in ufcfs.iter().zip(&result.discounted_ufcfs).enumerate() {
        let year = i as u32 + 1;
        trace.record(format!(
            "{:<5} | {:<15} | {:<12} | {:<15}",
            year,
            fmt_money(*flow),
            compound_factor(result.wacc, year)
                .map(|f| fmt_number(f, 4))
                .unwrap_or_else(|| "overflow".into()),
            fmt_money(*pv)
        ));
    }
    trace.record("-".repeat(60));
    trace.record(format!("Stage 1 PV Sum: {}", fmt_money(result.stage1_pv)));

    match result.status {
        BridgeStatus::DiscountRateAtOrBelowMinusOne => {
            trace.record(format!(
                "Error: WACC ({}) is at or below -100%; no valuation",
                fmt_pct(result.wacc, 4)
            ));
            return;
        }
        BridgeStatus::GrowthAtOrAboveWacc => {
            trace.record(format!(
                "Error: WACC ({}) <= Terminal Growth ({}); no valuation",
                fmt_pct(result.wacc, 4),
                fmt_pct(result.terminal_growth_rate, 2)
            ));
            return;
        }
        BridgeStatus::ArithmeticOverflow => {
            trace.record(format!(
                "Error: WACC ({}) / Terminal Growth ({}) overflow decimal range; no valuation",
                fmt_pct(result.wacc, 4),
                fmt_pct(result.terminal_growth_rate, 2)
            ));
            return;
        }
        BridgeStatus::Defined | BridgeStatus::NoSharesOutstanding => {}
    }

    trace.record("Terminal Value Calculation (Gordon Growth):");
    if let Some(last) = ufcfs.last() {
        trace.record(format!("   Final UFCF:   {}", fmt_money(*last)));
    }
    trace.record(format!(
        "   Growth (g):   {}",
        fmt_pct(result.terminal_growth_rate, 2)
    ));
    trace.record(format!("   WACC:         {}", fmt_pct(result.wacc, 4)));
    trace.record(format!("   -> TV:        {}", fmt_money(result.terminal_value)));
    trace.record(format!("Discounting TV {} years back...", ufcfs.len()));
    trace.record(format!(
        "   PV of TV:     {}",
        fmt_money(result.pv_terminal_value)
    ));
    trace.record(format!(
        "-> CURRENT ENTERPRISE VALUE: {}",
        fmt_money(result.enterprise_value)
    ));

    trace.header("PHASE 5: 12-MONTH TARGET PRICE BRIDGE");
    trace.record(format!(
        "1. Current Enterprise Value:     {}",
        fmt_money(result.enterprise_value)
    ));
    trace.record(format!(
        "2. Plus: Growth (1 Year @ WACC): +{}",
        result
            .enterprise_value
            .checked_mul(result.wacc)
            .map(fmt_money)
            .unwrap_or_default()
    ));
    if let Some(first) = ufcfs.first() {
        trace.record(format!("3. Less: Year 1 Cash Flow Paid:  -{}", fmt_money(*first)));
    }
    trace.record(format!(
        "-> 12-MONTH ENTERPRISE VALUE:    {}",
        fmt_money(result.enterprise_value_12m)
    ));
    trace.record("Net Debt Calculation:");
    trace.record(format!("   Total Debt: {}", fmt_money(input.total_debt)));
    trace.record(format!("   Less Cash:  -{}", fmt_money(input.cash)));
    trace.record(format!("   = Net Debt: {}", fmt_money(result.net_debt)));
    trace.record(format!(
        "-> EQUITY VALUE (12m):            {}",
        fmt_money(result.equity_value_12m)
    ));
    trace.record(format!(
        "   Shares Outstanding:           {}",
        fmt_number(input.shares_outstanding, 0)
    ));

    if result.status == BridgeStatus::NoSharesOutstanding {
        trace.record("Error: no shares outstanding; per-share value undefined");
    } else {
        trace.header(&format!(
            "FINAL TARGET PRICE: ${}",
            fmt_number(round_price(result.target_price), 2)
        ));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge_input() -> BridgeInput {
        BridgeInput {
            total_debt: dec!(300),
            cash: dec!(100),
            shares_outstanding: dec!(50),
        }
    }

    fn assert_close(actual: Decimal, expected: Decimal) {
        assert!(
            (actual - expected).abs() < dec!(0.000000000001),
            "expected ~{expected}, got {actual}"
        );
    }

    fn flows() -> Vec<Money> {
        vec![dec!(100), dec!(105), dec!(110), dec!(115), dec!(120)]
    }

    #[test]
    fn test_bridge_steps() {
        let out = value_from_cash_flows(dec!(0.10), dec!(0.02), &flows(), &bridge_input()).unwrap();

        assert_eq!(out.status, BridgeStatus::Defined);
        assert_eq!(out.discounted_ufcfs.len(), 5);
        assert_close(out.discounted_ufcfs[0], dec!(100) / dec!(1.1));
        assert_eq!(out.stage1_pv, out.discounted_ufcfs.iter().sum::<Decimal>());

        // TV = 120 * 1.02 / 0.08 = 1530
        assert_eq!(out.terminal_value, dec!(1530));
        assert_close(out.pv_terminal_value, dec!(1530) / dec!(1.61051));
        assert_eq!(out.enterprise_value, out.stage1_pv + out.pv_terminal_value);
        assert_eq!(
            out.enterprise_value_12m,
            out.enterprise_value * dec!(1.1) - dec!(100)
        );
        assert_eq!(out.net_debt, dec!(200));
        assert_eq!(out.equity_value_12m, out.enterprise_value_12m - dec!(200));
        assert_eq!(out.target_price, out.equity_value_12m / dec!(50));
    }

    #[test]
    fn test_wacc_equal_to_growth_is_sentinel() {
        let out = value_from_cash_flows(dec!(0.03), dec!(0.03), &flows(), &bridge_input()).unwrap();
        assert_eq!(out.status, BridgeStatus::GrowthAtOrAboveWacc);
        assert_eq!(out.target_price, Decimal::ZERO);
        // stage 1 still reported
        assert!(out.stage1_pv > Decimal::ZERO);
    }

    #[test]
    fn test_wacc_below_growth_is_sentinel() {
        let out = value_from_cash_flows(dec!(0.02), dec!(0.04), &flows(), &bridge_input()).unwrap();
        assert!(!out.is_defined());
        assert_eq!(out.target_price, Decimal::ZERO);
    }

    #[test]
    fn test_no_shares_is_sentinel() {
        let input = BridgeInput {
            shares_outstanding: Decimal::ZERO,
            ..bridge_input()
        };
        let out = value_from_cash_flows(dec!(0.10), dec!(0.02), &flows(), &input).unwrap();
        assert_eq!(out.status, BridgeStatus::NoSharesOutstanding);
        assert_eq!(out.target_price, Decimal::ZERO);
        assert!(out.equity_value_12m > Decimal::ZERO);
    }

    #[test]
    fn test_discount_rate_below_minus_one_is_sentinel() {
        let out = value_from_cash_flows(dec!(-1.5), dec!(-2), &flows(), &bridge_input()).unwrap();
        assert_eq!(out.status, BridgeStatus::DiscountRateAtOrBelowMinusOne);
        assert_eq!(out.target_price, Decimal::ZERO);
    }

    #[test]
    fn test_terminal_value_overflow_is_sentinel() {
        let big = vec![dec!(10000000000); 5];
        let out = value_from_cash_flows(
            dec!(0.050000000000000000001),
            dec!(0.05),
            &big,
            &bridge_input(),
        )
        .unwrap();
        assert_eq!(out.status, BridgeStatus::ArithmeticOverflow);
        assert_eq!(out.target_price, Decimal::ZERO);
        // stage 1 fits and is still reported
        assert!(out.stage1_pv > Decimal::ZERO);
    }

    #[test]
    fn test_discount_factor_overflow_is_sentinel() {
        let out = value_from_cash_flows(dec!(1000000), dec!(0.02), &flows(), &bridge_input()).unwrap();
        assert_eq!(out.status, BridgeStatus::ArithmeticOverflow);
        assert_eq!(out.target_price, Decimal::ZERO);

        let mut trace = CalculationTrace::new();
        trace_bridge(&out, &flows(), &bridge_input(), &mut trace);
        assert!(trace.entries().iter().any(|e| e.contains("overflow decimal range")));
    }

    #[test]
    fn test_describe_undefined_statuses() {
        assert!(BridgeStatus::UNDEFINED
            .iter()
            .all(|s| *s != BridgeStatus::Defined));
        assert_eq!(
            BridgeStatus::NoSharesOutstanding.describe(),
            "no shares outstanding"
        );
    }

    #[test]
    fn test_empty_stream_rejected() {
        assert!(value_from_cash_flows(dec!(0.10), dec!(0.02), &[], &bridge_input()).is_err());
    }

    #[test]
    fn test_terminal_exponent_follows_horizon() {
        let three = vec![dec!(100), dec!(100), dec!(100)];
        let out = value_from_cash_flows(dec!(0.10), dec!(0), &three, &bridge_input()).unwrap();
        // TV = 100 / 0.10 = 1000, discounted 3 years
        assert_close(out.pv_terminal_value, dec!(1000) / dec!(1.331));
    }

    #[test]
    fn test_net_cash_raises_equity() {
        let input = BridgeInput {
            total_debt: Decimal::ZERO,
            cash: dec!(500),
            shares_outstanding: dec!(50),
        };
        let out = value_from_cash_flows(dec!(0.10), dec!(0.02), &flows(), &input).unwrap();
        assert_eq!(out.net_debt, dec!(-500));
        assert_eq!(out.equity_value_12m, out.enterprise_value_12m + dec!(500));
    }

    #[test]
    fn test_round_price_is_bankers() {
        assert_eq!(round_price(dec!(2.935)), dec!(2.94));
        assert_eq!(round_price(dec!(2.925)), dec!(2.92));
        assert_eq!(round_price(dec!(2.93837)), dec!(2.94));
    }

    #[test]
    fn test_trace_for_undefined_case_stops_after_stage1() {
        let out = value_from_cash_flows(dec!(0.03), dec!(0.03), &flows(), &bridge_input()).unwrap();
        let mut trace = CalculationTrace::new();
        trace_bridge(&out, &flows(), &bridge_input(), &mut trace);
        let last = trace.entries().last().unwrap();
        assert!(last.contains("<= Terminal Growth"));
        assert!(!trace.entries().iter().any(|e| e.contains("FINAL TARGET PRICE")));
    }

    #[test]
    fn test_trace_for_defined_case_ends_with_price() {
        let out = value_from_cash_flows(dec!(0.10), dec!(0.02), &flows(), &bridge_input()).unwrap();
        let mut trace = CalculationTrace::new();
        trace_bridge(&out, &flows(), &bridge_input(), &mut trace);
        assert!(trace
            .entries()
            .iter()
            .any(|e| e.starts_with(" FINAL TARGET PRICE: $")));
    }
}
