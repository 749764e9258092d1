use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::DcfError;
use crate::types::{Money, Rate};
use crate::DcfResult;

/// Growth factor `(1 + rate)^periods`, or `None` if it overflows.
pub fn compound_factor(rate: Rate, periods: u32) -> Option<Decimal> {
    Decimal::ONE
        .checked_add(rate)?
        .checked_powi(periods as i64)
}

/// Checked discounting of end-of-period cash flows. `None` when a discount
/// factor overflows or is zero.
pub fn discount_stream(rate: Rate, cash_flows: &[Money]) -> Option<(Vec<Money>, Money)> {
    let mut discounted = Vec::with_capacity(cash_flows.len());
    let mut total = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        let factor = compound_factor(rate, t as u32 + 1)?;
        let pv = cf.checked_div(factor)?;
        discounted.push(pv);
        total = total.checked_add(pv)?;
    }

    Some((discounted, total))
}

/// Present values of end-of-period cash flows; `cash_flows[0]` falls at the end
/// of period 1. Returns the per-period present values and their sum.
pub fn present_value_of_stream(
    rate: Rate,
    cash_flows: &[Money],
) -> DcfResult<(Vec<Money>, Money)> {
    if rate <= dec!(-1) {
        return Err(DcfError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    discount_stream(rate, cash_flows).ok_or_else(|| DcfError::DivisionUndefined {
        context: format!("discounting at {rate} overflows decimal range"),
    })
}
