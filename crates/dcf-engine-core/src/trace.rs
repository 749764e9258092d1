//! Append-only, human-readable record of every quantity a valuation computes.
//!
//! The trace is returned alongside results instead of being printed, so it can
//! be displayed by callers and asserted on in tests.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationTrace {
    entries: Vec<String>,
}

impl CalculationTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
    }

    /// Section banner, three entries long.
    pub fn header(&mut self, title: &str) {
        let rule = "=".repeat(60);
        self.record(rule.clone());
        self.record(format!(" {title}"));
        self.record(rule);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries appended after `mark` (a previous `len()`).
    pub fn since(&self, mark: usize) -> Vec<String> {
        self.entries.get(mark..).map(<[String]>::to_vec).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Whole-currency amount with thousands separators, e.g. `$1,234` / `-$56`.
pub fn fmt_money(value: Money) -> String {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${}", group_thousands(&rounded.abs().trunc().to_string()))
}

/// Plain number with thousands separators and `dp` decimals.
pub fn fmt_number(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let abs = rounded.abs();
    let int_part = group_thousands(&abs.trunc().to_string());
    if dp == 0 {
        return format!("{sign}{int_part}");
    }
    // fract() renders as "0.xx" or "0"
    let frac = abs.fract().to_string();
    let mut frac_digits = frac.split('.').nth(1).unwrap_or("").to_string();
    while frac_digits.len() < dp as usize {
        frac_digits.push('0');
    }
    format!("{sign}{int_part}.{frac_digits}")
}

/// Rate rendered as a percentage, e.g. `fmt_pct(0.1, 2)` is `10.00%`.
pub fn fmt_pct(rate: Rate, dp: u32) -> String {
    match rate.checked_mul(dec!(100)) {
        Some(pct) => format!("{}%", fmt_number(pct, dp)),
        None => rate.to_string(),
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
