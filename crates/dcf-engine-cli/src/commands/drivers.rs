use clap::Args;
use serde_json::Value;
use std::time::Instant;

use dcf_engine_core::valuation::margins::estimate_margins;
use dcf_engine_core::valuation::wacc::calculate_wacc;
use dcf_engine_core::{with_metadata, CalculationTrace};

use super::model::{load_snapshot, SnapshotArgs};

/// Arguments for commands that need only a snapshot
#[derive(Args)]
pub struct SnapshotOnlyArgs {
    #[command(flatten)]
    pub source: SnapshotArgs,
}

pub fn run_wacc(args: SnapshotOnlyArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let loaded = load_snapshot(&args.source)?;
    let result = calculate_wacc(&loaded.snapshot, &loaded.config)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_margins(args: SnapshotOnlyArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let loaded = load_snapshot(&args.source)?;
    let mut trace = CalculationTrace::new();
    let margins = estimate_margins(&loaded.snapshot, &mut trace)?;

    let elapsed = start.elapsed().as_micros() as u64;
    let output = with_metadata(
        "Unweighted mean of historical line items over revenue",
        &loaded.snapshot,
        Vec::new(),
        elapsed,
        margins,
    );
    Ok(serde_json::to_value(output)?)
}
