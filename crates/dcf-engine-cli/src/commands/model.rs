use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use dcf_engine_core::sources::{normalize_ticker, SnapshotSource};
use dcf_engine_core::{Assumptions, EngineConfig, FinancialSnapshot};

use crate::input;
use crate::input::data_dir::JsonDirSource;

/// Where the financial snapshot comes from.
#[derive(Args, Debug, Clone, Default)]
pub struct SnapshotArgs {
    /// Path to a snapshot JSON file
    #[arg(long, conflicts_with = "ticker")]
    pub snapshot: Option<String>,

    /// Ticker to look up in --data-dir
    #[arg(long, requires = "data_dir")]
    pub ticker: Option<String>,

    /// Directory of <TICKER>.json snapshot files
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Path to a JSON document with "snapshot" and optional "assumptions",
    /// "config" and "ticker" keys (also read from stdin)
    #[arg(long)]
    pub input: Option<String>,

    /// Engine config file (YAML or JSON)
    #[arg(long)]
    pub config: Option<String>,
}

/// Snapshot source plus forward assumptions.
#[derive(Args, Debug, Clone)]
#[command(allow_hyphen_values = true)]
pub struct ModelArgs {
    #[command(flatten)]
    pub source: SnapshotArgs,

    /// Revenue growth per forecast year, comma separated (e.g. 0.08,0.07,0.06,0.05,0.04);
    /// a single value is used for every year
    #[arg(long, value_delimiter = ',')]
    pub growth_rates: Option<Vec<Decimal>>,

    /// Terminal (perpetuity) growth rate
    #[arg(long)]
    pub terminal_growth: Option<Decimal>,

    /// Forecast horizon in years
    #[arg(long, default_value = "5")]
    pub years: u32,
}

/// Everything a command may take from an `--input` document or stdin.
#[derive(Debug, Default, Deserialize)]
pub struct ModelDocument {
    pub ticker: Option<String>,
    pub snapshot: Option<FinancialSnapshot>,
    pub assumptions: Option<Assumptions>,
    pub config: Option<EngineConfig>,
}

/// Resolved inputs for one engine run.
#[derive(Debug, Clone)]
pub struct Model {
    pub ticker: Option<String>,
    pub snapshot: FinancialSnapshot,
    pub assumptions: Assumptions,
    pub config: EngineConfig,
}

/// Resolved snapshot-only inputs.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub ticker: Option<String>,
    pub snapshot: FinancialSnapshot,
    pub config: EngineConfig,
    /// Leftover document, for callers that also want assumptions from it
    assumptions: Option<Assumptions>,
}

pub fn load_snapshot(args: &SnapshotArgs) -> Result<LoadedSnapshot, Box<dyn std::error::Error>> {
    let doc = read_document(args)?;

    let (ticker, snapshot) = if let Some(ref path) = args.snapshot {
        (doc.ticker, input::file::read_json::<FinancialSnapshot>(path)?)
    } else if let Some(ref ticker) = args.ticker {
        let dir = args
            .data_dir
            .as_deref()
            .ok_or("--data-dir is required with --ticker")?;
        let snapshot = JsonDirSource::new(dir).load(ticker)?;
        (Some(normalize_ticker(ticker)?), snapshot)
    } else if let Some(snapshot) = doc.snapshot {
        (doc.ticker, snapshot)
    } else if let (Some(ticker), Some(dir)) = (doc.ticker.as_deref(), args.data_dir.as_deref()) {
        let snapshot = JsonDirSource::new(dir).load(ticker)?;
        (Some(normalize_ticker(ticker)?), snapshot)
    } else {
        return Err(
            "No snapshot given: use --snapshot, --ticker with --data-dir, or --input / stdin"
                .into(),
        );
    };
    snapshot.validate()?;

    let config = match (&args.config, doc.config) {
        (Some(path), _) => input::file::read_config(path)?,
        (None, Some(config)) => {
            config.validate()?;
            config
        }
        (None, None) => EngineConfig::default(),
    };

    tracing::debug!(
        ticker = ticker.as_deref().unwrap_or("-"),
        years = ?snapshot.years,
        "snapshot loaded"
    );

    Ok(LoadedSnapshot {
        ticker,
        snapshot,
        config,
        assumptions: doc.assumptions,
    })
}

pub fn load_model(args: &ModelArgs) -> Result<Model, Box<dyn std::error::Error>> {
    let loaded = load_snapshot(&args.source)?;

    let assumptions = match (&args.growth_rates, loaded.assumptions) {
        (Some(rates), _) => {
            let terminal = args
                .terminal_growth
                .ok_or("--terminal-growth is required with --growth-rates")?;
            assumptions_from_flags(rates, terminal, args.years)
        }
        (None, Some(mut from_doc)) => {
            if let Some(g) = args.terminal_growth {
                from_doc.terminal_growth_rate = g;
            }
            from_doc
        }
        (None, None) => {
            return Err("No assumptions given: use --growth-rates and --terminal-growth, \
                        or an \"assumptions\" key in the input document"
                .into())
        }
    };
    assumptions.validate()?;

    Ok(Model {
        ticker: loaded.ticker,
        snapshot: loaded.snapshot,
        assumptions,
        config: loaded.config,
    })
}

fn assumptions_from_flags(
    rates: &[Decimal],
    terminal_growth: Decimal,
    years: u32,
) -> Assumptions {
    let revenue_growth_rates = match rates {
        [single] => vec![*single; years as usize],
        _ => rates.to_vec(),
    };
    Assumptions {
        revenue_growth_rates,
        terminal_growth_rate: terminal_growth,
        projection_years: years,
    }
}

fn read_document(args: &SnapshotArgs) -> Result<ModelDocument, Box<dyn std::error::Error>> {
    let value: Option<Value> = if let Some(ref path) = args.input {
        Some(input::file::read_json_value(path)?)
    } else if args.snapshot.is_none() && args.ticker.is_none() {
        input::stdin::read_stdin()?
    } else {
        None
    };

    match value {
        Some(v) => Ok(serde_json::from_value(v)?),
        None => Ok(ModelDocument::default()),
    }
}
