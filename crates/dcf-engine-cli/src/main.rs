mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::drivers::SnapshotOnlyArgs;
use commands::valuation::{PriceArgs, SensitivityArgs, ValueArgs};

/// 12-month forward DCF target prices with decimal precision
#[derive(Parser)]
#[command(
    name = "dcf",
    version,
    about = "12-month forward DCF target prices",
    long_about = "Values a company from three years of financial statements and a \
                  five-year revenue growth path: historical margins, WACC, an \
                  unlevered free cash flow forecast, a Gordon growth terminal value \
                  and a 12-month price bridge, plus a WACC x growth sensitivity grid."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Full valuation report: target price, WACC, forecast and sensitivity
    Value(ValueArgs),
    /// Target price over a WACC x terminal growth grid
    Sensitivity(SensitivityArgs),
    /// What-if target price for a given WACC and terminal growth
    Price(PriceArgs),
    /// WACC breakdown for a snapshot
    Wacc(SnapshotOnlyArgs),
    /// Historical margin estimate for a snapshot
    Margins(SnapshotOnlyArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing() {
    // stdout carries results; diagnostics go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Value(args) => commands::valuation::run_value(args),
        Commands::Sensitivity(args) => commands::valuation::run_sensitivity(args),
        Commands::Price(args) => commands::valuation::run_price(args),
        Commands::Wacc(args) => commands::drivers::run_wacc(args),
        Commands::Margins(args) => commands::drivers::run_margins(args),
        Commands::Version => {
            println!("dcf {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
