pub mod assumptions;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod time_value;
pub mod trace;
pub mod types;

#[cfg(feature = "valuation")]
pub mod valuation;

#[cfg(feature = "sources")]
pub mod sources;

pub use assumptions::Assumptions;
pub use config::{EngineConfig, SensitivityConfig};
pub use error::DcfError;
pub use snapshot::FinancialSnapshot;
pub use trace::CalculationTrace;
pub use types::*;

#[cfg(feature = "valuation")]
pub use valuation::engine::{DcfEngine, Valuation};
#[cfg(feature = "valuation")]
pub use valuation::report::{ReportOptions, ValuationReport};

/// Standard result type for all engine operations
pub type DcfResult<T> = Result<T, DcfError>;
