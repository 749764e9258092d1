use std::fs;
use std::path::PathBuf;

use dcf_engine_core::sources::{normalize_ticker, SnapshotSource};
use dcf_engine_core::{DcfError, DcfResult, FinancialSnapshot};

/// Snapshots stored as `<dir>/<TICKER>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{ticker}.json"))
    }
}

impl SnapshotSource for JsonDirSource {
    fn load(&self, ticker: &str) -> DcfResult<FinancialSnapshot> {
        let ticker = normalize_ticker(ticker)?;
        let path = self.path_for(&ticker);
        tracing::debug!(%ticker, path = %path.display(), "reading snapshot file");

        let contents = fs::read_to_string(&path).map_err(|e| DcfError::SourceUnavailable {
            ticker: ticker.clone(),
            reason: format!("{}: {e}", path.display()),
        })?;
        let snapshot: FinancialSnapshot =
            serde_json::from_str(&contents).map_err(|e| DcfError::SourceUnavailable {
                ticker: ticker.clone(),
                reason: format!("{}: {e}", path.display()),
            })?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}
