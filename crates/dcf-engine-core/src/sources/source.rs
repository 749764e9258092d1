use chrono::Duration;
use std::collections::HashMap;

use crate::error::DcfError;
use crate::snapshot::FinancialSnapshot;
use crate::DcfResult;

use super::cache::{TtlCache, DEFAULT_SNAPSHOT_TTL_HOURS};

/// Anything that can turn a ticker into a normalised snapshot.
pub trait SnapshotSource: Send + Sync {
    fn load(&self, ticker: &str) -> DcfResult<FinancialSnapshot>;
}

/// Canonical ticker form used as a lookup and cache key: trimmed, upper-case.
pub fn normalize_ticker(ticker: &str) -> DcfResult<String> {
    let normalized = ticker.trim().to_uppercase();
    if normalized.is_empty() {
        return Err(DcfError::InvalidInput {
            field: "ticker".into(),
            reason: "Ticker cannot be empty".into(),
        });
    }
    Ok(normalized)
}

/// Fixed in-memory set of snapshots.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    snapshots: HashMap<String, FinancialSnapshot>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: &str, snapshot: FinancialSnapshot) -> DcfResult<()> {
        self.snapshots.insert(normalize_ticker(ticker)?, snapshot);
        Ok(())
    }

    pub fn with(mut self, ticker: &str, snapshot: FinancialSnapshot) -> DcfResult<Self> {
        self.insert(ticker, snapshot)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl SnapshotSource for StaticSource {
    fn load(&self, ticker: &str) -> DcfResult<FinancialSnapshot> {
        let key = normalize_ticker(ticker)?;
        self.snapshots
            .get(&key)
            .cloned()
            .ok_or(DcfError::SourceUnavailable {
                ticker: key,
                reason: "No snapshot registered".into(),
            })
    }
}

/// Wraps a source with a TTL cache. Snapshots are validated before they are
/// cached, so a malformed load is reported on every attempt. Expired entries
/// are purged on every miss.
pub struct CachedSource<S, C> {
    inner: S,
    cache: C,
    ttl: Duration,
}

impl<S, C> CachedSource<S, C>
where
    S: SnapshotSource,
    C: TtlCache<FinancialSnapshot>,
{
    pub fn new(inner: S, cache: C) -> Self {
        Self::with_ttl(inner, cache, Duration::hours(DEFAULT_SNAPSHOT_TTL_HOURS))
    }

    pub fn with_ttl(inner: S, cache: C, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Drop a ticker so the next load goes to the inner source.
    pub fn refresh(&self, ticker: &str) -> DcfResult<()> {
        self.cache.invalidate(&normalize_ticker(ticker)?);
        Ok(())
    }
}

impl<S, C> SnapshotSource for CachedSource<S, C>
where
    S: SnapshotSource,
    C: TtlCache<FinancialSnapshot>,
{
    fn load(&self, ticker: &str) -> DcfResult<FinancialSnapshot> {
        let key = normalize_ticker(ticker)?;

        if let Some(snapshot) = self.cache.get(&key) {
            tracing::debug!(ticker = %key, "snapshot cache hit");
            return Ok(snapshot);
        }

        tracing::debug!(ticker = %key, "snapshot cache miss; loading");
        self.cache.purge_expired();
        let snapshot = self.inner.load(&key)?;
        if let Err(err) = snapshot.validate() {
            tracing::warn!(ticker = %key, error = %err, "loaded snapshot failed validation");
            return Err(err);
        }

        self.cache.set_with_ttl(&key, snapshot.clone(), self.ttl);
        Ok(snapshot)
    }
}
