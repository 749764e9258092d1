//! Snapshot acquisition: the ticker-to-snapshot capability and the TTL cache
//! that sits in front of slow loaders.
//!
//! The valuation engine never touches this module; callers load a
//! [`FinancialSnapshot`](crate::snapshot::FinancialSnapshot) here and hand it
//! to the engine.

pub mod cache;
pub mod source;

pub use cache::{
    Clock, ManualClock, MemoryCache, SystemClock, TtlCache, DEFAULT_SNAPSHOT_TTL_HOURS,
};
pub use source::{normalize_ticker, CachedSource, SnapshotSource, StaticSource};
