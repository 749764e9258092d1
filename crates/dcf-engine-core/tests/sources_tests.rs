use chrono::{Duration, TimeZone, Utc};
use dcf_engine_core::sources::{
    CachedSource, ManualClock, MemoryCache, SnapshotSource, StaticSource, TtlCache,
};
use dcf_engine_core::{Assumptions, DcfEngine, DcfError, FinancialSnapshot};
use rust_decimal_macros::dec;

fn snapshot(price: &str) -> FinancialSnapshot {
    serde_json::from_value(serde_json::json!({
        "years": ["FY22", "FY23", "FY24"],
        "revenue": ["500", "550", "600"],
        "ebit": ["75", "82.5", "90"],
        "effective_tax_rate": ["0.25", "0.25", "0.25"],
        "interest_expense": ["-8", "-8", "-9"],
        "current_assets": ["150", "160", "170"],
        "current_liabilities": ["90", "95", "100"],
        "cash_and_equivalents": ["40", "45", "50"],
        "short_term_debt": ["10", "10", "10"],
        "long_term_debt": ["140", "140", "140"],
        "total_debt": ["150", "150", "150"],
        "total_assets": ["900", "950", "1000"],
        "total_liabilities": ["400", "410", "420"],
        "d_and_a": ["20", "22", "24"],
        "capex": ["-25", "-27", "-30"],
        "shares_outstanding": "40",
        "beta": "1.1",
        "stock_price": price,
        "market_cap": "1200",
        "risk_free_rate": "0.04",
        "market_return_rate": "0.09"
    }))
    .unwrap()
}

#[test]
fn test_cached_source_feeds_engine() {
    let source = StaticSource::new().with("widg", snapshot("30")).unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap());
    let cached = CachedSource::new(source, MemoryCache::with_clock(clock.clone()));

    let snap = cached.load(" Widg ").unwrap();
    let assumptions = Assumptions::new(vec![dec!(0.06); 5], dec!(0.02)).unwrap();
    let mut engine = DcfEngine::new(&snap, assumptions);
    let v = engine.compute_valuation().unwrap();

    assert!(v.result.is_defined());
    assert!(v.target_price > dec!(0));
    assert!(cached.cache().get("WIDG").is_some());
}

#[test]
fn test_cache_expires_after_default_ttl() {
    let source = StaticSource::new().with("WIDG", snapshot("30")).unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap());
    let cached = CachedSource::new(source, MemoryCache::with_clock(clock.clone()));

    cached.load("WIDG").unwrap();
    assert_eq!(cached.ttl(), Duration::hours(24));
    clock.advance(Duration::hours(24));
    assert!(cached.cache().get("WIDG").is_none());
    // reloads transparently
    assert_eq!(cached.load("WIDG").unwrap().stock_price, dec!(30));
}

#[test]
fn test_unknown_ticker_reports_source_unavailable() {
    let cached = CachedSource::new(StaticSource::new(), MemoryCache::new());
    match cached.load("nope").unwrap_err() {
        DcfError::SourceUnavailable { ticker, .. } => assert_eq!(ticker, "NOPE"),
        e => panic!("Expected SourceUnavailable, got {e:?}"),
    }
    assert!(matches!(
        cached.load("  ").unwrap_err(),
        DcfError::InvalidInput { .. }
    ));
}
