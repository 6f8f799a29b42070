use crate::client::MarketData;
use crate::filter_utils::{InstrumentFilter, matches_filters};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_CATALOG_MAX_AGE: Duration = Duration::from_secs(300);

/// A tradable perpetual swap that passed the [`InstrumentFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub inst_id: String,
    pub inst_type: String,
    pub quote_currency: String,
}

/// Lists eligible instruments in venue order.
///
/// Transport failures and malformed payloads are logged and reported as an
/// empty catalog; callers treat empty as "no data available".
pub async fn list_instruments(source: &dyn MarketData, filter: &InstrumentFilter) -> Vec<Instrument> {
    let raw = match source.instruments().await {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "instrument discovery failed");
            return Vec::new();
        }
    };

    let total = raw.len();
    let instruments: Vec<Instrument> = raw
        .into_iter()
        .filter(|r| matches_filters(r, filter))
        .map(|r| Instrument {
            inst_id: r.inst_id,
            inst_type: r.inst_type,
            quote_currency: filter.quote_currency().to_string(),
        })
        .collect();

    info!(listed = total, eligible = instruments.len(), "instrument catalog fetched");
    instruments
}

/// Last discovery result plus the instant it was fetched.
pub struct InstrumentCache {
    max_age: Duration,
    entry: RwLock<Option<(Vec<Instrument>, Instant)>>,
}

impl InstrumentCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            entry: RwLock::new(None),
        }
    }

    /// Returns the cached catalog while it is younger than `max_age`,
    /// otherwise fetches a fresh one. Empty catalogs are never cached.
    pub async fn get_or_fetch(&self, source: &dyn MarketData, filter: &InstrumentFilter) -> Vec<Instrument> {
        if let Some((instruments, fetched_at)) = self.entry.read().await.as_ref() {
            if fetched_at.elapsed() < self.max_age {
                debug!(age_ms = fetched_at.elapsed().as_millis() as u64, "using cached instrument catalog");
                return instruments.clone();
            }
        }

        let instruments = list_instruments(source, filter).await;
        let mut entry = self.entry.write().await;
        if instruments.is_empty() {
            *entry = None;
        } else {
            *entry = Some((instruments.clone(), Instant::now()));
        }
        instruments
    }

    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }
}

impl Default for InstrumentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CATALOG_MAX_AGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RawInstrument;
    use crate::klines::Timeframe;
    use crate::price_change::CandleSample;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Listing {
        raw: Vec<RawInstrument>,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl Listing {
        fn new(ids: &[(&str, &str)]) -> Self {
            Self {
                raw: ids
                    .iter()
                    .map(|(id, kind)| RawInstrument {
                        inst_id: id.to_string(),
                        inst_type: kind.to_string(),
                    })
                    .collect(),
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MarketData for Listing {
        async fn instruments(&self) -> Result<Vec<RawInstrument>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(anyhow!("connection refused"));
            }
            Ok(self.raw.clone())
        }

        async fn latest_candle(&self, _inst_id: &str, _timeframe: Timeframe) -> Result<Option<CandleSample>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_filters_and_keeps_order() {
        let source = Listing::new(&[
            ("ETH-USDT", "SWAP"),
            ("BTC-USDC", "SWAP"),
            ("SOL-USDT", "SPOT"),
            ("BTC-USDT", "SWAP"),
        ]);
        let filter = InstrumentFilter::perpetuals_quoted_in("USDT");
        let instruments = list_instruments(&source, &filter).await;
        let ids: Vec<&str> = instruments.iter().map(|i| i.inst_id.as_str()).collect();
        assert_eq!(ids, vec!["ETH-USDT", "BTC-USDT"]);
        assert!(instruments.iter().all(|i| i.quote_currency == "USDT" && i.inst_type == "SWAP"));
    }

    #[tokio::test]
    async fn test_failure_is_empty() {
        let source = Listing::new(&[("BTC-USDT", "SWAP")]);
        source.fail.store(true, Ordering::SeqCst);
        let filter = InstrumentFilter::perpetuals_quoted_in("USDT");
        assert!(list_instruments(&source, &filter).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires_after_max_age() {
        let source = Listing::new(&[("BTC-USDT", "SWAP")]);
        let filter = InstrumentFilter::perpetuals_quoted_in("USDT");
        let cache = InstrumentCache::new(Duration::from_secs(300));

        assert_eq!(cache.get_or_fetch(&source, &filter).await.len(), 1);
        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get_or_fetch(&source, &filter).await.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        cache.get_or_fetch(&source, &filter).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        cache.invalidate().await;
        cache.get_or_fetch(&source, &filter).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_catalog_not_cached() {
        let source = Listing::new(&[("BTC-USDT", "SWAP")]);
        source.fail.store(true, Ordering::SeqCst);
        let filter = InstrumentFilter::perpetuals_quoted_in("USDT");
        let cache = InstrumentCache::default();

        assert!(cache.get_or_fetch(&source, &filter).await.is_empty());
        source.fail.store(false, Ordering::SeqCst);
        assert_eq!(cache.get_or_fetch(&source, &filter).await.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
