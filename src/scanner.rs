//! Scan coordinator: discovers instruments, fetches the three timeframes for
//! each under a bounded worker pool and hands the records to the ranker.

use crate::client::MarketData;
use crate::filter_utils::InstrumentFilter;
use crate::find_tickers::{Instrument, InstrumentCache};
use crate::klines::{CandleStat, Timeframe, fetch_candle_stat};
use crate::pacer::RequestPacer;
use crate::ranking::rank;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::future::{Future, pending};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Instruments scanned at the same time.
    pub concurrency: usize,
    /// Minimum gap between two candle requests, across all workers.
    pub min_request_spacing: Duration,
    /// Budget for the per-instrument phase. The clock starts once the catalog
    /// is known; discovery itself is bounded by the HTTP request timeout.
    pub deadline: Duration,
    /// How long in-flight instruments may still finish after cancellation.
    pub grace: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: 10,
            min_request_spacing: Duration::from_millis(25),
            deadline: Duration::from_secs(30),
            grace: Duration::from_millis(500),
        }
    }
}

/// One output row.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRecord {
    pub inst_id: String,
    /// Close of the latest 5-minute candle.
    pub price: f64,
    pub change_5m: f64,
    pub change_15m: f64,
    pub change_1h: f64,
    /// Timeframes whose numbers are a zero fallback rather than real data.
    pub degraded: Vec<Timeframe>,
}

impl ScanRecord {
    fn from_stats(inst_id: String, m5: CandleStat, m15: CandleStat, h1: CandleStat) -> Self {
        let degraded = [(Timeframe::M5, m5), (Timeframe::M15, m15), (Timeframe::H1, h1)]
            .into_iter()
            .filter(|(_, stat)| stat.is_degraded())
            .map(|(tf, _)| tf)
            .collect();

        Self {
            inst_id,
            price: m5.price,
            change_5m: m5.change_pct,
            change_15m: m15.change_pct,
            change_1h: h1.change_pct,
            degraded,
        }
    }

    pub fn change(&self, timeframe: Timeframe) -> f64 {
        match timeframe {
            Timeframe::M5 => self.change_5m,
            Timeframe::M15 => self.change_15m,
            Timeframe::H1 => self.change_1h,
        }
    }

    pub fn is_degraded(&self, timeframe: Timeframe) -> bool {
        self.degraded.contains(&timeframe)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Ok,
    NoInstrumentsFound,
    /// Deadline hit or cancelled; `records` holds what completed in time.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ScanResult {
    pub status: ScanStatus,
    /// Ranked by 15-minute change, descending.
    pub records: Vec<ScanRecord>,
    /// Instruments selected for this scan (`min(catalog, limit)`).
    pub requested: usize,
    pub completed_at: DateTime<Utc>,
}

impl ScanResult {
    fn no_instruments() -> Self {
        Self {
            status: ScanStatus::NoInstrumentsFound,
            records: Vec::new(),
            requested: 0,
            completed_at: Utc::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ScanStatus::Ok
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct Scanner {
    source: Arc<dyn MarketData>,
    filter: InstrumentFilter,
    catalog: InstrumentCache,
    pacer: RequestPacer,
    options: ScanOptions,
}

impl Scanner {
    pub fn new(
        source: Arc<dyn MarketData>,
        filter: InstrumentFilter,
        catalog: InstrumentCache,
        options: ScanOptions,
    ) -> Self {
        Self {
            source,
            filter,
            catalog,
            pacer: RequestPacer::new(options.min_request_spacing),
            options,
        }
    }

    /// Scans up to `limit` instruments, bounded only by the configured deadline.
    pub async fn scan<P>(&self, limit: usize, progress: P) -> ScanResult
    where
        P: FnMut(usize, usize),
    {
        self.scan_until(limit, progress, pending::<()>()).await
    }

    /// Like [`Scanner::scan`], but also stops when `cancel` resolves.
    ///
    /// `progress(done, total)` fires once per finished instrument with `done`
    /// going 1..=total. Never fails: degraded fetches show up as zeros in the
    /// records, a missing catalog as [`ScanStatus::NoInstrumentsFound`].
    pub async fn scan_until<P, C>(&self, limit: usize, mut progress: P, cancel: C) -> ScanResult
    where
        P: FnMut(usize, usize),
        C: Future<Output = ()>,
    {
        let started = Instant::now();
        let mut instruments = self.catalog.get_or_fetch(self.source.as_ref(), &self.filter).await;
        instruments.truncate(limit);

        if instruments.is_empty() {
            warn!(limit, "no instruments to scan");
            return ScanResult::no_instruments();
        }

        let total = instruments.len();
        info!(total, concurrency = self.options.concurrency, "scan started");

        let stopped = AtomicBool::new(false);
        let stop_flag = &stopped;
        let mut slots: Vec<Option<ScanRecord>> = vec![None; total];

        // Tasks that start after cancellation return without fetching.
        let mut tasks = stream::iter(instruments.into_iter().enumerate())
            .map(move |(idx, instrument)| async move {
                if stop_flag.load(Ordering::Acquire) {
                    return (idx, None);
                }
                (idx, Some(self.scan_instrument(instrument).await))
            })
            .buffer_unordered(self.options.concurrency.max(1));

        let deadline = sleep(self.options.deadline);
        tokio::pin!(deadline);
        tokio::pin!(cancel);

        let mut done = 0usize;
        let mut store = |idx: usize, record: Option<ScanRecord>, done: &mut usize| {
            if let Some(record) = record {
                slots[idx] = Some(record);
                *done += 1;
                progress(*done, total);
            }
        };

        let status = loop {
            tokio::select! {
                next = tasks.next() => match next {
                    Some((idx, record)) => store(idx, record, &mut done),
                    None => break ScanStatus::Ok,
                },
                _ = &mut deadline => {
                    warn!(done, total, "scan deadline exceeded");
                    break ScanStatus::Cancelled;
                }
                _ = &mut cancel => {
                    warn!(done, total, "scan cancelled");
                    break ScanStatus::Cancelled;
                }
            }
        };

        if status == ScanStatus::Cancelled {
            stopped.store(true, Ordering::Release);
            let drained = timeout(self.options.grace, async {
                while let Some((idx, record)) = tasks.next().await {
                    store(idx, record, &mut done);
                }
            })
            .await;
            if drained.is_err() {
                debug!(abandoned = total - done, "in-flight instruments abandoned");
            }
        }
        drop(tasks);

        let records = rank(slots.into_iter().flatten().collect());
        info!(
            scanned = records.len(),
            total,
            ?status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan finished"
        );

        ScanResult {
            status,
            records,
            requested: total,
            completed_at: Utc::now(),
        }
    }

    async fn scan_instrument(&self, instrument: Instrument) -> ScanRecord {
        let inst_id = instrument.inst_id.as_str();
        let (m5, m15, h1) = tokio::join!(
            self.paced_stat(inst_id, Timeframe::M5),
            self.paced_stat(inst_id, Timeframe::M15),
            self.paced_stat(inst_id, Timeframe::H1),
        );
        debug!(
            inst_id,
            price = m5.price,
            change_5m = m5.change_pct,
            change_15m = m15.change_pct,
            change_1h = h1.change_pct,
            "instrument scanned"
        );
        ScanRecord::from_stats(instrument.inst_id, m5, m15, h1)
    }

    async fn paced_stat(&self, inst_id: &str, timeframe: Timeframe) -> CandleStat {
        self.pacer.acquire().await;
        fetch_candle_stat(self.source.as_ref(), inst_id, timeframe).await
    }
}
