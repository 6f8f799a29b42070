use crate::client::MarketData;
use crate::price_change::{CandleSample, deserialize_f64_lenient};
use anyhow::{Result, anyhow};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

const OPEN_INDEX: usize = 1;
const CLOSE_INDEX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    M5,
    M15,
    H1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::M5, Timeframe::M15, Timeframe::H1];

    /// Value of the `bar` query parameter.
    pub fn bar(self) -> &'static str {
        match self {
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1H",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a candle fetch actually went. The numbers in [`CandleStat`] are zero
/// for everything except `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Ok,
    NoData,
    ZeroOpen,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandleStat {
    pub price: f64,
    pub change_pct: f64,
    pub outcome: FetchOutcome,
}

impl CandleStat {
    fn degraded(outcome: FetchOutcome) -> Self {
        Self {
            price: 0.0,
            change_pct: 0.0,
            outcome,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.outcome != FetchOutcome::Ok
    }
}

/// Extracts open/close from the first row of a candle listing.
pub fn parse_latest_candle(rows: &[Vec<Value>]) -> Result<Option<CandleSample>> {
    let Some(latest) = rows.first() else {
        return Ok(None);
    };

    let field = |index: usize, name: &str| -> Result<f64> {
        let raw = latest
            .get(index)
            .ok_or_else(|| anyhow!("candle row has no {name} column"))?;
        let value = deserialize_f64_lenient(raw)?.ok_or_else(|| anyhow!("candle {name} is empty"))?;
        if !value.is_finite() {
            return Err(anyhow!("candle {name} is not finite: {value}"));
        }
        Ok(value)
    };

    let open = field(OPEN_INDEX, "open")?;
    let close = field(CLOSE_INDEX, "close")?;
    Ok(Some(CandleSample::new(open, close)))
}

/// Current price and percent change for one instrument on one timeframe.
///
/// Never fails: transport and parse errors, empty responses and a zero open
/// all collapse to `(0.0, 0.0)`; `outcome` records which one happened.
pub async fn fetch_candle_stat(source: &dyn MarketData, inst_id: &str, timeframe: Timeframe) -> CandleStat {
    match source.latest_candle(inst_id, timeframe).await {
        Ok(Some(sample)) if sample.open == 0.0 => {
            debug!(inst_id, %timeframe, "candle open is zero");
            CandleStat::degraded(FetchOutcome::ZeroOpen)
        }
        Ok(Some(sample)) => CandleStat {
            price: sample.close,
            change_pct: sample.change_pct(),
            outcome: FetchOutcome::Ok,
        },
        Ok(None) => {
            debug!(inst_id, %timeframe, "no candle data");
            CandleStat::degraded(FetchOutcome::NoData)
        }
        Err(err) => {
            warn!(inst_id, %timeframe, error = %format!("{err:#}"), "candle fetch failed");
            CandleStat::degraded(FetchOutcome::Failed)
        }
    }
}
