use crate::klines::{Timeframe, parse_latest_candle};
use crate::price_change::CandleSample;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::trace;

pub const DEFAULT_BASE_URL: &str = "https://openapi.blofin.com";

const INSTRUMENTS_PATH: &str = "/api/v1/market/instruments";
const CANDLES_PATH: &str = "/api/v1/market/candles";

/// One element of the instrument listing, as returned by the venue.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RawInstrument {
    #[serde(rename = "instId")]
    pub inst_id: String,
    #[serde(rename = "instType")]
    pub inst_type: String,
}

/// Response envelope shared by every public market endpoint.
#[derive(Deserialize, Debug)]
struct Envelope<T> {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    data: T,
}

/// Read-only market data the scanner needs from the venue.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn instruments(&self) -> Result<Vec<RawInstrument>>;

    /// Most recent candle for `inst_id`, or `None` when the venue returned no rows.
    async fn latest_candle(&self, inst_id: &str, timeframe: Timeframe) -> Result<Option<CandleSample>>;
}

pub struct BlofinClient {
    http: Client,
    base_url: String,
}

impl BlofinClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .pool_max_idle_per_host(50)
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("request to {path} failed"))?;

        check_status(response.status(), path)?;

        let envelope: Envelope<T> = response
            .json()
            .await
            .with_context(|| format!("malformed payload from {path}"))?;

        check_code(&envelope)?;
        Ok(envelope.data)
    }
}

fn check_status(status: StatusCode, path: &str) -> Result<()> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        bail!("rate limited by venue on {path}");
    }
    if !status.is_success() {
        bail!("{path} returned {status}");
    }
    Ok(())
}

/// Query for the single most recent candle.
fn candle_query(inst_id: &str, timeframe: Timeframe) -> [(&'static str, String); 3] {
    [
        ("instId", inst_id.to_string()),
        ("bar", timeframe.bar().to_string()),
        ("limit", "1".to_string()),
    ]
}

fn check_code<T>(envelope: &Envelope<T>) -> Result<()> {
    match envelope.code.as_deref() {
        None | Some("0") => Ok(()),
        Some(code) => Err(anyhow!(
            "venue error {code}: {}",
            envelope.msg.as_deref().unwrap_or("no message")
        )),
    }
}

#[async_trait]
impl MarketData for BlofinClient {
    async fn instruments(&self) -> Result<Vec<RawInstrument>> {
        let instruments: Vec<RawInstrument> = self.get(INSTRUMENTS_PATH, &[]).await?;
        trace!(count = instruments.len(), "instrument listing received");
        Ok(instruments)
    }

    async fn latest_candle(&self, inst_id: &str, timeframe: Timeframe) -> Result<Option<CandleSample>> {
        let query = candle_query(inst_id, timeframe);
        let rows: Vec<Vec<Value>> = self.get(CANDLES_PATH, &query).await?;
        parse_latest_candle(&rows).with_context(|| format!("bad candle row for {inst_id} {timeframe}"))
    }
}
