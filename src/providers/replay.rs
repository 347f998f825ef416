use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

use crate::models::{Candle, CandleSeries, Tick};
use crate::options::StrikeEntry;
use crate::providers::{HistoricalBars, OptionChainProvider};

/// File-backed market data for paper sessions. Each instrument has a JSON
/// file of 1-minute candles, oldest first; the latest date in the file is
/// the session being replayed, everything before it is history. Splitting
/// on that date keeps the warmup path from seeing the replayed session.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    root: PathBuf,
}

impl ReplayProvider {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn bars_path(&self, instrument: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize(instrument)))
    }

    fn chain_path(&self, instrument: &str) -> PathBuf {
        self.root.join(format!("{}_chain.json", sanitize(instrument)))
    }

    fn load_bars(&self, instrument: &str) -> Result<Vec<Candle>> {
        let path = self.bars_path(instrument);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading bars from {}", path.display()))?;
        let bars: Vec<Candle> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing bars from {}", path.display()))?;
        Ok(bars)
    }

    fn last_date(bars: &[Candle]) -> Option<NaiveDate> {
        bars.last().map(|b| b.timestamp.date_naive())
    }

    /// The bars of the replayed session itself, oldest first.
    pub fn session_bars(&self, instrument: &str) -> Result<CandleSeries> {
        let bars = self.load_bars(instrument)?;
        let session = Self::last_date(&bars).context("empty bar file")?;
        Ok(CandleSeries::new(
            bars.into_iter()
                .filter(|b| b.timestamp.date_naive() == session)
                .collect(),
        ))
    }
}

#[async_trait]
impl HistoricalBars for ReplayProvider {
    async fn fetch_intraday(&self, instrument: &str, days: u32) -> Result<CandleSeries> {
        let bars = self.load_bars(instrument)?;
        let session = Self::last_date(&bars).context("empty bar file")?;

        let mut dates: Vec<NaiveDate> = bars
            .iter()
            .map(|b| b.timestamp.date_naive())
            .filter(|d| *d < session)
            .collect();
        dates.dedup();
        let keep: Vec<NaiveDate> = dates
            .into_iter()
            .rev()
            .take(days as usize)
            .collect();

        Ok(CandleSeries::new(
            bars.into_iter()
                .filter(|b| keep.contains(&b.timestamp.date_naive()))
                .collect(),
        ))
    }
}

#[async_trait]
impl OptionChainProvider for ReplayProvider {
    /// Missing chain files read as an empty chain, which downstream treats
    /// as neutral sentiment.
    async fn fetch_chain(&self, instrument: &str) -> Result<Vec<StrikeEntry>> {
        let path = self.chain_path(instrument);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading chain from {}", path.display()))?;
        let chain: Vec<StrikeEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing chain from {}", path.display()))?;
        Ok(chain)
    }
}

/// Synthesize the four prints a bar pins down, spaced inside its minute.
pub fn ticks_from_bar(instrument: &str, bar: &Candle) -> Vec<Tick> {
    let qty = bar.volume / 4.0;
    [
        (0, bar.open),
        (15, bar.high),
        (30, bar.low),
        (45, bar.close),
    ]
    .iter()
    .map(|&(secs, price)| {
        Tick::new(
            instrument,
            price,
            qty,
            bar.timestamp + chrono::Duration::seconds(secs),
        )
    })
    .collect()
}

fn sanitize(instrument: &str) -> String {
    instrument
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
