pub mod paper;
pub mod replay;

pub use paper::PaperTransport;
pub use replay::ReplayProvider;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::intents::{EntryIntent, ExitIntent};
use crate::models::{CandleSeries, Direction};
use crate::options::StrikeEntry;

/// Historical 1-minute bars for warmup and prior-session zone computation.
#[async_trait]
pub trait HistoricalBars: Send + Sync {
    /// Most recent `days` trading days of 1-minute bars, oldest first.
    async fn fetch_intraday(&self, instrument: &str, days: u32) -> Result<CandleSeries>;
}

/// Option-chain snapshots for sentiment and ATM leg resolution.
#[async_trait]
pub trait OptionChainProvider: Send + Sync {
    async fn fetch_chain(&self, instrument: &str) -> Result<Vec<StrikeEntry>>;
}

/// What the transport reports back after acting on an intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: u64,
    pub instrument: String,
    pub direction: Direction,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Order placement seam. The paper transport is the only in-tree
/// implementation; a broker-backed one slots in behind the same trait.
#[async_trait]
pub trait OrderTransport: Send + Sync {
    async fn submit_entry(&mut self, intent: &EntryIntent) -> Result<Fill>;
    async fn submit_exit(&mut self, intent: &ExitIntent) -> Result<Fill>;
}
