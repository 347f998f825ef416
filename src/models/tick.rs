use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single trade print from the market-data feed. Ticks are ephemeral:
/// the aggregator folds them into candles and the live stop-loss monitor
/// reads the price, nothing else retains them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub instrument: String,
    pub price: f64,
    /// Quantity traded since the previous tick, not the session total.
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    pub fn new(instrument: &str, price: f64, quantity: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            instrument: instrument.to_string(),
            price,
            quantity,
            timestamp,
        }
    }
}
