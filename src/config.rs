use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::Archetype;

pub type SharedConfig = Arc<RwLock<Config>>;

/// ATR multipliers for the volatility buffer, keyed by tactical template.
/// MeanReversion borrows the Scalp multiplier, matching its tight-stop
/// profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopMultipliers {
    pub scalp: f64,
    pub hunter: f64,
    pub p2p_trend: f64,
    pub mean_reversion: f64,
}

impl StopMultipliers {
    pub fn get(&self, archetype: Archetype) -> f64 {
        match archetype {
            Archetype::Scalp => self.scalp,
            Archetype::Hunter => self.hunter,
            Archetype::P2PTrend => self.p2p_trend,
            Archetype::MeanReversion => self.mean_reversion,
        }
    }
}

impl Default for StopMultipliers {
    fn default() -> Self {
        Self {
            scalp: 0.7,
            hunter: 1.2,
            p2p_trend: 1.5,
            mean_reversion: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Universe
    pub instruments: Vec<String>,

    // Paper trading
    pub paper_trade: bool,

    // Entry gating
    pub score_entry_threshold: i32,
    pub probability_threshold: f64,
    pub enable_vpa_filter: bool,
    pub mean_reversion_deviation: f64,

    // Exits
    pub rvol_exit_multiplier: f64,
    pub rvol_lookback: usize,

    // Stop-loss engine
    pub stop_multipliers: StopMultipliers,
    pub swing_lookback: usize,
    pub atr_lookback: usize,

    // Indicators
    pub vpa_lookback: usize,
    pub evwma_decay_1m: f64,
    pub evwma_decay_5m: f64,

    // Per-instrument history retained for lookback computations
    pub history_limit: usize,

    // Worker channel capacity
    pub channel_capacity: usize,

    // Logging
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let instruments: Vec<String> = env("INSTRUMENTS", "NSE_INDEX|Nifty 50,NSE_INDEX|Nifty Bank")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Config {
            instruments,
            paper_trade: env("PAPER_TRADE", "true").to_lowercase() == "true",
            score_entry_threshold: env("SCORE_THRESHOLD", "7").parse().unwrap_or(7),
            probability_threshold: env("PROBABILITY_THRESHOLD", "75").parse().unwrap_or(75.0),
            enable_vpa_filter: env("USE_VPA_FILTER", "true").to_lowercase() == "true",
            mean_reversion_deviation: env("MEAN_REVERSION_DEVIATION", "0.01")
                .parse()
                .unwrap_or(0.01),
            rvol_exit_multiplier: env("RVOL_EXIT_MULTIPLIER", "4.0").parse().unwrap_or(4.0),
            rvol_lookback: env("RVOL_LOOKBACK", "20").parse().unwrap_or(20),
            stop_multipliers: StopMultipliers {
                scalp: env("STOP_MULT_SCALP", "0.7").parse().unwrap_or(0.7),
                hunter: env("STOP_MULT_HUNTER", "1.2").parse().unwrap_or(1.2),
                p2p_trend: env("STOP_MULT_P2P", "1.5").parse().unwrap_or(1.5),
                mean_reversion: env("STOP_MULT_MEAN_REVERSION", "0.7").parse().unwrap_or(0.7),
            },
            swing_lookback: env("SWING_LOOKBACK", "20").parse().unwrap_or(20),
            atr_lookback: env("ATR_LOOKBACK", "14").parse().unwrap_or(14),
            vpa_lookback: env("VPA_LOOKBACK", "10").parse().unwrap_or(10),
            evwma_decay_1m: env("EVWMA_DECAY_1M", "20").parse().unwrap_or(20.0),
            evwma_decay_5m: env("EVWMA_DECAY_5M", "20").parse().unwrap_or(20.0),
            history_limit: env("HISTORY_LIMIT", "500").parse().unwrap_or(500),
            channel_capacity: env("CHANNEL_CAPACITY", "1024").parse().unwrap_or(1024),
            log_level: env("LOG_LEVEL", "info").to_string(),
        }
    }

    pub fn shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }
}
