use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::stop_loss::StopLossPlan;
use crate::models::{Archetype, Direction, ExitReason};
use crate::options::OptionLeg;

/// A fully-gated entry decision, ready for a transport to act on.
/// The leg is the ATM option the trade executes through; None when no
/// chain snapshot was available at decision time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryIntent {
    pub instrument: String,
    pub direction: Direction,
    pub archetype: Archetype,
    pub entry_price: f64,
    pub score_total: i32,
    pub probability: f64,
    pub stop: StopLossPlan,
    pub leg: Option<OptionLeg>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    Entry(EntryIntent),
    Exit(ExitIntent),
}

impl Intent {
    pub fn instrument(&self) -> &str {
        match self {
            Intent::Entry(e) => &e.instrument,
            Intent::Exit(e) => &e.instrument,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitIntent {
    pub instrument: String,
    pub direction: Direction,
    pub exit_price: f64,
    pub reason: ExitReason,
    pub timestamp: DateTime<Utc>,
}
