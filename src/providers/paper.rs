use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use crate::engine::intents::{EntryIntent, ExitIntent};
use crate::models::{Archetype, Direction, ExitReason};
use crate::options::OptionLeg;
use crate::providers::{Fill, OrderTransport};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperPosition {
    pub order_id: u64,
    pub direction: Direction,
    pub archetype: Archetype,
    pub entry_price: f64,
    pub leg: Option<OptionLeg>,
    pub entry_time: chrono::DateTime<chrono::Utc>,
}

/// A completed round trip, one JSON line in the trade log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperTrade {
    pub order_id: u64,
    pub instrument: String,
    pub direction: Direction,
    pub archetype: Archetype,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl_points: f64,
    pub reason: ExitReason,
    pub entry_time: chrono::DateTime<chrono::Utc>,
    pub exit_time: chrono::DateTime<chrono::Utc>,
}

/// In-memory fills with an append-only JSON-lines trade log. Tracks index
/// points rather than premium; good enough to judge the signal engine.
pub struct PaperTransport {
    next_order_id: u64,
    open: HashMap<String, PaperPosition>,
    closed: Vec<PaperTrade>,
    log_file: Option<PathBuf>,
}

impl PaperTransport {
    pub fn new(log_file: Option<PathBuf>) -> Self {
        Self {
            next_order_id: 1,
            open: HashMap::new(),
            closed: Vec::new(),
            log_file,
        }
    }

    pub fn open_positions(&self) -> &HashMap<String, PaperPosition> {
        &self.open
    }

    pub fn closed_trades(&self) -> &[PaperTrade] {
        &self.closed
    }

    pub fn total_pnl_points(&self) -> f64 {
        self.closed.iter().map(|t| t.pnl_points).sum()
    }

    fn append_log(&self, trade: &PaperTrade) -> Result<()> {
        let path = match &self.log_file {
            Some(p) => p,
            None => return Ok(()),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening trade log {}", path.display()))?;
        let line = serde_json::to_string(trade)?;
        writeln!(file, "{line}").context("writing trade log")?;
        Ok(())
    }
}

#[async_trait]
impl OrderTransport for PaperTransport {
    async fn submit_entry(&mut self, intent: &EntryIntent) -> Result<Fill> {
        if self.open.contains_key(&intent.instrument) {
            bail!("position already open for {}", intent.instrument);
        }
        let order_id = self.next_order_id;
        self.next_order_id += 1;

        info!(
            order_id,
            instrument = %intent.instrument,
            direction = %intent.direction,
            archetype = %intent.archetype,
            price = intent.entry_price,
            leg = ?intent.leg.as_ref().map(|l| &l.instrument_key),
            "paper entry"
        );
        self.open.insert(
            intent.instrument.clone(),
            PaperPosition {
                order_id,
                direction: intent.direction,
                archetype: intent.archetype,
                entry_price: intent.entry_price,
                leg: intent.leg.clone(),
                entry_time: intent.timestamp,
            },
        );
        Ok(Fill {
            order_id,
            instrument: intent.instrument.clone(),
            direction: intent.direction,
            price: intent.entry_price,
            timestamp: intent.timestamp,
        })
    }

    async fn submit_exit(&mut self, intent: &ExitIntent) -> Result<Fill> {
        let position = self
            .open
            .remove(&intent.instrument)
            .with_context(|| format!("no open position for {}", intent.instrument))?;

        let pnl_points = match position.direction {
            Direction::Long => intent.exit_price - position.entry_price,
            Direction::Short => position.entry_price - intent.exit_price,
        };
        let trade = PaperTrade {
            order_id: position.order_id,
            instrument: intent.instrument.clone(),
            direction: position.direction,
            archetype: position.archetype,
            entry_price: position.entry_price,
            exit_price: intent.exit_price,
            pnl_points,
            reason: intent.reason,
            entry_time: position.entry_time,
            exit_time: intent.timestamp,
        };
        info!(
            order_id = trade.order_id,
            instrument = %trade.instrument,
            pnl_points = trade.pnl_points,
            reason = %trade.reason,
            "paper exit"
        );
        self.append_log(&trade)?;
        self.closed.push(trade);

        Ok(Fill {
            order_id: position.order_id,
            instrument: intent.instrument.clone(),
            direction: position.direction.opposite(),
            price: intent.exit_price,
            timestamp: intent.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{sample_entry_intent, ts};
    use crate::models::Archetype;

    fn exit_for(intent: &EntryIntent, price: f64, reason: ExitReason) -> ExitIntent {
        ExitIntent {
            instrument: intent.instrument.clone(),
            direction: intent.direction,
            exit_price: price,
            reason,
            timestamp: ts(300),
        }
    }

    #[tokio::test]
    async fn round_trip_books_pnl() {
        let mut transport = PaperTransport::new(None);
        let entry = sample_entry_intent(Direction::Long, Archetype::P2PTrend, 100.0, 97.0);

        let fill = transport.submit_entry(&entry).await.unwrap();
        assert_eq!(fill.order_id, 1);
        assert_eq!(transport.open_positions().len(), 1);

        let exit = exit_for(&entry, 104.0, ExitReason::ScoreFlip);
        transport.submit_exit(&exit).await.unwrap();
        assert!(transport.open_positions().is_empty());
        assert_eq!(transport.closed_trades().len(), 1);
        assert_eq!(transport.total_pnl_points(), 4.0);
    }

    #[tokio::test]
    async fn short_pnl_is_inverted() {
        let mut transport = PaperTransport::new(None);
        let mut entry = sample_entry_intent(Direction::Short, Archetype::Hunter, 100.0, 103.0);
        entry.instrument = "NSE_INDEX|Nifty Bank".to_string();

        transport.submit_entry(&entry).await.unwrap();
        let exit = exit_for(&entry, 96.0, ExitReason::StopLoss);
        transport.submit_exit(&exit).await.unwrap();
        assert_eq!(transport.total_pnl_points(), 4.0);
    }

    #[tokio::test]
    async fn duplicate_entry_is_rejected() {
        let mut transport = PaperTransport::new(None);
        let entry = sample_entry_intent(Direction::Long, Archetype::Hunter, 100.0, 95.6);
        transport.submit_entry(&entry).await.unwrap();
        assert!(transport.submit_entry(&entry).await.is_err());
    }

    #[tokio::test]
    async fn exit_without_position_is_an_error() {
        let mut transport = PaperTransport::new(None);
        let entry = sample_entry_intent(Direction::Long, Archetype::Scalp, 100.0, 99.0);
        let exit = exit_for(&entry, 101.0, ExitReason::SessionEnd);
        assert!(transport.submit_exit(&exit).await.is_err());
    }
}
