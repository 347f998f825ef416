use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::stop_loss::StopLossPlan;
use crate::engine::intents::{EntryIntent, ExitIntent};
use crate::errors::EngineError;
use crate::models::{Archetype, Direction, ExitReason, TradeState};
use crate::options::OptionLeg;

/// The open trade an instrument is riding. At most one exists per
/// instrument at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub archetype: Archetype,
    pub entry_price: f64,
    pub stop: StopLossPlan,
    pub leg: Option<OptionLeg>,
    pub entry_time: DateTime<Utc>,
}

/// Per-instrument trade lifecycle: Idle until the session context is
/// resolved, Armed while hunting for an entry, InPosition while riding
/// one, Exited after it closes. Exited re-arms for the next setup.
#[derive(Debug, Clone)]
pub struct TradeStateMachine {
    instrument: String,
    state: TradeState,
    position: Option<Position>,
}

impl TradeStateMachine {
    pub fn new(instrument: &str) -> Self {
        Self {
            instrument: instrument.to_string(),
            state: TradeState::Idle,
            position: None,
        }
    }

    pub fn state(&self) -> TradeState {
        self.state
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_armed(&self) -> bool {
        self.state == TradeState::Armed
    }

    pub fn in_position(&self) -> bool {
        self.state == TradeState::InPosition
    }

    /// Idle -> Armed once the session context exists. Also re-arms after
    /// an exit so the instrument can take the next setup.
    pub fn arm(&mut self) {
        match self.state {
            TradeState::Idle | TradeState::Exited => {
                self.state = TradeState::Armed;
            }
            _ => {}
        }
    }

    /// Armed -> InPosition. Opening while a position is live is rejected
    /// and leaves the existing position untouched.
    pub fn open(&mut self, intent: &EntryIntent) -> Result<(), EngineError> {
        if self.position.is_some() {
            return Err(EngineError::InvariantViolation {
                instrument: self.instrument.clone(),
                detail: format!(
                    "entry ({} {}) attempted with a position already open",
                    intent.archetype, intent.direction
                ),
            });
        }
        if self.state != TradeState::Armed {
            return Err(EngineError::InvariantViolation {
                instrument: self.instrument.clone(),
                detail: format!("entry attempted while {}", self.state),
            });
        }

        info!(
            instrument = %self.instrument,
            direction = %intent.direction,
            archetype = %intent.archetype,
            entry = intent.entry_price,
            stop = intent.stop.level,
            "position opened"
        );
        self.position = Some(Position {
            direction: intent.direction,
            archetype: intent.archetype,
            entry_price: intent.entry_price,
            stop: intent.stop,
            leg: intent.leg.clone(),
            entry_time: intent.timestamp,
        });
        self.state = TradeState::InPosition;
        Ok(())
    }

    /// InPosition -> Exited, producing the intent the transport acts on.
    pub fn close(
        &mut self,
        reason: ExitReason,
        exit_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<ExitIntent, EngineError> {
        let position = self
            .position
            .take()
            .ok_or_else(|| EngineError::InvariantViolation {
                instrument: self.instrument.clone(),
                detail: "exit attempted with no open position".to_string(),
            })?;

        info!(
            instrument = %self.instrument,
            direction = %position.direction,
            reason = %reason,
            exit = exit_price,
            "position closed"
        );
        self.state = TradeState::Exited;
        Ok(ExitIntent {
            instrument: self.instrument.clone(),
            direction: position.direction,
            exit_price,
            reason,
            timestamp,
        })
    }

    /// Tick-level stop check. Cheap enough to run on every trade print.
    pub fn stop_breached(&self, price: f64) -> bool {
        self.position
            .as_ref()
            .map(|p| p.stop.breached(price))
            .unwrap_or(false)
    }

    /// Replace the stop with a tightened plan (P2P-Trend trailing).
    pub fn tighten_stop(&mut self, plan: StopLossPlan) {
        if let Some(position) = self.position.as_mut() {
            info!(
                instrument = %self.instrument,
                level = plan.level,
                "stop tightened"
            );
            position.stop = plan;
        }
    }
}
