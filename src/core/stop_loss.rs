use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::EngineError;
use crate::models::{CandleSeries, Direction};

/// A local price extreme anchoring a structural stop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwingPoint {
    pub price: f64,
    pub bar_index: usize,
}

/// Structural stop level: the relevant swing extreme buffered by a
/// volatility allowance. Computed once at entry; only the P2P-Trend
/// archetype recomputes it afterwards, and then only to tighten.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StopLossPlan {
    pub level: f64,
    pub swing: f64,
    pub atr: f64,
    pub multiplier: f64,
    pub direction: Direction,
}

impl StopLossPlan {
    /// Constant-time breach test run on every tick while in position.
    pub fn breached(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long => price <= self.level,
            Direction::Short => price >= self.level,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StopLossEngine {
    pub swing_lookback: usize,
    pub atr_lookback: usize,
}

impl StopLossEngine {
    pub fn new(swing_lookback: usize, atr_lookback: usize) -> Self {
        Self {
            swing_lookback,
            atr_lookback,
        }
    }

    /// Most recent local extreme within the trailing lookback window: a bar
    /// whose low (long) / high (short) is not exceeded by either neighbor,
    /// scanning from the newest bar backward. The newest bar has no right
    /// neighbor and cannot be a pivot, but when it prints a fresh extreme it
    /// overrides any interior pivot, so the anchor never sits inside the
    /// entry bar's range. When no bar in the window qualifies as a pivot,
    /// the window extreme itself is the anchor.
    pub fn find_swing(
        &self,
        bars: &CandleSeries,
        direction: Direction,
    ) -> Result<SwingPoint, EngineError> {
        if bars.len() < self.swing_lookback {
            return Err(EngineError::InsufficientHistory {
                needed: self.swing_lookback,
                have: bars.len(),
            });
        }

        let start = bars.len() - self.swing_lookback;
        let newest = &bars[bars.len() - 1];
        for i in (start.max(1)..bars.len() - 1).rev() {
            let prev = &bars[i - 1];
            let cur = &bars[i];
            let next = &bars[i + 1];
            let is_pivot = match direction {
                Direction::Long => cur.low <= prev.low && cur.low <= next.low,
                Direction::Short => cur.high >= prev.high && cur.high >= next.high,
            };
            if is_pivot {
                let (price, bar_index) = match direction {
                    Direction::Long if newest.low < cur.low => (newest.low, bars.len() - 1),
                    Direction::Long => (cur.low, i),
                    Direction::Short if newest.high > cur.high => (newest.high, bars.len() - 1),
                    Direction::Short => (cur.high, i),
                };
                return Ok(SwingPoint { price, bar_index });
            }
        }

        let window = bars.slice(start, bars.len());
        let price = match direction {
            Direction::Long => window.lows_min(),
            Direction::Short => window.highs_max(),
        };
        debug!(%direction, price, "no pivot in window, anchoring stop on window extreme");
        Ok(SwingPoint {
            price,
            bar_index: bars.len() - 1,
        })
    }

    /// Average true range over the trailing window. Needs one bar more than
    /// the lookback for the first close-to-close term.
    pub fn atr(&self, bars: &CandleSeries) -> Result<f64, EngineError> {
        if bars.len() < self.atr_lookback + 1 {
            return Err(EngineError::InsufficientHistory {
                needed: self.atr_lookback + 1,
                have: bars.len(),
            });
        }

        let start = bars.len() - self.atr_lookback;
        let mut sum = 0.0;
        for i in start..bars.len() {
            let hl = bars[i].high - bars[i].low;
            let hc = (bars[i].high - bars[i - 1].close).abs();
            let lc = (bars[i].low - bars[i - 1].close).abs();
            sum += hl.max(hc).max(lc);
        }
        Ok(sum / self.atr_lookback as f64)
    }

    /// swing minus the buffer for longs, plus for shorts.
    pub fn plan(
        &self,
        bars: &CandleSeries,
        direction: Direction,
        multiplier: f64,
    ) -> Result<StopLossPlan, EngineError> {
        let swing = self.find_swing(bars, direction)?;
        let atr = self.atr(bars)?;
        let buffer = multiplier * atr;
        let level = match direction {
            Direction::Long => swing.price - buffer,
            Direction::Short => swing.price + buffer,
        };
        Ok(StopLossPlan {
            level,
            swing: swing.price,
            atr,
            multiplier,
            direction,
        })
    }

    /// Re-anchor on the latest swing, keeping the tighter of the two levels.
    /// Returns the replacement plan only when it actually tightens.
    pub fn trail(
        &self,
        bars: &CandleSeries,
        current: &StopLossPlan,
    ) -> Result<Option<StopLossPlan>, EngineError> {
        let candidate = self.plan(bars, current.direction, current.multiplier)?;
        let tightens = match current.direction {
            Direction::Long => candidate.level > current.level,
            Direction::Short => candidate.level < current.level,
        };
        Ok(if tightens { Some(candidate) } else { None })
    }
}
