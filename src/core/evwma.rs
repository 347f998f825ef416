use crate::models::Candle;

/// Elastic volume-weighted moving average for one (instrument, timeframe).
/// Each closed bar pulls the average toward its close in proportion to the
/// bar's share of the decay window:
///
///   avg += (volume / decay_period) * (close - avg)
///
/// Seeded from the first close of the session so there is never a NaN or
/// zero-division state. Slope is the change across the last update.
#[derive(Debug, Clone)]
pub struct EvwmaEngine {
    decay_period: f64,
    current: Option<f64>,
    previous: Option<f64>,
}

impl EvwmaEngine {
    pub fn new(decay_period: f64) -> Self {
        Self {
            decay_period,
            current: None,
            previous: None,
        }
    }

    pub fn update(&mut self, bar: &Candle) {
        match self.current {
            None => {
                self.current = Some(bar.close);
                self.previous = Some(bar.close);
            }
            Some(avg) => {
                let weight = bar.volume / self.decay_period;
                self.previous = self.current;
                self.current = Some(avg + weight * (bar.close - avg));
            }
        }
    }

    pub fn average(&self) -> Option<f64> {
        self.current
    }

    /// current - previous average; None until seeded.
    pub fn slope(&self) -> Option<f64> {
        match (self.current, self.previous) {
            (Some(c), Some(p)) => Some(c - p),
            _ => None,
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.current.is_some()
    }

    /// Session-start reset; the average never carries across sessions.
    pub fn reset(&mut self) {
        self.current = None;
        self.previous = None;
    }
}
