use tracing::debug;

use crate::models::{CandleSeries, VpaSignal};

const CLIMAX_VOLUME_FACTOR: f64 = 1.5;
const NARROW_RANGE_FACTOR: f64 = 0.7;

/// Volume-price analysis over the trailing closed bars. The detectors all
/// compare the latest bar against the `lookback` bars before it; with fewer
/// bars than that the result is `VpaSignal::None` (indeterminate, not a
/// default direction).
#[derive(Debug, Clone)]
pub struct VpaDetector {
    lookback: usize,
}

impl VpaDetector {
    pub fn new(lookback: usize) -> Self {
        Self { lookback }
    }

    /// Pivot signals outrank effort-vs-result signals when several fire on
    /// the same bar.
    pub fn detect(&self, bars: &CandleSeries) -> VpaSignal {
        if bars.len() < self.lookback + 1 {
            debug!(
                have = bars.len(),
                need = self.lookback + 1,
                "vpa window not filled yet"
            );
            return VpaSignal::None;
        }

        if self.pocket_pivot_volume(bars) {
            VpaSignal::PocketPivotVolume
        } else if self.pivot_negative_volume(bars) {
            VpaSignal::PivotNegativeVolume
        } else if self.accumulation(bars) {
            VpaSignal::Accumulation
        } else if self.distribution(bars) {
            VpaSignal::Distribution
        } else {
            VpaSignal::None
        }
    }

    /// Up-bar whose volume beats every down-bar in the trailing window.
    fn pocket_pivot_volume(&self, bars: &CandleSeries) -> bool {
        let latest = &bars[bars.len() - 1];
        if !latest.is_bullish() {
            return false;
        }

        let window = bars.slice(bars.len() - 1 - self.lookback, bars.len() - 1);
        let max_down_volume = window
            .iter()
            .filter(|c| c.is_bearish())
            .map(|c| c.volume)
            .fold(f64::NAN, f64::max);

        !max_down_volume.is_nan() && latest.volume > max_down_volume
    }

    /// Down-bar whose volume beats every up-bar in the trailing window.
    fn pivot_negative_volume(&self, bars: &CandleSeries) -> bool {
        let latest = &bars[bars.len() - 1];
        if !latest.is_bearish() {
            return false;
        }

        let window = bars.slice(bars.len() - 1 - self.lookback, bars.len() - 1);
        let max_up_volume = window
            .iter()
            .filter(|c| c.is_bullish())
            .map(|c| c.volume)
            .fold(f64::NAN, f64::max);

        !max_up_volume.is_nan() && latest.volume > max_up_volume
    }

    /// High effort, small result, up close: narrow-range bar absorbing
    /// above-average volume.
    fn accumulation(&self, bars: &CandleSeries) -> bool {
        let latest = &bars[bars.len() - 1];
        let (avg_range, avg_volume) = match self.window_averages(bars) {
            Some(v) => v,
            None => return false,
        };

        latest.volume > avg_volume * CLIMAX_VOLUME_FACTOR
            && latest.total_range() < avg_range * NARROW_RANGE_FACTOR
            && latest.is_bullish()
    }

    /// Mirror of accumulation on a down close.
    fn distribution(&self, bars: &CandleSeries) -> bool {
        let latest = &bars[bars.len() - 1];
        let (avg_range, avg_volume) = match self.window_averages(bars) {
            Some(v) => v,
            None => return false,
        };

        latest.volume > avg_volume * CLIMAX_VOLUME_FACTOR
            && latest.total_range() < avg_range * NARROW_RANGE_FACTOR
            && latest.is_bearish()
    }

    fn window_averages(&self, bars: &CandleSeries) -> Option<(f64, f64)> {
        let window = bars.slice(bars.len() - 1 - self.lookback, bars.len() - 1);
        if window.is_empty() {
            return None;
        }
        let n = window.len() as f64;
        let avg_range = window.iter().map(|c| c.total_range()).sum::<f64>() / n;
        let avg_volume = window.iter().map(|c| c.volume).sum::<f64>() / n;
        Some((avg_range, avg_volume))
    }
}
