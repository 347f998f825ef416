use chrono::{DateTime, Utc};
use tracing::warn;

use crate::models::{Candle, CandleSeries, Tick, Timeframe};

fn window_start(ts: DateTime<Utc>, window_secs: i64) -> DateTime<Utc> {
    let secs = ts.timestamp();
    let start = secs - secs.rem_euclid(window_secs);
    DateTime::from_timestamp(start, 0).unwrap_or(ts)
}

/// Folds a time-ordered tick stream into closed bars for one
/// (instrument, timeframe). The in-progress bar is owned exclusively here
/// until it closes; downstream consumers only ever see closed bars.
#[derive(Debug)]
pub struct CandleAggregator {
    instrument: String,
    timeframe: Timeframe,
    current: Option<Candle>,
    /// Out-of-order ticks for already-closed windows, counted rather than
    /// silently lost.
    pub dropped_ticks: u64,
}

impl CandleAggregator {
    pub fn new(instrument: &str, timeframe: Timeframe) -> Self {
        Self {
            instrument: instrument.to_string(),
            timeframe,
            current: None,
            dropped_ticks: 0,
        }
    }

    /// Fold one tick in. Returns the previous bar when the tick opens a new
    /// window; the returned bar is closed and immutable from here on.
    pub fn ingest(&mut self, tick: &Tick) -> Option<Candle> {
        let window = window_start(tick.timestamp, self.timeframe.as_seconds());

        match &mut self.current {
            None => {
                self.current = Some(Candle {
                    timestamp: window,
                    open: tick.price,
                    high: tick.price,
                    low: tick.price,
                    close: tick.price,
                    volume: tick.quantity,
                });
                None
            }
            Some(bar) if bar.timestamp == window => {
                bar.high = bar.high.max(tick.price);
                bar.low = bar.low.min(tick.price);
                bar.close = tick.price;
                bar.volume += tick.quantity;
                None
            }
            Some(bar) if window > bar.timestamp => {
                let closed = self.current.replace(Candle {
                    timestamp: window,
                    open: tick.price,
                    high: tick.price,
                    low: tick.price,
                    close: tick.price,
                    volume: tick.quantity,
                });
                closed
            }
            Some(bar) => {
                // Tick for a window that already closed.
                self.dropped_ticks += 1;
                warn!(
                    instrument = %self.instrument,
                    tf = %self.timeframe,
                    tick_window = %window,
                    open_window = %bar.timestamp,
                    dropped = self.dropped_ticks,
                    "dropping out-of-order tick"
                );
                None
            }
        }
    }

    /// Close the in-progress bar once `now` has moved past its window.
    /// Driven by a timer so a quiet tape cannot hold a bar open waiting
    /// for the next window's first tick.
    pub fn close_expired(&mut self, now: DateTime<Utc>) -> Option<Candle> {
        let window = window_start(now, self.timeframe.as_seconds());
        match &self.current {
            Some(bar) if window > bar.timestamp => self.current.take(),
            _ => None,
        }
    }

    /// Hand back the in-progress bar at session end without treating it as
    /// closed. The aggregator is empty afterwards.
    pub fn flush(&mut self) -> Option<Candle> {
        self.current.take()
    }
}

/// Re-aggregates closed 1-minute bars into the 5-minute feed, so the two
/// timeframes stay numerically consistent by construction.
#[derive(Debug)]
pub struct BarResampler {
    timeframe: Timeframe,
    current: Option<Candle>,
}

impl BarResampler {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            current: None,
        }
    }

    pub fn ingest(&mut self, bar: &Candle) -> Option<Candle> {
        let window = window_start(bar.timestamp, self.timeframe.as_seconds());

        match &mut self.current {
            None => {
                self.current = Some(Candle {
                    timestamp: window,
                    ..bar.clone()
                });
                None
            }
            Some(agg) if agg.timestamp == window => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
                None
            }
            Some(_) => self.current.replace(Candle {
                timestamp: window,
                ..bar.clone()
            }),
        }
    }

    pub fn flush(&mut self) -> Option<Candle> {
        self.current.take()
    }
}

/// Convenience for tests and session bootstrap: resample a whole series.
pub fn resample_series(bars: &CandleSeries, timeframe: Timeframe) -> CandleSeries {
    let mut resampler = BarResampler::new(timeframe);
    let mut out = Vec::new();
    for bar in bars {
        if let Some(closed) = resampler.ingest(bar) {
            out.push(closed);
        }
    }
    if let Some(last) = resampler.flush() {
        out.push(last);
    }
    CandleSeries::new(out)
}
