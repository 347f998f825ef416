use chrono::{DateTime, Duration, Utc};

use crate::config::{Config, StopMultipliers};
use crate::core::stop_loss::StopLossPlan;
use crate::engine::intents::EntryIntent;
use crate::models::{Archetype, Candle, CandleSeries, Direction, Tick};
use crate::options::{OptionQuote, StrikeEntry};

fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Fixed base timestamp plus an offset in seconds. The base is aligned to
/// both the 1-minute and 5-minute grid.
pub fn ts(secs: i64) -> DateTime<Utc> {
    base_time() + Duration::seconds(secs)
}

/// Candles from (open, high, low, close) tuples with auto-incrementing
/// 1-minute timestamps and a flat volume of 100.
pub fn make_candles(data: &[(f64, f64, f64, f64)]) -> CandleSeries {
    let base = base_time();
    let candles: Vec<Candle> = data
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Candle {
            timestamp: base + Duration::minutes(i as i64),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 100.0,
        })
        .collect();
    CandleSeries::new(candles)
}

/// Same as `make_candles` but with an explicit volume per bar.
pub fn make_candles_with_volume(data: &[(f64, f64, f64, f64, f64)]) -> CandleSeries {
    let base = base_time();
    let candles: Vec<Candle> = data
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c, v))| Candle {
            timestamp: base + Duration::minutes(i as i64),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: v,
        })
        .collect();
    CandleSeries::new(candles)
}

/// Ticks from (seconds offset, price, quantity) tuples.
pub fn make_ticks(instrument: &str, data: &[(i64, f64, f64)]) -> Vec<Tick> {
    data.iter()
        .map(|&(secs, price, qty)| Tick::new(instrument, price, qty, ts(secs)))
        .collect()
}

/// An option chain of `count` strikes in 50-point steps centered on
/// `center`, every strike carrying the same call and put open interest.
pub fn make_chain(center: f64, count: usize, put_oi: f64, call_oi: f64) -> Vec<StrikeEntry> {
    let center = (center / 50.0).round() as i64 * 50;
    let half = count as i64 / 2;
    (0..count as i64)
        .map(|i| {
            let strike = center + (i - half) * 50;
            StrikeEntry {
                strike_price: strike as f64,
                call: Some(OptionQuote {
                    instrument_key: format!("NSE_FO|{strike}CE"),
                    open_interest: call_oi,
                }),
                put: Some(OptionQuote {
                    instrument_key: format!("NSE_FO|{strike}PE"),
                    open_interest: put_oi,
                }),
            }
        })
        .collect()
}

/// An entry intent with its stop plan pre-built, for state machine and
/// transport tests that do not care how the plan was derived.
pub fn sample_entry_intent(
    direction: Direction,
    archetype: Archetype,
    entry_price: f64,
    stop_level: f64,
) -> EntryIntent {
    EntryIntent {
        instrument: "NSE_INDEX|Nifty 50".to_string(),
        direction,
        archetype,
        entry_price,
        score_total: match direction {
            Direction::Long => 12,
            Direction::Short => -12,
        },
        probability: 80.0,
        stop: StopLossPlan {
            level: stop_level,
            swing: entry_price,
            atr: (entry_price - stop_level).abs(),
            multiplier: 1.0,
            direction,
        },
        leg: None,
        timestamp: ts(0),
    }
}

/// A config with the production defaults except for the volume-price
/// filter, which tests that exercise it enable explicitly.
pub fn default_test_config() -> Config {
    Config {
        instruments: vec!["NSE_INDEX|Nifty 50".to_string()],
        paper_trade: true,
        score_entry_threshold: 7,
        probability_threshold: 75.0,
        enable_vpa_filter: false,
        mean_reversion_deviation: 0.01,
        rvol_exit_multiplier: 4.0,
        rvol_lookback: 20,
        stop_multipliers: StopMultipliers::default(),
        swing_lookback: 20,
        atr_lookback: 14,
        vpa_lookback: 10,
        evwma_decay_1m: 20.0,
        evwma_decay_5m: 20.0,
        history_limit: 500,
        channel_capacity: 1024,
        log_level: "error".to_string(),
    }
}
