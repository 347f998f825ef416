use chrono::{DateTime, Duration, Utc};

use tactical_trading_bot::config::{Config, StopMultipliers};
use tactical_trading_bot::models::Candle;
use tactical_trading_bot::options::{OptionQuote, StrikeEntry};

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
        + Duration::seconds(secs)
}

/// Steadily drifting 1-minute bars: `step` points per bar, negative for a
/// falling tape. Keep `volume` small next to the decay period so the
/// resampled 5-minute averages trail the tape instead of overshooting it.
pub fn trend_bars(start: f64, step: f64, n: usize, volume: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let open = start + i as f64 * step;
            let close = open + step;
            Candle {
                timestamp: ts(i as i64 * 60),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume,
            }
        })
        .collect()
}

pub fn flat_bars(price: f64, n: usize, volume: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| Candle {
            timestamp: ts(i as i64 * 60),
            open: price,
            high: price + 1.0,
            low: price - 1.0,
            close: price,
            volume,
        })
        .collect()
}

/// An option chain of `count` strikes in 50-point steps centered on
/// `center`, same open interest at every strike.
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

pub fn test_config() -> Config {
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
