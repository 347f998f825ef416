use chrono::NaiveTime;
use chrono_tz::Asia::Kolkata;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::EngineError;
use crate::models::{CandleSeries, DayType};

// PCR bands from the tactical playbook.
const PCR_BULLISH: f64 = 1.2;
const PCR_BEARISH: f64 = 0.7;
const PCR_BULL_TRAP: f64 = 0.9;
const PCR_BEAR_TRAP: f64 = 1.1;

/// Prior session's final-hour high/low band. Computed once before the open
/// and immutable for the session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HunterZone {
    pub high: f64,
    pub low: f64,
}

impl HunterZone {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

/// Classify the day exactly once at session open. The PCR bands leave gaps
/// (e.g. a gap-up open with PCR between 0.9 and 1.2); those fall through to
/// Choppy and are flagged rather than silently mapped to a trend.
pub fn classify_day_type(opening_price: f64, zone: &HunterZone, pcr: f64) -> DayType {
    let day_type = if opening_price > zone.high && pcr > PCR_BULLISH {
        DayType::BullishTrend
    } else if opening_price < zone.low && pcr < PCR_BEARISH {
        DayType::BearishTrend
    } else if opening_price > zone.high && pcr < PCR_BULL_TRAP {
        DayType::SidewaysBullTrap
    } else if opening_price < zone.low && pcr > PCR_BEAR_TRAP {
        DayType::SidewaysBearTrap
    } else {
        if !zone.contains(opening_price) {
            warn!(
                opening_price,
                pcr,
                zone_high = zone.high,
                zone_low = zone.low,
                "gap open with PCR in an unmapped band, classifying as choppy"
            );
        }
        DayType::Choppy
    };

    info!(opening_price, pcr, %day_type, "day type classified");
    day_type
}

/// Final-hour band of the most recent session in the candle history: bars at
/// or after 14:30 IST on the last traded date. The input is the raw
/// multi-day 1-minute history from the historical-bar provider.
pub fn compute_hunter_zone(history: &CandleSeries) -> Result<HunterZone, EngineError> {
    let last = history.last().ok_or(EngineError::InsufficientHistory {
        needed: 1,
        have: 0,
    })?;

    let last_date = last.timestamp.with_timezone(&Kolkata).date_naive();
    let cutoff = NaiveTime::from_hms_opt(14, 30, 0).unwrap();

    let final_hour: Vec<_> = history
        .iter()
        .filter(|c| {
            let local = c.timestamp.with_timezone(&Kolkata);
            local.date_naive() == last_date && local.time() >= cutoff
        })
        .cloned()
        .collect();

    if final_hour.is_empty() {
        return Err(EngineError::InsufficientHistory {
            needed: 1,
            have: 0,
        });
    }

    let series = CandleSeries::new(final_hour);
    let zone = HunterZone {
        high: series.highs_max(),
        low: series.lows_min(),
    };
    info!(high = zone.high, low = zone.low, %last_date, "hunter zone computed");
    Ok(zone)
}
