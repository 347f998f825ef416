use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Asia::Kolkata;
use serde::{Deserialize, Serialize};

use crate::core::day_type::{classify_day_type, HunterZone};
use crate::models::DayType;

/// NSE cash session, IST.
const MARKET_OPEN: (u32, u32) = (9, 15);
const MARKET_CLOSE: (u32, u32) = (15, 30);

pub fn is_market_hours(now: DateTime<Utc>) -> bool {
    let local = now.with_timezone(&Kolkata).time();
    let open = NaiveTime::from_hms_opt(MARKET_OPEN.0, MARKET_OPEN.1, 0).unwrap();
    let close = NaiveTime::from_hms_opt(MARKET_CLOSE.0, MARKET_CLOSE.1, 0).unwrap();
    local >= open && local <= close
}

/// Session-scoped inputs resolved once at the open and read everywhere:
/// the prior session's reference band, the opening print, option sentiment
/// and the regime derived from them. Explicitly passed into component
/// calls; nothing reads it as ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub hunter_zone: HunterZone,
    pub opening_price: f64,
    pub pcr: f64,
    pub day_type: DayType,
    /// Cross-index directional agreement, resolved outside the
    /// per-instrument engine. Single-index runs pass true.
    pub index_sync: bool,
}

impl SessionContext {
    pub fn resolve(hunter_zone: HunterZone, opening_price: f64, pcr: f64) -> Self {
        let day_type = classify_day_type(opening_price, &hunter_zone, pcr);
        Self {
            hunter_zone,
            opening_price,
            pcr,
            day_type,
            index_sync: true,
        }
    }
}
